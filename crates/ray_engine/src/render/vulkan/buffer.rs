//! Buffer management for scene tables and build inputs
//!
//! Memory management following RAII patterns with proper allocation and
//! cleanup. Buffers used as acceleration-structure inputs carry device
//! addresses, which requires the DEVICE_ADDRESS allocation flag.

use ash::vk;
use std::mem;

use crate::render::vulkan::commands::submit_one_shot;
use crate::render::vulkan::context::DeviceContext;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: ash::Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        ctx: &DeviceContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        // Zero-sized allocations are invalid; empty tables still bind.
        let size = size.max(1);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            ctx.device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = find_memory_type(
            ctx,
            mem_requirements.memory_type_bits,
            properties,
        )?;

        let mut alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        // Device addresses require the matching allocation flag.
        let mut flags_info = vk::MemoryAllocateFlagsInfo::builder()
            .flags(vk::MemoryAllocateFlags::DEVICE_ADDRESS);
        if usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            alloc_info = alloc_info.push_next(&mut flags_info);
        }

        let memory = unsafe {
            ctx.device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };

        unsafe {
            ctx.device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(Self {
            device: ctx.device.clone(),
            buffer,
            memory,
            size,
        })
    }

    /// Create a host-visible buffer pre-filled with the given bytes
    pub fn host_visible_with_data(
        ctx: &DeviceContext,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let buffer = Self::new(
            ctx,
            data.len() as vk::DeviceSize,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_bytes(data)?;
        Ok(buffer)
    }

    /// Create a device-local buffer filled through a transient staging copy
    pub fn device_local_with_data(
        ctx: &DeviceContext,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let staging = Self::host_visible_with_data(
            ctx,
            data,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )?;

        let buffer = Self::new(
            ctx,
            data.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        staging.copy_to(ctx, &buffer)?;
        Ok(buffer)
    }

    /// Map memory for writing
    pub fn map_memory(&self) -> VulkanResult<*mut std::ffi::c_void> {
        unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    /// Unmap memory
    pub fn unmap_memory(&self) {
        unsafe {
            self.device.unmap_memory(self.memory);
        }
    }

    /// Write raw bytes into a host-visible buffer
    pub fn write_bytes(&self, data: &[u8]) -> VulkanResult<()> {
        let data_ptr = self.map_memory()?;

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr() as *const std::ffi::c_void,
                data_ptr,
                data.len(),
            );
        }

        self.unmap_memory();
        Ok(())
    }

    /// Write typed data into a host-visible buffer
    pub fn write_data<T>(&self, data: &[T]) -> VulkanResult<()> {
        let data_ptr = self.map_memory()?;

        unsafe {
            let src_ptr = data.as_ptr() as *const std::ffi::c_void;
            let size = data.len() * mem::size_of::<T>();
            std::ptr::copy_nonoverlapping(src_ptr, data_ptr, size);
        }

        self.unmap_memory();
        Ok(())
    }

    /// Copy this buffer's full contents into another via a one-shot submit
    pub fn copy_to(&self, ctx: &DeviceContext, dst: &Buffer) -> VulkanResult<()> {
        let region = vk::BufferCopy::builder().size(self.size.min(dst.size)).build();
        submit_one_shot(ctx, |device, cmd| unsafe {
            device.cmd_copy_buffer(cmd, self.buffer, dst.buffer, &[region]);
        })
    }

    /// Query the buffer's device address
    pub fn device_address(&self) -> vk::DeviceAddress {
        let info = vk::BufferDeviceAddressInfo::builder().buffer(self.buffer);
        unsafe { self.device.get_buffer_device_address(&info) }
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Find memory type with required properties
pub(crate) fn find_memory_type(
    ctx: &DeviceContext,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let mem_properties = unsafe {
        ctx.instance
            .get_physical_device_memory_properties(ctx.physical_device)
    };

    for i in 0..mem_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && (mem_properties.memory_types[i as usize].property_flags & properties) == properties
        {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}
