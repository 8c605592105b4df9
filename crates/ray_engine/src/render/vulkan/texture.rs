//! Layered texture arrays
//!
//! One 2D-array image per table: the texture table at RGBA8, the
//! environment table at RGBA32F. Layers are staged through a host-visible
//! buffer and copied in a single submit with the usual layout transitions
//! around the copy.

use ash::vk;

use crate::render::vulkan::buffer::{find_memory_type, Buffer};
use crate::render::vulkan::commands::{set_image_layout, submit_one_shot};
use crate::render::vulkan::context::DeviceContext;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Sampled 2D-array image with its view and sampler.
pub struct TextureArray {
    device: ash::Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
}

impl TextureArray {
    /// Create a device-local array image and fill every layer from the
    /// tightly packed pixel block.
    pub fn new(
        ctx: &DeviceContext,
        format: vk::Format,
        width: u32,
        height: u32,
        layer_count: u32,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(layer_count)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            ctx.device
                .create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let memory_type_index = find_memory_type(
            ctx,
            mem_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe {
            ctx.device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };
        unsafe {
            ctx.device
                .bind_image_memory(image, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        let staging =
            Buffer::host_visible_with_data(ctx, pixels, vk::BufferUsageFlags::TRANSFER_SRC)?;

        let layer_stride = (pixels.len() / layer_count as usize) as vk::DeviceSize;
        submit_one_shot(ctx, |device, cmd| {
            set_image_layout(
                device,
                cmd,
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                layer_count,
            );

            let regions: Vec<vk::BufferImageCopy> = (0..layer_count)
                .map(|layer| {
                    vk::BufferImageCopy::builder()
                        .buffer_offset(layer as vk::DeviceSize * layer_stride)
                        .image_subresource(
                            vk::ImageSubresourceLayers::builder()
                                .aspect_mask(vk::ImageAspectFlags::COLOR)
                                .mip_level(0)
                                .base_array_layer(layer)
                                .layer_count(1)
                                .build(),
                        )
                        .image_extent(vk::Extent3D {
                            width,
                            height,
                            depth: 1,
                        })
                        .build()
                })
                .collect();
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.handle(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &regions,
                );
            }

            set_image_layout(
                device,
                cmd,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                layer_count,
            );
        })?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D_ARRAY)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::builder()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(layer_count)
                    .build(),
            );
        let view = unsafe {
            ctx.device
                .create_image_view(&view_info, None)
                .map_err(VulkanError::Api)?
        };

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0);
        let sampler = unsafe {
            ctx.device
                .create_sampler(&sampler_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: ctx.device.clone(),
            image,
            memory,
            view,
            sampler,
        })
    }

    /// Descriptor info for a combined image sampler binding
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}

impl Drop for TextureArray {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
