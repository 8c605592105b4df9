//! One-shot command submission
//!
//! Uploads and acceleration-structure builds all run through the same
//! pattern: record into a transient command buffer, submit, wait idle,
//! destroy the pool. Throughput does not matter at scene-build time, so
//! the simple synchronous path wins over fence juggling.

use ash::vk;

use crate::render::vulkan::context::DeviceContext;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Record and synchronously execute a single command buffer.
pub fn submit_one_shot<F>(ctx: &DeviceContext, record: F) -> VulkanResult<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer),
{
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .flags(vk::CommandPoolCreateFlags::TRANSIENT)
        .queue_family_index(ctx.queue_family_index);
    let pool = unsafe {
        ctx.device
            .create_command_pool(&pool_info, None)
            .map_err(VulkanError::Api)?
    };

    let result = submit_with_pool(ctx, pool, record);

    unsafe {
        ctx.device.destroy_command_pool(pool, None);
    }
    result
}

fn submit_with_pool<F>(ctx: &DeviceContext, pool: vk::CommandPool, record: F) -> VulkanResult<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer),
{
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);
    let cmd = unsafe {
        ctx.device
            .allocate_command_buffers(&alloc_info)
            .map_err(VulkanError::Api)?[0]
    };

    let begin_info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe {
        ctx.device
            .begin_command_buffer(cmd, &begin_info)
            .map_err(VulkanError::Api)?;
    }

    record(&ctx.device, cmd);

    unsafe {
        ctx.device
            .end_command_buffer(cmd)
            .map_err(VulkanError::Api)?;

        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        ctx.device
            .queue_submit(ctx.queue, &[submit_info.build()], vk::Fence::null())
            .map_err(VulkanError::Api)?;
        ctx.device
            .queue_wait_idle(ctx.queue)
            .map_err(VulkanError::Api)?;
    }

    Ok(())
}

/// Record an image layout transition covering the given array layers.
pub fn set_image_layout(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    layer_count: u32,
) {
    let (src_access, src_stage) = match old_layout {
        vk::ImageLayout::UNDEFINED => (
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TOP_OF_PIPE,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        _ => (
            vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    };
    let (dst_access, dst_stage) = match new_layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::RAY_TRACING_SHADER_KHR,
        ),
        _ => (
            vk::AccessFlags::MEMORY_READ,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    };

    let barrier = vk::ImageMemoryBarrier::builder()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::builder()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(layer_count)
                .build(),
        );

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }
}
