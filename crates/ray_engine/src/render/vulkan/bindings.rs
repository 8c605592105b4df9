//! Descriptor bindings for the ray-tracing pipeline
//!
//! A single descriptor set exposes the whole compiled scene to the
//! shaders. Slots are fixed; the per-table slots are arrayed, one element
//! per geometry, material, instance or light, so the shaders index them
//! with the same integers the instance records carry.

use ash::vk;

use crate::render::vulkan::context::DeviceContext;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Top-level acceleration structure
pub const SLOT_TOP_LEVEL: u32 = 0;
/// Output storage image
pub const SLOT_OUTPUT_IMAGE: u32 = 1;
/// Accumulation storage image
pub const SLOT_ACCUMULATION_IMAGE: u32 = 2;
/// Camera uniform buffer
pub const SLOT_CAMERA: u32 = 3;
/// Per-geometry attribute buffers
pub const SLOT_ATTRIBUTES: u32 = 4;
/// Per-geometry face buffers
pub const SLOT_FACES: u32 = 5;
/// Per-material record buffers
pub const SLOT_MATERIALS: u32 = 6;
/// Per-instance record buffers
pub const SLOT_INSTANCES: u32 = 7;
/// Per-light record buffers
pub const SLOT_LIGHTS: u32 = 8;
/// Texture array sampler
pub const SLOT_TEXTURES: u32 = 9;
/// Environment array sampler
pub const SLOT_ENVIRONMENTS: u32 = 10;

const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::RAYGEN_KHR.as_raw()
        | vk::ShaderStageFlags::CLOSEST_HIT_KHR.as_raw()
        | vk::ShaderStageFlags::MISS_KHR.as_raw(),
);

/// Array lengths of the table slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindingCounts {
    /// Geometry count, sizes the attribute and face slots
    pub geometries: u32,
    /// Material count
    pub materials: u32,
    /// Instance count
    pub instances: u32,
    /// Light count
    pub lights: u32,
}

/// Buffer descriptor infos for every table slot of one scene.
#[derive(Debug, Default)]
pub struct SceneBufferInfos {
    /// One entry per geometry's attribute buffer
    pub attributes: Vec<vk::DescriptorBufferInfo>,
    /// One entry per geometry's face buffer
    pub faces: Vec<vk::DescriptorBufferInfo>,
    /// One entry per material record buffer
    pub materials: Vec<vk::DescriptorBufferInfo>,
    /// One entry per instance record buffer
    pub instances: Vec<vk::DescriptorBufferInfo>,
    /// One entry per light record buffer
    pub lights: Vec<vk::DescriptorBufferInfo>,
}

/// The scene descriptor set with its layout and pool.
pub struct BindingTable {
    device: ash::Device,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

impl BindingTable {
    /// Create the layout, pool and one descriptor set sized for the given
    /// table counts. Array slots are laid out with a minimum count of one
    /// so an empty table still produces a valid layout.
    pub fn new(ctx: &DeviceContext, counts: BindingCounts) -> VulkanResult<Self> {
        let slot = |binding, ty, count: u32| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(count.max(1))
                .stage_flags(STAGES)
                .build()
        };

        let bindings = [
            slot(
                SLOT_TOP_LEVEL,
                vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
                1,
            ),
            slot(SLOT_OUTPUT_IMAGE, vk::DescriptorType::STORAGE_IMAGE, 1),
            slot(
                SLOT_ACCUMULATION_IMAGE,
                vk::DescriptorType::STORAGE_IMAGE,
                1,
            ),
            slot(SLOT_CAMERA, vk::DescriptorType::UNIFORM_BUFFER, 1),
            slot(
                SLOT_ATTRIBUTES,
                vk::DescriptorType::STORAGE_BUFFER,
                counts.geometries,
            ),
            slot(
                SLOT_FACES,
                vk::DescriptorType::STORAGE_BUFFER,
                counts.geometries,
            ),
            slot(
                SLOT_MATERIALS,
                vk::DescriptorType::STORAGE_BUFFER,
                counts.materials,
            ),
            slot(
                SLOT_INSTANCES,
                vk::DescriptorType::STORAGE_BUFFER,
                counts.instances,
            ),
            slot(
                SLOT_LIGHTS,
                vk::DescriptorType::STORAGE_BUFFER,
                counts.lights,
            ),
            slot(
                SLOT_TEXTURES,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                1,
            ),
            slot(
                SLOT_ENVIRONMENTS,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                1,
            ),
        ];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe {
            ctx.device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let storage_count = counts.geometries.max(1) * 2
            + counts.materials.max(1)
            + counts.instances.max(1)
            + counts.lights.max(1);
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
                descriptor_count: 1,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: 2,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: storage_count,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 2,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = unsafe {
            ctx.device
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let set = unsafe {
            ctx.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?[0]
        };

        Ok(Self {
            device: ctx.device.clone(),
            layout,
            pool,
            set,
        })
    }

    /// Write the acceleration structure, all table buffers and both
    /// samplers. Empty tables are skipped; their layout slots keep the
    /// placeholder count and are simply never read.
    pub fn write_scene(
        &self,
        tlas: vk::AccelerationStructureKHR,
        buffers: &SceneBufferInfos,
        textures: vk::DescriptorImageInfo,
        environments: vk::DescriptorImageInfo,
    ) {
        let structures = [tlas];
        let mut tlas_info = vk::WriteDescriptorSetAccelerationStructureKHR::builder()
            .acceleration_structures(&structures);
        let mut tlas_write = vk::WriteDescriptorSet::builder()
            .dst_set(self.set)
            .dst_binding(SLOT_TOP_LEVEL)
            .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
            .push_next(&mut tlas_info)
            .build();
        // The count lives in the extension struct, not the buffer arrays,
        // so the builder leaves it at zero.
        tlas_write.descriptor_count = 1;

        let texture_infos = [textures];
        let environment_infos = [environments];

        let mut writes = vec![
            tlas_write,
            vk::WriteDescriptorSet::builder()
                .dst_set(self.set)
                .dst_binding(SLOT_TEXTURES)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&texture_infos)
                .build(),
            vk::WriteDescriptorSet::builder()
                .dst_set(self.set)
                .dst_binding(SLOT_ENVIRONMENTS)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&environment_infos)
                .build(),
        ];

        let buffer_slots = [
            (SLOT_ATTRIBUTES, &buffers.attributes),
            (SLOT_FACES, &buffers.faces),
            (SLOT_MATERIALS, &buffers.materials),
            (SLOT_INSTANCES, &buffers.instances),
            (SLOT_LIGHTS, &buffers.lights),
        ];
        for (binding, infos) in buffer_slots {
            if infos.is_empty() {
                continue;
            }
            writes.push(
                vk::WriteDescriptorSet::builder()
                    .dst_set(self.set)
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(infos)
                    .build(),
            );
        }

        unsafe {
            self.device.update_descriptor_sets(&writes, &[]);
        }
    }

    /// Write the output and accumulation storage images
    pub fn write_render_targets(
        &self,
        output_view: vk::ImageView,
        accumulation_view: vk::ImageView,
    ) {
        let output_info = [vk::DescriptorImageInfo {
            sampler: vk::Sampler::null(),
            image_view: output_view,
            image_layout: vk::ImageLayout::GENERAL,
        }];
        let accumulation_info = [vk::DescriptorImageInfo {
            sampler: vk::Sampler::null(),
            image_view: accumulation_view,
            image_layout: vk::ImageLayout::GENERAL,
        }];

        let writes = [
            vk::WriteDescriptorSet::builder()
                .dst_set(self.set)
                .dst_binding(SLOT_OUTPUT_IMAGE)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(&output_info)
                .build(),
            vk::WriteDescriptorSet::builder()
                .dst_set(self.set)
                .dst_binding(SLOT_ACCUMULATION_IMAGE)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(&accumulation_info)
                .build(),
        ];

        unsafe {
            self.device.update_descriptor_sets(&writes, &[]);
        }
    }

    /// Write the camera uniform buffer
    pub fn write_camera(&self, camera: vk::DescriptorBufferInfo) {
        let camera_info = [camera];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(self.set)
            .dst_binding(SLOT_CAMERA)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&camera_info)
            .build();
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }

    /// Layout handle for pipeline creation
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// The descriptor set
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}

impl Drop for BindingTable {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
