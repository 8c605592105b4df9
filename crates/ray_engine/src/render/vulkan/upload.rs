//! Scene upload
//!
//! Moves a compiled scene onto the device: table buffers, texture arrays,
//! acceleration structures and the descriptor set that ties them together.
//! After this stage the renderer only needs the descriptor set layout and
//! the set itself; all resources are owned here and released together.

use ash::vk;
use log::info;

use crate::compile::CompiledScene;
use crate::render::vulkan::acceleration::{BlasGeometryInput, SceneAccelerationStructures};
use crate::render::vulkan::bindings::{BindingCounts, BindingTable, SceneBufferInfos};
use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::context::DeviceContext;
use crate::render::vulkan::texture::TextureArray;
use crate::render::vulkan::VulkanResult;

fn whole_buffer(buffer: &Buffer) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo {
        buffer: buffer.handle(),
        offset: 0,
        range: vk::WHOLE_SIZE,
    }
}

/// Every device resource of one uploaded scene.
pub struct SceneGpuResources {
    attribute_buffers: Vec<Buffer>,
    face_buffers: Vec<Buffer>,
    // Build inputs stay alive with the structures built from them.
    _vertex_buffers: Vec<Buffer>,
    _index_buffers: Vec<Buffer>,
    material_buffers: Vec<Buffer>,
    instance_buffers: Vec<Buffer>,
    light_buffers: Vec<Buffer>,
    textures: TextureArray,
    environments: TextureArray,
    acceleration: SceneAccelerationStructures,
    bindings: BindingTable,
}

impl SceneGpuResources {
    /// Upload a compiled scene and wire up its descriptor set.
    pub fn upload(ctx: &DeviceContext, compiled: &CompiledScene) -> VulkanResult<Self> {
        info!(
            "Uploading scene: {} geometries, {} materials, {} instances, {} lights",
            compiled.geometries.len(),
            compiled.materials.len(),
            compiled.instances.len(),
            compiled.lights.len()
        );

        let mut attribute_buffers = Vec::with_capacity(compiled.geometries.len());
        let mut face_buffers = Vec::with_capacity(compiled.geometries.len());
        let mut vertex_buffers = Vec::with_capacity(compiled.geometries.len());
        let mut index_buffers = Vec::with_capacity(compiled.geometries.len());
        for geometry in &compiled.geometries {
            attribute_buffers.push(Buffer::device_local_with_data(
                ctx,
                geometry.attribute_bytes(),
                vk::BufferUsageFlags::STORAGE_BUFFER,
            )?);
            face_buffers.push(Buffer::device_local_with_data(
                ctx,
                geometry.face_bytes(),
                vk::BufferUsageFlags::STORAGE_BUFFER,
            )?);
            vertex_buffers.push(Buffer::host_visible_with_data(
                ctx,
                bytemuck::cast_slice(&geometry.vertices),
                vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
                    | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            )?);
            index_buffers.push(Buffer::host_visible_with_data(
                ctx,
                bytemuck::cast_slice(&geometry.indices),
                vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
                    | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            )?);
        }

        // The shaders index these slots as descriptor arrays, so each
        // record gets its own buffer element. Record tables stage to
        // device-local memory the same way the attribute and face buffers
        // do; host-visible memory cannot stay bound as shader storage.
        let mut material_buffers = Vec::with_capacity(compiled.materials.len());
        for record in &compiled.materials {
            material_buffers.push(Buffer::device_local_with_data(
                ctx,
                bytemuck::bytes_of(record),
                vk::BufferUsageFlags::STORAGE_BUFFER,
            )?);
        }
        let mut instance_buffers = Vec::with_capacity(compiled.instances.len());
        for record in &compiled.instances {
            instance_buffers.push(Buffer::device_local_with_data(
                ctx,
                bytemuck::bytes_of(record),
                vk::BufferUsageFlags::STORAGE_BUFFER,
            )?);
        }
        let mut light_buffers = Vec::with_capacity(compiled.lights.len());
        for record in &compiled.lights {
            light_buffers.push(Buffer::device_local_with_data(
                ctx,
                bytemuck::bytes_of(record),
                vk::BufferUsageFlags::STORAGE_BUFFER,
            )?);
        }

        info!(
            "Uploading texture arrays: {}x{} x{} layers, environment {}x{} x{} layers",
            compiled.textures.width,
            compiled.textures.height,
            compiled.textures.layer_count,
            compiled.environments.width,
            compiled.environments.height,
            compiled.environments.layer_count
        );
        let textures = TextureArray::new(
            ctx,
            vk::Format::R8G8B8A8_UNORM,
            compiled.textures.width,
            compiled.textures.height,
            compiled.textures.layer_count,
            &compiled.textures.pixels,
        )?;
        let environments = TextureArray::new(
            ctx,
            vk::Format::R32G32B32A32_SFLOAT,
            compiled.environments.width,
            compiled.environments.height,
            compiled.environments.layer_count,
            bytemuck::cast_slice(&compiled.environments.texels),
        )?;

        info!(
            "Building acceleration structures: {} bottom-level, {} top-level instances",
            compiled.geometries.len(),
            compiled.tlas_instances.len()
        );
        let geometry_inputs: Vec<BlasGeometryInput<'_>> = compiled
            .geometries
            .iter()
            .enumerate()
            .map(|(i, geometry)| BlasGeometryInput {
                vertex_buffer: &vertex_buffers[i],
                index_buffer: &index_buffers[i],
                vertex_count: (geometry.vertices.len() / 3) as u32,
                triangle_count: geometry.indices.len() as u32 / 3,
            })
            .collect();
        let acceleration =
            SceneAccelerationStructures::build(ctx, &geometry_inputs, &compiled.tlas_instances)?;
        drop(geometry_inputs);

        let bindings = BindingTable::new(
            ctx,
            BindingCounts {
                geometries: compiled.geometries.len() as u32,
                materials: compiled.materials.len() as u32,
                instances: compiled.instances.len() as u32,
                lights: compiled.lights.len() as u32,
            },
        )?;
        let infos = SceneBufferInfos {
            attributes: attribute_buffers.iter().map(whole_buffer).collect(),
            faces: face_buffers.iter().map(whole_buffer).collect(),
            materials: material_buffers.iter().map(whole_buffer).collect(),
            instances: instance_buffers.iter().map(whole_buffer).collect(),
            lights: light_buffers.iter().map(whole_buffer).collect(),
        };
        bindings.write_scene(
            acceleration.tlas_handle(),
            &infos,
            textures.descriptor_info(),
            environments.descriptor_info(),
        );

        info!("Scene upload complete");

        Ok(Self {
            attribute_buffers,
            face_buffers,
            _vertex_buffers: vertex_buffers,
            _index_buffers: index_buffers,
            material_buffers,
            instance_buffers,
            light_buffers,
            textures,
            environments,
            acceleration,
            bindings,
        })
    }

    /// The scene descriptor set
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.bindings.set()
    }

    /// Layout of the scene descriptor set, for pipeline creation
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.bindings.layout()
    }

    /// The binding table, for render-target and camera writes
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Built acceleration structures
    pub fn acceleration(&self) -> &SceneAccelerationStructures {
        &self.acceleration
    }

    /// Sampled texture array
    pub fn textures(&self) -> &TextureArray {
        &self.textures
    }

    /// Sampled environment array
    pub fn environments(&self) -> &TextureArray {
        &self.environments
    }

    /// Number of uploaded table buffers per kind, mainly for logging
    pub fn table_sizes(&self) -> (usize, usize, usize, usize) {
        (
            self.attribute_buffers.len().min(self.face_buffers.len()),
            self.material_buffers.len(),
            self.instance_buffers.len(),
            self.light_buffers.len(),
        )
    }
}
