//! Acceleration-structure builds
//!
//! One bottom-level structure per distinct geometry and a single top-level
//! structure over all placed instances. Every structure moves through the
//! same lifecycle: created, sized against its inputs, backed by an
//! allocated buffer, then built on the device. Scratch memory for all
//! builds is summed into one allocation with aligned per-structure
//! offsets, and the whole build runs in one command buffer with a memory
//! barrier between the bottom-level and top-level phases.

use ash::extensions::khr;
use ash::vk;
use std::mem;

use crate::compile::TlasInstanceDesc;
use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::commands::submit_one_shot;
use crate::render::vulkan::context::DeviceContext;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Lifecycle of a single acceleration structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Created,
    Sized,
    Allocated,
    Built,
}

impl BuildState {
    /// Advance to the next lifecycle phase, rejecting skipped or repeated
    /// transitions.
    fn advance_to(&mut self, next: BuildState) -> VulkanResult<()> {
        let expected = match next {
            BuildState::Sized => BuildState::Created,
            BuildState::Allocated => BuildState::Sized,
            BuildState::Built => BuildState::Allocated,
            BuildState::Created => {
                return Err(VulkanError::InvalidOperation {
                    reason: "acceleration structure cannot return to the created state".into(),
                })
            }
        };
        if *self != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "acceleration structure transition {:?} -> {:?} skips a phase",
                    self, next
                ),
            });
        }
        *self = next;
        Ok(())
    }
}

/// Geometry arrays feeding one bottom-level build.
pub struct BlasGeometryInput<'a> {
    /// Tightly packed vertex positions, 12-byte stride
    pub vertex_buffer: &'a Buffer,
    /// 32-bit triangle indices
    pub index_buffer: &'a Buffer,
    /// Number of vertices in `vertex_buffer`
    pub vertex_count: u32,
    /// Number of triangles in `index_buffer`
    pub triangle_count: u32,
}

struct StructureSlot {
    state: BuildState,
    size: vk::DeviceSize,
    scratch_size: vk::DeviceSize,
    scratch_offset: vk::DeviceSize,
    buffer: Option<Buffer>,
    handle: vk::AccelerationStructureKHR,
}

impl StructureSlot {
    fn new() -> Self {
        Self {
            state: BuildState::Created,
            size: 0,
            scratch_size: 0,
            scratch_offset: 0,
            buffer: None,
            handle: vk::AccelerationStructureKHR::null(),
        }
    }

    fn record_sizes(&mut self, sizes: &vk::AccelerationStructureBuildSizesInfoKHR) -> VulkanResult<()> {
        self.state.advance_to(BuildState::Sized)?;
        self.size = sizes.acceleration_structure_size;
        self.scratch_size = sizes.build_scratch_size;
        Ok(())
    }

    fn record_allocation(
        &mut self,
        buffer: Buffer,
        handle: vk::AccelerationStructureKHR,
    ) -> VulkanResult<()> {
        self.state.advance_to(BuildState::Allocated)?;
        self.buffer = Some(buffer);
        self.handle = handle;
        Ok(())
    }

    fn record_built(&mut self) -> VulkanResult<()> {
        self.state.advance_to(BuildState::Built)
    }
}

fn align_up(value: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    (value + alignment - 1) & !(alignment - 1)
}

fn blas_geometry(
    input: &BlasGeometryInput<'_>,
) -> vk::AccelerationStructureGeometryKHR {
    let triangles = vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
        .vertex_format(vk::Format::R32G32B32_SFLOAT)
        .vertex_data(vk::DeviceOrHostAddressConstKHR {
            device_address: input.vertex_buffer.device_address(),
        })
        .vertex_stride(12)
        .max_vertex(input.vertex_count.saturating_sub(1))
        .index_type(vk::IndexType::UINT32)
        .index_data(vk::DeviceOrHostAddressConstKHR {
            device_address: input.index_buffer.device_address(),
        })
        .build();

    vk::AccelerationStructureGeometryKHR::builder()
        .geometry_type(vk::GeometryTypeKHR::TRIANGLES)
        .geometry(vk::AccelerationStructureGeometryDataKHR { triangles })
        .flags(vk::GeometryFlagsKHR::OPAQUE)
        .build()
}

fn tlas_geometry(instance_address: vk::DeviceAddress) -> vk::AccelerationStructureGeometryKHR {
    let instances = vk::AccelerationStructureGeometryInstancesDataKHR::builder()
        .array_of_pointers(false)
        .data(vk::DeviceOrHostAddressConstKHR {
            device_address: instance_address,
        })
        .build();

    vk::AccelerationStructureGeometryKHR::builder()
        .geometry_type(vk::GeometryTypeKHR::INSTANCES)
        .geometry(vk::AccelerationStructureGeometryDataKHR { instances })
        .build()
}

/// The built two-level structure set: every bottom-level structure plus
/// the top-level structure the ray-generation shader traces against.
pub struct SceneAccelerationStructures {
    acceleration: khr::AccelerationStructure,
    blas: Vec<StructureSlot>,
    tlas: StructureSlot,
}

impl SceneAccelerationStructures {
    /// Size, allocate and build all structures for the scene.
    ///
    /// `geometry_inputs` and `tlas_instances` come from the compiled
    /// scene: one input per geometry, one instance description per placed
    /// instance, with `TlasInstanceDesc::geometry` indexing into
    /// `geometry_inputs`.
    pub fn build(
        ctx: &DeviceContext,
        geometry_inputs: &[BlasGeometryInput<'_>],
        tlas_instances: &[TlasInstanceDesc],
    ) -> VulkanResult<Self> {
        let mut blas: Vec<StructureSlot> = (0..geometry_inputs.len())
            .map(|_| StructureSlot::new())
            .collect();
        let mut tlas = StructureSlot::new();

        // Phase 1: size every bottom-level structure and lay out the
        // shared scratch allocation.
        let mut scratch_total: vk::DeviceSize = 0;
        for (slot, input) in blas.iter_mut().zip(geometry_inputs) {
            let geometries = [blas_geometry(input)];
            let build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
                .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL)
                .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
                .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
                .geometries(&geometries)
                .build();
            let sizes = unsafe {
                ctx.acceleration.get_acceleration_structure_build_sizes(
                    vk::AccelerationStructureBuildTypeKHR::DEVICE,
                    &build_info,
                    &[input.triangle_count],
                )
            };
            slot.record_sizes(&sizes)?;
            slot.scratch_offset = align_up(scratch_total, ctx.scratch_alignment.max(1));
            scratch_total = slot.scratch_offset + slot.scratch_size;
        }

        // Phase 2: allocate result buffers and create the bottom-level
        // structure handles so instance records can reference them.
        for slot in &mut blas {
            let buffer = Buffer::new(
                ctx,
                slot.size,
                vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR
                    | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;
            let create_info = vk::AccelerationStructureCreateInfoKHR::builder()
                .buffer(buffer.handle())
                .size(slot.size)
                .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL);
            let handle = unsafe {
                ctx.acceleration
                    .create_acceleration_structure(&create_info, None)
                    .map_err(VulkanError::Api)?
            };
            slot.record_allocation(buffer, handle)?;
        }

        // Phase 3: pack and upload the device-format instance records.
        let blas_addresses: Vec<vk::DeviceAddress> = blas
            .iter()
            .map(|slot| {
                let info = vk::AccelerationStructureDeviceAddressInfoKHR::builder()
                    .acceleration_structure(slot.handle);
                unsafe { ctx.acceleration.get_acceleration_structure_device_address(&info) }
            })
            .collect();

        let device_instances: Vec<vk::AccelerationStructureInstanceKHR> = tlas_instances
            .iter()
            .map(|desc| vk::AccelerationStructureInstanceKHR {
                transform: vk::TransformMatrixKHR {
                    matrix: desc.transform,
                },
                instance_custom_index_and_mask: vk::Packed24_8::new(
                    desc.instance_index,
                    desc.mask,
                ),
                instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(
                    0,
                    vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE.as_raw() as u8,
                ),
                acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
                    device_handle: blas_addresses[desc.geometry as usize],
                },
            })
            .collect();

        // The instance struct carries bitfield unions, so no Pod derive;
        // the layout is still plain bytes.
        let instance_bytes = unsafe {
            std::slice::from_raw_parts(
                device_instances.as_ptr() as *const u8,
                device_instances.len() * mem::size_of::<vk::AccelerationStructureInstanceKHR>(),
            )
        };
        let instance_buffer = Buffer::host_visible_with_data(
            ctx,
            instance_bytes,
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        )?;

        // Phase 4: size and allocate the top-level structure.
        let instance_count = tlas_instances.len() as u32;
        {
            let geometries = [tlas_geometry(instance_buffer.device_address())];
            let build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
                .ty(vk::AccelerationStructureTypeKHR::TOP_LEVEL)
                .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
                .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
                .geometries(&geometries)
                .build();
            let sizes = unsafe {
                ctx.acceleration.get_acceleration_structure_build_sizes(
                    vk::AccelerationStructureBuildTypeKHR::DEVICE,
                    &build_info,
                    &[instance_count],
                )
            };
            tlas.record_sizes(&sizes)?;
            tlas.scratch_offset = align_up(scratch_total, ctx.scratch_alignment.max(1));
            scratch_total = tlas.scratch_offset + tlas.scratch_size;
        }

        let tlas_buffer = Buffer::new(
            ctx,
            tlas.size,
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let tlas_create = vk::AccelerationStructureCreateInfoKHR::builder()
            .buffer(tlas_buffer.handle())
            .size(tlas.size)
            .ty(vk::AccelerationStructureTypeKHR::TOP_LEVEL);
        let tlas_handle = unsafe {
            ctx.acceleration
                .create_acceleration_structure(&tlas_create, None)
                .map_err(VulkanError::Api)?
        };
        tlas.record_allocation(tlas_buffer, tlas_handle)?;

        let scratch = Buffer::new(
            ctx,
            scratch_total,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let scratch_base = scratch.device_address();

        // Phase 5: record every build into one command buffer. The
        // top-level build reads the bottom-level results, so a memory
        // barrier separates the two phases.
        submit_one_shot(ctx, |device, cmd| {
            for (slot, input) in blas.iter().zip(geometry_inputs) {
                let geometries = [blas_geometry(input)];
                let build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
                    .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL)
                    .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
                    .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
                    .dst_acceleration_structure(slot.handle)
                    .geometries(&geometries)
                    .scratch_data(vk::DeviceOrHostAddressKHR {
                        device_address: scratch_base + slot.scratch_offset,
                    })
                    .build();
                let range = vk::AccelerationStructureBuildRangeInfoKHR::builder()
                    .primitive_count(input.triangle_count)
                    .build();
                unsafe {
                    ctx.acceleration.cmd_build_acceleration_structures(
                        cmd,
                        &[build_info],
                        &[&[range]],
                    );
                }
            }

            let barrier = vk::MemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::ACCELERATION_STRUCTURE_WRITE_KHR)
                .dst_access_mask(
                    vk::AccessFlags::ACCELERATION_STRUCTURE_WRITE_KHR
                        | vk::AccessFlags::ACCELERATION_STRUCTURE_READ_KHR,
                );
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD_KHR,
                    vk::PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD_KHR,
                    vk::DependencyFlags::empty(),
                    &[barrier.build()],
                    &[],
                    &[],
                );
            }

            let geometries = [tlas_geometry(instance_buffer.device_address())];
            let build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
                .ty(vk::AccelerationStructureTypeKHR::TOP_LEVEL)
                .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
                .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
                .dst_acceleration_structure(tlas.handle)
                .geometries(&geometries)
                .scratch_data(vk::DeviceOrHostAddressKHR {
                    device_address: scratch_base + tlas.scratch_offset,
                })
                .build();
            let range = vk::AccelerationStructureBuildRangeInfoKHR::builder()
                .primitive_count(instance_count)
                .build();
            unsafe {
                ctx.acceleration
                    .cmd_build_acceleration_structures(cmd, &[build_info], &[&[range]]);
            }
        })?;

        for slot in &mut blas {
            slot.record_built()?;
        }
        tlas.record_built()?;

        // Scratch and instance staging die here; the builds have completed.
        Ok(Self {
            acceleration: ctx.acceleration.clone(),
            blas,
            tlas,
        })
    }

    /// Handle of the top-level structure for descriptor writes
    pub fn tlas_handle(&self) -> vk::AccelerationStructureKHR {
        self.tlas.handle
    }

    /// Number of bottom-level structures
    pub fn blas_count(&self) -> usize {
        self.blas.len()
    }
}

impl Drop for SceneAccelerationStructures {
    fn drop(&mut self) {
        unsafe {
            self.acceleration
                .destroy_acceleration_structure(self.tlas.handle, None);
            for slot in &self.blas {
                self.acceleration
                    .destroy_acceleration_structure(slot.handle, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_advances_in_order() {
        let mut state = BuildState::Created;
        assert!(state.advance_to(BuildState::Sized).is_ok());
        assert!(state.advance_to(BuildState::Allocated).is_ok());
        assert!(state.advance_to(BuildState::Built).is_ok());
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut state = BuildState::Created;
        assert!(matches!(
            state.advance_to(BuildState::Allocated),
            Err(VulkanError::InvalidOperation { .. })
        ));
        // The failed transition must not move the state.
        assert_eq!(state, BuildState::Created);
    }

    #[test]
    fn building_twice_is_rejected() {
        let mut state = BuildState::Created;
        state.advance_to(BuildState::Sized).unwrap();
        state.advance_to(BuildState::Allocated).unwrap();
        state.advance_to(BuildState::Built).unwrap();
        assert!(state.advance_to(BuildState::Built).is_err());
    }

    #[test]
    fn scratch_offsets_align_upward() {
        assert_eq!(align_up(0, 128), 0);
        assert_eq!(align_up(1, 128), 128);
        assert_eq!(align_up(128, 128), 128);
        assert_eq!(align_up(129, 128), 256);
    }
}
