//! Draw collection, instancing and command emission.
//!
//! [`DrawCollector`] is the bridge between scene traversal and the GPU
//! command stream. A frame goes through three strictly ordered phases:
//!
//! 1. **Collect** — traversal code appends uninstanced draw descriptors
//!    into named draw groups ([`DrawCollector::create_group`],
//!    [`DrawCollector::add_model_draw`],
//!    [`DrawCollector::collect_component_models`], ...).
//! 2. **Sync** — [`DrawCollector::prepare_render_data`] drains the CPU
//!    groups, runs the skinning preprocessor and the instancer, and
//!    rebuilds the GPU-ready [`RenderingData`].
//! 3. **Emit** — [`DrawCollector::render_group`] walks a prepared group
//!    and appends the minimal command sequence to a [`CommandStream`].
//!
//! Collection for the next frame may begin as soon as
//! `prepare_render_data` returns; the CPU and GPU sides are disjoint
//! structures and never alias within a frame.

mod draw_data;
mod instancing;
mod rendering_data;
mod skinning;

pub use draw_data::{
    CustomDraw, CustomDrawInstance, CustomDrawRaw, DrawGroup, DrawInstanceTarget, ModelDraw,
    ModelDrawInstance,
};
pub use rendering_data::{
    DrawCall, DrawEntity, DrawEntityIdent, GpuDrawArgs, GpuEntity, RenderingData, RenderingGroup,
    SkinnedBlock,
};

use bevy_ecs::prelude::*;

use crate::gpu::{BufferHandle, Command, CommandStream, PipelineHandle};
use crate::resources::{ResourceId, ResourceManager, ShaderKind};
use crate::scene::{EntityInfo, ModelComponent};
use crate::string_id::StringId;

use instancing::EntityLookup;

/// Variant selected for non-skinned model primitives during component
/// collection.
pub const VARIANT_STATIC: StringId = StringId::new("Static");
/// Variant selected for skinned model primitives during component
/// collection.
pub const VARIANT_SKINNED: StringId = StringId::new("Skinned");

/// Initial capacities for the per-frame containers.
#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    pub group_capacity: usize,
    pub draw_capacity: usize,
    pub entity_capacity: usize,
    pub instance_arg_capacity: usize,
    pub bone_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            group_capacity: 8,
            draw_capacity: 256,
            entity_capacity: 512,
            instance_arg_capacity: 1024,
            bone_capacity: 256,
        }
    }
}

/// Per-frame draw collection and instancing engine.
pub struct DrawCollector {
    config: CollectorConfig,
    groups: Vec<DrawGroup>,
    render_data: RenderingData,
}

impl Default for DrawCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawCollector {
    pub fn new() -> Self {
        Self::with_config(CollectorConfig::default())
    }

    pub fn with_config(config: CollectorConfig) -> Self {
        Self {
            config,
            groups: Vec::with_capacity(config.group_capacity),
            render_data: RenderingData::with_capacity(
                config.entity_capacity,
                config.instance_arg_capacity,
                config.bone_capacity,
            ),
        }
    }

    // ----------------------------------------------------------------
    // collect phase

    /// Registers an empty draw group for this frame and returns its id.
    ///
    /// Creating a group that already exists is a programming error;
    /// callers that may run more than once per frame check
    /// [`group_exists`](Self::group_exists) first.
    pub fn create_group(&mut self, name: &str) -> StringId {
        let id = StringId::new(name);
        let exists = self.groups.iter().any(|g| g.id() == id);
        debug_assert!(!exists, "draw group '{name}' already exists this frame");
        if !exists {
            log::debug!("created draw group '{name}'");
            self.groups.push(DrawGroup::new(name, self.config.draw_capacity));
        }
        id
    }

    /// True if `id` names a group created this frame.
    pub fn group_exists(&self, id: StringId) -> bool {
        self.groups.iter().any(|g| g.id() == id)
    }

    /// Returns the group `id`. Missing groups are fatal.
    pub fn group(&self, id: StringId) -> &DrawGroup {
        self.groups
            .iter()
            .find(|g| g.id() == id)
            .unwrap_or_else(|| panic!("draw group {id:?} was not created this frame"))
    }

    fn group_mut(&mut self, id: StringId) -> &mut DrawGroup {
        self.groups
            .iter_mut()
            .find(|g| g.id() == id)
            .unwrap_or_else(|| panic!("draw group {id:?} was not created this frame"))
    }

    /// Appends one model draw. Mesh and primitive indices are not
    /// validated here; the instancer resolves them at sync.
    #[allow(clippy::too_many_arguments)]
    pub fn add_model_draw(
        &mut self,
        group: StringId,
        model: ResourceId,
        mesh_index: usize,
        primitive_index: usize,
        shader: ResourceId,
        variant: StringId,
        instance: ModelDrawInstance,
    ) {
        self.group_mut(group).model_draws.push(ModelDraw {
            model,
            mesh_index,
            primitive_index,
            shader,
            variant,
            instance,
        });
    }

    /// Appends one indexed draw from caller-supplied buffers (UI quads,
    /// debug shapes).
    #[allow(clippy::too_many_arguments)]
    pub fn add_custom_draw(
        &mut self,
        group: StringId,
        instance: CustomDrawInstance,
        shader: ResourceId,
        variant: StringId,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        vertex_stride: u32,
        base_vertex: u32,
        index_count: u32,
        start_index: u32,
    ) {
        self.group_mut(group).custom_draws.push(CustomDraw {
            shader,
            variant,
            vertex_buffer,
            index_buffer,
            vertex_stride,
            base_vertex,
            index_count,
            start_index,
            instance,
        });
    }

    /// Appends one non-indexed draw from a caller-supplied vertex buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn add_custom_draw_raw(
        &mut self,
        group: StringId,
        instance: CustomDrawInstance,
        shader: ResourceId,
        variant: StringId,
        vertex_buffer: BufferHandle,
        vertex_stride: u32,
        base_vertex: u32,
        vertex_count: u32,
    ) {
        self.group_mut(group).custom_raw_draws.push(CustomDrawRaw {
            shader,
            variant,
            vertex_buffer,
            vertex_stride,
            base_vertex,
            vertex_count,
            instance,
        });
    }

    /// Bulk scene traversal: emits one model draw into `group` for every
    /// visible model-component primitive whose material's shader matches
    /// `kind`, tagged with the `"Static"` or `"Skinned"` variant.
    pub fn collect_component_models(
        &mut self,
        group: StringId,
        world: &mut World,
        resources: &ResourceManager,
        kind: ShaderKind,
    ) {
        let mut query = world.query::<(Entity, &EntityInfo, &ModelComponent)>();
        let mut draws: Vec<ModelDraw> = Vec::new();

        for (entity, info, component) in query.iter(world) {
            if !info.visible {
                continue;
            }
            let model = resources.model(component.model);
            for (mesh_index, mesh) in model.meshes.iter().enumerate() {
                for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
                    let material_id = component.materials[primitive.material_slot];
                    let material = resources.material(material_id);
                    if resources.shader(material.shader).kind != kind {
                        continue;
                    }
                    let variant = if primitive.skinned {
                        VARIANT_SKINNED
                    } else {
                        VARIANT_STATIC
                    };
                    draws.push(ModelDraw {
                        model: component.model,
                        mesh_index,
                        primitive_index,
                        shader: material.shader,
                        variant,
                        instance: ModelDrawInstance {
                            target: DrawInstanceTarget::Entity(entity),
                            material: material_id,
                        },
                    });
                }
            }
        }

        self.group_mut(group).model_draws.extend(draws);
    }

    /// Re-emits `src`'s model draws into `dst` with variants replaced by
    /// skinned-ness (see [`DrawGroup`] docs). Both groups must exist.
    pub fn variant_override(
        &mut self,
        dst: StringId,
        src: StringId,
        static_variant: StringId,
        skinned_variant: StringId,
    ) {
        let (dst_group, src_group) = self.group_pair_mut(dst, src);
        dst_group.extend_variant_override(src_group, static_variant, skinned_variant);
    }

    /// Re-emits `src`'s model draws into `dst` with shader and variant
    /// replaced. Both groups must exist.
    pub fn shader_override(&mut self, dst: StringId, src: StringId, shader: ResourceId, variant: StringId) {
        let (dst_group, src_group) = self.group_pair_mut(dst, src);
        dst_group.extend_shader_override(src_group, shader, variant);
    }

    fn group_pair_mut(&mut self, dst: StringId, src: StringId) -> (&mut DrawGroup, &DrawGroup) {
        let dst_index = self.group_index(dst);
        let src_index = self.group_index(src);
        debug_assert_ne!(dst_index, src_index, "override source and destination must differ");
        if dst_index < src_index {
            let (left, right) = self.groups.split_at_mut(src_index);
            (&mut left[dst_index], &right[0])
        } else {
            let (left, right) = self.groups.split_at_mut(dst_index);
            (&mut right[0], &left[src_index])
        }
    }

    fn group_index(&self, id: StringId) -> usize {
        self.groups
            .iter()
            .position(|g| g.id() == id)
            .unwrap_or_else(|| panic!("draw group {id:?} was not created this frame"))
    }

    // ----------------------------------------------------------------
    // sync phase

    /// Frame sync: drains all CPU draw groups and rebuilds the GPU-ready
    /// rendering data — bone matrices first (parallel, joined), then one
    /// instanced rendering group per draw group.
    pub fn prepare_render_data(&mut self, world: &World, resources: &ResourceManager) {
        let groups = std::mem::take(&mut self.groups);
        self.render_data.clear();

        self.render_data.skinned_blocks =
            skinning::discover_skinned_components(&groups, world, resources);
        skinning::compute_bone_matrices(
            &self.render_data.skinned_blocks,
            world,
            resources,
            &mut self.render_data.bones,
        );

        let mut lookup = EntityLookup::new();
        for group in &groups {
            let rendered =
                instancing::instance_group(group, world, resources, &mut self.render_data, &mut lookup);
            self.render_data.groups.push(rendered);
        }

        log::trace!(
            "prepared {} groups: {} entities, {} instance args, {} bones",
            self.render_data.groups.len(),
            self.render_data.entities.len(),
            self.render_data.instance_args.len(),
            self.render_data.bones.len()
        );
    }

    /// The GPU-ready data of the last prepared frame.
    #[inline]
    pub fn rendering_data(&self) -> &RenderingData {
        &self.render_data
    }

    /// True if `id` names a group prepared by the last sync.
    pub fn render_group_exists(&self, id: StringId) -> bool {
        self.render_data.group(id).is_some()
    }

    // ----------------------------------------------------------------
    // emit phase

    /// Emits the prepared group `id` into `stream`, skipping redundant
    /// pipeline and buffer binds. Requesting a group that was never
    /// prepared is a programming error; an empty group is a no-op.
    pub fn render_group(&self, id: StringId, stream: &mut CommandStream) {
        let Some(group) = self.render_data.group(id) else {
            debug_assert!(false, "render group {id:?} was not prepared this frame");
            return;
        };

        let mut bound_pipeline: Option<PipelineHandle> = None;
        let mut bound_vertex_buffer: Option<BufferHandle> = None;

        for call in group.draw_calls() {
            if bound_pipeline != Some(call.pipeline) {
                stream.push(Command::BindPipeline {
                    pipeline: call.pipeline,
                });
                bound_pipeline = Some(call.pipeline);
            }

            // Vertex and index buffers are paired per draw kind, so one
            // cache covers both binds.
            if bound_vertex_buffer != Some(call.vertex_buffer) {
                stream.push(Command::BindVertexBuffer {
                    buffer: call.vertex_buffer,
                    stride: call.vertex_stride,
                });
                if let Some(index_buffer) = call.index_buffer {
                    stream.push(Command::BindIndexBuffer {
                        buffer: index_buffer,
                    });
                }
                bound_vertex_buffer = Some(call.vertex_buffer);
            }

            stream.push(Command::PushConstants {
                first_instance_arg: call.push_constant_offset,
            });

            match call.index_buffer {
                Some(_) => stream.push(Command::DrawIndexedInstanced {
                    index_count: call.index_count,
                    instance_count: call.instance_count,
                    base_index: call.base_index,
                    base_vertex: call.base_vertex,
                }),
                None => stream.push(Command::DrawInstanced {
                    vertex_count: call.vertex_count,
                    instance_count: call.instance_count,
                    base_vertex: call.base_vertex,
                }),
            }
        }

        log::trace!(
            "emitted group '{}': {} draw calls, {} commands",
            group.name(),
            group.draw_calls().len(),
            stream.len()
        );
    }
}
