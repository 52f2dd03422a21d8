//! GPU-ready per-frame rendering data.
//!
//! Built wholesale by the instancing pass at frame sync and consumed by
//! the emission pass; the flat arrays are laid out exactly as the GPU
//! sees them and expose Pod byte views for upload.

use bevy_ecs::entity::Entity;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::gpu::{BufferHandle, PipelineHandle};
use crate::string_id::StringId;

/// GPU-packed per-entity data: the model-to-world matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuEntity {
    pub model: Mat4,
}

/// Identity of a draw entity within one frame: a scene GUID plus up to
/// three disambiguating sub-indices (mesh, primitive, node for model
/// draws; all zero for custom draws).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DrawEntityIdent {
    pub guid: u64,
    pub sub: [u32; 3],
}

impl DrawEntityIdent {
    /// True when every field of the tuple is zero. Such idents mark
    /// unpopulated slots and never participate in deduplication.
    #[inline]
    pub fn is_unpopulated(&self) -> bool {
        self.guid == 0 && self.sub[0] == 0 && self.sub[1] == 0 && self.sub[2] == 0
    }
}

/// One deduplicated rendered-object record, valid for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawEntity {
    pub gpu: GpuEntity,
    pub ident: DrawEntityIdent,
}

/// Per-instance GPU arguments, indexed from the draw's push-constant base.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct GpuDrawArgs {
    /// Index into the frame's entity table.
    pub entity_index: u32,
    /// Material bindless offset in 32-bit words.
    pub material_index: u32,
    /// Base index of the owning component's bone block, 0 for static.
    pub bone_index: u32,
    /// Free slot for pass-specific data; never written by the instancer.
    pub scratch: u32,
}

/// One finalized, instanced draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub pipeline: PipelineHandle,
    pub vertex_buffer: BufferHandle,
    /// `None` for vertex-only (non-indexed) draws.
    pub index_buffer: Option<BufferHandle>,
    pub vertex_stride: u32,
    pub base_vertex: u32,
    pub base_index: u32,
    pub index_count: u32,
    pub vertex_count: u32,
    pub instance_count: u32,
    /// Base offset of this batch in the frame's instance-argument table.
    pub push_constant_offset: u32,
}

/// The GPU-ready counterpart of a draw group.
#[derive(Debug)]
pub struct RenderingGroup {
    id: StringId,
    name: String,
    draw_calls: Vec<DrawCall>,
}

impl RenderingGroup {
    pub(crate) fn new(id: StringId, name: String, draw_calls: Vec<DrawCall>) -> Self {
        Self { id, name, draw_calls }
    }

    #[inline]
    pub fn id(&self) -> StringId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }
}

/// Bone-block reservation for one skinned component, in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinnedBlock {
    pub entity: Entity,
    /// First slot of this component's block in the bone array.
    pub bone_base: u32,
    pub joint_count: u32,
}

/// All GPU-visible data for one frame.
#[derive(Debug, Default)]
pub struct RenderingData {
    pub(crate) groups: Vec<RenderingGroup>,
    pub(crate) entities: Vec<DrawEntity>,
    pub(crate) instance_args: Vec<GpuDrawArgs>,
    pub(crate) bones: Vec<Mat4>,
    pub(crate) skinned_blocks: Vec<SkinnedBlock>,
}

impl RenderingData {
    pub(crate) fn with_capacity(entities: usize, args: usize, bones: usize) -> Self {
        Self {
            groups: Vec::new(),
            entities: Vec::with_capacity(entities),
            instance_args: Vec::with_capacity(args),
            bones: Vec::with_capacity(bones),
            skinned_blocks: Vec::new(),
        }
    }

    /// Drops the previous frame's content, keeping allocations.
    pub(crate) fn clear(&mut self) {
        self.groups.clear();
        self.entities.clear();
        self.instance_args.clear();
        self.bones.clear();
        self.skinned_blocks.clear();
    }

    /// Looks up a prepared group by id.
    pub fn group(&self, id: StringId) -> Option<&RenderingGroup> {
        self.groups.iter().find(|g| g.id() == id)
    }

    /// All prepared groups, in preparation order.
    #[inline]
    pub fn groups(&self) -> &[RenderingGroup] {
        &self.groups
    }

    /// The frame's deduplicated entity table. Pick/outline consumers read
    /// idents back from here by instance-argument entity index.
    #[inline]
    pub fn entities(&self) -> &[DrawEntity] {
        &self.entities
    }

    /// The flat per-instance argument table.
    #[inline]
    pub fn instance_args(&self) -> &[GpuDrawArgs] {
        &self.instance_args
    }

    /// The flat bone matrix array.
    #[inline]
    pub fn bones(&self) -> &[Mat4] {
        &self.bones
    }

    /// Bone-block reservations, in component discovery order.
    #[inline]
    pub fn skinned_blocks(&self) -> &[SkinnedBlock] {
        &self.skinned_blocks
    }

    /// Instance-argument table as bytes for upload.
    pub fn instance_arg_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instance_args)
    }

    /// Bone array as bytes for upload.
    pub fn bone_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bones)
    }
}
