//! CPU-side draw descriptors and named draw groups.
//!
//! Everything here is per-frame scratch: scene traversal appends
//! descriptors during the collect phase, the instancer drains them at
//! sync, nothing survives into the next frame.

use bevy_ecs::entity::Entity;
use glam::Mat4;

use crate::gpu::BufferHandle;
use crate::resources::ResourceId;
use crate::string_id::StringId;

use super::rendering_data::GpuDrawArgs;
use super::VARIANT_SKINNED;

/// What a draw instance renders on behalf of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawInstanceTarget {
    /// A scene entity; transform and GUID are read from its components.
    Entity(Entity),
    /// A synthetic entity with a caller-supplied transform and GUID
    /// (editor gizmos, overlays). A zero GUID is legal and is never
    /// deduplicated against anything.
    Custom { guid: u64, transform: Mat4 },
}

/// Per-instance payload of a model draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDrawInstance {
    pub target: DrawInstanceTarget,
    pub material: ResourceId,
}

/// Per-instance payload of a custom (caller-geometry) draw.
///
/// `args` is passed through to the GPU verbatim unless the two auto-fill
/// flags opt specific slots into instancer-resolved values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomDrawInstance {
    pub target: Option<DrawInstanceTarget>,
    pub material: Option<ResourceId>,
    pub args: GpuDrawArgs,
    /// Replace `args.entity_index` with the resolved entity table index.
    pub use_entity_as_first_arg: bool,
    /// Replace `args.material_index` with the material's bindless word
    /// index. Requires `material` to be set.
    pub use_material_as_second_arg: bool,
}

impl CustomDrawInstance {
    /// An instance that passes `args` through untouched.
    pub fn raw(args: GpuDrawArgs) -> Self {
        Self {
            target: None,
            material: None,
            args,
            use_entity_as_first_arg: false,
            use_material_as_second_arg: false,
        }
    }
}

/// One requested draw of a model primitive, pre-instancing.
#[derive(Debug, Clone, Copy)]
pub struct ModelDraw {
    pub model: ResourceId,
    pub mesh_index: usize,
    pub primitive_index: usize,
    pub shader: ResourceId,
    pub variant: StringId,
    pub instance: ModelDrawInstance,
}

/// One requested indexed draw from caller-supplied buffers.
#[derive(Debug, Clone, Copy)]
pub struct CustomDraw {
    pub shader: ResourceId,
    pub variant: StringId,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub vertex_stride: u32,
    pub base_vertex: u32,
    pub index_count: u32,
    pub start_index: u32,
    pub instance: CustomDrawInstance,
}

/// One requested non-indexed draw from a caller-supplied vertex buffer.
#[derive(Debug, Clone, Copy)]
pub struct CustomDrawRaw {
    pub shader: ResourceId,
    pub variant: StringId,
    pub vertex_buffer: BufferHandle,
    pub vertex_stride: u32,
    pub base_vertex: u32,
    pub vertex_count: u32,
    pub instance: CustomDrawInstance,
}

/// A named bucket of uninstanced draw descriptors for one logical pass.
#[derive(Debug)]
pub struct DrawGroup {
    id: StringId,
    name: String,
    pub(crate) model_draws: Vec<ModelDraw>,
    pub(crate) custom_draws: Vec<CustomDraw>,
    pub(crate) custom_raw_draws: Vec<CustomDrawRaw>,
}

impl DrawGroup {
    pub(crate) fn new(name: &str, draw_capacity: usize) -> Self {
        Self {
            id: StringId::new(name),
            name: name.to_string(),
            model_draws: Vec::with_capacity(draw_capacity),
            custom_draws: Vec::new(),
            custom_raw_draws: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> StringId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total descriptor count across all three kinds.
    pub fn draw_count(&self) -> usize {
        self.model_draws.len() + self.custom_draws.len() + self.custom_raw_draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draw_count() == 0
    }

    /// Re-emits every model draw of `src` into this group with its variant
    /// replaced: draws currently using the skinned variant get
    /// `skinned_variant`, all others get `static_variant`.
    ///
    /// Used by passes that redraw another pass's objects through different
    /// shader permutations (entity-id buffers, outlines).
    pub(crate) fn extend_variant_override(
        &mut self,
        src: &DrawGroup,
        static_variant: StringId,
        skinned_variant: StringId,
    ) {
        self.model_draws.extend(src.model_draws.iter().map(|draw| {
            let variant = if draw.variant == VARIANT_SKINNED {
                skinned_variant
            } else {
                static_variant
            };
            ModelDraw { variant, ..*draw }
        }));
    }

    /// Re-emits every model draw of `src` into this group with both shader
    /// and variant replaced.
    pub(crate) fn extend_shader_override(
        &mut self,
        src: &DrawGroup,
        shader: ResourceId,
        variant: StringId,
    ) {
        self.model_draws.extend(
            src.model_draws
                .iter()
                .map(|draw| ModelDraw { shader, variant, ..*draw }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::VARIANT_STATIC;

    fn model_draw(variant: StringId) -> ModelDraw {
        ModelDraw {
            model: ResourceId(1),
            mesh_index: 0,
            primitive_index: 0,
            shader: ResourceId(2),
            variant,
            instance: ModelDrawInstance {
                target: DrawInstanceTarget::Custom {
                    guid: 9,
                    transform: Mat4::IDENTITY,
                },
                material: ResourceId(3),
            },
        }
    }

    #[test]
    fn variant_override_splits_by_skinned() {
        let mut src = DrawGroup::new("src", 4);
        src.model_draws.push(model_draw(VARIANT_STATIC));
        src.model_draws.push(model_draw(VARIANT_SKINNED));
        src.model_draws.push(model_draw(StringId::NONE));

        let static_id = StringId::new("StaticEntityID");
        let skinned_id = StringId::new("SkinnedEntityID");
        let mut dst = DrawGroup::new("dst", 4);
        dst.extend_variant_override(&src, static_id, skinned_id);

        let variants: Vec<_> = dst.model_draws.iter().map(|d| d.variant).collect();
        assert_eq!(variants, vec![static_id, skinned_id, static_id]);
    }

    #[test]
    fn shader_override_replaces_shader_and_variant() {
        let mut src = DrawGroup::new("src", 4);
        src.model_draws.push(model_draw(VARIANT_STATIC));

        let mut dst = DrawGroup::new("dst", 4);
        dst.extend_shader_override(&src, ResourceId(77), StringId::NONE);

        assert_eq!(dst.model_draws[0].shader, ResourceId(77));
        assert_eq!(dst.model_draws[0].variant, StringId::NONE);
        // grouping keys and instances are otherwise preserved
        assert_eq!(dst.model_draws[0].model, ResourceId(1));
    }
}
