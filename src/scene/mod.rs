//! Scene components the collector reads.
//!
//! The scene itself (spawning, animation, visibility logic) belongs to the
//! application; the collector only queries these components once per frame
//! per referenced entity. All of them are plain data.

mod transform;

pub use transform::Transform;

use bevy_ecs::prelude::*;
use glam::Mat4;

use crate::resources::{Model, ResourceId};

/// Identity and visibility of a renderable entity.
///
/// The GUID is the stable identifier the renderer hands back to pick /
/// outline consumers; it is assigned by the scene layer, never by this
/// crate.
#[derive(Component, Debug, Clone, Copy)]
pub struct EntityInfo {
    pub guid: u64,
    pub visible: bool,
}

impl EntityInfo {
    pub fn new(guid: u64) -> Self {
        Self { guid, visible: true }
    }
}

/// A model attached to an entity.
///
/// Holds the animated node pose (model space, global per node) and the
/// material assigned to each of the model's material slots. The animation
/// system writes `node_transforms`; the collector only reads them.
#[derive(Component, Debug, Clone)]
pub struct ModelComponent {
    pub model: ResourceId,
    /// Animated global node transforms, model space. Same length and
    /// order as the model's node list.
    pub node_transforms: Vec<Mat4>,
    /// Material per model material slot.
    pub materials: Vec<ResourceId>,
}

impl ModelComponent {
    /// Creates a component referencing `model`, seeded with the model's
    /// rest pose and default materials.
    pub fn new(id: ResourceId, model: &Model) -> Self {
        Self {
            model: id,
            node_transforms: model.nodes.clone(),
            materials: model.default_materials.clone(),
        }
    }

    /// Overrides the material in `slot`.
    pub fn set_material(&mut self, slot: usize, material: ResourceId) {
        self.materials[slot] = material;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::BufferHandle;
    use crate::resources::{Mesh, MeshBuffers, Primitive};

    fn model() -> Model {
        let buffers = MeshBuffers {
            vertex_buffer: BufferHandle(1),
            index_buffer: BufferHandle(2),
            vertex_stride: 32,
        };
        Model {
            name: "m".to_string(),
            nodes: vec![Mat4::IDENTITY, Mat4::from_translation(glam::Vec3::X)],
            meshes: vec![Mesh {
                name: "mesh".to_string(),
                node_index: 1,
                primitives: vec![Primitive {
                    base_vertex: 0,
                    base_index: 0,
                    index_count: 3,
                    vertex_count: 3,
                    material_slot: 0,
                    skinned: false,
                }],
            }],
            skins: Vec::new(),
            default_materials: vec![ResourceId(7)],
            static_buffers: buffers,
            skinned_buffers: buffers,
        }
    }

    #[test]
    fn component_seeds_from_model() {
        let model = model();
        let mut comp = ModelComponent::new(ResourceId(1), &model);
        assert_eq!(comp.node_transforms.len(), 2);
        assert_eq!(comp.materials, vec![ResourceId(7)]);

        comp.set_material(0, ResourceId(8));
        assert_eq!(comp.materials[0], ResourceId(8));
    }
}
