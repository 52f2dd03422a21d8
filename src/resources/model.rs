//! Model resources: meshes, primitives, skins and their GPU buffers.

use glam::Mat4;

use crate::error::ResourceError;
use crate::gpu::BufferHandle;
use crate::resources::ResourceId;

/// A vertex/index buffer pair with its per-vertex stride.
///
/// Models carry two pairs: static geometry and skinned geometry live in
/// separate buffers with different vertex layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub vertex_stride: u32,
}

/// One drawable range of a mesh, bound to a single material slot.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    /// First vertex in the model's vertex buffer.
    pub base_vertex: u32,
    /// First index in the model's index buffer.
    pub base_index: u32,
    pub index_count: u32,
    pub vertex_count: u32,
    /// Slot into the model's material list.
    pub material_slot: usize,
    /// True when the primitive's vertices carry joint weights and draw
    /// through the skinned buffer pair.
    pub skinned: bool,
}

/// A mesh: a set of primitives attached to one model node.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    /// Node whose transform positions this mesh within the model.
    pub node_index: usize,
    pub primitives: Vec<Primitive>,
}

/// A skin definition: the joints deforming a mesh and their inverse bind
/// poses.
#[derive(Debug, Clone)]
pub struct Skin {
    /// Node the skin is rooted at. `None` means the skin follows the
    /// owning entity's transform instead of a model node.
    pub root_joint: Option<usize>,
    /// Joint node indices, in joint order.
    pub joints: Vec<usize>,
    /// One inverse bind matrix per joint, same order as `joints`.
    pub inverse_bind: Vec<Mat4>,
}

impl Skin {
    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }
}

/// A model resource: node hierarchy flattened to rest-pose transforms,
/// meshes, skins and the GPU buffers its geometry lives in.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    /// Rest-pose global node transforms, model space.
    pub nodes: Vec<Mat4>,
    pub meshes: Vec<Mesh>,
    pub skins: Vec<Skin>,
    /// Default material per material slot; components seed their slot
    /// assignment from this list.
    pub default_materials: Vec<ResourceId>,
    pub static_buffers: MeshBuffers,
    pub skinned_buffers: MeshBuffers,
}

impl Model {
    /// Total joint count across all skins. Sizes the model's block in the
    /// per-frame bone array.
    pub fn joint_count(&self) -> usize {
        self.skins.iter().map(|s| s.joint_count()).sum()
    }

    /// True when drawing `mesh_index` requires skinning matrices: the mesh
    /// has at least one skinned primitive and the model carries skins.
    /// An out-of-range mesh index is fatal.
    pub fn mesh_is_skinned(&self, mesh_index: usize) -> bool {
        !self.skins.is_empty() && self.meshes[mesh_index].primitives.iter().any(|p| p.skinned)
    }

    /// Checks all internal indices, so per-frame passes can resolve them
    /// without bounds handling.
    pub(crate) fn validate(&self) -> Result<(), ResourceError> {
        for (mesh_index, mesh) in self.meshes.iter().enumerate() {
            if mesh.node_index >= self.nodes.len() {
                return Err(ResourceError::NodeOutOfRange {
                    mesh: mesh_index,
                    node: mesh.node_index,
                    node_count: self.nodes.len(),
                });
            }
            for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
                if primitive.material_slot >= self.default_materials.len() {
                    return Err(ResourceError::MaterialSlotOutOfRange {
                        mesh: mesh_index,
                        primitive: primitive_index,
                        slot: primitive.material_slot,
                        slot_count: self.default_materials.len(),
                    });
                }
            }
        }

        for (skin_index, skin) in self.skins.iter().enumerate() {
            if skin.inverse_bind.len() != skin.joints.len() {
                return Err(ResourceError::SkinJointMismatch {
                    skin: skin_index,
                    joints: skin.joints.len(),
                    inverse_binds: skin.inverse_bind.len(),
                });
            }
            for &joint in skin.root_joint.iter().chain(&skin.joints) {
                if joint >= self.nodes.len() {
                    return Err(ResourceError::JointOutOfRange {
                        skin: skin_index,
                        node: joint,
                        node_count: self.nodes.len(),
                    });
                }
            }
        }

        Ok(())
    }
}
