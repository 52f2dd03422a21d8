//! Skinning preprocessor.
//!
//! Before instancing runs, every skinned model component referenced by
//! this frame's model draws gets a contiguous block in the flat bone
//! array, and the final skinning matrices (root-relative joint transform
//! composed with the inverse bind pose) are computed into those blocks in
//! parallel, one task per component.

use bevy_ecs::prelude::*;
use glam::Mat4;

use crate::executor::parallel_scatter;
use crate::resources::{Model, ResourceManager};
use crate::scene::{ModelComponent, Transform};

use super::draw_data::{DrawGroup, DrawInstanceTarget};
use super::rendering_data::SkinnedBlock;

/// Scans all model draws across `groups` and reserves one bone block per
/// distinct skinned component, in discovery order.
///
/// A draw joins its component to the set iff the referenced mesh has at
/// least one skinned primitive and the model carries skins. Block bases
/// are strictly increasing; blocks never overlap.
pub(crate) fn discover_skinned_components(
    groups: &[DrawGroup],
    world: &World,
    resources: &ResourceManager,
) -> Vec<SkinnedBlock> {
    let mut blocks: Vec<SkinnedBlock> = Vec::new();
    let mut next_base = 0u32;

    for group in groups {
        for draw in &group.model_draws {
            let DrawInstanceTarget::Entity(entity) = draw.instance.target else {
                continue;
            };
            let model = resources.model(draw.model);
            if !model.mesh_is_skinned(draw.mesh_index) {
                continue;
            }
            if blocks.iter().any(|b| b.entity == entity) {
                continue;
            }
            let joint_count = model.joint_count() as u32;
            blocks.push(SkinnedBlock {
                entity,
                bone_base: next_base,
                joint_count,
            });
            next_base += joint_count;
        }
    }

    blocks
}

/// Resolves the bone-block base for `entity` by walking the discovery
/// -ordered block list. Returns 0 when the entity is not in the skinned
/// set (static draws).
pub(crate) fn bone_base_for(blocks: &[SkinnedBlock], entity: Entity) -> u32 {
    blocks
        .iter()
        .find(|b| b.entity == entity)
        .map(|b| b.bone_base)
        .unwrap_or(0)
}

struct SkinJob<'a> {
    component: &'a ModelComponent,
    model: &'a Model,
    entity_world: Mat4,
}

/// Computes all skinning matrices for the reserved blocks into `bones`.
///
/// Runs one task per component on the rayon pool and joins before
/// returning; each task writes only its own block. An empty set is a
/// clean no-op.
pub(crate) fn compute_bone_matrices(
    blocks: &[SkinnedBlock],
    world: &World,
    resources: &ResourceManager,
    bones: &mut Vec<Mat4>,
) {
    bones.clear();
    if blocks.is_empty() {
        return;
    }

    let total: u32 = blocks.iter().map(|b| b.joint_count).sum();
    bones.resize(total as usize, Mat4::IDENTITY);

    let mut jobs = Vec::with_capacity(blocks.len());
    let mut spans = Vec::with_capacity(blocks.len());
    for block in blocks {
        let component = world
            .get::<ModelComponent>(block.entity)
            .unwrap_or_else(|| {
                panic!("skinned entity {:?} lost its model component", block.entity)
            });
        let entity_world = world
            .get::<Transform>(block.entity)
            .map(|t| t.matrix())
            .unwrap_or(Mat4::IDENTITY);
        jobs.push(SkinJob {
            component,
            model: resources.model(component.model),
            entity_world,
        });
        let base = block.bone_base as usize;
        spans.push(base..base + block.joint_count as usize);
    }

    parallel_scatter(jobs, bones, &spans, |job, out| {
        let mut cursor = 0;
        for skin in &job.model.skins {
            let root_global = match skin.root_joint {
                Some(root) => job.component.node_transforms[root],
                None => job.entity_world,
            };
            let root_inverse = root_global.inverse();
            for (joint_index, &joint) in skin.joints.iter().enumerate() {
                out[cursor] = root_inverse
                    * job.component.node_transforms[joint]
                    * skin.inverse_bind[joint_index];
                cursor += 1;
            }
        }
    });

    log::trace!(
        "skinning: {} components, {} bone matrices",
        blocks.len(),
        bones.len()
    );
}
