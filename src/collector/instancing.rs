//! Instancer: turns a draw group's flat descriptor lists into
//! deduplicated, instanced draw calls.
//!
//! Descriptors group by structural equality of their draw signature in an
//! insertion-ordered map, so batches come out in first-seen order and
//! instances keep their original descriptor order — stable input order
//! gives stable output. The pass also fills the frame-wide entity table
//! and instance-argument array shared by every group.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use glam::Mat4;
use indexmap::IndexMap;

use crate::gpu::BufferHandle;
use crate::resources::{ResourceId, ResourceManager};
use crate::scene::{EntityInfo, ModelComponent, Transform};
use crate::string_id::StringId;

use super::draw_data::{
    CustomDraw, CustomDrawInstance, CustomDrawRaw, DrawGroup, DrawInstanceTarget, ModelDraw,
    ModelDrawInstance,
};
use super::rendering_data::{
    DrawCall, DrawEntity, DrawEntityIdent, GpuDrawArgs, GpuEntity, RenderingData, RenderingGroup,
};
use super::skinning;

/// Per-frame entity dedup table: populated idents map to their table
/// index; unpopulated (all-zero) idents bypass the table entirely.
pub(crate) type EntityLookup = HashMap<DrawEntityIdent, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ModelDrawKey {
    model: ResourceId,
    shader: ResourceId,
    variant: StringId,
    mesh_index: usize,
    primitive_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CustomDrawKey {
    shader: ResourceId,
    variant: StringId,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_stride: u32,
    base_vertex: u32,
    index_count: u32,
    start_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RawDrawKey {
    shader: ResourceId,
    variant: StringId,
    vertex_buffer: BufferHandle,
    vertex_stride: u32,
    base_vertex: u32,
    vertex_count: u32,
}

/// Instances one draw group into a rendering group, appending to the
/// frame-shared entity table and instance-argument array in `data`.
pub(crate) fn instance_group(
    group: &DrawGroup,
    world: &World,
    resources: &ResourceManager,
    data: &mut RenderingData,
    lookup: &mut EntityLookup,
) -> RenderingGroup {
    let mut calls = Vec::new();
    instance_model_draws(&group.model_draws, world, resources, data, lookup, &mut calls);
    instance_custom_draws(&group.custom_draws, world, resources, data, lookup, &mut calls);
    instance_raw_draws(&group.custom_raw_draws, world, resources, data, lookup, &mut calls);
    RenderingGroup::new(group.id(), group.name().to_string(), calls)
}

fn instance_model_draws(
    draws: &[ModelDraw],
    world: &World,
    resources: &ResourceManager,
    data: &mut RenderingData,
    lookup: &mut EntityLookup,
    calls: &mut Vec<DrawCall>,
) {
    let mut batches: IndexMap<ModelDrawKey, Vec<ModelDrawInstance>> = IndexMap::new();
    for draw in draws {
        let key = ModelDrawKey {
            model: draw.model,
            shader: draw.shader,
            variant: draw.variant,
            mesh_index: draw.mesh_index,
            primitive_index: draw.primitive_index,
        };
        batches.entry(key).or_default().push(draw.instance);
    }

    for (key, instances) in &batches {
        let model = resources.model(key.model);
        let mesh = &model.meshes[key.mesh_index];
        let primitive = &mesh.primitives[key.primitive_index];
        let pipeline = resources.shader(key.shader).pipeline(key.variant);
        let buffers = if primitive.skinned {
            &model.skinned_buffers
        } else {
            &model.static_buffers
        };

        let push_constant_offset = data.instance_args.len() as u32;
        for instance in instances {
            let (ident, gpu) = resolve_model_instance(
                world,
                instance,
                key.mesh_index,
                key.primitive_index,
                mesh.node_index,
            );
            let entity_index = resolve_entity_index(&mut data.entities, lookup, ident, gpu);
            let bone_index = match instance.target {
                DrawInstanceTarget::Entity(entity) => {
                    skinning::bone_base_for(&data.skinned_blocks, entity)
                }
                DrawInstanceTarget::Custom { .. } => 0,
            };
            let material_index = resources.material(instance.material).bindless_word_index();
            data.instance_args.push(GpuDrawArgs {
                entity_index,
                material_index,
                bone_index,
                scratch: 0,
            });
        }

        calls.push(DrawCall {
            pipeline,
            vertex_buffer: buffers.vertex_buffer,
            index_buffer: Some(buffers.index_buffer),
            vertex_stride: buffers.vertex_stride,
            base_vertex: primitive.base_vertex,
            base_index: primitive.base_index,
            index_count: primitive.index_count,
            vertex_count: primitive.vertex_count,
            instance_count: instances.len() as u32,
            push_constant_offset,
        });
    }
}

fn instance_custom_draws(
    draws: &[CustomDraw],
    world: &World,
    resources: &ResourceManager,
    data: &mut RenderingData,
    lookup: &mut EntityLookup,
    calls: &mut Vec<DrawCall>,
) {
    let mut batches: IndexMap<CustomDrawKey, Vec<CustomDrawInstance>> = IndexMap::new();
    for draw in draws {
        let key = CustomDrawKey {
            shader: draw.shader,
            variant: draw.variant,
            vertex_buffer: draw.vertex_buffer,
            index_buffer: draw.index_buffer,
            vertex_stride: draw.vertex_stride,
            base_vertex: draw.base_vertex,
            index_count: draw.index_count,
            start_index: draw.start_index,
        };
        batches.entry(key).or_default().push(draw.instance);
    }

    for (key, instances) in &batches {
        let pipeline = resources.shader(key.shader).pipeline(key.variant);
        let push_constant_offset = data.instance_args.len() as u32;
        for instance in instances {
            let args = resolve_custom_args(world, resources, data, lookup, instance);
            data.instance_args.push(args);
        }
        calls.push(DrawCall {
            pipeline,
            vertex_buffer: key.vertex_buffer,
            index_buffer: Some(key.index_buffer),
            vertex_stride: key.vertex_stride,
            base_vertex: key.base_vertex,
            base_index: key.start_index,
            index_count: key.index_count,
            vertex_count: 0,
            instance_count: instances.len() as u32,
            push_constant_offset,
        });
    }
}

fn instance_raw_draws(
    draws: &[CustomDrawRaw],
    world: &World,
    resources: &ResourceManager,
    data: &mut RenderingData,
    lookup: &mut EntityLookup,
    calls: &mut Vec<DrawCall>,
) {
    let mut batches: IndexMap<RawDrawKey, Vec<CustomDrawInstance>> = IndexMap::new();
    for draw in draws {
        let key = RawDrawKey {
            shader: draw.shader,
            variant: draw.variant,
            vertex_buffer: draw.vertex_buffer,
            vertex_stride: draw.vertex_stride,
            base_vertex: draw.base_vertex,
            vertex_count: draw.vertex_count,
        };
        batches.entry(key).or_default().push(draw.instance);
    }

    for (key, instances) in &batches {
        let pipeline = resources.shader(key.shader).pipeline(key.variant);
        let push_constant_offset = data.instance_args.len() as u32;
        for instance in instances {
            let args = resolve_custom_args(world, resources, data, lookup, instance);
            data.instance_args.push(args);
        }
        calls.push(DrawCall {
            pipeline,
            vertex_buffer: key.vertex_buffer,
            index_buffer: None,
            vertex_stride: key.vertex_stride,
            base_vertex: key.base_vertex,
            base_index: 0,
            index_count: 0,
            vertex_count: key.vertex_count,
            instance_count: instances.len() as u32,
            push_constant_offset,
        });
    }
}

/// Resolves (or reuses) the entity-table index for `ident`.
///
/// Unpopulated idents always append a fresh entry — an all-zero tuple is
/// "no entity" and must never alias another instance's slot.
fn resolve_entity_index(
    entities: &mut Vec<DrawEntity>,
    lookup: &mut EntityLookup,
    ident: DrawEntityIdent,
    gpu: GpuEntity,
) -> u32 {
    if !ident.is_unpopulated() {
        if let Some(&index) = lookup.get(&ident) {
            return index;
        }
    }
    let index = entities.len() as u32;
    entities.push(DrawEntity { gpu, ident });
    if !ident.is_unpopulated() {
        lookup.insert(ident, index);
    }
    index
}

fn resolve_model_instance(
    world: &World,
    instance: &ModelDrawInstance,
    mesh_index: usize,
    primitive_index: usize,
    node_index: usize,
) -> (DrawEntityIdent, GpuEntity) {
    let sub = [mesh_index as u32, primitive_index as u32, node_index as u32];
    match instance.target {
        DrawInstanceTarget::Entity(entity) => {
            let info = entity_info(world, entity);
            let component = world.get::<ModelComponent>(entity).unwrap_or_else(|| {
                panic!("model draw references entity {entity:?} without a model component")
            });
            let world_matrix = entity_world_matrix(world, entity);
            (
                DrawEntityIdent { guid: info.guid, sub },
                GpuEntity {
                    model: world_matrix * component.node_transforms[node_index],
                },
            )
        }
        DrawInstanceTarget::Custom { guid, transform } => (
            DrawEntityIdent { guid, sub },
            GpuEntity { model: transform },
        ),
    }
}

fn resolve_custom_args(
    world: &World,
    resources: &ResourceManager,
    data: &mut RenderingData,
    lookup: &mut EntityLookup,
    instance: &CustomDrawInstance,
) -> GpuDrawArgs {
    let mut args = instance.args;

    match instance.target {
        Some(target) => {
            let (ident, gpu) = match target {
                DrawInstanceTarget::Entity(entity) => {
                    let info = entity_info(world, entity);
                    (
                        DrawEntityIdent {
                            guid: info.guid,
                            sub: [0; 3],
                        },
                        GpuEntity {
                            model: entity_world_matrix(world, entity),
                        },
                    )
                }
                DrawInstanceTarget::Custom { guid, transform } => (
                    DrawEntityIdent { guid, sub: [0; 3] },
                    GpuEntity { model: transform },
                ),
            };
            let entity_index = resolve_entity_index(&mut data.entities, lookup, ident, gpu);
            if instance.use_entity_as_first_arg {
                args.entity_index = entity_index;
            }
        }
        None => {
            debug_assert!(
                !instance.use_entity_as_first_arg,
                "entity auto-fill requested on an instance with no target"
            );
        }
    }

    if instance.use_material_as_second_arg {
        let material = instance
            .material
            .unwrap_or_else(|| panic!("material auto-fill requested on an instance with no material"));
        args.material_index = resources.material(material).bindless_word_index();
    }

    args
}

fn entity_info(world: &World, entity: Entity) -> EntityInfo {
    *world
        .get::<EntityInfo>(entity)
        .unwrap_or_else(|| panic!("draw references entity {entity:?} without EntityInfo"))
}

fn entity_world_matrix(world: &World, entity: Entity) -> Mat4 {
    world
        .get::<Transform>(entity)
        .map(|t| t.matrix())
        .unwrap_or(Mat4::IDENTITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::PipelineHandle;
    use crate::resources::{Material, Mesh, MeshBuffers, Model, Primitive, Shader, ShaderKind};
    use glam::Vec3;

    const MODEL: ResourceId = ResourceId(1);
    const SHADER: ResourceId = ResourceId(2);
    const MATERIAL_A: ResourceId = ResourceId(3);
    const MATERIAL_B: ResourceId = ResourceId(4);

    fn buffers(base: u64) -> MeshBuffers {
        MeshBuffers {
            vertex_buffer: BufferHandle(base),
            index_buffer: BufferHandle(base + 1),
            vertex_stride: 32,
        }
    }

    fn primitive(material_slot: usize) -> Primitive {
        Primitive {
            base_vertex: 0,
            base_index: 0,
            index_count: 36,
            vertex_count: 24,
            material_slot,
            skinned: false,
        }
    }

    fn two_primitive_model() -> Model {
        Model {
            name: "model".to_string(),
            nodes: vec![Mat4::IDENTITY],
            meshes: vec![Mesh {
                name: "mesh".to_string(),
                node_index: 0,
                primitives: vec![primitive(0), primitive(0)],
            }],
            skins: Vec::new(),
            default_materials: vec![MATERIAL_A],
            static_buffers: buffers(10),
            skinned_buffers: buffers(20),
        }
    }

    fn resources() -> ResourceManager {
        let mut rm = ResourceManager::new();
        rm.register_shader(
            SHADER,
            Shader::new("lit", ShaderKind::OpaqueSurface, PipelineHandle(1)),
        )
        .unwrap();
        rm.register_material(MATERIAL_A, Material::new("a", SHADER, 16))
            .unwrap();
        rm.register_material(MATERIAL_B, Material::new("b", SHADER, 16))
            .unwrap();
        rm.register_model(MODEL, two_primitive_model()).unwrap();
        rm
    }

    fn custom_target(guid: u64) -> DrawInstanceTarget {
        DrawInstanceTarget::Custom {
            guid,
            transform: Mat4::IDENTITY,
        }
    }

    fn model_draw(primitive_index: usize, guid: u64) -> ModelDraw {
        ModelDraw {
            model: MODEL,
            mesh_index: 0,
            primitive_index,
            shader: SHADER,
            variant: StringId::NONE,
            instance: ModelDrawInstance {
                target: custom_target(guid),
                material: MATERIAL_A,
            },
        }
    }

    fn run(group: DrawGroup, rm: &ResourceManager) -> (RenderingGroup, RenderingData) {
        let world = World::new();
        let mut data = RenderingData::default();
        let mut lookup = EntityLookup::new();
        let rendered = instance_group(&group, &world, rm, &mut data, &mut lookup);
        (rendered, data)
    }

    #[test]
    fn identical_signatures_merge_into_one_call() {
        let rm = resources();
        let mut group = DrawGroup::new("G", 8);
        // two instances of primitive 0, one of primitive 1
        group.model_draws.push(model_draw(0, 100));
        group.model_draws.push(model_draw(0, 101));
        group.model_draws.push(model_draw(1, 100));

        let (rendered, data) = run(group, &rm);

        assert_eq!(rendered.draw_calls().len(), 2);
        assert_eq!(rendered.draw_calls()[0].instance_count, 2);
        assert_eq!(rendered.draw_calls()[1].instance_count, 1);
        // first-seen order: primitive 0 batch first
        assert_eq!(rendered.draw_calls()[0].push_constant_offset, 0);
        assert_eq!(rendered.draw_calls()[1].push_constant_offset, 2);

        // three distinct (guid, mesh, primitive, node) tuples
        assert_eq!(data.entities().len(), 3);
        let args = data.instance_args();
        assert_eq!(args.len(), 3);
        assert_eq!(args[0].entity_index, 0);
        assert_eq!(args[1].entity_index, 1);
        assert_eq!(args[2].entity_index, 2);
    }

    #[test]
    fn repeated_ident_reuses_entity_index() {
        let rm = resources();
        let mut group = DrawGroup::new("G", 8);
        group.model_draws.push(model_draw(0, 100));
        group.model_draws.push(model_draw(0, 100));

        let (rendered, data) = run(group, &rm);

        assert_eq!(rendered.draw_calls().len(), 1);
        assert_eq!(rendered.draw_calls()[0].instance_count, 2);
        assert_eq!(data.entities().len(), 1);
        assert_eq!(data.instance_args()[0].entity_index, 0);
        assert_eq!(data.instance_args()[1].entity_index, 0);
    }

    #[test]
    fn differing_sub_index_gets_fresh_entity() {
        let rm = resources();
        let mut group = DrawGroup::new("G", 8);
        group.model_draws.push(model_draw(0, 100));
        group.model_draws.push(model_draw(1, 100));

        let (_, data) = run(group, &rm);
        assert_eq!(data.entities().len(), 2);
        assert_ne!(data.entities()[0].ident, data.entities()[1].ident);
    }

    #[test]
    fn zero_guid_never_matches() {
        let rm = resources();
        let mut group = DrawGroup::new("G", 8);
        let mut draw = model_draw(0, 0);
        draw.mesh_index = 0;
        draw.primitive_index = 0;
        group.model_draws.push(draw);
        group.model_draws.push(draw);

        let (_, data) = run(group, &rm);
        // both idents are all-zero: each instance gets its own slot
        assert_eq!(data.entities().len(), 2);
        assert_eq!(data.instance_args()[0].entity_index, 0);
        assert_eq!(data.instance_args()[1].entity_index, 1);
    }

    #[test]
    fn material_index_is_bindless_word_offset() {
        let rm = resources();
        let mut group = DrawGroup::new("G", 8);
        let mut draw = model_draw(0, 100);
        draw.instance.material = MATERIAL_B;
        group.model_draws.push(draw);

        let (_, data) = run(group, &rm);
        // MATERIAL_B sits at byte offset 16 -> word 4
        assert_eq!(data.instance_args()[0].material_index, 4);
    }

    #[test]
    fn entity_transform_composes_node_transform() {
        let rm = {
            let mut rm = ResourceManager::new();
            rm.register_shader(
                SHADER,
                Shader::new("lit", ShaderKind::OpaqueSurface, PipelineHandle(1)),
            )
            .unwrap();
            rm.register_material(MATERIAL_A, Material::new("a", SHADER, 16))
                .unwrap();
            let mut model = two_primitive_model();
            model.nodes = vec![Mat4::from_translation(Vec3::Y)];
            rm.register_model(MODEL, model).unwrap();
            rm
        };

        let mut world = World::new();
        let component = ModelComponent::new(MODEL, rm.model(MODEL));
        let entity = world
            .spawn((
                crate::scene::EntityInfo::new(55),
                Transform::from_position(Vec3::X),
                component,
            ))
            .id();

        let mut group = DrawGroup::new("G", 8);
        let mut draw = model_draw(0, 0);
        draw.instance.target = DrawInstanceTarget::Entity(entity);
        group.model_draws.push(draw);

        let mut data = RenderingData::default();
        let mut lookup = EntityLookup::new();
        instance_group(&group, &world, &rm, &mut data, &mut lookup);

        assert_eq!(data.entities().len(), 1);
        assert_eq!(data.entities()[0].ident.guid, 55);
        let expected = Mat4::from_translation(Vec3::X) * Mat4::from_translation(Vec3::Y);
        assert_eq!(data.entities()[0].gpu.model, expected);
    }

    #[test]
    fn custom_raw_args_pass_through() {
        let rm = resources();
        let mut group = DrawGroup::new("G", 8);
        let args = GpuDrawArgs {
            entity_index: 11,
            material_index: 22,
            bone_index: 33,
            scratch: 44,
        };
        group.custom_raw_draws.push(CustomDrawRaw {
            shader: SHADER,
            variant: StringId::NONE,
            vertex_buffer: BufferHandle(99),
            vertex_stride: 16,
            base_vertex: 0,
            vertex_count: 6,
            instance: CustomDrawInstance::raw(args),
        });

        let (rendered, data) = run(group, &rm);

        assert_eq!(data.instance_args()[0], args);
        assert!(data.entities().is_empty());
        let call = rendered.draw_calls()[0];
        assert_eq!(call.index_buffer, None);
        assert_eq!(call.vertex_count, 6);
    }

    #[test]
    fn custom_draw_auto_fill() {
        let rm = resources();
        let mut group = DrawGroup::new("G", 8);
        let mut instance = CustomDrawInstance::raw(GpuDrawArgs::default());
        instance.target = Some(custom_target(7));
        instance.material = Some(MATERIAL_B);
        instance.use_entity_as_first_arg = true;
        instance.use_material_as_second_arg = true;
        group.custom_draws.push(CustomDraw {
            shader: SHADER,
            variant: StringId::NONE,
            vertex_buffer: BufferHandle(50),
            index_buffer: BufferHandle(51),
            vertex_stride: 16,
            base_vertex: 2,
            index_count: 12,
            start_index: 6,
            instance,
        });

        let (rendered, data) = run(group, &rm);

        assert_eq!(data.entities().len(), 1);
        assert_eq!(data.entities()[0].ident.sub, [0; 3]);
        assert_eq!(data.instance_args()[0].entity_index, 0);
        assert_eq!(data.instance_args()[0].material_index, 4);

        let call = rendered.draw_calls()[0];
        assert_eq!(call.base_index, 6);
        assert_eq!(call.base_vertex, 2);
        assert_eq!(call.index_count, 12);
    }

    #[test]
    fn empty_group_produces_nothing() {
        let rm = resources();
        let group = DrawGroup::new("Empty", 8);
        let (rendered, data) = run(group, &rm);

        assert!(rendered.draw_calls().is_empty());
        assert!(data.entities().is_empty());
        assert!(data.instance_args().is_empty());
    }
}
