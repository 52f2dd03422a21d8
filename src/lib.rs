//! Draw collection and instancing engine.
//!
//! This crate is the bridge between a scene graph and a GPU command
//! stream. Scene traversal appends per-object draw requests into named
//! draw groups; at frame sync the collector deduplicates them into
//! instanced draw calls, computes skinning matrices for every referenced
//! skeletal model, assigns stable per-frame indices to entities and
//! materials, and finally emits typed GPU commands in a deterministic,
//! minimal-state-change order.
//!
//! # Features
//! - Named, frame-scoped draw groups for independent render passes
//! - Instancing by structural equality of the draw signature, preserving
//!   first-seen batch order and original instance order
//! - Per-frame entity table deduplicated by GUID plus sub-indices, with
//!   ident read-back for pick/outline consumers
//! - Parallel skinning into disjoint blocks of one flat bone array
//! - Redundant-bind elimination when emitting into a command stream
//!
//! # Frame lifecycle
//!
//! ```ignore
//! let mut collector = DrawCollector::new();
//!
//! // Collect: scene traversal fills draw groups
//! let forward = collector.create_group("Forward");
//! collector.collect_component_models(forward, &mut world, &resources, ShaderKind::OpaqueSurface);
//!
//! // Sync: build GPU-ready rendering data
//! collector.prepare_render_data(&world, &resources);
//!
//! // Emit: write commands for each pass
//! collector.render_group(forward, &mut stream);
//! ```

pub mod collector;
pub mod error;
pub mod executor;
pub mod gpu;
pub mod resources;
pub mod scene;
pub mod string_id;

pub use collector::{
    CollectorConfig, CustomDrawInstance, DrawCollector, DrawEntity, DrawEntityIdent,
    DrawInstanceTarget, GpuDrawArgs, GpuEntity, ModelDrawInstance, RenderingData, RenderingGroup,
    VARIANT_SKINNED, VARIANT_STATIC,
};
pub use error::ResourceError;
pub use gpu::{BufferHandle, Command, CommandStream, PipelineHandle};
pub use resources::{
    Material, Mesh, MeshBuffers, Model, Primitive, ResourceId, ResourceManager, Shader, ShaderKind,
    Skin,
};
pub use scene::{EntityInfo, ModelComponent, Transform};
pub use string_id::StringId;
