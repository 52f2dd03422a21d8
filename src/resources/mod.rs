//! Resource model and registry.
//!
//! Models, materials and shaders are owned by the application's resource
//! layer; the collector only borrows them for the duration of one frame's
//! collect → instance → emit cycle. [`ResourceManager`] is the lookup
//! table that contract goes through.
//!
//! Registration validates and can fail; per-frame lookup of a missing
//! resource is a programming error (the scene graph referenced something
//! that was never registered) and fails hard.

mod material;
mod model;
mod shader;

pub use material::Material;
pub use model::{Mesh, MeshBuffers, Model, Primitive, Skin};
pub use shader::{Shader, ShaderKind};

use std::collections::HashMap;

use crate::error::ResourceError;

/// Identifier for a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Registry of all resources the collector may reference during a frame.
#[derive(Debug, Default)]
pub struct ResourceManager {
    models: HashMap<ResourceId, Model>,
    materials: HashMap<ResourceId, Material>,
    shaders: HashMap<ResourceId, Shader>,
    /// Next free byte offset in the bindless material buffer.
    next_bindless_offset: u32,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shader under `id`.
    pub fn register_shader(&mut self, id: ResourceId, shader: Shader) -> Result<(), ResourceError> {
        if self.shaders.contains_key(&id) {
            return Err(ResourceError::DuplicateId(id));
        }
        log::debug!("registered shader '{}' as {:?}", shader.name, id);
        self.shaders.insert(id, shader);
        Ok(())
    }

    /// Registers a material under `id`, assigning its bindless offset.
    ///
    /// Offsets are handed out cumulatively, 4-byte aligned, in
    /// registration order. Returns the assigned byte offset.
    pub fn register_material(
        &mut self,
        id: ResourceId,
        mut material: Material,
    ) -> Result<u32, ResourceError> {
        if self.materials.contains_key(&id) {
            return Err(ResourceError::DuplicateId(id));
        }
        let offset = self.next_bindless_offset;
        material.bindless_offset = offset;
        self.next_bindless_offset += material.data_size.div_ceil(4) * 4;
        log::debug!(
            "registered material '{}' as {:?} at bindless offset {}",
            material.name,
            id,
            offset
        );
        self.materials.insert(id, material);
        Ok(offset)
    }

    /// Registers a model under `id` after validating its internal indices.
    pub fn register_model(&mut self, id: ResourceId, model: Model) -> Result<(), ResourceError> {
        if self.models.contains_key(&id) {
            return Err(ResourceError::DuplicateId(id));
        }
        model.validate()?;
        log::debug!("registered model '{}' as {:?}", model.name, id);
        self.models.insert(id, model);
        Ok(())
    }

    /// Looks up a model. Missing ids are fatal.
    pub fn model(&self, id: ResourceId) -> &Model {
        self.models
            .get(&id)
            .unwrap_or_else(|| panic!("model {id:?} does not exist"))
    }

    /// Looks up a material. Missing ids are fatal.
    pub fn material(&self, id: ResourceId) -> &Material {
        self.materials
            .get(&id)
            .unwrap_or_else(|| panic!("material {id:?} does not exist"))
    }

    /// Looks up a shader. Missing ids are fatal.
    pub fn shader(&self, id: ResourceId) -> &Shader {
        self.shaders
            .get(&id)
            .unwrap_or_else(|| panic!("shader {id:?} does not exist"))
    }

    pub fn model_exists(&self, id: ResourceId) -> bool {
        self.models.contains_key(&id)
    }

    pub fn material_exists(&self, id: ResourceId) -> bool {
        self.materials.contains_key(&id)
    }

    pub fn shader_exists(&self, id: ResourceId) -> bool {
        self.shaders.contains_key(&id)
    }
}
