//! Shader resources and their compiled variants.

use std::collections::HashMap;

use crate::gpu::PipelineHandle;
use crate::string_id::StringId;

/// Broad category a shader renders into, used to filter model primitives
/// into the matching pass during collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    OpaqueSurface,
    TransparentSurface,
    Sky,
    Custom,
}

/// A shader resource: one default compiled pipeline plus named variants
/// (e.g. `"Static"` / `"Skinned"`, or an entity-id pass variant).
#[derive(Debug, Clone)]
pub struct Shader {
    pub name: String,
    pub kind: ShaderKind,
    pipeline: PipelineHandle,
    variants: HashMap<StringId, PipelineHandle>,
}

impl Shader {
    pub fn new(name: &str, kind: ShaderKind, pipeline: PipelineHandle) -> Self {
        Self {
            name: name.to_string(),
            kind,
            pipeline,
            variants: HashMap::new(),
        }
    }

    /// Adds a compiled variant. Builder-style, used at registration.
    pub fn with_variant(mut self, variant: StringId, pipeline: PipelineHandle) -> Self {
        self.variants.insert(variant, pipeline);
        self
    }

    /// True if `variant` names a compiled variant of this shader.
    pub fn has_variant(&self, variant: StringId) -> bool {
        self.variants.contains_key(&variant)
    }

    /// Resolves the pipeline for `variant`.
    ///
    /// [`StringId::NONE`] selects the default pipeline. Requesting a
    /// variant that was never registered is a programming error.
    pub fn pipeline(&self, variant: StringId) -> PipelineHandle {
        if variant.is_none() {
            return self.pipeline;
        }
        *self.variants.get(&variant).unwrap_or_else(|| {
            panic!("shader '{}' has no compiled variant {:?}", self.name, variant)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_variant_is_base_pipeline() {
        let shader = Shader::new("lit", ShaderKind::OpaqueSurface, PipelineHandle(5));
        assert_eq!(shader.pipeline(StringId::NONE), PipelineHandle(5));
    }

    #[test]
    fn named_variant_resolves() {
        let skinned = StringId::new("Skinned");
        let shader = Shader::new("lit", ShaderKind::OpaqueSurface, PipelineHandle(5))
            .with_variant(skinned, PipelineHandle(6));
        assert_eq!(shader.pipeline(skinned), PipelineHandle(6));
        assert!(shader.has_variant(skinned));
        assert!(!shader.has_variant(StringId::new("Outline")));
    }

    #[test]
    #[should_panic(expected = "has no compiled variant")]
    fn missing_variant_is_fatal() {
        let shader = Shader::new("lit", ShaderKind::OpaqueSurface, PipelineHandle(5));
        shader.pipeline(StringId::new("Outline"));
    }
}
