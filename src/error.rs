//! Resource registration errors.
//!
//! Registration is the one boundary where the caller can still react to a
//! problem; everything past it (missing resources, out-of-range indices
//! during a frame) is a programming error and fails hard instead.

use thiserror::Error;

use crate::resources::ResourceId;

/// Errors reported when registering resources.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// The id is already registered for this resource type.
    #[error("resource id {0:?} is already registered")]
    DuplicateId(ResourceId),

    /// A primitive references a material slot the model does not declare.
    #[error("mesh {mesh} primitive {primitive} references material slot {slot}, model declares {slot_count}")]
    MaterialSlotOutOfRange {
        mesh: usize,
        primitive: usize,
        slot: usize,
        slot_count: usize,
    },

    /// A mesh is bound to a node index the model does not have.
    #[error("mesh {mesh} is bound to node {node}, model has {node_count} nodes")]
    NodeOutOfRange {
        mesh: usize,
        node: usize,
        node_count: usize,
    },

    /// A skin joint references a node index the model does not have.
    #[error("skin {skin} references joint node {node}, model has {node_count} nodes")]
    JointOutOfRange {
        skin: usize,
        node: usize,
        node_count: usize,
    },

    /// A skin's inverse-bind matrix count does not match its joint count.
    #[error("skin {skin} has {joints} joints but {inverse_binds} inverse bind matrices")]
    SkinJointMismatch {
        skin: usize,
        joints: usize,
        inverse_binds: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ResourceError::DuplicateId(ResourceId(3));
        assert_eq!(err.to_string(), "resource id ResourceId(3) is already registered");

        let err = ResourceError::SkinJointMismatch {
            skin: 0,
            joints: 4,
            inverse_binds: 3,
        };
        assert!(err.to_string().contains("4 joints"));
    }
}
