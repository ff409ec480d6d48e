//! Error types for the physics system

use crate::body::RigidBodyHandle;
use crate::collider::ColliderHandle;
use crate::context::WorldId;
use thiserror::Error;
use void_ecs::Entity;

/// Physics system errors
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// Body/collider descriptors that cannot form a valid body
    #[error("Invalid descriptor for entity {entity}: {reason}")]
    InvalidDescriptor { entity: Entity, reason: String },

    /// Rigid body not found
    #[error("Rigid body not found: {0:?}")]
    BodyNotFound(RigidBodyHandle),

    /// Collider not found
    #[error("Collider not found: {0:?}")]
    ColliderNotFound(ColliderHandle),

    /// Entity not found in physics world
    #[error("Entity {0} has no physics body")]
    EntityNotInPhysics(Entity),

    /// World handle does not belong to this context
    #[error("Physics world not found: {0:?}")]
    WorldNotFound(WorldId),

    /// Invalid configuration
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),

    /// The world step produced no usable state
    #[error("Physics step failed: {0}")]
    StepFailed(String),
}

impl PhysicsError {
    pub(crate) fn invalid_descriptor(entity: Entity, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            entity,
            reason: reason.into(),
        }
    }
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
