//! ECS components read and written by the physics core

use crate::body::{BodyKind, Pose, RigidBodyDesc, RigidBodyHandle};
use crate::collider::{ColliderDesc, ColliderHandle};
use crate::events::{ContactKind, CollisionPhase};
use crate::ownership::ParticipantId;
use std::collections::BTreeMap;
use void_ecs::Entity;

/// World-space transform; for non-owned networked entities this holds the
/// last pose received from the network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
}

impl Transform {
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self::from(Pose::from_translation(x, y, z))
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from(Pose::IDENTITY)
    }
}

impl From<Pose> for Transform {
    fn from(pose: Pose) -> Self {
        Self {
            position: pose.position,
            rotation: pose.rotation,
        }
    }
}

/// Linear and angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub linear: [f32; 3],
    pub angular: [f32; 3],
}

impl Velocity {
    pub fn new(linear: [f32; 3], angular: [f32; 3]) -> Self {
        Self { linear, angular }
    }
}

/// Marks an entity as networked and records who may author it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkObject {
    pub owner: ParticipantId,
    pub network_id: u32,
}

impl NetworkObject {
    pub fn new(owner: ParticipantId, network_id: u32) -> Self {
        Self { owner, network_id }
    }
}

/// Dirty marker: a received network update not yet applied to the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkObjectDirty;

/// Entity is driven by the avatar controller, not by generic write-back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AvatarTag;

/// Physics intent: the body an entity should have.
///
/// Adding this component requests a body; removing it (or despawning the
/// entity) releases the body on the next tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyIntent {
    pub body: RigidBodyDesc,
    pub colliders: Vec<ColliderDesc>,
}

impl BodyIntent {
    pub fn new(body: RigidBodyDesc, colliders: Vec<ColliderDesc>) -> Self {
        Self { body, colliders }
    }
}

/// Live body attached to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub handle: RigidBodyHandle,
    pub kind: BodyKind,
    pub colliders: Vec<ColliderHandle>,
}

/// Axis-aligned bounds of an entity's colliders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
    /// Recompute every tick instead of once
    pub dynamic: bool,
}

impl BoundingBox {
    pub fn empty(dynamic: bool) -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
            dynamic,
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    pub fn contains(&self, point: [f32; 3]) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }
}

/// Entity has a visual representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Renderable;

/// One active contact seen from the entity carrying the component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionView {
    pub body_self: Option<RigidBodyHandle>,
    pub body_other: Option<RigidBodyHandle>,
    pub shape_self: ColliderHandle,
    pub shape_other: ColliderHandle,
    pub kind: ContactKind,
    pub phase: CollisionPhase,
}

/// Active contacts of an entity, keyed by counterpart.
///
/// Present only while the entity touches something.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collisions {
    pub contacts: BTreeMap<Entity, CollisionView>,
}

impl Collisions {
    pub fn get(&self, other: Entity) -> Option<&CollisionView> {
        self.contacts.get(&other)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_empty_and_contains() {
        let mut bounds = BoundingBox::empty(false);
        assert!(bounds.is_empty());

        bounds.min = [-1.0, -1.0, -1.0];
        bounds.max = [1.0, 1.0, 1.0];
        assert!(!bounds.is_empty());
        assert!(bounds.contains([0.5, 0.0, -1.0]));
        assert!(!bounds.contains([1.5, 0.0, 0.0]));
    }

    #[test]
    fn test_transform_from_pose() {
        let transform = Transform::from_translation(1.0, 2.0, 3.0);
        assert_eq!(transform.pose(), Pose::from_translation(1.0, 2.0, 3.0));
        assert_eq!(transform.rotation, [0.0, 0.0, 0.0, 1.0]);
    }
}
