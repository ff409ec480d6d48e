//! Rigid body types, descriptors and body-type tags

use crate::config::PhysicsConfig;
use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};
use void_ecs::{ComponentId, Entity, World};

/// Handle to a rigid body in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RigidBodyHandle(pub(crate) rapier::RigidBodyHandle);

impl RigidBodyHandle {
    /// Create from raw Rapier handle
    pub fn from_raw(handle: rapier::RigidBodyHandle) -> Self {
        Self(handle)
    }

    /// Get the raw Rapier handle
    pub fn raw(&self) -> rapier::RigidBodyHandle {
        self.0
    }
}

/// Type of rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moved by the simulation, infinite mass
    Fixed,
    /// Fully simulated
    #[default]
    Dynamic,
    /// Moved by its velocity only, pushes dynamic bodies
    Kinematic,
}

impl BodyKind {
    pub(crate) fn from_rapier(body_type: rapier::RigidBodyType) -> Self {
        match body_type {
            rapier::RigidBodyType::Fixed => Self::Fixed,
            rapier::RigidBodyType::Dynamic => Self::Dynamic,
            rapier::RigidBodyType::KinematicPositionBased
            | rapier::RigidBodyType::KinematicVelocityBased => Self::Kinematic,
        }
    }
}

impl From<BodyKind> for rapier::RigidBodyType {
    fn from(kind: BodyKind) -> Self {
        match kind {
            BodyKind::Fixed => rapier::RigidBodyType::Fixed,
            BodyKind::Dynamic => rapier::RigidBodyType::Dynamic,
            BodyKind::Kinematic => rapier::RigidBodyType::KinematicVelocityBased,
        }
    }
}

/// Position plus orientation (quaternion x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    pub fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            ..Self::IDENTITY
        }
    }

    pub(crate) fn to_isometry(&self) -> rapier::Isometry<f32> {
        let [x, y, z, w] = self.rotation;
        rapier::Isometry::from_parts(
            rapier::Translation::new(self.position[0], self.position[1], self.position[2]),
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        )
    }

    pub(crate) fn from_isometry(iso: &rapier::Isometry<f32>) -> Self {
        let t = iso.translation.vector;
        let r = iso.rotation;
        Self {
            position: [t.x, t.y, t.z],
            rotation: [r.i, r.j, r.k, r.w],
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Description for creating a rigid body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyDesc {
    pub kind: BodyKind,
    pub pose: Pose,
    pub linear_velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
    /// Gravity scale (0 = no gravity, 1 = normal, 2 = double)
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Lock all rotation (characters, upright props)
    pub lock_rotations: bool,
    pub ccd_enabled: bool,
    pub can_sleep: bool,
}

impl Default for RigidBodyDesc {
    fn default() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            pose: Pose::IDENTITY,
            linear_velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            lock_rotations: false,
            ccd_enabled: false,
            can_sleep: true,
        }
    }
}

impl RigidBodyDesc {
    pub fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn fixed() -> Self {
        Self::new(BodyKind::Fixed)
    }

    pub fn dynamic() -> Self {
        Self::new(BodyKind::Dynamic)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyKind::Kinematic)
    }

    pub fn with_translation(mut self, x: f32, y: f32, z: f32) -> Self {
        self.pose.position = [x, y, z];
        self
    }

    /// Set rotation (quaternion x, y, z, w)
    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.pose.rotation = rotation;
        self
    }

    pub fn with_linear_velocity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.linear_velocity = [x, y, z];
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_ccd(mut self, enabled: bool) -> Self {
        self.ccd_enabled = enabled;
        self
    }

    pub fn with_locked_rotations(mut self) -> Self {
        self.lock_rotations = true;
        self
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.pose.position.iter().all(|v| v.is_finite())
            && self.pose.rotation.iter().all(|v| v.is_finite())
            && self.linear_velocity.iter().all(|v| v.is_finite())
            && self.angular_velocity.iter().all(|v| v.is_finite())
            && self.gravity_scale.is_finite()
    }

    /// Build a Rapier rigid body, tagged with its owning entity.
    ///
    /// World-level CCD and sleeping switches override the descriptor.
    pub(crate) fn to_rapier(&self, entity: Entity, config: &PhysicsConfig) -> rapier::RigidBody {
        let [lx, ly, lz] = self.linear_velocity;
        let [ax, ay, az] = self.angular_velocity;

        let mut builder = rapier::RigidBodyBuilder::new(self.kind.into())
            .position(self.pose.to_isometry())
            .linvel(rapier::Vector::new(lx, ly, lz))
            .angvel(rapier::Vector::new(ax, ay, az))
            .gravity_scale(self.gravity_scale)
            .linear_damping(self.linear_damping)
            .angular_damping(self.angular_damping)
            .ccd_enabled(self.ccd_enabled && config.ccd_enabled)
            .can_sleep(self.can_sleep && config.sleeping_enabled)
            .user_data(entity.to_user_data());

        if self.lock_rotations {
            builder = builder.lock_rotations();
        }

        builder.build()
    }
}

// ==================== Body-type tags ====================

/// Tag: entity's body is fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RigidBodyFixedTag;

/// Tag: entity's body is dynamic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RigidBodyDynamicTag;

/// Tag: entity's body is kinematic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RigidBodyKinematicTag;

/// The mutually exclusive body-type tag set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Fixed,
    Dynamic,
    Kinematic,
}

impl TagKind {
    pub const ALL: [TagKind; 3] = [TagKind::Fixed, TagKind::Dynamic, TagKind::Kinematic];

    pub fn component_id(&self) -> ComponentId {
        match self {
            TagKind::Fixed => ComponentId::of::<RigidBodyFixedTag>(),
            TagKind::Dynamic => ComponentId::of::<RigidBodyDynamicTag>(),
            TagKind::Kinematic => ComponentId::of::<RigidBodyKinematicTag>(),
        }
    }

    pub(crate) fn attach(&self, ecs: &mut World, entity: Entity) -> bool {
        match self {
            TagKind::Fixed => ecs.add_component(entity, RigidBodyFixedTag),
            TagKind::Dynamic => ecs.add_component(entity, RigidBodyDynamicTag),
            TagKind::Kinematic => ecs.add_component(entity, RigidBodyKinematicTag),
        }
    }

    pub(crate) fn detach(&self, ecs: &mut World, entity: Entity) -> bool {
        match self {
            TagKind::Fixed => ecs.remove_component::<RigidBodyFixedTag>(entity).is_some(),
            TagKind::Dynamic => ecs.remove_component::<RigidBodyDynamicTag>(entity).is_some(),
            TagKind::Kinematic => ecs.remove_component::<RigidBodyKinematicTag>(entity).is_some(),
        }
    }

    pub fn is_attached(&self, ecs: &World, entity: Entity) -> bool {
        ecs.has_component_id(entity, self.component_id())
    }
}

/// The one tag that must accompany a body of this kind
pub fn tag_for_body_type(kind: BodyKind) -> TagKind {
    match kind {
        BodyKind::Fixed => TagKind::Fixed,
        BodyKind::Dynamic => TagKind::Dynamic,
        BodyKind::Kinematic => TagKind::Kinematic,
    }
}

/// Tags currently attached to an entity
pub fn attached_tags(ecs: &World, entity: Entity) -> Vec<TagKind> {
    TagKind::ALL
        .into_iter()
        .filter(|tag| tag.is_attached(ecs, entity))
        .collect()
}
