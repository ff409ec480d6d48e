//! Collider shapes and descriptors

use crate::config::PhysicsConfig;
use crate::groups::InteractionGroups;
use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};
use void_ecs::Entity;

/// Handle to a collider in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub(crate) rapier::ColliderHandle);

impl ColliderHandle {
    /// Create from raw Rapier handle
    pub fn from_raw(handle: rapier::ColliderHandle) -> Self {
        Self(handle)
    }

    /// Get the raw Rapier handle
    pub fn raw(&self) -> rapier::ColliderHandle {
        self.0
    }
}

impl PartialOrd for ColliderHandle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColliderHandle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.into_raw_parts().cmp(&other.0.into_raw_parts())
    }
}

/// Collision shape type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: [f32; 3] },
    /// Capsule aligned along Y axis
    Capsule { half_height: f32, radius: f32 },
    /// Cylinder aligned along Y axis
    Cylinder { half_height: f32, radius: f32 },
    /// Cone aligned along Y axis
    Cone { half_height: f32, radius: f32 },
    ConvexHull { points: Vec<[f32; 3]> },
    /// Triangle mesh (fixed and kinematic bodies only)
    TriMesh {
        vertices: Vec<[f32; 3]>,
        indices: Vec<[u32; 3]>,
    },
}

impl ColliderShape {
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self::Box {
            half_extents: [hx, hy, hz],
        }
    }

    pub fn capsule(half_height: f32, radius: f32) -> Self {
        Self::Capsule { half_height, radius }
    }

    pub fn cylinder(half_height: f32, radius: f32) -> Self {
        Self::Cylinder { half_height, radius }
    }

    pub fn cone(half_height: f32, radius: f32) -> Self {
        Self::Cone { half_height, radius }
    }

    /// Why this shape cannot be built, if it cannot
    pub(crate) fn defect(&self) -> Option<String> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        match self {
            Self::Sphere { radius } if !positive(*radius) => {
                Some(format!("sphere radius must be positive, got {radius}"))
            }
            Self::Box { half_extents } if !half_extents.iter().all(|v| positive(*v)) => {
                Some(format!("box half extents must be positive, got {half_extents:?}"))
            }
            Self::Capsule { half_height, radius }
            | Self::Cylinder { half_height, radius }
            | Self::Cone { half_height, radius }
                if !(positive(*half_height) && positive(*radius)) =>
            {
                Some(format!(
                    "half height and radius must be positive, got {half_height} / {radius}"
                ))
            }
            Self::ConvexHull { points } if points.len() < 4 => {
                Some(format!("convex hull needs at least 4 points, got {}", points.len()))
            }
            Self::TriMesh { vertices, indices } => {
                let count = vertices.len() as u32;
                if indices.is_empty() {
                    Some("triangle mesh has no triangles".into())
                } else if indices.iter().flatten().any(|i| *i >= count) {
                    Some("triangle mesh index out of range".into())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Build a Rapier shared shape
    pub(crate) fn to_rapier(&self) -> Option<rapier::SharedShape> {
        let shape = match self {
            Self::Sphere { radius } => rapier::SharedShape::ball(*radius),
            Self::Box { half_extents } => {
                rapier::SharedShape::cuboid(half_extents[0], half_extents[1], half_extents[2])
            }
            Self::Capsule { half_height, radius } => {
                rapier::SharedShape::capsule_y(*half_height, *radius)
            }
            Self::Cylinder { half_height, radius } => {
                rapier::SharedShape::cylinder(*half_height, *radius)
            }
            Self::Cone { half_height, radius } => rapier::SharedShape::cone(*half_height, *radius),
            Self::ConvexHull { points } => {
                let points: Vec<_> = points
                    .iter()
                    .map(|p| rapier::Point::new(p[0], p[1], p[2]))
                    .collect();
                return rapier::SharedShape::convex_hull(&points);
            }
            Self::TriMesh { vertices, indices } => {
                let vertices: Vec<_> = vertices
                    .iter()
                    .map(|v| rapier::Point::new(v[0], v[1], v[2]))
                    .collect();
                rapier::SharedShape::trimesh(vertices, indices.clone())
            }
        };
        Some(shape)
    }
}

impl Default for ColliderShape {
    fn default() -> Self {
        Self::Box {
            half_extents: [0.5, 0.5, 0.5],
        }
    }
}

/// Description for creating a collider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderDesc {
    pub shape: ColliderShape,
    /// Position offset from parent body
    pub position_offset: [f32; 3],
    /// Sensor/trigger: reports overlaps, no physical response
    pub is_sensor: bool,
    /// Falls back to the world's default friction
    pub friction: Option<f32>,
    /// Falls back to the world's default restitution
    pub restitution: Option<f32>,
    pub density: f32,
    pub collision_groups: InteractionGroups,
}

impl Default for ColliderDesc {
    fn default() -> Self {
        Self {
            shape: ColliderShape::default(),
            position_offset: [0.0, 0.0, 0.0],
            is_sensor: false,
            friction: None,
            restitution: None,
            density: 1.0,
            collision_groups: InteractionGroups::default(),
        }
    }
}

impl ColliderDesc {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            ..Default::default()
        }
    }

    /// Create a sensor (trigger volume)
    pub fn sensor(shape: ColliderShape) -> Self {
        Self {
            shape,
            is_sensor: true,
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position_offset = [x, y, z];
        self
    }

    pub fn with_collision_groups(mut self, groups: impl Into<InteractionGroups>) -> Self {
        self.collision_groups = groups.into();
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = Some(friction);
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = Some(restitution);
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Build a Rapier collider, tagged with its owning entity.
    ///
    /// Collision events are enabled for every pairing so the tracker sees
    /// fixed and kinematic contacts as well as dynamic ones.
    pub(crate) fn to_rapier(&self, entity: Entity, config: &PhysicsConfig) -> Option<rapier::Collider> {
        let [ox, oy, oz] = self.position_offset;
        let groups = self.collision_groups.to_rapier();

        let collider = rapier::ColliderBuilder::new(self.to_shape()?)
            .translation(rapier::Vector::new(ox, oy, oz))
            .sensor(self.is_sensor)
            .friction(self.friction.unwrap_or(config.default_friction))
            .restitution(self.restitution.unwrap_or(config.default_restitution))
            .density(self.density)
            .collision_groups(groups)
            .solver_groups(groups)
            .active_events(rapier::ActiveEvents::COLLISION_EVENTS)
            .active_collision_types(rapier::ActiveCollisionTypes::all())
            .user_data(entity.to_user_data())
            .build();

        Some(collider)
    }

    fn to_shape(&self) -> Option<rapier::SharedShape> {
        self.shape.to_rapier()
    }
}
