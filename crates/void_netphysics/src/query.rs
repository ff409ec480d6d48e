//! Scene queries (raycasting, shape casting)
//!
//! Every hit resolves back to the struck body and its owning entity.

use crate::body::{Pose, RigidBodyHandle};
use crate::collider::{ColliderHandle, ColliderShape};
use crate::groups::InteractionGroups;
use crate::registry::BodyRegistry;
use rapier3d::parry::query::ShapeCastOptions as RapierShapeCastOptions;
use rapier3d::prelude as rapier;
use std::cmp::Ordering;
use void_ecs::Entity;

/// Result of a raycast query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// The collider that was hit
    pub collider: ColliderHandle,
    /// Parent body of the collider
    pub body: Option<RigidBodyHandle>,
    /// Entity owning the collider
    pub entity: Option<Entity>,
    /// Hit point in world space
    pub point: [f32; 3],
    /// Surface normal at hit point
    pub normal: [f32; 3],
    /// Distance from ray origin
    pub distance: f32,
}

/// Result of a shape cast query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeCastHit {
    pub collider: ColliderHandle,
    pub body: Option<RigidBodyHandle>,
    pub entity: Option<Entity>,
    /// Contact point on the struck collider, world space
    pub point: [f32; 3],
    /// Surface normal of the struck collider at the contact
    pub normal: [f32; 3],
    /// Distance travelled along the cast direction
    pub distance: f32,
}

/// How many hits a ray cast collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Nearest hit only
    #[default]
    Closest,
    /// Every hit along the ray
    All,
}

/// Options for raycast queries
#[derive(Debug, Clone)]
pub struct RaycastOptions {
    /// Maximum distance for the ray
    pub max_distance: f32,
    pub mode: QueryMode,
    /// Skip sensor colliders
    pub exclude_sensors: bool,
    /// Collision groups filter
    pub groups: InteractionGroups,
    /// Colliders to exclude
    pub exclude: Vec<ColliderHandle>,
}

impl Default for RaycastOptions {
    fn default() -> Self {
        Self {
            max_distance: f32::MAX,
            mode: QueryMode::Closest,
            exclude_sensors: true,
            groups: InteractionGroups::ALL,
            exclude: Vec::new(),
        }
    }
}

impl RaycastOptions {
    /// Set maximum distance
    pub fn with_max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance;
        self
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set whether to hit sensors
    pub fn with_sensors(mut self, include_sensors: bool) -> Self {
        self.exclude_sensors = !include_sensors;
        self
    }

    pub fn with_groups(mut self, groups: impl Into<InteractionGroups>) -> Self {
        self.groups = groups.into();
        self
    }

    /// Add a collider to exclude
    pub fn exclude(mut self, collider: ColliderHandle) -> Self {
        self.exclude.push(collider);
        self
    }

    fn filter(&self) -> rapier::QueryFilter<'_> {
        build_filter(self.groups, self.exclude_sensors, &self.exclude)
    }
}

/// Options for shape cast queries
#[derive(Debug, Clone)]
pub struct ShapeCastOptions {
    pub max_distance: f32,
    pub exclude_sensors: bool,
    pub groups: InteractionGroups,
    pub exclude: Vec<ColliderHandle>,
}

impl Default for ShapeCastOptions {
    fn default() -> Self {
        Self {
            max_distance: f32::MAX,
            exclude_sensors: true,
            groups: InteractionGroups::ALL,
            exclude: Vec::new(),
        }
    }
}

impl ShapeCastOptions {
    pub fn with_max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance;
        self
    }

    pub fn with_groups(mut self, groups: impl Into<InteractionGroups>) -> Self {
        self.groups = groups.into();
        self
    }

    pub fn exclude(mut self, collider: ColliderHandle) -> Self {
        self.exclude.push(collider);
        self
    }
}

fn build_filter(
    groups: InteractionGroups,
    exclude_sensors: bool,
    exclude: &[ColliderHandle],
) -> rapier::QueryFilter<'static> {
    let mut filter = rapier::QueryFilter::new().groups(groups.to_rapier());
    if exclude_sensors {
        filter = filter.exclude_sensors();
    }
    // QueryFilter holds a single excluded collider
    if let Some(first) = exclude.first() {
        filter = filter.exclude_collider(first.0);
    }
    filter
}

/// Unit direction, or `None` for a zero or non-finite vector
fn unit_direction(direction: [f32; 3]) -> Option<rapier::Vector<f32>> {
    let dir = rapier::Vector::new(direction[0], direction[1], direction[2]);
    let norm = dir.norm();
    (norm.is_finite() && norm > f32::EPSILON).then(|| dir / norm)
}

/// Query interface for physics world
pub struct PhysicsQuery<'a> {
    pub(crate) query_pipeline: &'a rapier::QueryPipeline,
    pub(crate) colliders: &'a rapier::ColliderSet,
    pub(crate) bodies: &'a rapier::RigidBodySet,
    pub(crate) registry: &'a BodyRegistry,
}

impl<'a> PhysicsQuery<'a> {
    fn resolve(&self, handle: rapier::ColliderHandle) -> (Option<RigidBodyHandle>, Option<Entity>) {
        let collider = self.colliders.get(handle);
        let body = collider.and_then(|c| c.parent()).map(RigidBodyHandle);
        let entity = self
            .registry
            .collider_owner(ColliderHandle(handle))
            .or_else(|| collider.and_then(|c| Entity::from_user_data(c.user_data)));
        (body, entity)
    }

    fn is_excluded(exclude: &[ColliderHandle], handle: rapier::ColliderHandle) -> bool {
        exclude.iter().any(|c| c.0 == handle)
    }

    /// Cast a ray; hits are ordered nearest first.
    ///
    /// [`QueryMode::Closest`] yields at most one hit. A zero-length
    /// direction yields none.
    pub fn raycast(&self, origin: [f32; 3], direction: [f32; 3], options: &RaycastOptions) -> Vec<RaycastHit> {
        match options.mode {
            QueryMode::Closest => self.raycast_first(origin, direction, options).into_iter().collect(),
            QueryMode::All => self.raycast_all(origin, direction, options),
        }
    }

    /// Cast a ray and get the first hit
    pub fn raycast_first(
        &self,
        origin: [f32; 3],
        direction: [f32; 3],
        options: &RaycastOptions,
    ) -> Option<RaycastHit> {
        if options.exclude.len() > 1 {
            return self.raycast_all(origin, direction, options).into_iter().next();
        }

        let dir = unit_direction(direction)?;
        let ray = rapier::Ray::new(rapier::Point::new(origin[0], origin[1], origin[2]), dir);

        self.query_pipeline
            .cast_ray_and_get_normal(
                self.bodies,
                self.colliders,
                &ray,
                options.max_distance,
                true,
                options.filter(),
            )
            .map(|(handle, intersection)| self.ray_hit(&ray, handle, intersection))
    }

    /// Cast a ray and get all hits, nearest first
    pub fn raycast_all(&self, origin: [f32; 3], direction: [f32; 3], options: &RaycastOptions) -> Vec<RaycastHit> {
        let Some(dir) = unit_direction(direction) else {
            return Vec::new();
        };
        let ray = rapier::Ray::new(rapier::Point::new(origin[0], origin[1], origin[2]), dir);

        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_ray(
            self.bodies,
            self.colliders,
            &ray,
            options.max_distance,
            true,
            options.filter(),
            |handle, intersection| {
                if !Self::is_excluded(&options.exclude, handle) {
                    hits.push(self.ray_hit(&ray, handle, intersection));
                }
                true
            },
        );

        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        hits
    }

    fn ray_hit(&self, ray: &rapier::Ray, handle: rapier::ColliderHandle, hit: rapier::RayIntersection) -> RaycastHit {
        let point = ray.point_at(hit.time_of_impact);
        let (body, entity) = self.resolve(handle);

        RaycastHit {
            collider: ColliderHandle(handle),
            body,
            entity,
            point: [point.x, point.y, point.z],
            normal: [hit.normal.x, hit.normal.y, hit.normal.z],
            distance: hit.time_of_impact,
        }
    }

    /// Sweep a shape from `pose` along `direction` and get the first hit
    pub fn shapecast(
        &self,
        shape: &ColliderShape,
        pose: Pose,
        direction: [f32; 3],
        options: &ShapeCastOptions,
    ) -> Option<ShapeCastHit> {
        if shape.defect().is_some() {
            return None;
        }
        let rapier_shape = shape.to_rapier()?;
        let dir = unit_direction(direction)?;
        let pos = pose.to_isometry();

        let filter = build_filter(options.groups, options.exclude_sensors, &options.exclude);
        let cast_options = RapierShapeCastOptions {
            max_time_of_impact: options.max_distance,
            stop_at_penetration: true,
            ..Default::default()
        };

        self.query_pipeline
            .cast_shape(
                self.bodies,
                self.colliders,
                &pos,
                &dir,
                rapier_shape.as_ref(),
                cast_options,
                filter,
            )
            .and_then(|(handle, hit)| {
                let collider = self.colliders.get(handle)?;
                let point = collider.position() * hit.witness2;
                let normal = collider.position() * hit.normal2;
                let (body, entity) = self.resolve(handle);

                Some(ShapeCastHit {
                    collider: ColliderHandle(handle),
                    body,
                    entity,
                    point: [point.x, point.y, point.z],
                    normal: [normal.x, normal.y, normal.z],
                    distance: hit.time_of_impact,
                })
            })
    }

    /// Entities whose colliders overlap a shape placed at `pose`
    pub fn overlap_shape(&self, shape: &ColliderShape, pose: Pose, groups: InteractionGroups) -> Vec<Entity> {
        if shape.defect().is_some() {
            return Vec::new();
        }
        let Some(rapier_shape) = shape.to_rapier() else {
            return Vec::new();
        };
        let pos = pose.to_isometry();

        let mut results = Vec::new();
        self.query_pipeline.intersections_with_shape(
            self.bodies,
            self.colliders,
            &pos,
            rapier_shape.as_ref(),
            build_filter(groups, false, &[]),
            |handle| {
                if let (_, Some(entity)) = self.resolve(handle) {
                    if !results.contains(&entity) {
                        results.push(entity);
                    }
                }
                true
            },
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::RigidBodyDesc;
    use crate::collider::ColliderDesc;
    use crate::config::PhysicsConfig;
    use crate::world::PhysicsWorld;
    use approx::assert_relative_eq;
    use void_ecs::World;

    fn spawn_fixed(
        ecs: &mut World,
        world: &mut PhysicsWorld,
        x: f32,
        collider: ColliderDesc,
    ) -> (Entity, RigidBodyHandle) {
        let entity = ecs.spawn();
        let handle = world
            .create_body(ecs, entity, &RigidBodyDesc::fixed().with_translation(x, 0.0, 0.0), &[collider])
            .unwrap();
        (entity, handle)
    }

    #[test]
    fn test_raycast_all_sorted_nearest_first() {
        let mut ecs = World::new();
        let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let (far, _) = spawn_fixed(&mut ecs, &mut world, 20.0, ColliderDesc::new(ColliderShape::sphere(1.0)));
        let (near, near_body) = spawn_fixed(&mut ecs, &mut world, 5.0, ColliderDesc::new(ColliderShape::sphere(1.0)));
        world.sync_query_pipeline();

        let options = RaycastOptions::default().with_mode(QueryMode::All).with_max_distance(100.0);
        let hits = world.query().raycast([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], &options);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entity, Some(near));
        assert_eq!(hits[0].body, Some(near_body));
        assert_eq!(hits[1].entity, Some(far));
        assert_relative_eq!(hits[0].distance, 4.0, epsilon = 1e-4);
        assert_relative_eq!(hits[1].distance, 19.0, epsilon = 1e-4);
    }

    #[test]
    fn test_raycast_respects_max_distance_and_zero_direction() {
        let mut ecs = World::new();
        let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        spawn_fixed(&mut ecs, &mut world, 5.0, ColliderDesc::new(ColliderShape::sphere(1.0)));
        world.sync_query_pipeline();

        let query = world.query();
        let short = RaycastOptions::default().with_max_distance(3.0);
        assert!(query.raycast([0.0; 3], [1.0, 0.0, 0.0], &short).is_empty());
        assert!(query.raycast([0.0; 3], [0.0; 3], &RaycastOptions::default()).is_empty());
    }

    #[test]
    fn test_raycast_skips_sensors_and_filtered_groups() {
        let mut ecs = World::new();
        let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        spawn_fixed(&mut ecs, &mut world, 3.0, ColliderDesc::sensor(ColliderShape::sphere(1.0)));
        let (wall, _) = spawn_fixed(
            &mut ecs,
            &mut world,
            8.0,
            ColliderDesc::new(ColliderShape::cuboid(1.0, 1.0, 1.0))
                .with_collision_groups(InteractionGroups::new(0b100, 0xffff)),
        );
        world.sync_query_pipeline();
        let query = world.query();

        let hit = query
            .raycast_first([0.0; 3], [1.0, 0.0, 0.0], &RaycastOptions::default())
            .unwrap();
        assert_eq!(hit.entity, Some(wall));
        assert_relative_eq!(hit.normal[0], -1.0, epsilon = 1e-4);

        let filtered = RaycastOptions::default().with_groups(InteractionGroups::new(0xffff, 0b001));
        assert!(query.raycast_first([0.0; 3], [1.0, 0.0, 0.0], &filtered).is_none());

        let with_sensors = RaycastOptions::default().with_sensors(true);
        let first = query.raycast_first([0.0; 3], [1.0, 0.0, 0.0], &with_sensors).unwrap();
        assert_relative_eq!(first.distance, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_shapecast_hits_wall() {
        let mut ecs = World::new();
        let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let (wall, body) = spawn_fixed(&mut ecs, &mut world, 10.0, ColliderDesc::new(ColliderShape::cuboid(1.0, 5.0, 5.0)));
        world.sync_query_pipeline();

        let hit = world
            .query()
            .shapecast(
                &ColliderShape::sphere(1.0),
                Pose::IDENTITY,
                [1.0, 0.0, 0.0],
                &ShapeCastOptions::default().with_max_distance(50.0),
            )
            .unwrap();

        assert_eq!(hit.entity, Some(wall));
        assert_eq!(hit.body, Some(body));
        assert_relative_eq!(hit.distance, 8.0, epsilon = 1e-3);
        assert_relative_eq!(hit.normal[0], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_overlap_shape_reports_entities() {
        let mut ecs = World::new();
        let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let (inside, _) = spawn_fixed(&mut ecs, &mut world, 0.5, ColliderDesc::new(ColliderShape::sphere(1.0)));
        spawn_fixed(&mut ecs, &mut world, 30.0, ColliderDesc::new(ColliderShape::sphere(1.0)));
        world.sync_query_pipeline();

        let found = world
            .query()
            .overlap_shape(&ColliderShape::sphere(1.0), Pose::IDENTITY, InteractionGroups::ALL);
        assert_eq!(found, vec![inside]);
    }
}
