//! Rigid-body registry
//!
//! Binds ECS entities to engine bodies. Every entity with a live body has
//! exactly one body-type tag, and every collider resolves back to the entity
//! that owns it. Lifecycle operations live here as an `impl PhysicsWorld`
//! block so the mapping and the engine sets change together.

use crate::body::{attached_tags, tag_for_body_type, BodyKind, RigidBodyDesc, RigidBodyHandle, TagKind};
use crate::collider::{ColliderDesc, ColliderHandle, ColliderShape};
use crate::components::RigidBody;
use crate::error::{PhysicsError, Result};
use crate::world::PhysicsWorld;
use std::collections::{BTreeMap, HashMap};
use void_ecs::{Entity, World};

/// Engine-side record of one entity's body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyEntry {
    pub handle: RigidBodyHandle,
    pub kind: BodyKind,
    pub colliders: Vec<ColliderHandle>,
}

/// Entity <-> handle mapping
#[derive(Debug, Default)]
pub struct BodyRegistry {
    bodies: BTreeMap<Entity, BodyEntry>,
    collider_owners: HashMap<ColliderHandle, Entity>,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: Entity) -> Option<&BodyEntry> {
        self.bodies.get(&entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.bodies.contains_key(&entity)
    }

    /// Entity owning a collider
    pub fn collider_owner(&self, collider: ColliderHandle) -> Option<Entity> {
        self.collider_owners.get(&collider).copied()
    }

    /// Owner entity and parent body of a collider
    pub fn resolve_collider(&self, collider: ColliderHandle) -> Option<(Entity, RigidBodyHandle)> {
        let entity = self.collider_owner(collider)?;
        self.bodies.get(&entity).map(|entry| (entity, entry.handle))
    }

    /// Entities with a live body, in entity order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.bodies.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn insert(&mut self, entity: Entity, entry: BodyEntry) {
        for collider in &entry.colliders {
            self.collider_owners.insert(*collider, entity);
        }
        self.bodies.insert(entity, entry);
    }

    fn remove(&mut self, entity: Entity) -> Option<BodyEntry> {
        let entry = self.bodies.remove(&entity)?;
        for collider in &entry.colliders {
            self.collider_owners.remove(collider);
        }
        Some(entry)
    }

    fn set_kind(&mut self, entity: Entity, kind: BodyKind) {
        if let Some(entry) = self.bodies.get_mut(&entity) {
            entry.kind = kind;
        }
    }
}

fn check_descriptors(entity: Entity, body: &RigidBodyDesc, colliders: &[ColliderDesc]) -> Result<()> {
    if !body.is_finite() {
        return Err(PhysicsError::invalid_descriptor(
            entity,
            "body pose, velocity or scale is not finite",
        ));
    }

    if colliders.is_empty() && body.kind == BodyKind::Dynamic {
        return Err(PhysicsError::invalid_descriptor(
            entity,
            "dynamic body needs at least one collider",
        ));
    }

    for (index, desc) in colliders.iter().enumerate() {
        if let Some(reason) = desc.shape.defect() {
            return Err(PhysicsError::invalid_descriptor(
                entity,
                format!("collider {index}: {reason}"),
            ));
        }
        if body.kind == BodyKind::Dynamic && matches!(desc.shape, ColliderShape::TriMesh { .. }) {
            return Err(PhysicsError::invalid_descriptor(
                entity,
                format!("collider {index}: triangle meshes cannot be dynamic"),
            ));
        }
        if !desc.density.is_finite() || desc.density < 0.0 {
            return Err(PhysicsError::invalid_descriptor(
                entity,
                format!("collider {index}: density must be finite and non-negative"),
            ));
        }
    }

    Ok(())
}

impl PhysicsWorld {
    /// Create a body for an entity and attach its type tag.
    ///
    /// Descriptors are validated and every collider is built before the
    /// engine is touched, so a rejected descriptor leaves nothing behind.
    pub fn create_body(
        &mut self,
        ecs: &mut World,
        entity: Entity,
        body: &RigidBodyDesc,
        colliders: &[ColliderDesc],
    ) -> Result<RigidBodyHandle> {
        if !ecs.is_alive(entity) {
            return Err(PhysicsError::invalid_descriptor(entity, "entity is not alive"));
        }
        if self.registry.contains(entity) {
            return Err(PhysicsError::invalid_descriptor(entity, "entity already has a body"));
        }
        check_descriptors(entity, body, colliders)?;

        let mut built = Vec::with_capacity(colliders.len());
        for (index, desc) in colliders.iter().enumerate() {
            let collider = desc.to_rapier(entity, self.config()).ok_or_else(|| {
                PhysicsError::invalid_descriptor(
                    entity,
                    format!("collider {index}: shape is degenerate"),
                )
            })?;
            built.push(collider);
        }

        let rapier_body = body.to_rapier(entity, self.config());
        let handle = RigidBodyHandle(self.bodies.insert(rapier_body));
        let collider_handles: Vec<ColliderHandle> = built
            .into_iter()
            .map(|collider| {
                ColliderHandle(
                    self.colliders
                        .insert_with_parent(collider, handle.0, &mut self.bodies),
                )
            })
            .collect();

        self.registry.insert(
            entity,
            BodyEntry {
                handle,
                kind: body.kind,
                colliders: collider_handles.clone(),
            },
        );

        for tag in TagKind::ALL {
            tag.detach(ecs, entity);
        }
        tag_for_body_type(body.kind).attach(ecs, entity);
        ecs.add_component(
            entity,
            RigidBody {
                handle,
                kind: body.kind,
                colliders: collider_handles,
            },
        );

        log::debug!("Created {:?} body {:?} for {}", body.kind, handle, entity);
        Ok(handle)
    }

    /// Release an entity's body.
    ///
    /// Active contacts of the entity end with synthetic events before the
    /// engine handles are freed. Returns `false` when there was no body.
    pub fn remove_body(&mut self, ecs: &mut World, entity: Entity) -> bool {
        if !self.registry.contains(entity) {
            return false;
        }

        let tick = self.tick();
        let ended = self.tracker.force_end(entity, ecs, &self.actions, tick);
        if ended > 0 {
            log::debug!("Ended {} active contacts of {}", ended, entity);
        }

        let Some(entry) = self.registry.remove(entity) else {
            return false;
        };

        self.bodies.remove(
            entry.handle.0,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );

        for tag in TagKind::ALL {
            tag.detach(ecs, entity);
        }
        ecs.remove_component::<RigidBody>(entity);

        log::debug!("Removed body {:?} of {}", entry.handle, entity);
        true
    }

    /// Switch a body's type in place, keeping pose and velocity.
    ///
    /// Fixed bodies carry no velocity in the engine; switching back from
    /// fixed starts at rest.
    pub fn change_body_type(&mut self, ecs: &mut World, entity: Entity, kind: BodyKind) -> Result<()> {
        let entry = self
            .registry
            .get(entity)
            .cloned()
            .ok_or(PhysicsError::EntityNotInPhysics(entity))?;
        if entry.kind == kind {
            return Ok(());
        }

        let body = self
            .bodies
            .get_mut(entry.handle.0)
            .ok_or(PhysicsError::BodyNotFound(entry.handle))?;

        let position = *body.position();
        let linvel = *body.linvel();
        let angvel = *body.angvel();

        body.set_body_type(kind.into(), true);
        if *body.position() != position {
            body.set_position(position, false);
        }
        if kind != BodyKind::Fixed {
            body.set_linvel(linvel, true);
            body.set_angvel(angvel, true);
        }

        self.registry.set_kind(entity, kind);

        tag_for_body_type(entry.kind).detach(ecs, entity);
        tag_for_body_type(kind).attach(ecs, entity);
        if let Some(component) = ecs.get_component_mut::<RigidBody>(entity) {
            component.kind = kind;
        }

        log::debug!("Changed body of {} from {:?} to {:?}", entity, entry.kind, kind);
        Ok(())
    }

    /// True iff the entity carries exactly the tag matching its body type.
    ///
    /// An entity without a body is valid only when it carries no tag.
    pub fn validate_tags(&self, ecs: &World, entity: Entity) -> bool {
        let tags = attached_tags(ecs, entity);
        match self.registry.get(entity) {
            Some(entry) => tags == [tag_for_body_type(entry.kind)],
            None => tags.is_empty(),
        }
    }

    /// Release every body, ending all contacts first
    pub fn clear_bodies(&mut self, ecs: &mut World) -> usize {
        let entities: Vec<Entity> = self.registry.entities().collect();
        entities
            .into_iter()
            .filter(|entity| self.remove_body(ecs, *entity))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::RigidBodyDynamicTag;
    use crate::config::PhysicsConfig;

    fn setup() -> (World, PhysicsWorld) {
        (World::new(), PhysicsWorld::new(PhysicsConfig::default()).unwrap())
    }

    fn ball() -> Vec<ColliderDesc> {
        vec![ColliderDesc::new(ColliderShape::sphere(1.0))]
    }

    #[test]
    fn test_create_attaches_tag_and_component() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();

        let handle = world
            .create_body(&mut ecs, entity, &RigidBodyDesc::dynamic(), &ball())
            .unwrap();

        assert!(ecs.has_component::<RigidBodyDynamicTag>(entity));
        assert!(world.validate_tags(&ecs, entity));
        let component = ecs.get_component::<RigidBody>(entity).unwrap();
        assert_eq!(component.handle, handle);
        assert_eq!(component.colliders.len(), 1);
        assert_eq!(world.entity_for_collider(component.colliders[0]), Some(entity));
        assert_eq!(world.registry().resolve_collider(component.colliders[0]), Some((entity, handle)));
    }

    #[test]
    fn test_rejected_descriptor_leaves_no_trace() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();

        let err = world
            .create_body(&mut ecs, entity, &RigidBodyDesc::dynamic(), &[])
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidDescriptor { .. }));

        let mesh = ColliderShape::TriMesh {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            indices: vec![[0, 1, 2]],
        };
        assert!(world
            .create_body(&mut ecs, entity, &RigidBodyDesc::dynamic(), &[ColliderDesc::new(mesh)])
            .is_err());
        assert!(world
            .create_body(
                &mut ecs,
                entity,
                &RigidBodyDesc::dynamic().with_translation(f32::NAN, 0.0, 0.0),
                &ball()
            )
            .is_err());

        assert_eq!(world.body_count(), 0);
        assert_eq!(world.collider_count(), 0);
        assert!(attached_tags(&ecs, entity).is_empty());
        assert!(world.validate_tags(&ecs, entity));
    }

    #[test]
    fn test_second_body_rejected() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();
        world
            .create_body(&mut ecs, entity, &RigidBodyDesc::fixed(), &ball())
            .unwrap();
        assert!(world
            .create_body(&mut ecs, entity, &RigidBodyDesc::dynamic(), &ball())
            .is_err());
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_fixed_body_without_colliders_allowed() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();
        assert!(world
            .create_body(&mut ecs, entity, &RigidBodyDesc::fixed(), &[])
            .is_ok());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();
        world
            .create_body(&mut ecs, entity, &RigidBodyDesc::dynamic(), &ball())
            .unwrap();

        assert!(world.remove_body(&mut ecs, entity));
        assert!(!world.remove_body(&mut ecs, entity));
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.collider_count(), 0);
        assert!(!ecs.has_component::<RigidBody>(entity));
        assert!(attached_tags(&ecs, entity).is_empty());
    }

    #[test]
    fn test_change_type_swaps_tags_and_keeps_pose() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();
        let handle = world
            .create_body(
                &mut ecs,
                entity,
                &RigidBodyDesc::dynamic()
                    .with_translation(1.5, 2.25, -3.0)
                    .with_linear_velocity(1.0, 0.0, 0.0),
                &ball(),
            )
            .unwrap();
        let before = world.body_state(handle).unwrap();

        world
            .change_body_type(&mut ecs, entity, BodyKind::Kinematic)
            .unwrap();
        let after = world.body_state(handle).unwrap();
        assert_eq!(after.kind, BodyKind::Kinematic);
        assert_eq!(after.pose, before.pose);
        assert_eq!(after.linear_velocity, before.linear_velocity);
        assert_eq!(attached_tags(&ecs, entity), vec![TagKind::Kinematic]);

        world
            .change_body_type(&mut ecs, entity, BodyKind::Fixed)
            .unwrap();
        assert_eq!(world.body_state(handle).unwrap().pose, before.pose);
        assert_eq!(attached_tags(&ecs, entity), vec![TagKind::Fixed]);
        assert_eq!(ecs.get_component::<RigidBody>(entity).unwrap().kind, BodyKind::Fixed);
    }

    #[test]
    fn test_change_type_without_body() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();
        assert!(matches!(
            world.change_body_type(&mut ecs, entity, BodyKind::Fixed),
            Err(PhysicsError::EntityNotInPhysics(_))
        ));
    }

    #[test]
    fn test_validate_tags_detects_stray_tag() {
        let (mut ecs, mut world) = setup();
        let entity = ecs.spawn();
        world
            .create_body(&mut ecs, entity, &RigidBodyDesc::dynamic(), &ball())
            .unwrap();
        TagKind::Fixed.attach(&mut ecs, entity);
        assert!(!world.validate_tags(&ecs, entity));
    }
}
