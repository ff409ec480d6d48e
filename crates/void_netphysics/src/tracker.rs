//! Collision state tracking
//!
//! Turns the engine's raw started/stopped signals into a per-pair lifecycle.
//! A pair of entities has at most one record; the record lives from the first
//! start signal until the last of its shape contacts stops, or until one of
//! the entities loses its body.

use crate::body::RigidBodyHandle;
use crate::collider::ColliderHandle;
use crate::components::{CollisionView, Collisions};
use crate::events::{CollisionEvent, CollisionPhase, ContactKind, RawContactEvent};
use crate::registry::BodyRegistry;
use std::collections::{BTreeMap, BTreeSet};
use void_ecs::{Entity, World};
use void_event::ActionBus;

/// Unordered entity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityPair {
    low: Entity,
    high: Entity,
}

impl EntityPair {
    pub fn new(a: Entity, b: Entity) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn first(&self) -> Entity {
        self.low
    }

    pub fn second(&self) -> Entity {
        self.high
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.low == entity || self.high == entity
    }

    pub fn other(&self, entity: Entity) -> Option<Entity> {
        if entity == self.low {
            Some(self.high)
        } else if entity == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

/// Unordered collider pair
type ShapePair = (ColliderHandle, ColliderHandle);

fn shape_pair(a: ColliderHandle, b: ColliderHandle) -> ShapePair {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Active contact between two entities
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionRecord {
    /// Side reported first by the engine
    pub entity_self: Entity,
    pub entity_other: Entity,
    pub body_self: Option<RigidBodyHandle>,
    pub body_other: Option<RigidBodyHandle>,
    pub shape_self: ColliderHandle,
    pub shape_other: ColliderHandle,
    pub kind: ContactKind,
    /// `Started` during the tick the contact began, `Continuing` afterwards
    pub phase: CollisionPhase,
    pub started_tick: u64,
    shapes: BTreeSet<ShapePair>,
}

impl CollisionRecord {
    /// Number of collider pairs currently touching
    pub fn shape_contacts(&self) -> usize {
        self.shapes.len()
    }

    /// The record seen from `entity`
    pub fn view_from(&self, entity: Entity) -> CollisionView {
        if entity == self.entity_self {
            CollisionView {
                body_self: self.body_self,
                body_other: self.body_other,
                shape_self: self.shape_self,
                shape_other: self.shape_other,
                kind: self.kind,
                phase: self.phase,
            }
        } else {
            CollisionView {
                body_self: self.body_other,
                body_other: self.body_self,
                shape_self: self.shape_other,
                shape_other: self.shape_self,
                kind: self.kind,
                phase: self.phase,
            }
        }
    }

    fn event(&self, phase: CollisionPhase, first: Entity, tick: u64, synthetic: bool) -> CollisionEvent {
        let view = self.view_from(first);
        let second = if first == self.entity_self {
            self.entity_other
        } else {
            self.entity_self
        };
        CollisionEvent {
            phase,
            kind: self.kind,
            entity1: first,
            entity2: second,
            body1: view.body_self,
            body2: view.body_other,
            shape1: view.shape_self,
            shape2: view.shape_other,
            tick,
            synthetic,
        }
    }
}

/// Outcome counters for one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub processed: usize,
    pub started: usize,
    pub ended: usize,
    /// Start signals for pairs that were already active
    pub refreshed: usize,
    /// Signals naming a collider that no longer maps to an entity
    pub unresolved: usize,
    /// Stop signals for pairs with no record
    pub spurious_stops: usize,
}

impl DrainStats {
    pub fn merge(&mut self, other: &DrainStats) {
        self.processed += other.processed;
        self.started += other.started;
        self.ended += other.ended;
        self.refreshed += other.refreshed;
        self.unresolved += other.unresolved;
        self.spurious_stops += other.spurious_stops;
    }
}

/// Per-pair contact state machine
#[derive(Debug, Default)]
pub struct CollisionTracker {
    records: BTreeMap<EntityPair, CollisionRecord>,
    /// Pairs that started during the previous drain
    fresh: Vec<EntityPair>,
}

impl CollisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, a: Entity, b: Entity) -> Option<&CollisionRecord> {
        self.records.get(&EntityPair::new(a, b))
    }

    pub fn is_active(&self, a: Entity, b: Entity) -> bool {
        self.records.contains_key(&EntityPair::new(a, b))
    }

    pub fn active_pairs(&self) -> impl Iterator<Item = EntityPair> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume one step's raw signals in report order.
    ///
    /// Records that started on the previous drain move to `Continuing`
    /// first. Events are published as each signal is classified.
    pub fn drain(
        &mut self,
        events: &[RawContactEvent],
        registry: &BodyRegistry,
        ecs: &mut World,
        bus: &ActionBus<CollisionEvent>,
        tick: u64,
    ) -> DrainStats {
        self.age_fresh(ecs);

        let mut stats = DrainStats::default();
        for raw in events {
            stats.processed += 1;

            let (Some((entity1, body1)), Some((entity2, body2))) = (
                registry.resolve_collider(raw.collider1),
                registry.resolve_collider(raw.collider2),
            ) else {
                log::trace!(
                    "Dropping contact signal for unresolved colliders {:?} / {:?}",
                    raw.collider1,
                    raw.collider2
                );
                stats.unresolved += 1;
                continue;
            };

            if entity1 == entity2 {
                continue;
            }

            let pair = EntityPair::new(entity1, entity2);
            let shapes = shape_pair(raw.collider1, raw.collider2);

            if raw.started {
                if let Some(record) = self.records.get_mut(&pair) {
                    // Classification stays as started; only the shapes move
                    record.shapes.insert(shapes);
                    refresh(record, entity1, raw.collider1, raw.collider2);
                    sync_views(ecs, record);
                    stats.refreshed += 1;
                    continue;
                }

                let record = CollisionRecord {
                    entity_self: entity1,
                    entity_other: entity2,
                    body_self: Some(body1),
                    body_other: Some(body2),
                    shape_self: raw.collider1,
                    shape_other: raw.collider2,
                    kind: raw.kind,
                    phase: CollisionPhase::Started,
                    started_tick: tick,
                    shapes: BTreeSet::from([shapes]),
                };
                sync_views(ecs, &record);
                bus.publish(record.event(CollisionPhase::Started, entity1, tick, false));
                self.records.insert(pair, record);
                self.fresh.push(pair);
                stats.started += 1;
            } else {
                let Some(record) = self.records.get_mut(&pair) else {
                    log::trace!("Stop signal for inactive pair {} / {}", entity1, entity2);
                    stats.spurious_stops += 1;
                    continue;
                };

                record.shapes.remove(&shapes);
                if let Some((a, b)) = record.shapes.iter().next().copied() {
                    // Another collider pair still touches; keep the contact alive
                    let first = registry.collider_owner(a).unwrap_or(record.entity_self);
                    let (own, other) = if first == record.entity_self { (a, b) } else { (b, a) };
                    record.shape_self = own;
                    record.shape_other = other;
                    sync_views(ecs, record);
                    continue;
                }

                if let Some(record) = self.records.remove(&pair) {
                    clear_views(ecs, pair);
                    bus.publish(record.event(CollisionPhase::Ended, entity1, tick, false));
                    stats.ended += 1;
                }
            }
        }

        stats
    }

    /// End every contact of `entity` with a synthetic event per pair.
    ///
    /// Used when the entity's body is released, so subscribers never see a
    /// started contact without a matching end.
    pub fn force_end(
        &mut self,
        entity: Entity,
        ecs: &mut World,
        bus: &ActionBus<CollisionEvent>,
        tick: u64,
    ) -> usize {
        let pairs: Vec<EntityPair> = self
            .records
            .keys()
            .filter(|pair| pair.contains(entity))
            .copied()
            .collect();

        for pair in &pairs {
            if let Some(record) = self.records.remove(pair) {
                clear_views(ecs, *pair);
                bus.publish(record.event(CollisionPhase::Ended, entity, tick, true));
            }
        }
        self.fresh.retain(|pair| !pair.contains(entity));

        pairs.len()
    }

    fn age_fresh(&mut self, ecs: &mut World) {
        for pair in std::mem::take(&mut self.fresh) {
            if let Some(record) = self.records.get_mut(&pair) {
                record.phase = CollisionPhase::Continuing;
                sync_views(ecs, record);
            }
        }
    }
}

fn refresh(record: &mut CollisionRecord, entity1: Entity, collider1: ColliderHandle, collider2: ColliderHandle) {
    if entity1 == record.entity_self {
        record.shape_self = collider1;
        record.shape_other = collider2;
    } else {
        record.shape_self = collider2;
        record.shape_other = collider1;
    }
}

fn sync_views(ecs: &mut World, record: &CollisionRecord) {
    for (owner, other) in [
        (record.entity_self, record.entity_other),
        (record.entity_other, record.entity_self),
    ] {
        if !ecs.is_alive(owner) {
            continue;
        }
        let view = record.view_from(owner);
        match ecs.get_component_mut::<Collisions>(owner) {
            Some(collisions) => {
                collisions.contacts.insert(other, view);
            }
            None => {
                let mut collisions = Collisions::default();
                collisions.contacts.insert(other, view);
                ecs.add_component(owner, collisions);
            }
        }
    }
}

fn clear_views(ecs: &mut World, pair: EntityPair) {
    for (owner, other) in [(pair.first(), pair.second()), (pair.second(), pair.first())] {
        let now_empty = match ecs.get_component_mut::<Collisions>(owner) {
            Some(collisions) => {
                collisions.contacts.remove(&other);
                collisions.is_empty()
            }
            None => false,
        };
        if now_empty {
            ecs.remove_component::<Collisions>(owner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::RigidBodyDesc;
    use crate::collider::{ColliderDesc, ColliderShape};
    use crate::config::PhysicsConfig;
    use crate::events::CollisionEventKind;
    use crate::world::PhysicsWorld;

    struct Fixture {
        ecs: World,
        world: PhysicsWorld,
        a: Entity,
        b: Entity,
        shape_a: ColliderHandle,
        shape_b: ColliderHandle,
    }

    fn fixture() -> Fixture {
        let mut ecs = World::new();
        let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let a = ecs.spawn();
        let b = ecs.spawn();
        for entity in [a, b] {
            world
                .create_body(
                    &mut ecs,
                    entity,
                    &RigidBodyDesc::dynamic(),
                    &[ColliderDesc::new(ColliderShape::sphere(1.0))],
                )
                .unwrap();
        }
        let shape_a = world.registry().get(a).unwrap().colliders[0];
        let shape_b = world.registry().get(b).unwrap().colliders[0];
        Fixture { ecs, world, a, b, shape_a, shape_b }
    }

    /// `a` carries a solid sphere and an offset sensor
    fn two_shape_fixture() -> (Fixture, ColliderHandle) {
        let mut ecs = World::new();
        let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let a = ecs.spawn();
        let b = ecs.spawn();
        world
            .create_body(
                &mut ecs,
                a,
                &RigidBodyDesc::dynamic(),
                &[
                    ColliderDesc::new(ColliderShape::sphere(1.0)),
                    ColliderDesc::sensor(ColliderShape::sphere(1.0)).with_offset(0.0, 1.0, 0.0),
                ],
            )
            .unwrap();
        world
            .create_body(
                &mut ecs,
                b,
                &RigidBodyDesc::dynamic(),
                &[ColliderDesc::new(ColliderShape::sphere(1.0))],
            )
            .unwrap();
        let shapes_a = world.registry().get(a).unwrap().colliders.clone();
        let shape_b = world.registry().get(b).unwrap().colliders[0];
        let fixture = Fixture {
            ecs,
            world,
            a,
            b,
            shape_a: shapes_a[0],
            shape_b,
        };
        (fixture, shapes_a[1])
    }

    fn drain(f: &mut Fixture, events: &[RawContactEvent]) -> DrainStats {
        f.world.drain_collisions(&mut f.ecs, events)
    }

    #[test]
    fn test_entity_pair_is_unordered() {
        let a = Entity::new(1, 0);
        let b = Entity::new(2, 0);
        assert_eq!(EntityPair::new(a, b), EntityPair::new(b, a));
        assert_eq!(EntityPair::new(b, a).other(a), Some(b));
        assert_eq!(EntityPair::new(a, b).other(Entity::new(9, 0)), None);
    }

    #[test]
    fn test_start_once_then_continue() {
        let mut f = fixture();
        let queue = f.world.subscribe_all();
        let start = RawContactEvent::started(f.shape_a, f.shape_b, ContactKind::Collision);

        let stats = drain(&mut f, &[start, start]);
        assert_eq!(stats.started, 1);
        assert_eq!(stats.refreshed, 1);
        assert_eq!(queue.drain().len(), 1);

        let view = *f.ecs.get_component::<Collisions>(f.a).unwrap().get(f.b).unwrap();
        assert_eq!(view.phase, CollisionPhase::Started);
        assert_eq!(view.shape_self, f.shape_a);
        assert_eq!(view.shape_other, f.shape_b);

        drain(&mut f, &[]);
        let record = f.world.tracker().record(f.b, f.a).unwrap();
        assert_eq!(record.phase, CollisionPhase::Continuing);
        let view = f.ecs.get_component::<Collisions>(f.b).unwrap().get(f.a).unwrap();
        assert_eq!(view.phase, CollisionPhase::Continuing);
        assert_eq!(view.shape_self, f.shape_b);
    }

    #[test]
    fn test_stop_ends_and_clears_component() {
        let mut f = fixture();
        let (shape_a, shape_b) = (f.shape_a, f.shape_b);
        let queue = f.world.subscribe_all();
        drain(&mut f, &[RawContactEvent::started(shape_a, shape_b, ContactKind::Collision)]);
        let stats = drain(&mut f, &[RawContactEvent::stopped(shape_b, shape_a, ContactKind::Collision)]);

        assert_eq!(stats.ended, 1);
        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert!(events[1].is_ended());
        assert!(!events[1].synthetic);
        assert!(f.world.tracker().is_empty());
        assert!(!f.ecs.has_component::<Collisions>(f.a));
        assert!(!f.ecs.has_component::<Collisions>(f.b));
    }

    #[test]
    fn test_spurious_stop_is_counted_not_published() {
        let mut f = fixture();
        let (shape_a, shape_b) = (f.shape_a, f.shape_b);
        let queue = f.world.subscribe_all();
        let stats = drain(&mut f, &[RawContactEvent::stopped(shape_a, shape_b, ContactKind::Collision)]);
        assert_eq!(stats.spurious_stops, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unresolved_collider_dropped() {
        let mut f = fixture();
        let shape_a = f.shape_a;
        let queue = f.world.subscribe_all();
        let stale = f.shape_b;
        f.world.remove_body(&mut f.ecs, f.b);

        let stats = drain(&mut f, &[RawContactEvent::started(shape_a, stale, ContactKind::Trigger)]);
        assert_eq!(stats.unresolved, 1);
        assert!(queue.is_empty());
        assert!(f.world.tracker().is_empty());
    }

    #[test]
    fn test_force_end_publishes_synthetic_end() {
        let mut f = fixture();
        let (shape_a, shape_b) = (f.shape_a, f.shape_b);
        let queue = f.world.subscribe_all();
        drain(&mut f, &[RawContactEvent::started(shape_a, shape_b, ContactKind::Trigger)]);
        queue.drain();

        assert!(f.world.remove_body(&mut f.ecs, f.a));
        let events = queue.drain();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ended());
        assert!(events[0].is_trigger());
        assert!(events[0].synthetic);
        assert_eq!(events[0].entity1, f.a);
        assert_eq!(events[0].entity2, f.b);
        assert!(!f.ecs.has_component::<Collisions>(f.b));
    }

    #[test]
    fn test_reentry_starts_again() {
        let mut f = fixture();
        let queue = f.world.subscribe_all();
        let start = RawContactEvent::started(f.shape_a, f.shape_b, ContactKind::Collision);
        let stop = RawContactEvent::stopped(f.shape_a, f.shape_b, ContactKind::Collision);

        drain(&mut f, &[start]);
        drain(&mut f, &[stop]);
        assert!(!f.world.tracker().is_active(f.a, f.b));
        drain(&mut f, &[start]);
        assert_eq!(f.world.tracker().record(f.a, f.b).unwrap().phase, CollisionPhase::Started);
        drain(&mut f, &[stop]);

        let phases: Vec<bool> = queue.drain().iter().map(|e| e.is_started()).collect();
        assert_eq!(phases, vec![true, false, true, false]);
        assert!(f.world.tracker().is_empty());
    }

    #[test]
    fn test_pair_lives_until_last_shape_stops() {
        let (mut f, sensor_a) = two_shape_fixture();
        let (shape_a, shape_b) = (f.shape_a, f.shape_b);
        let queue = f.world.subscribe_all();

        drain(
            &mut f,
            &[
                RawContactEvent::started(shape_a, shape_b, ContactKind::Collision),
                RawContactEvent::started(shape_b, sensor_a, ContactKind::Collision),
            ],
        );
        assert_eq!(f.world.tracker().record(f.a, f.b).unwrap().shape_contacts(), 2);
        assert_eq!(queue.drain().len(), 1);

        let stats = drain(&mut f, &[RawContactEvent::stopped(shape_a, shape_b, ContactKind::Collision)]);
        assert_eq!(stats.ended, 0);
        assert!(queue.is_empty());
        let record = f.world.tracker().record(f.a, f.b).unwrap();
        assert_eq!(record.shape_contacts(), 1);
        assert_eq!(record.view_from(f.a).shape_self, sensor_a);
        assert_eq!(record.view_from(f.a).shape_other, f.shape_b);
        let view = f.ecs.get_component::<Collisions>(f.b).unwrap().get(f.a).unwrap();
        assert_eq!(view.shape_other, sensor_a);

        let stats = drain(&mut f, &[RawContactEvent::stopped(sensor_a, shape_b, ContactKind::Collision)]);
        assert_eq!(stats.ended, 1);
        assert_eq!(queue.drain().len(), 1);
        assert!(f.world.tracker().is_empty());
        assert!(!f.ecs.has_component::<Collisions>(f.a));
    }

    #[test]
    fn test_classification_is_kept_for_the_life_of_a_pair() {
        let (mut f, sensor_a) = two_shape_fixture();
        let (shape_a, shape_b) = (f.shape_a, f.shape_b);
        let collision_started = f.world.subscribe(CollisionEventKind::CollisionStarted);
        let collision_ended = f.world.subscribe(CollisionEventKind::CollisionEnded);
        let trigger_ended = f.world.subscribe(CollisionEventKind::TriggerEnded);

        drain(
            &mut f,
            &[
                RawContactEvent::started(shape_a, shape_b, ContactKind::Collision),
                RawContactEvent::started(sensor_a, shape_b, ContactKind::Trigger),
            ],
        );
        assert_eq!(f.world.tracker().record(f.a, f.b).unwrap().kind, ContactKind::Collision);

        drain(
            &mut f,
            &[
                RawContactEvent::stopped(shape_a, shape_b, ContactKind::Collision),
                RawContactEvent::stopped(sensor_a, shape_b, ContactKind::Trigger),
            ],
        );

        assert_eq!(collision_started.drain().len(), 1);
        assert_eq!(collision_ended.drain().len(), 1);
        assert!(trigger_ended.is_empty());
    }
}
