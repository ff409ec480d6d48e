//! Collision lifecycle events published to downstream systems

use crate::body::RigidBodyHandle;
use crate::collider::ColliderHandle;
use void_ecs::Entity;

/// Physical contact or overlap-only sensor contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    Collision,
    Trigger,
}

/// Lifecycle phase of a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionPhase {
    /// Began this tick
    Started,
    /// Began on an earlier tick and is still active
    Continuing,
    Ended,
}

/// The four published transitions, used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionEventKind {
    CollisionStarted,
    CollisionEnded,
    TriggerStarted,
    TriggerEnded,
}

impl CollisionEventKind {
    pub fn new(kind: ContactKind, started: bool) -> Self {
        match (kind, started) {
            (ContactKind::Collision, true) => Self::CollisionStarted,
            (ContactKind::Collision, false) => Self::CollisionEnded,
            (ContactKind::Trigger, true) => Self::TriggerStarted,
            (ContactKind::Trigger, false) => Self::TriggerEnded,
        }
    }

    pub fn matches(&self, event: &CollisionEvent) -> bool {
        event.event_kind() == *self
    }
}

/// One start or end transition for an entity pair.
///
/// Immutable once published; every subscriber receives its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    /// `Started` or `Ended`, never `Continuing`
    pub phase: CollisionPhase,
    pub kind: ContactKind,
    pub entity1: Entity,
    pub entity2: Entity,
    pub body1: Option<RigidBodyHandle>,
    pub body2: Option<RigidBodyHandle>,
    pub shape1: ColliderHandle,
    pub shape2: ColliderHandle,
    /// Tick of the drain that published the event
    pub tick: u64,
    /// Ended because an entity was removed, not because the engine said so
    pub synthetic: bool,
}

impl CollisionEvent {
    pub fn is_started(&self) -> bool {
        self.phase == CollisionPhase::Started
    }

    pub fn is_ended(&self) -> bool {
        self.phase == CollisionPhase::Ended
    }

    pub fn is_trigger(&self) -> bool {
        self.kind == ContactKind::Trigger
    }

    pub fn event_kind(&self) -> CollisionEventKind {
        CollisionEventKind::new(self.kind, self.is_started())
    }

    /// Whether `entity` is one side of the pair
    pub fn involves(&self, entity: Entity) -> bool {
        self.entity1 == entity || self.entity2 == entity
    }

    /// The side opposite `entity`
    pub fn other(&self, entity: Entity) -> Option<Entity> {
        if self.entity1 == entity {
            Some(self.entity2)
        } else if self.entity2 == entity {
            Some(self.entity1)
        } else {
            None
        }
    }
}

/// A raw signal reported by the engine during one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawContactEvent {
    pub collider1: ColliderHandle,
    pub collider2: ColliderHandle,
    pub started: bool,
    pub kind: ContactKind,
}

impl RawContactEvent {
    pub fn started(collider1: ColliderHandle, collider2: ColliderHandle, kind: ContactKind) -> Self {
        Self {
            collider1,
            collider2,
            started: true,
            kind,
        }
    }

    pub fn stopped(collider1: ColliderHandle, collider2: ColliderHandle, kind: ContactKind) -> Self {
        Self {
            collider1,
            collider2,
            started: false,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude as rapier;

    fn event(phase: CollisionPhase, kind: ContactKind) -> CollisionEvent {
        let shape = ColliderHandle::from_raw(rapier::ColliderHandle::from_raw_parts(0, 0));
        CollisionEvent {
            phase,
            kind,
            entity1: Entity::new(1, 0),
            entity2: Entity::new(2, 0),
            body1: None,
            body2: None,
            shape1: shape,
            shape2: shape,
            tick: 0,
            synthetic: false,
        }
    }

    #[test]
    fn test_event_kind_classification() {
        assert_eq!(
            event(CollisionPhase::Started, ContactKind::Collision).event_kind(),
            CollisionEventKind::CollisionStarted
        );
        assert_eq!(
            event(CollisionPhase::Ended, ContactKind::Trigger).event_kind(),
            CollisionEventKind::TriggerEnded
        );
        assert!(CollisionEventKind::TriggerStarted
            .matches(&event(CollisionPhase::Started, ContactKind::Trigger)));
        assert!(!CollisionEventKind::TriggerStarted
            .matches(&event(CollisionPhase::Started, ContactKind::Collision)));
    }

    #[test]
    fn test_other_side() {
        let e = event(CollisionPhase::Started, ContactKind::Collision);
        assert_eq!(e.other(Entity::new(1, 0)), Some(Entity::new(2, 0)));
        assert_eq!(e.other(Entity::new(2, 0)), Some(Entity::new(1, 0)));
        assert_eq!(e.other(Entity::new(3, 0)), None);
        assert!(e.involves(Entity::new(2, 0)));
    }
}
