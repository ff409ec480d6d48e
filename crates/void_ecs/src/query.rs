//! Query - Access to entities with specific components
//!
//! A [`QueryDescriptor`] names the component set an entity must (and must
//! not) carry. A [`TrackedQuery`] remembers its previous result so callers can
//! react to entities entering or leaving the set exactly once.

use crate::component::{Component, ComponentId};
use crate::entity::Entity;
use crate::world::World;
use std::collections::BTreeSet;

/// Describes a query's requirements
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    with: Vec<ComponentId>,
    without: Vec<ComponentId>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a component
    pub fn with<T: Component>(mut self) -> Self {
        self.with.push(ComponentId::of::<T>());
        self
    }

    /// Exclude entities carrying a component
    pub fn without<T: Component>(mut self) -> Self {
        self.without.push(ComponentId::of::<T>());
        self
    }

    pub fn required(&self) -> &[ComponentId] {
        &self.with
    }

    pub fn excluded(&self) -> &[ComponentId] {
        &self.without
    }
}

/// Entities that entered and exited a tracked query since the last update
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryDelta {
    pub entered: Vec<Entity>,
    pub exited: Vec<Entity>,
}

impl QueryDelta {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// A query that reports membership changes between updates
#[derive(Clone, Debug)]
pub struct TrackedQuery {
    descriptor: QueryDescriptor,
    members: BTreeSet<Entity>,
}

impl TrackedQuery {
    pub fn new(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            members: BTreeSet::new(),
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Re-evaluate against the world and return what changed.
    ///
    /// Despawned entities show up in `exited`; each transition is reported
    /// by exactly one update.
    pub fn update(&mut self, world: &World) -> QueryDelta {
        let current: BTreeSet<Entity> = world.query(&self.descriptor).into_iter().collect();

        let entered = current.difference(&self.members).copied().collect();
        let exited = self.members.difference(&current).copied().collect();

        self.members = current;
        QueryDelta { entered, exited }
    }

    /// Members as of the last update
    pub fn members(&self) -> impl Iterator<Item = Entity> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.members.contains(&entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;
    struct Other;

    #[test]
    fn test_tracked_query_enter_exit_once() {
        let mut world = World::new();
        let mut query = TrackedQuery::new(QueryDescriptor::new().with::<Marker>());

        let a = world.spawn();
        let b = world.spawn();
        world.add_component(a, Marker);
        world.add_component(b, Marker);

        let delta = query.update(&world);
        assert_eq!(delta.entered, vec![a, b]);
        assert!(delta.exited.is_empty());

        // No changes, no transitions
        assert!(query.update(&world).is_empty());

        world.remove_component::<Marker>(a);
        world.despawn(b);
        let delta = query.update(&world);
        assert!(delta.entered.is_empty());
        assert_eq!(delta.exited, vec![a, b]);
        assert!(query.update(&world).is_empty());
    }

    #[test]
    fn test_without_filter() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.add_component(a, Marker);
        world.add_component(b, Marker);
        world.add_component(b, Other);

        let desc = QueryDescriptor::new().with::<Marker>().without::<Other>();
        assert_eq!(world.query(&desc), vec![a]);
    }
}
