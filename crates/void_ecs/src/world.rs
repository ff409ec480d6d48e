//! World - Container for all ECS data
//!
//! The World is the central storage for all entities, components, and resources.
//! It provides the main API for creating entities and manipulating components.
//! All mutations are synchronous: a component added or removed is visible to
//! the very next read.

use crate::component::{Column, Component, ComponentColumn, ComponentId};
use crate::entity::{Entity, EntityAllocator};
use crate::query::QueryDescriptor;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Resource storage
#[derive(Default)]
struct Resources {
    data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    fn insert<R: Any + Send + Sync>(&mut self, resource: R) {
        self.data.insert(TypeId::of::<R>(), Box::new(resource));
    }

    fn remove<R: Any + Send + Sync>(&mut self) -> Option<R> {
        self.data
            .remove(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast::<R>().ok())
            .map(|b| *b)
    }

    fn get<R: Any + Send + Sync>(&self) -> Option<&R> {
        self.data
            .get(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_ref::<R>())
    }

    fn get_mut<R: Any + Send + Sync>(&mut self) -> Option<&mut R> {
        self.data
            .get_mut(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_mut::<R>())
    }
}

/// The ECS World - container for all game data
#[derive(Default)]
pub struct World {
    entities: EntityAllocator,
    columns: HashMap<ComponentId, Box<dyn ComponentColumn>>,
    resources: Resources,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Entity Management ==========

    /// Spawn a new entity without components
    pub fn spawn(&mut self) -> Entity {
        self.entities.allocate()
    }

    /// Despawn an entity, dropping all of its components
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }

        for column in self.columns.values_mut() {
            column.remove_entity(entity);
        }
        self.entities.deallocate(entity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    // ========== Component Access ==========

    fn column<T: Component>(&self) -> Option<&Column<T>> {
        self.columns
            .get(&ComponentId::of::<T>())
            .and_then(|c| c.as_any().downcast_ref::<Column<T>>())
    }

    fn column_mut<T: Component>(&mut self) -> Option<&mut Column<T>> {
        self.columns
            .get_mut(&ComponentId::of::<T>())
            .and_then(|c| c.as_any_mut().downcast_mut::<Column<T>>())
    }

    /// Add (or replace) a component. Returns false if the entity is dead.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }

        let column = self
            .columns
            .entry(ComponentId::of::<T>())
            .or_insert_with(|| Box::new(Column::<T>::new()) as Box<dyn ComponentColumn>);

        match column.as_any_mut().downcast_mut::<Column<T>>() {
            Some(column) => {
                column.insert(entity, component);
                true
            }
            None => false,
        }
    }

    /// Remove a component, returning its value
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.column_mut::<T>()?.remove(entity)
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.column::<T>()?.get(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.column_mut::<T>()?.get_mut(entity)
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.has_component_id(entity, ComponentId::of::<T>())
    }

    pub fn has_component_id(&self, entity: Entity, id: ComponentId) -> bool {
        self.entities.is_alive(entity)
            && self
                .columns
                .get(&id)
                .map(|c| c.contains(entity))
                .unwrap_or(false)
    }

    /// Iterate all entities carrying `T`, in entity order
    pub fn iter_component<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.column::<T>().into_iter().flat_map(|c| c.iter())
    }

    // ========== Queries ==========

    /// Entities matching a descriptor, in entity order
    pub fn query(&self, descriptor: &QueryDescriptor) -> Vec<Entity> {
        let Some((first, rest)) = descriptor.required().split_first() else {
            return Vec::new();
        };
        let Some(column) = self.columns.get(first) else {
            return Vec::new();
        };

        column
            .entities()
            .into_iter()
            .filter(|&e| self.entities.is_alive(e))
            .filter(|&e| rest.iter().all(|id| self.has_component_id(e, *id)))
            .filter(|&e| !descriptor.excluded().iter().any(|id| self.has_component_id(e, *id)))
            .collect()
    }

    // ========== Resources ==========

    pub fn insert_resource<R: Any + Send + Sync>(&mut self, resource: R) {
        self.resources.insert(resource);
    }

    pub fn remove_resource<R: Any + Send + Sync>(&mut self) -> Option<R> {
        self.resources.remove::<R>()
    }

    pub fn resource<R: Any + Send + Sync>(&self) -> Option<&R> {
        self.resources.get::<R>()
    }

    pub fn resource_mut<R: Any + Send + Sync>(&mut self) -> Option<&mut R> {
        self.resources.get_mut::<R>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    #[test]
    fn test_world_spawn_despawn() {
        let mut world = World::new();

        let e1 = world.spawn();
        let e2 = world.spawn();
        world.add_component(e1, Position { x: 0.0, y: 0.0 });
        assert_eq!(world.entity_count(), 2);

        assert!(world.despawn(e1));
        assert!(!world.despawn(e1));
        assert!(!world.is_alive(e1));
        assert!(world.is_alive(e2));
        assert!(!world.has_component::<Position>(e1));
    }

    #[test]
    fn test_world_components() {
        let mut world = World::new();

        let entity = world.spawn();
        world.add_component(entity, Position { x: 1.0, y: 2.0 });
        world.add_component(entity, Velocity { x: 0.5, y: -0.5 });

        assert!(world.has_component::<Position>(entity));
        assert_eq!(world.get_component::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));

        if let Some(vel) = world.get_component_mut::<Velocity>(entity) {
            vel.x = 1.0;
        }
        assert_eq!(world.get_component::<Velocity>(entity).unwrap().x, 1.0);

        let removed = world.remove_component::<Position>(entity);
        assert_eq!(removed, Some(Position { x: 1.0, y: 2.0 }));
        assert!(!world.has_component::<Position>(entity));
        assert!(world.has_component::<Velocity>(entity));
    }

    #[test]
    fn test_add_to_dead_entity_is_rejected() {
        let mut world = World::new();
        let entity = world.spawn();
        world.despawn(entity);
        assert!(!world.add_component(entity, Position { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn test_query_requires_all_components() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.add_component(a, Position { x: 0.0, y: 0.0 });
        world.add_component(a, Velocity { x: 0.0, y: 0.0 });
        world.add_component(b, Position { x: 0.0, y: 0.0 });

        let desc = QueryDescriptor::new().with::<Position>().with::<Velocity>();
        assert_eq!(world.query(&desc), vec![a]);
    }

    #[test]
    fn test_world_resources() {
        #[derive(Debug, PartialEq)]
        struct Time(f32);

        let mut world = World::new();
        world.insert_resource(Time(0.0));
        if let Some(time) = world.resource_mut::<Time>() {
            time.0 = 1.5;
        }
        assert_eq!(world.resource::<Time>(), Some(&Time(1.5)));
        assert_eq!(world.remove_resource::<Time>(), Some(Time(1.5)));
        assert!(world.resource::<Time>().is_none());
    }
}
