//! Component - Data attached to entities
//!
//! Components are plain data with no behavior. Each component type lives in
//! its own column keyed by entity, so adds and removes are visible to the
//! next read immediately.

use crate::entity::Entity;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;

/// Trait for component types
pub trait Component: Send + Sync + 'static {}

// Blanket implementation for all suitable types
impl<T: Send + Sync + 'static> Component for T {}

/// Identifier for a component type
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentId {
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name for debugging
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Type-erased view over a component column
pub trait ComponentColumn: Send + Sync {
    fn contains(&self, entity: Entity) -> bool;

    /// Drop the entity's value, if any
    fn remove_entity(&mut self, entity: Entity) -> bool;

    fn entities(&self) -> Vec<Entity>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage for a single component type, ordered by entity
pub struct Column<T: Component> {
    values: BTreeMap<Entity, T>,
}

impl<T: Component> Column<T> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        self.values.insert(entity, value)
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        self.values.remove(&entity)
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.values.get(&entity)
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.values.get_mut(&entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.values.iter().map(|(e, v)| (*e, v))
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentColumn for Column<T> {
    fn contains(&self, entity: Entity) -> bool {
        self.values.contains_key(&entity)
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.values.remove(&entity).is_some()
    }

    fn entities(&self) -> Vec<Entity> {
        self.values.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_column_type_erased_access() {
        let mut column: Box<dyn ComponentColumn> = Box::new(Column::<Health>::new());
        let e = Entity::new(3, 0);

        column
            .as_any_mut()
            .downcast_mut::<Column<Health>>()
            .unwrap()
            .insert(e, Health(10));

        assert!(column.contains(e));
        assert_eq!(column.entities(), vec![e]);
        assert!(column.remove_entity(e));
        assert!(column.is_empty());
    }

    #[test]
    fn test_component_id_identity() {
        assert_eq!(ComponentId::of::<Health>(), ComponentId::of::<Health>());
        assert_ne!(ComponentId::of::<Health>(), ComponentId::of::<u32>());
        assert!(ComponentId::of::<Health>().name().ends_with("Health"));
    }
}
