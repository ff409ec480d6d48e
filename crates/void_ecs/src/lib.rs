//! # void_ecs - Entity Component Store
//!
//! Minimal ECS host used by the simulation crates:
//! - Generational entity IDs for use-after-free safety
//! - One ordered column per component type; add/remove is visible immediately
//! - Query descriptors (`with` / `without`)
//! - Tracked queries that report enter/exit sets exactly once
//!
//! ## Example
//!
//! ```
//! use void_ecs::prelude::*;
//!
//! struct Position([f32; 3]);
//!
//! let mut world = World::new();
//! let mut positioned = TrackedQuery::new(QueryDescriptor::new().with::<Position>());
//!
//! let entity = world.spawn();
//! world.add_component(entity, Position([0.0, 1.0, 0.0]));
//!
//! assert_eq!(positioned.update(&world).entered, vec![entity]);
//! ```

pub mod component;
pub mod entity;
pub mod query;
pub mod world;

pub use component::{Column, Component, ComponentColumn, ComponentId};
pub use entity::{Entity, EntityAllocator};
pub use query::{QueryDelta, QueryDescriptor, TrackedQuery};
pub use world::World;

pub mod prelude {
    pub use crate::{Component, Entity, QueryDelta, QueryDescriptor, TrackedQuery, World};
}
