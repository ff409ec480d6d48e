//! Void NetPhysics - networked rigid-body core
//!
//! Binds ECS entities to Rapier 3D bodies, keeps networked bodies in sync
//! with the participant that owns them, and turns raw contact signals into
//! a start/end lifecycle that downstream systems subscribe to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  SimulationPipeline                  │
//! │  lifecycle ─► apply external ─► step ─► write-back ─► drain
//! └──────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//! ┌──────────────────────────────┐     ┌─────────────────────┐
//! │         PhysicsWorld         │     │ ActionBus<Collision │
//! │  BodyRegistry  Rapier sets   │────►│       Event>        │
//! │  CollisionTracker  Queries   │     └─────────────────────┘
//! └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use void_netphysics::prelude::*;
//!
//! let mut ecs = World::new();
//! let mut world = PhysicsWorld::new(PhysicsConfig::default())?;
//! let mut pipeline = SimulationPipeline::new(PipelineConfig::new(ParticipantId(1)));
//!
//! let ball = ecs.spawn();
//! ecs.add_component(ball, BodyIntent::new(
//!     RigidBodyDesc::dynamic().with_translation(0.0, 10.0, 0.0),
//!     vec![ColliderDesc::new(ColliderShape::sphere(0.5))],
//! ));
//!
//! let started = world.subscribe(CollisionEventKind::CollisionStarted);
//! pipeline.run_tick(&mut ecs, &mut world, TickMode::Run)?;
//! for event in started.drain() {
//!     println!("{} hit {}", event.entity1, event.entity2);
//! }
//! ```

pub mod body;
pub mod collider;
pub mod components;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod groups;
pub mod ownership;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod tracker;
pub mod world;

pub use body::{tag_for_body_type, BodyKind, Pose, RigidBodyDesc, RigidBodyHandle, TagKind};
pub use collider::{ColliderDesc, ColliderHandle, ColliderShape};
pub use config::{PhysicsConfig, PipelineConfig};
pub use context::{PhysicsContext, WorldId};
pub use error::{PhysicsError, Result};
pub use events::{CollisionEvent, CollisionEventKind, CollisionPhase, ContactKind};
pub use groups::{interaction_groups, CollisionGroup, InteractionGroups, DEFAULT_COLLISION_MASK};
pub use ownership::{OwnershipResolver, ParticipantId};
pub use pipeline::{Diagnostics, SimulationPipeline, TickMode, TickReport};
pub use world::PhysicsWorld;

pub mod prelude {
    //! Common imports for networked physics
    pub use crate::body::{
        attached_tags, tag_for_body_type, BodyKind, Pose, RigidBodyDesc, RigidBodyDynamicTag,
        RigidBodyFixedTag, RigidBodyHandle, RigidBodyKinematicTag, TagKind,
    };
    pub use crate::collider::{ColliderDesc, ColliderHandle, ColliderShape};
    pub use crate::components::{
        AvatarTag, BodyIntent, BoundingBox, CollisionView, Collisions, NetworkObject,
        NetworkObjectDirty, Renderable, RigidBody, Transform, Velocity,
    };
    pub use crate::config::{PhysicsConfig, PipelineConfig};
    pub use crate::context::{PhysicsContext, WorldId};
    pub use crate::error::{PhysicsError, Result};
    pub use crate::events::{CollisionEvent, CollisionEventKind, CollisionPhase, ContactKind};
    pub use crate::groups::{interaction_groups, CollisionGroup, InteractionGroups, DEFAULT_COLLISION_MASK};
    pub use crate::ownership::{OwnershipResolver, ParticipantId};
    pub use crate::pipeline::{Diagnostics, PendingTick, SimulationPipeline, TickMode, TickReport};
    pub use crate::query::{PhysicsQuery, QueryMode, RaycastHit, RaycastOptions, ShapeCastHit, ShapeCastOptions};
    pub use crate::registry::{BodyEntry, BodyRegistry};
    pub use crate::tracker::{CollisionRecord, CollisionTracker, DrainStats, EntityPair};
    pub use crate::world::{BodyState, PhysicsWorld, StepOutput};
    pub use void_ecs::{Entity, World};
    pub use void_event::ActionQueue;
}
