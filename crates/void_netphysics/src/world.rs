//! Physics world - main simulation container

use crate::body::{BodyKind, Pose, RigidBodyHandle};
use crate::collider::ColliderHandle;
use crate::config::PhysicsConfig;
use crate::error::{PhysicsError, Result};
use crate::events::{CollisionEvent, CollisionEventKind, ContactKind, RawContactEvent};
use crate::query::PhysicsQuery;
use crate::registry::BodyRegistry;
use crate::tracker::{CollisionTracker, DrainStats};
use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::prelude as rapier;
use std::num::NonZeroUsize;
use void_ecs::{Entity, World};
use void_event::{ActionBus, ActionQueue};

/// Snapshot of a body's simulated state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub kind: BodyKind,
    pub pose: Pose,
    pub linear_velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
}

/// Raw output of one world step, consumed by the collision drain
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Tick number the step produced
    pub tick: u64,
    /// Engine signals in report order
    pub events: Vec<RawContactEvent>,
}

/// The main physics world containing all simulation state
pub struct PhysicsWorld {
    config: PhysicsConfig,

    pipeline: rapier::PhysicsPipeline,
    gravity: rapier::Vector<f32>,
    integration_params: rapier::IntegrationParameters,
    pub(crate) islands: rapier::IslandManager,
    broad_phase: rapier::DefaultBroadPhase,
    narrow_phase: rapier::NarrowPhase,
    pub(crate) impulse_joints: rapier::ImpulseJointSet,
    pub(crate) multibody_joints: rapier::MultibodyJointSet,
    ccd_solver: rapier::CCDSolver,
    query_pipeline: rapier::QueryPipeline,
    pub(crate) bodies: rapier::RigidBodySet,
    pub(crate) colliders: rapier::ColliderSet,

    /// Entity <-> handle mapping
    pub(crate) registry: BodyRegistry,

    /// Active contact pairs
    pub(crate) tracker: CollisionTracker,

    /// Published collision lifecycle events
    pub(crate) actions: ActionBus<CollisionEvent>,

    /// Signals from a failed step, handed out by the next one
    carried: Vec<RawContactEvent>,

    /// Completed steps
    tick: u64,
}

impl PhysicsWorld {
    /// Create a new physics world
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;

        let gravity = rapier::Vector::new(config.gravity[0], config.gravity[1], config.gravity[2]);

        let mut integration_params = rapier::IntegrationParameters::default();
        integration_params.dt = config.timestep;
        if let Some(iterations) = NonZeroUsize::new(config.velocity_iterations) {
            integration_params.num_solver_iterations = iterations;
        }

        Ok(Self {
            config,
            pipeline: rapier::PhysicsPipeline::new(),
            gravity,
            integration_params,
            islands: rapier::IslandManager::new(),
            broad_phase: rapier::DefaultBroadPhase::new(),
            narrow_phase: rapier::NarrowPhase::new(),
            impulse_joints: rapier::ImpulseJointSet::new(),
            multibody_joints: rapier::MultibodyJointSet::new(),
            ccd_solver: rapier::CCDSolver::new(),
            query_pipeline: rapier::QueryPipeline::new(),
            bodies: rapier::RigidBodySet::new(),
            colliders: rapier::ColliderSet::new(),
            registry: BodyRegistry::new(),
            tracker: CollisionTracker::new(),
            actions: ActionBus::new(),
            carried: Vec::new(),
            tick: 0,
        })
    }

    /// Get the physics configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Set gravity
    pub fn set_gravity(&mut self, x: f32, y: f32, z: f32) {
        self.gravity = rapier::Vector::new(x, y, z);
        self.config.gravity = [x, y, z];
    }

    /// Number of completed steps
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn registry(&self) -> &BodyRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &CollisionTracker {
        &self.tracker
    }

    // ==================== Events ====================

    /// Publisher handle for collision events
    pub fn actions(&self) -> &ActionBus<CollisionEvent> {
        &self.actions
    }

    /// Queue receiving one kind of transition
    pub fn subscribe(&self, kind: CollisionEventKind) -> ActionQueue<CollisionEvent> {
        self.actions.subscribe(move |event| kind.matches(event))
    }

    /// Queue receiving every transition
    pub fn subscribe_all(&self) -> ActionQueue<CollisionEvent> {
        self.actions.subscribe_all()
    }

    // ==================== Bodies ====================

    /// Body handle for an entity
    pub fn body_for_entity(&self, entity: Entity) -> Option<RigidBodyHandle> {
        self.registry.get(entity).map(|entry| entry.handle)
    }

    /// Owning entity of a collider
    pub fn entity_for_collider(&self, collider: ColliderHandle) -> Option<Entity> {
        self.registry.collider_owner(collider)
    }

    /// Owning entity of a body, read from the engine-side back-reference
    pub fn entity_for_body(&self, handle: RigidBodyHandle) -> Option<Entity> {
        self.bodies
            .get(handle.0)
            .and_then(|body| Entity::from_user_data(body.user_data))
    }

    /// Current simulated state of a body
    pub fn body_state(&self, handle: RigidBodyHandle) -> Result<BodyState> {
        let body = self.bodies.get(handle.0).ok_or(PhysicsError::BodyNotFound(handle))?;
        let linvel = body.linvel();
        let angvel = body.angvel();

        Ok(BodyState {
            kind: BodyKind::from_rapier(body.body_type()),
            pose: Pose::from_isometry(body.position()),
            linear_velocity: [linvel.x, linvel.y, linvel.z],
            angular_velocity: [angvel.x, angvel.y, angvel.z],
        })
    }

    /// Get rigid body pose
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Result<Pose> {
        self.bodies
            .get(handle.0)
            .map(|b| Pose::from_isometry(b.position()))
            .ok_or(PhysicsError::BodyNotFound(handle))
    }

    /// Snap a body to a pose without interpolation
    pub fn teleport(&mut self, handle: RigidBodyHandle, pose: Pose) -> Result<()> {
        let body = self
            .bodies
            .get_mut(handle.0)
            .ok_or(PhysicsError::BodyNotFound(handle))?;
        body.set_position(pose.to_isometry(), true);
        Ok(())
    }

    /// Set linear and angular velocity
    pub fn set_body_velocity(
        &mut self,
        handle: RigidBodyHandle,
        linear: [f32; 3],
        angular: [f32; 3],
    ) -> Result<()> {
        let body = self
            .bodies
            .get_mut(handle.0)
            .ok_or(PhysicsError::BodyNotFound(handle))?;
        body.set_linvel(rapier::Vector::new(linear[0], linear[1], linear[2]), true);
        body.set_angvel(rapier::Vector::new(angular[0], angular[1], angular[2]), true);
        Ok(())
    }

    /// Apply an impulse to a rigid body
    pub fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: [f32; 3]) -> Result<()> {
        self.bodies
            .get_mut(handle.0)
            .map(|b| {
                b.apply_impulse(rapier::Vector::new(impulse[0], impulse[1], impulse[2]), true);
            })
            .ok_or(PhysicsError::BodyNotFound(handle))
    }

    /// World-space bounds of all colliders of an entity
    pub fn entity_bounds(&self, entity: Entity) -> Option<([f32; 3], [f32; 3])> {
        let entry = self.registry.get(entity)?;
        let mut bounds: Option<Aabb> = None;

        for handle in &entry.colliders {
            let Some(collider) = self.colliders.get(handle.0) else {
                continue;
            };
            let aabb = collider.compute_aabb();
            bounds = Some(match bounds {
                Some(acc) => acc.merged(&aabb),
                None => aabb,
            });
        }

        bounds.map(|b| {
            (
                [b.mins.x, b.mins.y, b.mins.z],
                [b.maxs.x, b.maxs.y, b.maxs.z],
            )
        })
    }

    // ==================== Simulation ====================

    /// Advance the world by exactly one fixed tick.
    ///
    /// Raw contact signals are collected in the order the engine reports
    /// them. A step that leaves an awake body with a non-finite pose fails;
    /// its signals are kept and lead the output of the next successful step,
    /// so no stop is lost when the caller keeps running.
    pub fn step(&mut self) -> Result<StepOutput> {
        let (contact_send, contact_recv) = crossbeam_channel::unbounded();
        let event_handler = ContactCollector {
            contacts: contact_send,
        };

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &event_handler,
        );

        self.carried.extend(contact_recv.try_iter());

        if let Some(handle) = self.islands.active_dynamic_bodies().iter().find(|h| {
            self.bodies
                .get(**h)
                .map(|b| !b.translation().iter().all(|v| v.is_finite()))
                .unwrap_or(false)
        }) {
            return Err(PhysicsError::StepFailed(format!(
                "body {:?} left the step with a non-finite position",
                RigidBodyHandle(*handle)
            )));
        }

        self.tick += 1;
        self.query_pipeline.update(&self.colliders);

        let events = std::mem::take(&mut self.carried);

        Ok(StepOutput {
            tick: self.tick,
            events,
        })
    }

    /// Classify a step's raw signals and publish lifecycle transitions
    pub fn drain_collisions(&mut self, ecs: &mut World, events: &[RawContactEvent]) -> DrainStats {
        self.tracker
            .drain(events, &self.registry, ecs, &self.actions, self.tick)
    }

    /// Sync the query pipeline with current colliders.
    ///
    /// Stepping does this implicitly; call it to query before the first step.
    pub fn sync_query_pipeline(&mut self) {
        self.query_pipeline.update(&self.colliders);
    }

    // ==================== Queries ====================

    /// Get a query interface for raycasting and shape queries
    pub fn query(&self) -> PhysicsQuery<'_> {
        PhysicsQuery {
            query_pipeline: &self.query_pipeline,
            colliders: &self.colliders,
            bodies: &self.bodies,
            registry: &self.registry,
        }
    }

    // ==================== Debug ====================

    /// Get number of rigid bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get number of colliders
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Get number of active (awake) bodies
    pub fn active_body_count(&self) -> usize {
        self.islands.active_dynamic_bodies().len()
    }
}

/// Forwards Rapier contact signals into a channel during a step
struct ContactCollector {
    contacts: crossbeam_channel::Sender<RawContactEvent>,
}

impl rapier::EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &rapier::RigidBodySet,
        _colliders: &rapier::ColliderSet,
        event: rapier::CollisionEvent,
        _contact_pair: Option<&rapier::ContactPair>,
    ) {
        let kind = if event.sensor() {
            ContactKind::Trigger
        } else {
            ContactKind::Collision
        };
        let c1 = ColliderHandle(event.collider1());
        let c2 = ColliderHandle(event.collider2());
        let raw = if event.started() {
            RawContactEvent::started(c1, c2, kind)
        } else {
            RawContactEvent::stopped(c1, c2, kind)
        };
        let _ = self.contacts.send(raw);
    }

    fn handle_contact_force_event(
        &self,
        _dt: f32,
        _bodies: &rapier::RigidBodySet,
        _colliders: &rapier::ColliderSet,
        _contact_pair: &rapier::ContactPair,
        _total_force_magnitude: f32,
    ) {
    }
}
