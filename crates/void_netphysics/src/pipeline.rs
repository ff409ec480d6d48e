//! Simulation pipeline
//!
//! One tick runs four phases in fixed order:
//!
//! 1. apply external state: received poses of non-owned networked bodies
//!    are pushed into the engine
//! 2. step: the world advances by one fixed timestep
//! 3. write-back: engine state flows back into ECS components
//! 4. drain: raw contact signals become lifecycle events
//!
//! Body lifecycle (intent enter/exit, dead entities) and staged ownership
//! transfers are settled before phase 1. [`SimulationPipeline::begin_tick`]
//! and [`SimulationPipeline::finish_tick`] expose the gap between phase 2
//! and phase 3 for hosts that step the world themselves.

use crate::body::BodyKind;
use crate::components::{
    AvatarTag, BodyIntent, BoundingBox, NetworkObject, NetworkObjectDirty, Renderable, RigidBody,
    Transform, Velocity,
};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ownership::OwnershipResolver;
use crate::tracker::DrainStats;
use crate::world::{PhysicsWorld, StepOutput};
use std::collections::BTreeSet;
use void_ecs::{Entity, QueryDescriptor, TrackedQuery, World};

/// Whether a tick simulates or only settles lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickMode {
    #[default]
    Run,
    /// Paused: bodies are created and released, nothing else moves
    Skip,
}

/// Counters accumulated over the pipeline's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub consistency_warnings: u64,
    pub rejected_descriptors: u64,
    /// Engine signals naming colliders without an owner
    pub dropped_events: u64,
    pub spurious_stops: u64,
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// World tick after the step; unchanged for skipped ticks
    pub tick: u64,
    pub mode: TickMode,
    pub created: usize,
    pub removed: usize,
    pub ownership_transfers: usize,
    pub applied_external: usize,
    pub written_back: usize,
    pub bounds_refreshed: usize,
    pub consistency_warnings: usize,
    pub collisions: DrainStats,
}

/// A tick stopped between the step and write-back
#[derive(Debug)]
#[must_use = "a begun tick must be finished or discarded"]
pub struct PendingTick {
    report: TickReport,
}

impl PendingTick {
    pub fn is_skipped(&self) -> bool {
        self.report.mode == TickMode::Skip
    }

    pub fn report(&self) -> &TickReport {
        &self.report
    }

    pub fn into_report(self) -> TickReport {
        self.report
    }
}

/// Drives the fixed-tick phases over one ECS world and one physics world
pub struct SimulationPipeline {
    config: PipelineConfig,
    ownership: OwnershipResolver,
    intents: TrackedQuery,
    bounds: TrackedQuery,
    networked_dirty: QueryDescriptor,
    rigid_bodies: QueryDescriptor,
    avatars: QueryDescriptor,
    diagnostics: Diagnostics,
}

impl SimulationPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            ownership: OwnershipResolver::new(config.local_participant),
            config,
            intents: TrackedQuery::new(QueryDescriptor::new().with::<BodyIntent>()),
            bounds: TrackedQuery::new(
                QueryDescriptor::new()
                    .with::<BoundingBox>()
                    .with::<Renderable>(),
            ),
            networked_dirty: QueryDescriptor::new()
                .with::<NetworkObject>()
                .with::<RigidBody>()
                .with::<NetworkObjectDirty>(),
            rigid_bodies: QueryDescriptor::new().with::<RigidBody>(),
            avatars: QueryDescriptor::new().with::<AvatarTag>(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_editor(&mut self, editor: bool) {
        self.config.editor = editor;
    }

    pub fn ownership(&self) -> &OwnershipResolver {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut OwnershipResolver {
        &mut self.ownership
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Run one full tick
    pub fn run_tick(&mut self, ecs: &mut World, world: &mut PhysicsWorld, mode: TickMode) -> Result<TickReport> {
        let pending = self.begin_tick(ecs, world, mode);
        if pending.is_skipped() {
            return Ok(pending.into_report());
        }

        let step = world.step()?;
        Ok(self.finish_tick(ecs, world, pending, step))
    }

    /// Settle lifecycle and ownership, then run phase 1.
    ///
    /// Skipped ticks stop after lifecycle; the returned tick needs no step.
    pub fn begin_tick(&mut self, ecs: &mut World, world: &mut PhysicsWorld, mode: TickMode) -> PendingTick {
        let mut report = TickReport {
            tick: world.tick(),
            mode,
            ..Default::default()
        };

        report.ownership_transfers = self.ownership.commit(ecs);
        self.sync_lifecycle(ecs, world, &mut report);

        if mode == TickMode::Skip {
            self.diagnostics.skipped_ticks += 1;
            return PendingTick { report };
        }

        self.apply_external_state(ecs, world, &mut report);
        PendingTick { report }
    }

    /// Run phases 3 and 4 over the output of a step
    pub fn finish_tick(
        &mut self,
        ecs: &mut World,
        world: &mut PhysicsWorld,
        pending: PendingTick,
        step: StepOutput,
    ) -> TickReport {
        let mut report = pending.report;
        if report.mode == TickMode::Skip {
            return report;
        }

        report.tick = step.tick;
        self.write_back(ecs, world, &mut report);
        report.collisions = self.drain_collisions(ecs, world, &step);

        self.diagnostics.ticks += 1;
        report
    }

    /// Create bodies for new intents and release bodies whose intent or
    /// entity is gone.
    fn sync_lifecycle(&mut self, ecs: &mut World, world: &mut PhysicsWorld, report: &mut TickReport) {
        let delta = self.intents.update(ecs);

        for entity in delta.exited {
            if world.remove_body(ecs, entity) {
                report.removed += 1;
            }
        }

        let orphaned: Vec<Entity> = world
            .registry()
            .entities()
            .filter(|entity| !ecs.is_alive(*entity))
            .collect();
        for entity in orphaned {
            if world.remove_body(ecs, entity) {
                report.removed += 1;
            }
        }

        for entity in delta.entered {
            let Some(intent) = ecs.get_component::<BodyIntent>(entity).cloned() else {
                continue;
            };
            if world.body_for_entity(entity).is_some() {
                continue;
            }
            match world.create_body(ecs, entity, &intent.body, &intent.colliders) {
                Ok(_) => report.created += 1,
                Err(err) => {
                    log::error!("Rejected body for {}: {}", entity, err);
                    self.diagnostics.rejected_descriptors += 1;
                }
            }
        }
    }

    fn consistency_warning(&mut self, report: &mut TickReport, entity: Entity, what: &str) {
        log::warn!("Skipping {}: {}", entity, what);
        self.diagnostics.consistency_warnings += 1;
        report.consistency_warnings += 1;
    }

    /// Phase 1: push received state of non-owned networked bodies into the
    /// engine and clear their dirty markers.
    ///
    /// Dirty markers on owned objects are cleared without touching the body.
    pub fn apply_external_state(&mut self, ecs: &mut World, world: &mut PhysicsWorld, report: &mut TickReport) {
        for entity in ecs.query(&self.networked_dirty) {
            let Some(object) = ecs.get_component::<NetworkObject>(entity).copied() else {
                continue;
            };
            if self.ownership.is_locally_authoritative(&object) {
                ecs.remove_component::<NetworkObjectDirty>(entity);
                continue;
            }

            let Some(handle) = world.body_for_entity(entity) else {
                self.consistency_warning(report, entity, "networked entity has no engine body");
                continue;
            };
            let Some(transform) = ecs.get_component::<Transform>(entity).copied() else {
                self.consistency_warning(report, entity, "networked body has no transform");
                continue;
            };
            let velocity = ecs.get_component::<Velocity>(entity).copied().unwrap_or_default();

            let applied = world
                .teleport(handle, transform.pose())
                .and_then(|_| world.set_body_velocity(handle, velocity.linear, velocity.angular));
            if let Err(err) = applied {
                self.consistency_warning(report, entity, &err.to_string());
                continue;
            }

            ecs.remove_component::<NetworkObjectDirty>(entity);
            report.applied_external += 1;
        }
    }

    /// Phase 3: copy engine state into components.
    ///
    /// Simulated bodies report pose and velocity. Fixed bodies, and every
    /// body in editor mode, follow their transform instead: the body is
    /// snapped to it and the velocity the move implies is recorded.
    /// Avatars are left alone, and so are simulated bodies owned by another
    /// participant. Transform-driven bodies never touch the transform, so
    /// they follow it regardless of owner.
    pub fn write_back(&mut self, ecs: &mut World, world: &mut PhysicsWorld, report: &mut TickReport) {
        let avatars: BTreeSet<Entity> = ecs.query(&self.avatars).into_iter().collect();
        let dt = world.config().timestep;

        for entity in ecs.query(&self.rigid_bodies) {
            if avatars.contains(&entity) {
                continue;
            }

            let Some(handle) = world.body_for_entity(entity) else {
                self.consistency_warning(report, entity, "rigid body component without engine body");
                continue;
            };
            let state = match world.body_state(handle) {
                Ok(state) => state,
                Err(err) => {
                    self.consistency_warning(report, entity, &err.to_string());
                    continue;
                }
            };

            let transform_driven = self.config.editor || state.kind == BodyKind::Fixed;
            if !transform_driven && !self.ownership.is_entity_authoritative(ecs, entity) {
                continue;
            }

            if transform_driven {
                let Some(transform) = ecs.get_component::<Transform>(entity).copied() else {
                    self.consistency_warning(report, entity, "transform-driven body has no transform");
                    continue;
                };
                if let Some(velocity) = ecs.get_component_mut::<Velocity>(entity) {
                    for i in 0..3 {
                        velocity.linear[i] = (transform.position[i] - state.pose.position[i]) / dt;
                    }
                    velocity.angular = [0.0; 3];
                }
                if let Err(err) = world.teleport(handle, transform.pose()) {
                    self.consistency_warning(report, entity, &err.to_string());
                    continue;
                }
            } else {
                if let Some(velocity) = ecs.get_component_mut::<Velocity>(entity) {
                    velocity.linear = state.linear_velocity;
                    velocity.angular = state.angular_velocity;
                }
                match ecs.get_component_mut::<Transform>(entity) {
                    Some(transform) => *transform = Transform::from(state.pose),
                    None => {
                        ecs.add_component(entity, Transform::from(state.pose));
                    }
                }
            }

            report.written_back += 1;
        }

        report.bounds_refreshed = self.refresh_bounds(ecs, world);
    }

    /// Recompute bounding boxes on first appearance, and every tick for
    /// dynamic ones.
    fn refresh_bounds(&mut self, ecs: &mut World, world: &PhysicsWorld) -> usize {
        let delta = self.bounds.update(ecs);
        let entered: BTreeSet<Entity> = delta.entered.into_iter().collect();

        let targets: Vec<Entity> = self
            .bounds
            .members()
            .filter(|entity| {
                entered.contains(entity)
                    || ecs
                        .get_component::<BoundingBox>(*entity)
                        .map(|b| b.dynamic)
                        .unwrap_or(false)
            })
            .collect();

        let mut refreshed = 0;
        for entity in targets {
            let Some((min, max)) = world.entity_bounds(entity) else {
                continue;
            };
            if let Some(bounds) = ecs.get_component_mut::<BoundingBox>(entity) {
                bounds.min = min;
                bounds.max = max;
                refreshed += 1;
            }
        }
        refreshed
    }

    /// Phase 4: classify the step's signals and publish transitions
    pub fn drain_collisions(&mut self, ecs: &mut World, world: &mut PhysicsWorld, step: &StepOutput) -> DrainStats {
        let stats = world.drain_collisions(ecs, &step.events);
        self.diagnostics.dropped_events += stats.unresolved as u64;
        self.diagnostics.spurious_stops += stats.spurious_stops as u64;
        stats
    }
}
