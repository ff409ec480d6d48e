//! Physics context - owns every physics world of a process

use crate::config::PhysicsConfig;
use crate::error::{PhysicsError, Result};
use crate::world::PhysicsWorld;
use std::collections::BTreeMap;
use void_ecs::World;

/// Identifier of a world within its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(u32);

impl WorldId {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Registry of physics worlds sharing one default configuration
pub struct PhysicsContext {
    config: PhysicsConfig,
    worlds: BTreeMap<WorldId, PhysicsWorld>,
    next_id: u32,
}

impl PhysicsContext {
    /// Initialize the context; worlds created later default to `config`
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Physics context initialized (timestep {:.4}s, gravity {:?})",
            config.timestep,
            config.gravity
        );
        Ok(Self {
            config,
            worlds: BTreeMap::new(),
            next_id: 0,
        })
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Create a world with the context's configuration
    pub fn create_world(&mut self) -> Result<WorldId> {
        self.create_world_with(self.config.clone())
    }

    pub fn create_world_with(&mut self, config: PhysicsConfig) -> Result<WorldId> {
        let world = PhysicsWorld::new(config)?;
        let id = WorldId(self.next_id);
        self.next_id += 1;
        self.worlds.insert(id, world);
        log::debug!("Created physics world {:?}", id);
        Ok(id)
    }

    /// Tear down a world, releasing its bodies from `ecs` first
    pub fn remove_world(&mut self, id: WorldId, ecs: &mut World) -> Result<()> {
        let mut world = self.worlds.remove(&id).ok_or(PhysicsError::WorldNotFound(id))?;
        let released = world.clear_bodies(ecs);
        log::debug!("Removed physics world {:?} ({} bodies released)", id, released);
        Ok(())
    }

    pub fn world(&self, id: WorldId) -> Result<&PhysicsWorld> {
        self.worlds.get(&id).ok_or(PhysicsError::WorldNotFound(id))
    }

    pub fn world_mut(&mut self, id: WorldId) -> Result<&mut PhysicsWorld> {
        self.worlds.get_mut(&id).ok_or(PhysicsError::WorldNotFound(id))
    }

    pub fn world_ids(&self) -> impl Iterator<Item = WorldId> + '_ {
        self.worlds.keys().copied()
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// Remove every world
    pub fn shutdown(mut self, ecs: &mut World) {
        let ids: Vec<WorldId> = self.world_ids().collect();
        for id in ids {
            if let Err(err) = self.remove_world(id, ecs) {
                log::warn!("Physics shutdown: {}", err);
            }
        }
        log::info!("Physics context shut down");
    }
}
