//! Ownership resolution for networked objects
//!
//! Exactly one participant authors each networked object. The resolver
//! answers "may this process write the object's pose?" and stages ownership
//! transfers so they only land between ticks.

use crate::components::NetworkObject;
use serde::{Deserialize, Serialize};
use std::fmt;
use void_ecs::{Entity, World};

/// Identity of a session participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant:{}", self.0)
    }
}

/// Decides write direction per networked object
#[derive(Debug, Clone)]
pub struct OwnershipResolver {
    local: ParticipantId,
    pending: Vec<(Entity, ParticipantId)>,
}

impl OwnershipResolver {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            pending: Vec::new(),
        }
    }

    pub fn local_participant(&self) -> ParticipantId {
        self.local
    }

    /// True iff the local participant owns the object
    #[inline]
    pub fn is_locally_authoritative(&self, object: &NetworkObject) -> bool {
        object.owner == self.local
    }

    /// Entity-level check; entities that are not networked are always local
    pub fn is_entity_authoritative(&self, ecs: &World, entity: Entity) -> bool {
        ecs.get_component::<NetworkObject>(entity)
            .map(|object| self.is_locally_authoritative(object))
            .unwrap_or(true)
    }

    /// Stage a transfer; it takes effect at the next [`commit`](Self::commit)
    pub fn queue_transfer(&mut self, entity: Entity, new_owner: ParticipantId) {
        self.pending.push((entity, new_owner));
    }

    pub fn pending_transfers(&self) -> usize {
        self.pending.len()
    }

    /// Apply staged transfers in the order they were queued.
    ///
    /// Called by the pipeline before the first phase of a tick. Transfers
    /// for entities that are no longer networked are discarded.
    pub fn commit(&mut self, ecs: &mut World) -> usize {
        let mut applied = 0;
        for (entity, new_owner) in self.pending.drain(..) {
            match ecs.get_component_mut::<NetworkObject>(entity) {
                Some(object) => {
                    if object.owner != new_owner {
                        log::debug!(
                            "Ownership of {} moves from {} to {}",
                            entity,
                            object.owner,
                            new_owner
                        );
                        object.owner = new_owner;
                    }
                    applied += 1;
                }
                None => log::debug!("Dropping ownership transfer for non-networked {}", entity),
            }
        }
        applied
    }
}
