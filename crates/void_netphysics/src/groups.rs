//! Collision groups and interaction filtering
//!
//! Interaction groups pack a 16-bit membership (high half) and a 16-bit
//! filter mask (low half) into one `u32`, the layout networked peers
//! exchange for collider filtering.

use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};

/// Named collision groups (bit positions within the 16-bit halves)
pub struct CollisionGroup;

impl CollisionGroup {
    pub const NONE: u16 = 0;
    pub const DEFAULT: u16 = 1 << 0;
    pub const AVATARS: u16 = 1 << 1;
    pub const GROUND: u16 = 1 << 2;
    pub const TRIGGER: u16 = 1 << 3;
}

/// Groups an ordinary collider interacts with
pub const DEFAULT_COLLISION_MASK: u16 = CollisionGroup::DEFAULT
    | CollisionGroup::AVATARS
    | CollisionGroup::GROUND
    | CollisionGroup::TRIGGER;

/// Pack a membership group and a filter mask: `(group << 16) | mask`
#[inline]
pub const fn interaction_groups(group: u16, mask: u16) -> u32 {
    ((group as u32) << 16) | mask as u32
}

/// Membership/filter pair for a collider or scene query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionGroups {
    /// Which groups this object belongs to
    pub memberships: u16,
    /// Which groups this object can interact with
    pub filter: u16,
}

impl InteractionGroups {
    /// Interacts with everything
    pub const ALL: Self = Self {
        memberships: u16::MAX,
        filter: u16::MAX,
    };

    /// Interacts with nothing
    pub const NONE: Self = Self {
        memberships: 0,
        filter: 0,
    };

    pub const fn new(memberships: u16, filter: u16) -> Self {
        Self { memberships, filter }
    }

    /// Unpack from the `(group << 16) | mask` layout
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            memberships: (bits >> 16) as u16,
            filter: bits as u16,
        }
    }

    pub const fn bits(&self) -> u32 {
        interaction_groups(self.memberships, self.filter)
    }

    /// Both sides must accept each other
    pub fn can_interact(&self, other: &InteractionGroups) -> bool {
        (self.memberships & other.filter) != 0 && (other.memberships & self.filter) != 0
    }

    pub(crate) fn to_rapier(self) -> rapier::InteractionGroups {
        rapier::InteractionGroups::new(
            rapier::Group::from_bits_truncate(self.memberships as u32),
            rapier::Group::from_bits_truncate(self.filter as u32),
        )
    }
}

impl Default for InteractionGroups {
    fn default() -> Self {
        Self::new(CollisionGroup::DEFAULT, DEFAULT_COLLISION_MASK)
    }
}

impl From<u32> for InteractionGroups {
    fn from(bits: u32) -> Self {
        Self::from_bits(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_groups_packing() {
        assert_eq!(interaction_groups(0x0001, 0x0003), 65539);

        let groups = InteractionGroups::from_bits(65539);
        assert_eq!(groups.memberships, 0x0001);
        assert_eq!(groups.filter, 0x0003);
        assert_eq!(groups.bits(), 65539);
    }

    #[test]
    fn test_can_interact() {
        let avatar = InteractionGroups::new(CollisionGroup::AVATARS, DEFAULT_COLLISION_MASK);
        let scenery = InteractionGroups::default();
        let ghost = InteractionGroups::new(CollisionGroup::DEFAULT, CollisionGroup::GROUND);

        assert!(avatar.can_interact(&scenery));
        assert!(!ghost.can_interact(&avatar));
        assert!(!InteractionGroups::NONE.can_interact(&InteractionGroups::ALL));
    }
}
