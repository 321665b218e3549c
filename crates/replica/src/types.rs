use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

/// Simulation tick counter. Tick zero means "unset": data stamped with it is
/// identical to what the prototype produces and never needs to be sent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Archive, Serialize, Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct Tick(pub u32);

impl Tick {
    pub const ZERO: Tick = Tick(0);
    pub const FIRST: Tick = Tick(1);

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn next(self) -> Tick {
        Tick(self.0.saturating_add(1))
    }

    #[inline]
    pub fn saturating_sub(self, ticks: u32) -> Tick {
        Tick(self.0.saturating_sub(ticks))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network-wide entity identifier. Allocated monotonically by the authority
/// and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct EntityId(pub u32);

impl EntityId {
    pub const FIRST: EntityId = EntityId(1);
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Wire identifier of a component type, stable for the whole session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct NetId(pub u32);

impl NetId {
    pub const TRANSFORM: NetId = NetId(0);
    pub const METADATA: NetId = NetId(1);
    pub const COLLIDABLE: NetId = NetId(2);

    /// First id available to content components.
    pub const FIRST_CUSTOM: NetId = NetId(16);
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Archive, Serialize, Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map{}", self.0)
    }
}
