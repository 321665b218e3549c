use std::collections::BTreeMap;
use std::fmt;

use crate::types::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("peer limit of {0} reached")]
    Full(usize),
}

/// Replication bookkeeping for one remote mirror.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    /// Newest tick the peer confirmed applying. Zero until the first ack,
    /// which makes the first message a full state.
    pub last_acked_tick: Tick,
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub reliable_sent: u64,
}

impl Peer {
    fn new(id: PeerId) -> Self {
        Self {
            id,
            last_acked_tick: Tick::ZERO,
            messages_sent: 0,
            bytes_sent: 0,
            reliable_sent: 0,
        }
    }

    /// First tick the next message has to cover.
    pub fn send_from(&self) -> Tick {
        self.last_acked_tick.next()
    }
}

#[derive(Debug)]
pub struct PeerRegistry {
    peers: BTreeMap<PeerId, Peer>,
    next_id: u32,
    max_peers: usize,
}

impl PeerRegistry {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: BTreeMap::new(),
            next_id: 1,
            max_peers,
        }
    }

    pub fn add(&mut self) -> Result<PeerId, PeerError> {
        if self.peers.len() >= self.max_peers {
            return Err(PeerError::Full(self.max_peers));
        }
        let id = PeerId(self.next_id);
        self.next_id += 1;
        self.peers.insert(id, Peer::new(id));
        Ok(id)
    }

    pub fn remove(&mut self, id: PeerId) -> Option<Peer> {
        self.peers.remove(&id)
    }

    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut Peer> {
        self.peers.get_mut(&id)
    }

    /// Records an acknowledgement. Older or repeated acks are ignored.
    pub fn acknowledge(&mut self, id: PeerId, tick: Tick) -> bool {
        match self.peers.get_mut(&id) {
            Some(peer) if tick > peer.last_acked_tick => {
                peer.last_acked_tick = tick;
                true
            }
            _ => false,
        }
    }

    /// Oldest acknowledged tick across peers, `None` without peers.
    pub fn min_acked_tick(&self) -> Option<Tick> {
        self.peers.values().map(|peer| peer.last_acked_tick).min()
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
