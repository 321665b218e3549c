use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryIter};
use log::trace;

use super::peer::PeerId;

/// Delivery tier of a message. Everything is independent: the reliable tier
/// guarantees arrival but no ordering relative to other messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryChannel {
    Unreliable,
    ReliableUnordered,
}

impl DeliveryChannel {
    /// Messages strictly larger than `reliable_threshold` go reliable.
    pub fn for_message_size(size: usize, reliable_threshold: usize) -> Self {
        if size > reliable_threshold {
            Self::ReliableUnordered
        } else {
            Self::Unreliable
        }
    }

    pub fn is_reliable(self) -> bool {
        self == Self::ReliableUnordered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("peer {0} disconnected")]
    Disconnected(PeerId),
}

/// Outbound half of the connection layer as seen by the replication core.
pub trait Transport {
    fn send(
        &mut self,
        peer: PeerId,
        channel: DeliveryChannel,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError>;
}

/// A received message, as handed from a network thread to the simulation.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub channel: DeliveryChannel,
    pub bytes: Vec<u8>,
    pub received: Instant,
}

/// Thread-safe handle network code pushes received bytes into. The store is
/// never touched from here; the simulation thread drains the other end.
#[derive(Debug, Clone)]
pub struct Ingress {
    sender: Sender<Datagram>,
}

impl Ingress {
    pub fn push(&self, channel: DeliveryChannel, bytes: Vec<u8>) -> bool {
        self.sender
            .send(Datagram {
                channel,
                bytes,
                received: Instant::now(),
            })
            .is_ok()
    }
}

#[derive(Debug)]
pub struct IngressQueue {
    receiver: Receiver<Datagram>,
}

impl IngressQueue {
    pub fn try_iter(&self) -> TryIter<'_, Datagram> {
        self.receiver.try_iter()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

pub fn ingress_channel() -> (Ingress, IngressQueue) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (Ingress { sender }, IngressQueue { receiver })
}

/// Drops a fraction of best-effort traffic. Reliable traffic is never
/// dropped, matching what a real reliable channel eventually delivers.
#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    /// Probability in `[0, 1]`.
    pub loss_rate: f32,
}

impl PacketLossSimulation {
    pub fn new(loss_rate: f32) -> Self {
        Self {
            enabled: loss_rate > 0.0,
            loss_rate: loss_rate.clamp(0.0, 1.0),
        }
    }

    pub fn should_drop(&self, channel: DeliveryChannel) -> bool {
        if !self.enabled || self.loss_rate <= 0.0 || channel.is_reliable() {
            return false;
        }
        rand_unit() < self.loss_rate
    }
}

fn rand_unit() -> f32 {
    let mut hasher = DefaultHasher::new();
    Instant::now().hash(&mut hasher);
    (hasher.finish() % 10_000) as f32 / 10_000.0
}

/// In-process transport that routes each peer to an [`Ingress`].
#[derive(Debug, Default)]
pub struct ChannelTransport {
    routes: HashMap<PeerId, Ingress>,
    loss: PacketLossSimulation,
    dropped: u64,
}

impl ChannelTransport {
    pub fn new(loss: PacketLossSimulation) -> Self {
        Self {
            routes: HashMap::new(),
            loss,
            dropped: 0,
        }
    }

    pub fn connect(&mut self, peer: PeerId, ingress: Ingress) {
        self.routes.insert(peer, ingress);
    }

    pub fn disconnect(&mut self, peer: PeerId) -> bool {
        self.routes.remove(&peer).is_some()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Transport for ChannelTransport {
    fn send(
        &mut self,
        peer: PeerId,
        channel: DeliveryChannel,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError> {
        let route = self
            .routes
            .get(&peer)
            .ok_or(TransportError::UnknownPeer(peer))?;

        if self.loss.should_drop(channel) {
            self.dropped += 1;
            trace!("simulated loss of {} bytes to {peer}", bytes.len());
            return Ok(());
        }

        if route.push(channel, bytes) {
            Ok(())
        } else {
            Err(TransportError::Disconnected(peer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_selection_is_strictly_greater() {
        assert_eq!(
            DeliveryChannel::for_message_size(1500, 1300),
            DeliveryChannel::ReliableUnordered
        );
        assert_eq!(
            DeliveryChannel::for_message_size(200, 1300),
            DeliveryChannel::Unreliable
        );
        assert_eq!(
            DeliveryChannel::for_message_size(1300, 1300),
            DeliveryChannel::Unreliable
        );
    }

    #[test]
    fn reliable_traffic_survives_total_loss() {
        let (ingress, queue) = ingress_channel();
        let mut transport = ChannelTransport::new(PacketLossSimulation::new(1.0));
        let peer = PeerId(1);
        transport.connect(peer, ingress);

        for _ in 0..10 {
            transport
                .send(peer, DeliveryChannel::Unreliable, vec![1])
                .unwrap();
        }
        transport
            .send(peer, DeliveryChannel::ReliableUnordered, vec![2])
            .unwrap();

        let received: Vec<_> = queue.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].bytes, [2]);
        assert_eq!(transport.dropped(), 10);
    }

    #[test]
    fn unknown_and_closed_routes_fail() {
        let mut transport = ChannelTransport::default();
        let err = transport
            .send(PeerId(7), DeliveryChannel::Unreliable, Vec::new())
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownPeer(PeerId(7)));

        let (ingress, queue) = ingress_channel();
        transport.connect(PeerId(7), ingress);
        drop(queue);
        let err = transport
            .send(PeerId(7), DeliveryChannel::Unreliable, Vec::new())
            .unwrap_err();
        assert_eq!(err, TransportError::Disconnected(PeerId(7)));
    }
}
