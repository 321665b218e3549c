use std::borrow::Cow;
use std::io;

use rkyv::rancor;
use rkyv::util::AlignedVec;

use super::protocol::GameState;
use super::transport::DeliveryChannel;
use super::varint;
use crate::config::ReplicationConfig;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("compression failed: {0}")]
    Compress(io::Error),
    #[error("decompression failed: {0}")]
    Decompress(io::Error),
    #[error("malformed length prefix")]
    BadLength,
    #[error("payload truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    #[error("payload of {0} bytes exceeds the limit")]
    TooLarge(usize),
}

/// General-purpose compressor applied to large state payloads.
pub trait PayloadCompression: Send + Sync {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>>;
    fn decompress(&self, body: &[u8], max_size: usize) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompression {
    level: i32,
}

impl ZstdCompression {
    pub fn new(level: i32) -> Self {
        let range = zstd::compression_level_range();
        Self {
            level: level.clamp(*range.start(), *range.end()),
        }
    }
}

impl Default for ZstdCompression {
    fn default() -> Self {
        Self::new(*zstd::compression_level_range().end())
    }
}

impl PayloadCompression for ZstdCompression {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
        zstd::bulk::compress(raw, self.level)
    }

    fn decompress(&self, body: &[u8], max_size: usize) -> io::Result<Vec<u8>> {
        zstd::bulk::decompress(body, max_size)
    }
}

/// An encoded state message and the channel it must travel on.
#[derive(Debug, Clone)]
pub struct StateMessage {
    pub bytes: Vec<u8>,
    pub channel: DeliveryChannel,
    pub compressed: bool,
    /// Serialized size before compression.
    pub payload_size: usize,
}

/// Frames state messages as `varint(length) ++ body`. A negative length
/// marks a compressed body.
pub struct StateCodec {
    compression: Box<dyn PayloadCompression>,
    compression_threshold: usize,
    reliable_threshold: usize,
    max_payload: usize,
}

impl std::fmt::Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCodec")
            .field("compression_threshold", &self.compression_threshold)
            .field("reliable_threshold", &self.reliable_threshold)
            .field("max_payload", &self.max_payload)
            .finish_non_exhaustive()
    }
}

impl Default for StateCodec {
    fn default() -> Self {
        Self::new(&ReplicationConfig::default())
    }
}

impl StateCodec {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            compression: Box::new(ZstdCompression::new(config.compression_level)),
            compression_threshold: config.compression_threshold,
            reliable_threshold: config.reliable_threshold,
            max_payload: config.max_payload,
        }
    }

    pub fn with_compression(mut self, compression: Box<dyn PayloadCompression>) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_thresholds(mut self, compression: usize, reliable: usize) -> Self {
        self.compression_threshold = compression;
        self.reliable_threshold = reliable;
        self
    }

    pub fn encode(&self, state: &GameState) -> Result<StateMessage, CodecError> {
        let raw = rkyv::to_bytes::<rancor::Error>(state).map_err(CodecError::Serialize)?;
        self.frame(&raw)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<GameState, CodecError> {
        let payload = self.unframe(bytes)?;
        let mut aligned = AlignedVec::<16>::with_capacity(payload.len());
        aligned.extend_from_slice(&payload);
        rkyv::from_bytes::<GameState, rancor::Error>(&aligned).map_err(CodecError::Deserialize)
    }

    /// Compresses payloads above the threshold and keeps the result only
    /// when strictly smaller; on a tie the raw form is sent.
    pub fn frame(&self, raw: &[u8]) -> Result<StateMessage, CodecError> {
        if raw.len() > self.max_payload {
            return Err(CodecError::TooLarge(raw.len()));
        }

        let mut body = Cow::Borrowed(raw);
        let mut compressed = false;
        if raw.len() > self.compression_threshold {
            let packed = self.compression.compress(raw).map_err(CodecError::Compress)?;
            if !packed.is_empty() && packed.len() < raw.len() {
                body = Cow::Owned(packed);
                compressed = true;
            }
        }

        let length = i32::try_from(body.len()).map_err(|_| CodecError::TooLarge(body.len()))?;
        let prefix = if compressed { -length } else { length };

        let mut bytes = Vec::with_capacity(varint::encoded_len(prefix) + body.len());
        varint::write_i32(&mut bytes, prefix);
        bytes.extend_from_slice(&body);

        Ok(StateMessage {
            channel: DeliveryChannel::for_message_size(bytes.len(), self.reliable_threshold),
            bytes,
            compressed,
            payload_size: raw.len(),
        })
    }

    /// Strips the length prefix and decompresses when flagged.
    pub fn unframe<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>, CodecError> {
        let (prefix, used) = varint::read_i32(bytes).map_err(|_| CodecError::BadLength)?;
        let body = &bytes[used..];
        let expected = prefix.unsigned_abs() as usize;

        if body.len() < expected {
            return Err(CodecError::Truncated {
                expected,
                actual: body.len(),
            });
        }
        if body.len() > expected {
            return Err(CodecError::TrailingBytes(body.len() - expected));
        }

        if prefix < 0 {
            let payload = self
                .compression
                .decompress(body, self.max_payload)
                .map_err(CodecError::Decompress)?;
            Ok(Cow::Owned(payload))
        } else {
            Ok(Cow::Borrowed(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ComponentData, TransformState};
    use crate::net::{ComponentChanged, ComponentState, DeletionEntry, EntityState};
    use crate::types::{EntityId, MapId, NetId, Tick};

    /// Pads its output by a fixed amount, so it never wins.
    struct Inflating(usize);

    impl PayloadCompression for Inflating {
        fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
            let mut out = raw.to_vec();
            out.resize(raw.len() + self.0, 0);
            Ok(out)
        }

        fn decompress(&self, _body: &[u8], _max_size: usize) -> io::Result<Vec<u8>> {
            Err(io::Error::other("never compressed"))
        }
    }

    fn sample_state(entities: u32) -> GameState {
        let states = (1..=entities)
            .map(|i| {
                EntityState::new(
                    EntityId(i),
                    Some("crate".into()),
                    vec![
                        ComponentChanged::added(NetId::TRANSFORM),
                        ComponentChanged::added(NetId::METADATA),
                    ],
                    vec![ComponentState {
                        net_id: NetId::TRANSFORM,
                        data: ComponentData::Transform(TransformState {
                            map: MapId(1),
                            parent: None,
                            local_position: [i as f32, 0.0],
                            rotation: 0.0,
                        }),
                    }],
                )
            })
            .collect();
        GameState::new(
            Tick(1),
            Tick(30),
            states,
            vec![DeletionEntry {
                tick: Tick(12),
                entity_id: EntityId(500),
            }],
        )
    }

    #[test]
    fn inflating_compression_is_never_sent() {
        let codec = StateCodec::default().with_compression(Box::new(Inflating(20)));
        let message = codec.frame(&[7u8; 40]).unwrap();

        assert!(!message.compressed);
        assert_eq!(message.payload_size, 40);
        assert_eq!(message.bytes.len(), 41);
        assert_eq!(varint::read_i32(&message.bytes), Ok((40, 1)));
    }

    #[test]
    fn equal_size_prefers_raw() {
        let codec = StateCodec::default().with_compression(Box::new(Inflating(0)));
        let message = codec.frame(&[1u8; 64]).unwrap();
        assert!(!message.compressed);
    }

    #[test]
    fn small_payloads_skip_compression() {
        let codec = StateCodec::default();
        let message = codec.frame(&[0u8; 32]).unwrap();
        assert!(!message.compressed);
        assert_eq!(message.bytes[0], 64);
    }

    #[test]
    fn compressed_bodies_use_negative_length() {
        let codec = StateCodec::default();
        let raw = vec![0u8; 600];
        let message = codec.frame(&raw).unwrap();

        assert!(message.compressed);
        let (prefix, _) = varint::read_i32(&message.bytes).unwrap();
        assert!(prefix < 0);
        assert!(message.bytes.len() < raw.len());
        assert_eq!(codec.unframe(&message.bytes).unwrap().as_ref(), raw.as_slice());
    }

    #[test]
    fn channel_follows_encoded_size() {
        let codec = StateCodec::default().with_compression(Box::new(Inflating(1)));

        let large = codec.frame(&[3u8; 1500]).unwrap();
        assert_eq!(large.channel, DeliveryChannel::ReliableUnordered);

        let small = codec.frame(&[3u8; 200]).unwrap();
        assert_eq!(small.channel, DeliveryChannel::Unreliable);
    }

    #[test]
    fn game_state_survives_both_branches() {
        let state = sample_state(40);

        let compressing = StateCodec::default();
        let message = compressing.encode(&state).unwrap();
        assert!(message.compressed);
        assert_eq!(compressing.decode(&message.bytes).unwrap(), state);

        let raw_only = StateCodec::default().with_thresholds(usize::MAX, 1300);
        let message = raw_only.encode(&state).unwrap();
        assert!(!message.compressed);
        let prefix_len = varint::encoded_len(message.payload_size as i32);
        assert_eq!(message.payload_size + prefix_len, message.bytes.len());
        assert_eq!(raw_only.decode(&message.bytes).unwrap(), state);

        let empty = GameState::new(Tick(3), Tick(4), Vec::new(), Vec::new());
        let message = raw_only.encode(&empty).unwrap();
        assert_eq!(raw_only.decode(&message.bytes).unwrap(), empty);
    }

    #[test]
    fn malformed_messages_are_rejected() {
        let codec = StateCodec::default();
        let good = codec.encode(&sample_state(1)).unwrap().bytes;

        assert!(matches!(codec.decode(&[]), Err(CodecError::BadLength)));
        assert!(matches!(
            codec.decode(&good[..good.len() - 3]),
            Err(CodecError::Truncated { .. })
        ));

        let mut trailing = good.clone();
        trailing.push(0);
        assert!(matches!(
            codec.decode(&trailing),
            Err(CodecError::TrailingBytes(1))
        ));

        let mut garbage = Vec::new();
        varint::write_i32(&mut garbage, 6);
        garbage.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        assert!(matches!(
            codec.decode(&garbage),
            Err(CodecError::Deserialize(_))
        ));

        let mut bogus_compressed = Vec::new();
        varint::write_i32(&mut bogus_compressed, -4);
        bogus_compressed.extend_from_slice(&[1, 2, 3, 4]);
        assert!(matches!(
            codec.decode(&bogus_compressed),
            Err(CodecError::Decompress(_))
        ));
    }
}
