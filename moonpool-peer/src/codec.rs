//! Pluggable message serialization.
//!
//! The [`MessageCodec`] trait lets users bring their own format while
//! [`JsonCodec`] is the default: readable in packet dumps, good enough for a
//! control-plane link that carries heartbeats and registry lookups.
//!
//! # Example
//!
//! ```rust
//! use moonpool_peer::{JsonCodec, Message, MessageCodec};
//!
//! let codec = JsonCodec;
//! let bytes = codec.encode(&Message::Heartbeat).unwrap();
//! let decoded: Message = codec.decode(&bytes).unwrap();
//! assert_eq!(decoded, Message::Heartbeat);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Failure to turn a [`crate::Message`] into bytes or back.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value has no representation in the codec's format.
    #[error("encode error: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),

    /// The bytes are not a valid encoding of the requested type.
    #[error("decode error: {0}")]
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

/// Serialization format used on a peer link.
///
/// Requires `Clone + 'static` so a codec can be stored inside a peer and
/// shared with its timer callbacks.
pub trait MessageCodec: Clone + 'static {
    /// Serialize `msg` into a byte payload.
    ///
    /// # Errors
    ///
    /// `CodecError::Encode`; nothing must be written in that case.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Parse a byte payload produced by [`MessageCodec::encode`].
    ///
    /// # Errors
    ///
    /// `CodecError::Decode` for truncated or foreign payloads.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// Default codec: `serde_json`, human readable on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
