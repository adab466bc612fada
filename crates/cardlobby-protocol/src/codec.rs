//! Codec trait and implementations for packet bodies.
//!
//! A codec turns a typed body into payload bytes and back. The frame
//! layer (type tag + length) is independent of it, so a more compact body
//! format can replace [`JsonCodec`] without touching framing or dispatch.

use serde::{Serialize, de::DeserializeOwned};

use crate::{PacketType, ProtocolError};

/// A codec that can encode bodies to bytes and decode bytes back.
///
/// `kind` is passed to `decode` so a failure can name the packet whose
/// payload was malformed.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a body into payload bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be
    /// represented in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes payload bytes into the body for `kind`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Malformed`] if the bytes do not parse as
    /// the expected structure.
    fn decode<T: DeserializeOwned>(
        &self,
        kind: PacketType,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The core process writes the additional-cards catalog as JSON too, so
/// that response can be forwarded without re-shaping.
///
/// ```rust
/// use cardlobby_protocol::{Codec, CreateRequest, JsonCodec, PacketType};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&CreateRequest { name: "Alice".into() }).unwrap();
/// let back: CreateRequest = codec.decode(PacketType::CreateRequest, &bytes).unwrap();
/// assert_eq!(back.name, "Alice");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        kind: PacketType,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data)
            .map_err(|source| ProtocolError::Malformed { kind, source })
    }
}
