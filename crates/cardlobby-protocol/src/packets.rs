//! Typed packet bodies and the client/server packet enums.
//!
//! Each request kind has one body struct; the create, join and leave
//! responses share [`Ack`]. [`ClientPacket`] and [`ServerPacket`] pair a
//! body with its [`PacketType`] and convert to and from [`RawPacket`]s.

use serde::{Deserialize, Serialize};

use crate::{Codec, PacketType, PlayerId, ProtocolError, RawPacket};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Client → lobby: "open a room hosted by me."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub name: String,
}

/// Client → lobby: "seat me in the room hosted by `target_name`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    pub target_name: String,
}

/// Client → lobby: "free my seat."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub name: String,
}

/// Client → lobby: "which rooms can I join?"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomsRequest {}

/// Client → lobby: "here is my deck, I am ready."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub name: String,
    pub decklist: Vec<String>,
    #[serde(default)]
    pub noshuffle: bool,
}

/// Client → lobby: "send me the additional cards catalog."
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalCardsRequest {}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Success flag plus an optional human-readable failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Display names of every joinable room's host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomsResponse {
    pub rooms: Vec<String>,
}

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartResult {
    /// The core is listening on `port`; connect there with `id`.
    Success,
    /// Ready flag recorded, the opponent still has to start.
    SuccessButWaiting,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub result: StartResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl StartResponse {
    pub fn success(id: PlayerId, port: u16) -> Self {
        Self {
            result: StartResult::Success,
            reason: None,
            id: Some(id),
            port: Some(port),
        }
    }

    pub fn waiting(reason: impl Into<String>) -> Self {
        Self {
            result: StartResult::SuccessButWaiting,
            reason: Some(reason.into()),
            id: None,
            port: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            result: StartResult::Failure,
            reason: Some(reason.into()),
            id: None,
            port: None,
        }
    }
}

/// Lobby → client push: the other seat changed. `None` means it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentChanged {
    #[serde(default)]
    pub name: Option<String>,
}

/// The additional cards catalog as exported by the core.
///
/// `time` is the catalog's embedded generation timestamp; card entries are
/// forwarded to clients as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalCardsResponse {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub cards: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// ClientPacket
// ---------------------------------------------------------------------------

/// Everything a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    Create(CreateRequest),
    Join(JoinRequest),
    Leave(LeaveRequest),
    Rooms(RoomsRequest),
    Start(StartRequest),
    AdditionalCards(AdditionalCardsRequest),
}

impl ClientPacket {
    pub fn kind(&self) -> PacketType {
        match self {
            Self::Create(_) => PacketType::CreateRequest,
            Self::Join(_) => PacketType::JoinRequest,
            Self::Leave(_) => PacketType::LeaveRequest,
            Self::Rooms(_) => PacketType::RoomsRequest,
            Self::Start(_) => PacketType::StartRequest,
            Self::AdditionalCards(_) => PacketType::AdditionalCardsRequest,
        }
    }

    /// The display name the request acts for, if it carries one.
    pub fn player_name(&self) -> Option<&str> {
        match self {
            Self::Create(r) => Some(&r.name),
            Self::Join(r) => Some(&r.name),
            Self::Leave(r) => Some(&r.name),
            Self::Start(r) => Some(&r.name),
            Self::Rooms(_) | Self::AdditionalCards(_) => None,
        }
    }

    pub fn encode(&self, codec: &impl Codec) -> Result<RawPacket, ProtocolError> {
        let payload = match self {
            Self::Create(body) => codec.encode(body)?,
            Self::Join(body) => codec.encode(body)?,
            Self::Leave(body) => codec.encode(body)?,
            Self::Rooms(body) => codec.encode(body)?,
            Self::Start(body) => codec.encode(body)?,
            Self::AdditionalCards(body) => codec.encode(body)?,
        };
        Ok(RawPacket::new(self.kind(), payload))
    }

    /// Decodes a frame received from a client.
    ///
    /// # Errors
    /// - [`ProtocolError::UnexpectedPacket`] for response kinds
    /// - [`ProtocolError::Malformed`] if the body does not parse
    pub fn decode(codec: &impl Codec, raw: &RawPacket) -> Result<Self, ProtocolError> {
        let kind = raw.kind;
        let data = raw.payload.as_slice();
        let packet = match kind {
            PacketType::CreateRequest => Self::Create(codec.decode(kind, data)?),
            PacketType::JoinRequest => Self::Join(codec.decode(kind, data)?),
            PacketType::LeaveRequest => Self::Leave(codec.decode(kind, data)?),
            PacketType::RoomsRequest => Self::Rooms(codec.decode(kind, data)?),
            PacketType::StartRequest => Self::Start(codec.decode(kind, data)?),
            PacketType::AdditionalCardsRequest => {
                Self::AdditionalCards(codec.decode(kind, data)?)
            }
            other => return Err(ProtocolError::UnexpectedPacket(other)),
        };
        Ok(packet)
    }
}

// ---------------------------------------------------------------------------
// ServerPacket
// ---------------------------------------------------------------------------

/// Everything the lobby may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    Create(Ack),
    Join(Ack),
    Leave(Ack),
    Rooms(RoomsResponse),
    Start(StartResponse),
    OpponentChanged(OpponentChanged),
    AdditionalCards(AdditionalCardsResponse),
}

impl ServerPacket {
    pub fn kind(&self) -> PacketType {
        match self {
            Self::Create(_) => PacketType::CreateResponse,
            Self::Join(_) => PacketType::JoinResponse,
            Self::Leave(_) => PacketType::LeaveResponse,
            Self::Rooms(_) => PacketType::RoomsResponse,
            Self::Start(_) => PacketType::StartResponse,
            Self::OpponentChanged(_) => PacketType::OpponentChangedResponse,
            Self::AdditionalCards(_) => PacketType::AdditionalCardsResponse,
        }
    }

    pub fn encode(&self, codec: &impl Codec) -> Result<RawPacket, ProtocolError> {
        let payload = match self {
            Self::Create(body) | Self::Join(body) | Self::Leave(body) => {
                codec.encode(body)?
            }
            Self::Rooms(body) => codec.encode(body)?,
            Self::Start(body) => codec.encode(body)?,
            Self::OpponentChanged(body) => codec.encode(body)?,
            Self::AdditionalCards(body) => codec.encode(body)?,
        };
        Ok(RawPacket::new(self.kind(), payload))
    }

    /// Decodes a frame received from the lobby (client side).
    pub fn decode(codec: &impl Codec, raw: &RawPacket) -> Result<Self, ProtocolError> {
        let kind = raw.kind;
        let data = raw.payload.as_slice();
        let packet = match kind {
            PacketType::CreateResponse => Self::Create(codec.decode(kind, data)?),
            PacketType::JoinResponse => Self::Join(codec.decode(kind, data)?),
            PacketType::LeaveResponse => Self::Leave(codec.decode(kind, data)?),
            PacketType::RoomsResponse => Self::Rooms(codec.decode(kind, data)?),
            PacketType::StartResponse => Self::Start(codec.decode(kind, data)?),
            PacketType::OpponentChangedResponse => {
                Self::OpponentChanged(codec.decode(kind, data)?)
            }
            PacketType::AdditionalCardsResponse => {
                Self::AdditionalCards(codec.decode(kind, data)?)
            }
            other => return Err(ProtocolError::UnexpectedPacket(other)),
        };
        Ok(packet)
    }
}
