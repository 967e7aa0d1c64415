//! Wire protocol and game constants shared by the server and the client.
//!
//! Both sides quantize, diff and wrap angles through the helpers in this
//! crate, so a snapshot encoded by the server is read back by the client
//! with identical semantics.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, Key};
use std::f32::consts::{PI, TAU};
use std::fmt;
use thiserror::Error;

pub const GRID_SIZE: f32 = 3000.0;
pub const TICK_RATE: u32 = 30;
pub const INITIAL_FOOD: usize = 500;
pub const FOOD_CAP: usize = 1000;
pub const FOOD_RADIUS: f32 = 5.0;
pub const MIN_SCORE: f32 = 10.0;
pub const BASE_RADIUS: f32 = 10.0;
pub const BASE_SPEED: f32 = 5.0;
pub const BOOST_SPEED: f32 = 10.0;
/// Score drained per tick while boosting.
pub const BOOST_COST: f32 = 0.2;
pub const SPAWN_SEGMENTS: usize = 10;
pub const INTERPOLATION_FACTOR: f32 = 0.3;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_NAME_LEN: usize = 32;
/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
pub const DEFAULT_NAME: &str = "Snake";
pub const DEFAULT_COLOR: &str = "#ff0000";

/// Radius of a snake head for the given score.
pub fn radius_for_score(score: f32) -> f32 {
    BASE_RADIUS + score.sqrt() * 0.5
}

new_key_type! {
    /// Identity of a player: a slot in the server's player map plus the
    /// version that slot was on when the player spawned. A recycled slot
    /// never yields an equal id.
    pub struct PlayerId;
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.data())
    }
}

/// Food ids grow monotonically, so ordering by id is insertion order.
pub type FoodId = u64;

/// A body point rounded to integer world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodView {
    pub id: FoodId,
    pub x: i16,
    pub y: i16,
    /// Growth granted when eaten, 1..=5. Doubles as a color index.
    pub value: u8,
}

/// The reduced, quantized player record carried by every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub score: u32,
    pub radius: f32,
    pub segments: Vec<Segment>,
    pub is_boosting: bool,
    pub is_leader: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // client -> server
    Connect {
        protocol_version: u32,
    },
    Join {
        name: String,
        color: String,
    },
    Input {
        angle: f32,
        boosting: bool,
    },
    Leave,
    /// Asks for the full food field again after the one sent on join was lost.
    RequestFood,

    // server -> client
    IdentityAssigned {
        id: PlayerId,
    },
    InitialFood {
        food: Vec<FoodView>,
    },
    /// One datagram of a tick's broadcast. A tick too large for a single
    /// datagram is split into `parts` datagrams sharing the same `tick`; the
    /// food changes travel in part 0.
    WorldSnapshot {
        tick: u32,
        part: u16,
        parts: u16,
        players: Vec<PlayerView>,
        eaten_food: Vec<FoodId>,
        new_food: Vec<FoodView>,
    },
    KillNotification {
        killer_name: String,
        killer_color: String,
        victim_name: String,
        victim_color: String,
    },
    Disconnected {
        reason: String,
    },
}

/// A client packet that passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Connect { protocol_version: u32 },
    Join { name: String, color: String },
    Input { angle: f32, boosting: bool },
    Leave,
    RequestFood,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode packet: {0}")]
    Decode(#[from] bincode::Error),
    #[error("input angle is not finite")]
    InvalidAngle,
    #[error("name is longer than {max} characters")]
    NameTooLong { max: usize },
    #[error("color {0:?} is not a #rrggbb value")]
    InvalidColor(String),
    #[error("packet type is not accepted from clients")]
    UnexpectedPacket,
}

pub fn encode_packet(packet: &Packet) -> bincode::Result<Vec<u8>> {
    bincode::serialize(packet)
}

/// Encoded size of a value in bytes, used to pack snapshots into datagrams.
pub fn encoded_len<T: Serialize + ?Sized>(value: &T) -> bincode::Result<usize> {
    Ok(bincode::serialized_size(value)? as usize)
}

pub fn decode_packet(bytes: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Decodes a datagram received by the server and validates its fields.
///
/// Empty names and colors fall back to [`DEFAULT_NAME`] and
/// [`DEFAULT_COLOR`]; input angles are wrapped into `(-π, π]`.
pub fn decode_client_message(bytes: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_packet(bytes)? {
        Packet::Connect { protocol_version } => Ok(ClientMessage::Connect { protocol_version }),
        Packet::Join { name, color } => {
            let name = name.trim();
            let name = if name.is_empty() { DEFAULT_NAME } else { name };
            if name.chars().count() > MAX_NAME_LEN {
                return Err(ProtocolError::NameTooLong { max: MAX_NAME_LEN });
            }

            let color = color.trim();
            let color = if color.is_empty() { DEFAULT_COLOR } else { color };
            if parse_color(color).is_none() {
                return Err(ProtocolError::InvalidColor(color.to_string()));
            }

            Ok(ClientMessage::Join {
                name: name.to_string(),
                color: color.to_ascii_lowercase(),
            })
        }
        Packet::Input { angle, boosting } => {
            if !angle.is_finite() {
                return Err(ProtocolError::InvalidAngle);
            }
            Ok(ClientMessage::Input {
                angle: wrap_angle(angle),
                boosting,
            })
        }
        Packet::Leave => Ok(ClientMessage::Leave),
        Packet::RequestFood => Ok(ClientMessage::RequestFood),
        _ => Err(ProtocolError::UnexpectedPacket),
    }
}

/// Parses a `#rrggbb` color into its channels.
pub fn parse_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Wraps an angle into `(-π, π]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle % TAU;
    if wrapped > PI {
        wrapped - TAU
    } else if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Rounds to 0.1 precision, the resolution of positions, angles and radii
/// on the wire.
pub fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Rounds to an integer world unit. Values outside `i16` saturate, which
/// never happens for clamped positions on the 3000 unit grid.
pub fn round_unit(value: f32) -> i16 {
    value.round() as i16
}
