use serde::{Deserialize, Serialize};

use crate::crash::{CrashKind, Seat};
use crate::grid::{Coord, Direction};
use crate::room::{MatchOptions, RoomError};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    RoomMatch = 0x01,
    SnakeUpdate = 0x02,
    Chat = 0x03,
    Pong = 0x04,

    // Server -> Client
    RoomIndex = 0x10,
    RoomError = 0x11,
    Notice = 0x12,
    ChatRelay = 0x13,
    GameCountdown = 0x14,
    GameStart = 0x15,
    SnakeState = 0x16,
    SnakeCrash = 0x17,
    SnakeSize = 0x18,
    SnakeSpeed = 0x19,
    SnakeAction = 0x1A,
    Spawn = 0x1B,
    Despawn = 0x1C,
    ScoreUpdate = 0x1D,
    MatchEnd = 0x1E,
    Ping = 0x1F,
    Combined = 0x20,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x01 => Self::RoomMatch,
            0x02 => Self::SnakeUpdate,
            0x03 => Self::Chat,
            0x04 => Self::Pong,
            0x10 => Self::RoomIndex,
            0x11 => Self::RoomError,
            0x12 => Self::Notice,
            0x13 => Self::ChatRelay,
            0x14 => Self::GameCountdown,
            0x15 => Self::GameStart,
            0x16 => Self::SnakeState,
            0x17 => Self::SnakeCrash,
            0x18 => Self::SnakeSize,
            0x19 => Self::SnakeSpeed,
            0x1A => Self::SnakeAction,
            0x1B => Self::Spawn,
            0x1C => Self::Despawn,
            0x1D => Self::ScoreUpdate,
            0x1E => Self::MatchEnd,
            0x1F => Self::Ping,
            0x20 => Self::Combined,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    RoomMatch(RoomMatchMsg),
    SnakeUpdate(SnakeUpdateMsg),
    Chat(ChatMsg),
    Pong(PongMsg),
}

/// Find or create a room and join it. With `room_key` set, join that room only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMatchMsg {
    pub name: String,
    #[serde(default)]
    pub options: MatchOptions,
    #[serde(default)]
    pub room_key: Option<String>,
}

/// A client's recent trajectory and current heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeUpdateMsg {
    pub parts: Vec<Coord>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMsg {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongMsg {
    pub sent_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    RoomIndex(RoomIndexMsg),
    RoomError(RoomErrorMsg),
    Notice(NoticeMsg),
    ChatRelay(ChatRelayMsg),
    GameCountdown(GameCountdownMsg),
    GameStart(GameStartMsg),
    SnakeState(SnakeStateMsg),
    SnakeCrash(SnakeCrashMsg),
    SnakeSize(SnakeSizeMsg),
    SnakeSpeed(SnakeSpeedMsg),
    SnakeAction(SnakeActionMsg),
    Spawn(SpawnMsg),
    Despawn(DespawnMsg),
    ScoreUpdate(ScoreUpdateMsg),
    MatchEnd(MatchEndMsg),
    Ping(PingMsg),
    /// Events batched during one logical tick.
    Combined(Vec<ServerMessage>),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::RoomIndex(_) => MessageType::RoomIndex,
            Self::RoomError(_) => MessageType::RoomError,
            Self::Notice(_) => MessageType::Notice,
            Self::ChatRelay(_) => MessageType::ChatRelay,
            Self::GameCountdown(_) => MessageType::GameCountdown,
            Self::GameStart(_) => MessageType::GameStart,
            Self::SnakeState(_) => MessageType::SnakeState,
            Self::SnakeCrash(_) => MessageType::SnakeCrash,
            Self::SnakeSize(_) => MessageType::SnakeSize,
            Self::SnakeSpeed(_) => MessageType::SnakeSpeed,
            Self::SnakeAction(_) => MessageType::SnakeAction,
            Self::Spawn(_) => MessageType::Spawn,
            Self::Despawn(_) => MessageType::Despawn,
            Self::ScoreUpdate(_) => MessageType::ScoreUpdate,
            Self::MatchEnd(_) => MessageType::MatchEnd,
            Self::Ping(_) => MessageType::Ping,
            Self::Combined(_) => MessageType::Combined,
        }
    }
}

/// Room snapshot sent to each client, personalised with its own seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomIndexMsg {
    pub seat: Seat,
    pub capacity: u8,
    pub round: u32,
    pub key: String,
    pub level: usize,
    pub names: Vec<String>,
    pub points: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomErrorMsg {
    pub error: RoomError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Join {
        seat: Seat,
        name: String,
    },
    Disconnect {
        seat: Seat,
        name: String,
    },
    Crash {
        seat: Seat,
        kind: CrashKind,
        opponent: Option<Seat>,
        draw: bool,
    },
    NewRound {
        gloat_secs: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeMsg {
    pub notice: Notice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRelayMsg {
    pub seat: Seat,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeSnapshot {
    pub seat: Seat,
    pub parts: Vec<Coord>,
    pub direction: Direction,
    pub speed: u64,
    pub size: usize,
    pub crashed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCountdownMsg {
    pub secs: u64,
    pub level: usize,
    pub snakes: Vec<SnakeSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartMsg {
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeStateMsg {
    pub seat: Seat,
    pub parts: Vec<Coord>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeCrashMsg {
    pub seat: Seat,
    pub parts: Vec<Coord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeSizeMsg {
    pub seat: Seat,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeSpeedMsg {
    pub seat: Seat,
    pub speed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeActionMsg {
    pub seat: Seat,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnKind {
    Apple,
    Powerup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnMsg {
    pub id: usize,
    pub kind: SpawnKind,
    pub at: Coord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DespawnMsg {
    pub id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdateMsg {
    pub seat: Seat,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEndMsg {
    pub winner: Seat,
    pub points: Vec<i32>,
    pub special: bool,
    pub gloat_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMsg {
    pub sent_at_ms: u64,
}
