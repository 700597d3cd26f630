use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GameTuning;

/// Longest display name kept after cleaning.
pub const MAX_NAME_LEN: usize = 20;

const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Maps the wire value (1 to 3).
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Easy),
            2 => Some(Self::Medium),
            3 => Some(Self::Hard),
            _ => None,
        }
    }
}

/// Room options exactly as a client sent them. Any field may be missing or
/// out of range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub capacity: Option<i64>,
    pub difficulty: Option<i64>,
    pub powerups: Option<bool>,
    pub private: Option<bool>,
    pub special: Option<bool>,
}

/// Cleaned room options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomOptions {
    pub capacity: u8,
    pub difficulty: Difficulty,
    pub powerups: bool,
    pub private: bool,
    /// Alternate end-of-match celebration.
    pub special: bool,
}

impl RoomOptions {
    /// Clamps client options to valid values. Invalid input falls back to
    /// defaults rather than failing.
    pub fn clean(raw: &MatchOptions, tuning: &GameTuning) -> Self {
        let max = i64::from(tuning.room_capacity);
        let capacity = match raw.capacity {
            Some(c) if (1..=max).contains(&c) => c as u8,
            _ => tuning.room_capacity,
        };
        Self {
            capacity,
            difficulty: raw
                .difficulty
                .and_then(Difficulty::from_level)
                .unwrap_or(Difficulty::Medium),
            powerups: raw.powerups.unwrap_or(true),
            private: raw.private.unwrap_or(false),
            special: raw.special.unwrap_or(false),
        }
    }

    pub fn defaults(tuning: &GameTuning) -> Self {
        Self::clean(&MatchOptions::default(), tuning)
    }

    /// Whether a public room with these options can take a player asking for `wanted`.
    pub fn matches(&self, wanted: &RoomOptions) -> bool {
        !self.private
            && !wanted.private
            && self.capacity == wanted.capacity
            && self.difficulty == wanted.difficulty
            && self.powerups == wanted.powerups
            && self.special == wanted.special
    }
}

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Filling,
    Countdown,
    InProgress,
    RoundEnded,
    MatchEnded,
}

impl RoomPhase {
    /// A round exists and its snakes are on the board.
    pub fn round_active(self) -> bool {
        matches!(self, Self::InProgress | Self::RoundEnded)
    }
}

/// A client's standing relative to the rest of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    Leading,
    Neutral,
    Losing,
}

/// Standing of `points[seat]` among `points`.
pub fn rank(points: &[i32], seat: usize) -> Rank {
    let Some(&mine) = points.get(seat) else {
        return Rank::Neutral;
    };
    if points.len() <= 1 {
        return Rank::Neutral;
    }
    let lower = points.iter().filter(|&&p| p < mine).count();
    let higher = points.iter().filter(|&&p| p > mine).count();
    if lower > higher {
        Rank::Leading
    } else if higher > lower {
        Rank::Losing
    } else {
        Rank::Neutral
    }
}

/// Why a join attempt failed. The discriminants are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoomError {
    Invalid = 1,
    Full = 2,
    NotFound = 3,
    InProgress = 4,
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid room key"),
            Self::Full => write!(f, "room is full"),
            Self::NotFound => write!(f, "room not found"),
            Self::InProgress => write!(f, "room is in progress"),
        }
    }
}

impl std::error::Error for RoomError {}

/// Generate a random lowercase alphanumeric room key.
pub fn generate_room_key(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())]))
        .collect()
}

/// Validate the shape of a room key supplied by a client.
pub fn is_valid_room_key(key: &str, len: usize) -> bool {
    key.len() == len && key.bytes().all(|b| KEY_ALPHABET.contains(&b))
}

/// Trims and truncates a display name, substituting a default when empty.
pub fn clean_name(raw: &str) -> String {
    let trimmed: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if trimmed.is_empty() {
        "Anonymous".to_string()
    } else {
        trimmed
    }
}
