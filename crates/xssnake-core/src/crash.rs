use serde::{Deserialize, Serialize};

use crate::grid::Coord;

/// Seat index of a client within its room.
pub type Seat = usize;

/// What a snake ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrashKind {
    Wall,
    #[serde(rename = "Self")]
    SelfCollision,
    Opponent,
}

/// Immutable record of a detected collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crash {
    pub kind: CrashKind,
    pub subject: Seat,
    pub opponent: Option<Seat>,
    /// Body of the subject at the moment of the collision.
    pub parts: Vec<Coord>,
    /// Game clock in milliseconds when the crash was detected.
    pub time_ms: u64,
    /// Head-on collision where the opponent dies too.
    pub draw: bool,
}

impl Crash {
    pub fn new(kind: CrashKind, subject: Seat, parts: Vec<Coord>, time_ms: u64) -> Self {
        Self {
            kind,
            subject,
            opponent: None,
            parts,
            time_ms,
            draw: false,
        }
    }

    pub fn with_opponent(mut self, opponent: Seat, draw: bool) -> Self {
        self.opponent = Some(opponent);
        self.draw = draw;
        self
    }
}
