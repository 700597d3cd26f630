use serde::{Deserialize, Serialize};

/// A cell on the level grid. Out-of-range coordinates are representable so
/// that untrusted client input can be decoded and then rejected by wall checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i16,
    pub y: i16,
}

impl Coord {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to `other`.
    pub fn distance(self, other: Coord) -> u32 {
        let dx = (i32::from(self.x) - i32::from(other.x)).unsigned_abs();
        let dy = (i32::from(self.y) - i32::from(other.y)).unsigned_abs();
        dx + dy
    }

    /// The neighbouring cell one step in `direction`.
    pub fn step(self, direction: Direction) -> Coord {
        let (dx, dy) = direction.shift();
        Coord {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }
}

impl From<(i16, i16)> for Coord {
    fn from((x, y): (i16, i16)) -> Self {
        Self { x, y }
    }
}

/// Heading of a snake. The discriminants are the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Left = 0,
    Up = 1,
    Right = 2,
    Down = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Up,
        Direction::Right,
        Direction::Down,
    ];

    /// Grid delta applied when moving one cell in this direction.
    pub fn shift(self) -> (i16, i16) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b)).copied()
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
        }
    }

    /// Number of clockwise quarter turns from `self` to `to`.
    pub fn quarter_turns_to(self, to: Direction) -> u8 {
        ((to as u8) + 4 - (self as u8)) % 4
    }
}

/// True when every consecutive pair of cells is exactly one step apart.
pub fn is_contiguous(parts: &[Coord]) -> bool {
    parts.windows(2).all(|w| w[0].distance(w[1]) == 1)
}
