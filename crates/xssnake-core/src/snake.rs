use crate::crash::Crash;
use crate::grid::{Coord, Direction};

/// Per-player body and movement state. `parts` is ordered tail first, so the
/// head is always the last element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    pub parts: Vec<Coord>,
    pub direction: Direction,
    /// Milliseconds needed to advance one cell.
    pub speed: u64,
    /// Length the snake grows or shrinks towards.
    pub size: usize,
    /// Milliseconds accumulated since the last advance.
    pub elapsed: u64,
    pub crashed: bool,
    /// Suspected but unconfirmed collision.
    pub limbo: Option<Crash>,
}

impl Snake {
    /// A snake of a single cell at `spawn`, grown to `size` by moving.
    pub fn new(spawn: Coord, direction: Direction, size: usize, speed: u64) -> Self {
        Self {
            parts: vec![spawn],
            direction,
            speed: speed.max(1),
            size: size.max(1),
            elapsed: 0,
            crashed: false,
            limbo: None,
        }
    }

    pub fn head(&self) -> Option<Coord> {
        self.parts.last().copied()
    }

    pub fn has_part(&self, cell: Coord) -> bool {
        self.parts.contains(&cell)
    }

    /// Cell the snake would enter by moving one step in its current direction.
    pub fn peek_next(&self) -> Option<Coord> {
        self.head().map(|h| h.step(self.direction))
    }

    /// The body after moving into `next`, dropping the oldest part.
    pub fn predict_parts(&self, next: Coord) -> Vec<Coord> {
        let mut predicted = self.parts.get(1..).unwrap_or_default().to_vec();
        predicted.push(next);
        predicted
    }

    /// Appends `next` as the new head and trims to `size`.
    pub fn move_to(&mut self, next: Coord) {
        self.parts.push(next);
        self.trim();
    }

    /// Drops the oldest parts beyond `size`.
    pub fn trim(&mut self) {
        if self.parts.len() > self.size {
            let excess = self.parts.len() - self.size;
            self.parts.drain(..excess);
        }
    }

    pub fn accumulate(&mut self, delta_ms: u64) {
        self.elapsed = self.elapsed.saturating_add(delta_ms);
    }

    /// Consumes one step worth of time if available.
    pub fn take_step(&mut self) -> bool {
        if self.crashed || self.elapsed < self.speed {
            return false;
        }
        self.elapsed -= self.speed;
        true
    }

    /// The last `n` parts.
    pub fn tail_window(&self, n: usize) -> &[Coord] {
        let start = self.parts.len().saturating_sub(n);
        &self.parts[start..]
    }
}

/// Why a remote view of a snake was not merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRejection {
    /// Consecutive cells are not adjacent.
    Gap,
    /// No cell in common with the local history.
    NoCommon,
    /// The remote side is further behind than latency allows.
    Mismatches { found: usize, allowed: usize },
}

impl std::fmt::Display for UpdateRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gap => write!(f, "update contains a gap"),
            Self::NoCommon => write!(f, "update shares no cell with server history"),
            Self::Mismatches { found, allowed } => {
                write!(f, "{found} mismatched cells (max {allowed})")
            },
        }
    }
}

impl std::error::Error for UpdateRejection {}

/// How a snake moves and how a remote view of it is merged. The server and a
/// predicting client implement this differently.
pub trait SnakeMotion {
    type Update;

    /// Applies any pending heading change and returns the cell the snake
    /// moves into next.
    fn advance(&mut self, snake: &mut Snake) -> Option<Coord>;

    /// Merge the other side's view of the snake into `snake`.
    fn reconcile(&mut self, snake: &mut Snake, update: &Self::Update)
    -> Result<(), UpdateRejection>;
}
