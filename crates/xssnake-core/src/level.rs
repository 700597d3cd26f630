use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::crash::Seat;
use crate::grid::{Coord, Direction};

/// Read-only wall grid and spawn table consumed by a round.
pub trait Level: Send + Sync {
    fn width(&self) -> i16;
    fn height(&self) -> i16;
    fn spawn(&self, seat: Seat) -> Coord;
    fn spawn_direction(&self, seat: Seat) -> Direction;
    /// Out-of-bounds cells count as walls.
    fn is_wall(&self, cell: Coord) -> bool;
    /// A random non-wall cell not contained in `occupied`.
    fn empty_location(&self, occupied: &[Coord], rng: &mut dyn RngCore) -> Option<Coord>;
}

/// Level backed by a dense wall bitmap.
#[derive(Debug, Clone)]
pub struct GridLevel {
    name: &'static str,
    width: i16,
    height: i16,
    walls: Vec<bool>,
    spawns: Vec<(Coord, Direction)>,
}

const RANDOM_PROBES: usize = 64;

impl GridLevel {
    /// Builds a level from rows of `#` (wall) and anything else (floor).
    pub fn from_rows(
        name: &'static str,
        rows: &[&str],
        spawns: Vec<(Coord, Direction)>,
    ) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut walls = vec![false; width * height];
        for (y, row) in rows.iter().enumerate() {
            for (x, b) in row.bytes().enumerate() {
                walls[y * width + x] = b == b'#';
            }
        }
        Self {
            name,
            width: width as i16,
            height: height as i16,
            walls,
            spawns,
        }
    }

    /// Builds a bordered level, marking as wall every cell `is_wall` accepts.
    pub fn generate(
        name: &'static str,
        width: i16,
        height: i16,
        spawns: Vec<(Coord, Direction)>,
        is_wall: impl Fn(i16, i16) -> bool,
    ) -> Self {
        let mut walls = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                walls.push(border || is_wall(x, y));
            }
        }
        Self {
            name,
            width,
            height,
            walls,
            spawns,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn index(&self, cell: Coord) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width || cell.y >= self.height {
            return None;
        }
        Some(cell.y as usize * self.width as usize + cell.x as usize)
    }

    fn spawn_entry(&self, seat: Seat) -> (Coord, Direction) {
        if self.spawns.is_empty() {
            return (Coord::new(self.width / 2, self.height / 2), Direction::Right);
        }
        self.spawns[seat % self.spawns.len()]
    }
}

impl Level for GridLevel {
    fn width(&self) -> i16 {
        self.width
    }

    fn height(&self) -> i16 {
        self.height
    }

    fn spawn(&self, seat: Seat) -> Coord {
        self.spawn_entry(seat).0
    }

    fn spawn_direction(&self, seat: Seat) -> Direction {
        self.spawn_entry(seat).1
    }

    fn is_wall(&self, cell: Coord) -> bool {
        self.index(cell).is_none_or(|i| self.walls[i])
    }

    fn empty_location(&self, occupied: &[Coord], rng: &mut dyn RngCore) -> Option<Coord> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        let free = |cell: Coord| !self.is_wall(cell) && !occupied.contains(&cell);
        for _ in 0..RANDOM_PROBES {
            let cell = Coord::new(
                rng.random_range(0..self.width),
                rng.random_range(0..self.height),
            );
            if free(cell) {
                return Some(cell);
            }
        }
        // Crowded board: fall back to a scan from a random offset.
        let total = self.walls.len();
        let offset = rng.random_range(0..total);
        (0..total)
            .map(|i| (offset + i) % total)
            .map(|i| {
                Coord::new(
                    (i % self.width as usize) as i16,
                    (i / self.width as usize) as i16,
                )
            })
            .find(|&cell| free(cell))
    }
}

pub const LEVEL_WIDTH: i16 = 63;
pub const LEVEL_HEIGHT: i16 = 33;

fn default_spawns() -> Vec<(Coord, Direction)> {
    vec![
        (Coord::new(8, 5), Direction::Right),
        (Coord::new(54, 27), Direction::Left),
        (Coord::new(54, 5), Direction::Left),
        (Coord::new(8, 27), Direction::Right),
        (Coord::new(20, 16), Direction::Up),
        (Coord::new(42, 16), Direction::Down),
    ]
}

/// The built-in levels, cycled through round by round.
pub struct LevelCatalog {
    levels: Vec<Arc<GridLevel>>,
}

impl LevelCatalog {
    pub fn new(levels: Vec<GridLevel>) -> Self {
        Self {
            levels: levels.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn builtin() -> Self {
        let (w, h) = (LEVEL_WIDTH, LEVEL_HEIGHT);
        let pillar = |cx: i16, cy: i16, x: i16, y: i16| (x - cx).abs() <= 1 && (y - cy).abs() <= 1;
        Self::new(vec![
            GridLevel::generate("blank", w, h, default_spawns(), |_, _| false),
            GridLevel::generate("pillars", w, h, default_spawns(), move |x, y| {
                pillar(15, 10, x, y)
                    || pillar(47, 10, x, y)
                    || pillar(15, 22, x, y)
                    || pillar(47, 22, x, y)
            }),
            GridLevel::generate("divider", w, h, default_spawns(), move |x, y| {
                y == h / 2 && (x <= 14 || x >= w - 15)
            }),
            GridLevel::generate("crosshair", w, h, default_spawns(), move |x, y| {
                x == w / 2 && (y <= 8 || y >= h - 9)
            }),
        ])
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level for the given selector, wrapping around the catalog.
    pub fn get(&self, selector: usize) -> Option<Arc<GridLevel>> {
        if self.levels.is_empty() {
            return None;
        }
        self.levels.get(selector % self.levels.len()).map(Arc::clone)
    }
}

impl Default for LevelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
