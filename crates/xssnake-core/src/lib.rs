pub mod config;
pub mod crash;
pub mod grid;
pub mod level;
pub mod net;
pub mod prediction;
pub mod room;
pub mod snake;

/// Identifier the server assigns to each connection.
pub type ClientId = u64;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::grid::{Coord, Direction};
    use crate::level::GridLevel;
    use crate::snake::Snake;

    /// Build a coordinate list from tuples.
    pub fn coords(cells: &[(i16, i16)]) -> Vec<Coord> {
        cells.iter().map(|&c| c.into()).collect()
    }

    /// A snake occupying exactly `cells`, tail first, sized to fit them.
    pub fn snake_with(cells: &[(i16, i16)], direction: Direction, speed: u64) -> Snake {
        let parts = coords(cells);
        let mut snake = Snake::new(parts[0], direction, parts.len(), speed);
        snake.parts = parts;
        snake
    }

    /// A horizontal snake of `len` cells ending at `head`, heading right.
    pub fn straight_snake(head: (i16, i16), len: usize, speed: u64) -> Snake {
        let cells: Vec<(i16, i16)> = (0..len as i16)
            .rev()
            .map(|i| (head.0 - i, head.1))
            .collect();
        snake_with(&cells, Direction::Right, speed)
    }

    /// An empty bordered arena with the given spawn table.
    pub fn open_level(width: i16, height: i16, spawns: Vec<(Coord, Direction)>) -> GridLevel {
        GridLevel::generate("test", width, height, spawns, |_, _| false)
    }

    /// Assert every consecutive pair of cells is adjacent.
    pub fn assert_contiguous(parts: &[Coord]) {
        for pair in parts.windows(2) {
            assert_eq!(
                pair[0].distance(pair[1]),
                1,
                "gap between {:?} and {:?} in {parts:?}",
                pair[0],
                pair[1]
            );
        }
    }
}
