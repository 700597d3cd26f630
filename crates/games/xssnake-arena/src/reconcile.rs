use xssnake_core::config::GameTuning;
use xssnake_core::grid::{Coord, is_contiguous};
use xssnake_core::net::messages::SnakeUpdateMsg;
use xssnake_core::snake::{Snake, SnakeMotion, UpdateRejection};

/// Most recent pair of indices `(client, server)` naming the same cell,
/// searching from the head backwards in both sequences.
pub fn find_common(client: &[Coord], server: &[Coord]) -> Option<(usize, usize)> {
    for i in (0..client.len()).rev() {
        for j in (0..server.len()).rev() {
            if client[i] == server[j] {
                return Some((i, j));
            }
        }
    }
    None
}

fn tail(parts: &[Coord], window: usize) -> &[Coord] {
    &parts[parts.len().saturating_sub(window)..]
}

/// Merges a client's reported trajectory into the server's. Only the last
/// `window` cells of either side are considered. On success the returned body
/// keeps server history up to the common anchor and the client's moves after it.
pub fn merge_tail(
    server_parts: &[Coord],
    client_parts: &[Coord],
    window: usize,
    max_mismatches: usize,
) -> Result<Vec<Coord>, UpdateRejection> {
    let client = tail(client_parts, window);
    if !is_contiguous(client) {
        return Err(UpdateRejection::Gap);
    }

    let server = tail(server_parts, window);
    let (i, j) = find_common(client, server).ok_or(UpdateRejection::NoCommon)?;

    let mismatches = server.len() - j - 1;
    if mismatches > max_mismatches {
        return Err(UpdateRejection::Mismatches {
            found: mismatches,
            allowed: max_mismatches,
        });
    }

    let keep = server_parts.len() - server.len();
    let mut merged = Vec::with_capacity(keep + j + 1 + client.len() - i - 1);
    merged.extend_from_slice(&server_parts[..keep]);
    merged.extend_from_slice(&server[..=j]);
    merged.extend_from_slice(&client[i + 1..]);
    Ok(merged)
}

/// Server-side motion: the snake follows its heading, and client updates are
/// merged within a latency-scaled tolerance.
#[derive(Debug, Clone, Copy)]
pub struct AuthoritativeMotion {
    window: usize,
    max_mismatches: usize,
}

impl AuthoritativeMotion {
    pub fn new(tuning: &GameTuning, speed: u64, rtt_ms: u64) -> Self {
        Self {
            window: tuning.sync_window(speed),
            max_mismatches: tuning.max_mismatches(rtt_ms, speed),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl SnakeMotion for AuthoritativeMotion {
    type Update = SnakeUpdateMsg;

    fn advance(&mut self, snake: &mut Snake) -> Option<Coord> {
        snake.peek_next()
    }

    fn reconcile(
        &mut self,
        snake: &mut Snake,
        update: &SnakeUpdateMsg,
    ) -> Result<(), UpdateRejection> {
        // Turning is accepted even when the trajectory is not.
        snake.direction = update.direction;
        snake.parts = merge_tail(
            &snake.parts,
            &update.parts,
            self.window,
            self.max_mismatches,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xssnake_core::grid::Direction;
    use xssnake_core::test_helpers::{coords, snake_with};

    #[test]
    fn anchor_at_head_is_unchanged() {
        let server = coords(&[(5, 4), (5, 5), (5, 6), (5, 7)]);
        let client = coords(&[(5, 5), (5, 6), (5, 7)]);
        assert_eq!(find_common(&client, &server), Some((2, 3)));
        let merged = merge_tail(&server, &client, 4, 1).unwrap();
        assert_eq!(merged, server);
    }

    #[test]
    fn gap_is_rejected_regardless_of_server() {
        let server = coords(&[(5, 4), (5, 5)]);
        let client = coords(&[(5, 5), (6, 7)]);
        assert_eq!(
            merge_tail(&server, &client, 4, 10),
            Err(UpdateRejection::Gap)
        );
        assert_eq!(merge_tail(&[], &client, 4, 10), Err(UpdateRejection::Gap));
    }

    #[test]
    fn gap_outside_window_is_ignored() {
        // The jump sits before the trusted window and is truncated away.
        let server = coords(&[(5, 4), (5, 5), (5, 6), (5, 7)]);
        let client = coords(&[(0, 0), (5, 5), (5, 6), (5, 7)]);
        assert!(merge_tail(&server, &client, 3, 1).is_ok());
    }

    #[test]
    fn no_common_cell_is_rejected() {
        let server = coords(&[(5, 4), (5, 5)]);
        let client = coords(&[(9, 9), (9, 10)]);
        assert_eq!(
            merge_tail(&server, &client, 4, 10),
            Err(UpdateRejection::NoCommon)
        );
        assert_eq!(
            merge_tail(&server, &[], 4, 10),
            Err(UpdateRejection::NoCommon)
        );
    }

    #[test]
    fn client_ahead_is_adopted() {
        // Client turned down at (5,7) and moved two cells the server has not seen.
        let server = coords(&[(5, 4), (5, 5), (5, 6), (5, 7)]);
        let client = coords(&[(5, 6), (5, 7), (6, 7), (7, 7)]);
        let merged = merge_tail(&server, &client, 4, 1).unwrap();
        assert_eq!(merged, coords(&[(5, 4), (5, 5), (5, 6), (5, 7), (6, 7), (7, 7)]));
    }

    #[test]
    fn server_ahead_within_budget_rewinds() {
        // Server predicted one cell past the client's turn.
        let server = coords(&[(5, 4), (5, 5), (5, 6), (5, 7)]);
        let client = coords(&[(5, 5), (5, 6), (6, 6)]);
        let merged = merge_tail(&server, &client, 4, 1).unwrap();
        assert_eq!(merged, coords(&[(5, 4), (5, 5), (5, 6), (6, 6)]));
    }

    #[test]
    fn server_too_far_ahead_is_rejected() {
        let server = coords(&[(5, 4), (5, 5), (5, 6), (5, 7)]);
        let client = coords(&[(5, 4), (5, 5), (6, 5)]);
        assert_eq!(
            merge_tail(&server, &client, 4, 1),
            Err(UpdateRejection::Mismatches {
                found: 2,
                allowed: 1
            })
        );
    }

    #[test]
    fn prefix_outside_window_is_kept() {
        let server = coords(&[(1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1)]);
        let client = coords(&[(5, 1), (6, 1), (6, 2)]);
        let merged = merge_tail(&server, &client, 3, 1).unwrap();
        assert_eq!(
            merged,
            coords(&[(1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1), (6, 2)])
        );
    }

    #[test]
    fn motion_accepts_direction_even_when_rejected() {
        let tuning = GameTuning::default();
        let mut snake = snake_with(&[(5, 4), (5, 5), (5, 6)], Direction::Down, 120);
        let before = snake.parts.clone();
        let mut motion = AuthoritativeMotion::new(&tuning, snake.speed, 0);
        let update = SnakeUpdateMsg {
            parts: coords(&[(5, 6), (7, 6)]),
            direction: Direction::Right,
        };
        assert_eq!(
            motion.reconcile(&mut snake, &update),
            Err(UpdateRejection::Gap)
        );
        assert_eq!(snake.parts, before);
        assert_eq!(snake.direction, Direction::Right);
    }

    #[test]
    fn motion_window_follows_speed() {
        let tuning = GameTuning::default();
        assert_eq!(AuthoritativeMotion::new(&tuning, 120, 0).window(), 4);
        assert_eq!(AuthoritativeMotion::new(&tuning, 250, 0).window(), 2);
    }
}
