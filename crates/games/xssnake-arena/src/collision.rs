use xssnake_core::crash::{Crash, CrashKind, Seat};
use xssnake_core::grid::Coord;
use xssnake_core::level::Level;
use xssnake_core::snake::Snake;

/// Collision check for `subject` occupying `candidate` (tail first, head
/// last). Categories are checked in priority order across all cells: walls,
/// then the snake's own body, then opponents.
pub fn detect_crash(
    level: &dyn Level,
    snakes: &[Snake],
    subject: Seat,
    candidate: &[Coord],
    self_min_len: usize,
    time_ms: u64,
) -> Option<Crash> {
    let crash = |kind| Crash::new(kind, subject, candidate.to_vec(), time_ms);

    if candidate.iter().any(|&cell| level.is_wall(cell)) {
        return Some(crash(CrashKind::Wall));
    }

    if candidate.len() >= self_min_len.max(2)
        && let Some((&head, body)) = candidate.split_last()
        && body.contains(&head)
    {
        return Some(crash(CrashKind::SelfCollision));
    }

    let head = candidate.last().copied();
    for &cell in candidate.iter().rev() {
        for (seat, other) in snakes.iter().enumerate() {
            if seat == subject || !other.has_part(cell) {
                continue;
            }
            let draw = head == Some(cell) && other.head() == Some(cell);
            return Some(crash(CrashKind::Opponent).with_opponent(seat, draw));
        }
    }

    None
}
