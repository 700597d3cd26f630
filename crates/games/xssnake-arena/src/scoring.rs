use xssnake_core::config::GameTuning;
use xssnake_core::crash::Seat;

/// Seat of the match winner, if one can be declared once the zero-based
/// `round` has ended. The leader must be ahead of the runner-up by at least
/// `win_by_min`; a narrow lead keeps the match going.
pub fn match_winner(points: &[i32], round: u32, tuning: &GameTuning) -> Option<Seat> {
    if round < tuning.rounds_max.saturating_sub(1) || points.len() < 2 {
        return None;
    }
    let mut ranked: Vec<(Seat, i32)> = points.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let (leader, top) = ranked[0];
    let (_, second) = ranked[1];
    (top - second >= tuning.win_by_min).then_some(leader)
}
