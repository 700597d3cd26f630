use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::state::SharedRoomManager;

/// Spawns the shared ticker. Every period it takes the room manager's write
/// lock and advances every room by the real time elapsed since the previous
/// tick. Skipped ticks are folded into the next delta.
pub fn spawn_ticker(rooms: SharedRoomManager, tick_rate_hz: u32) -> JoinHandle<()> {
    let period = Duration::from_secs_f64(1.0 / f64::from(tick_rate_hz.max(1)));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = Instant::now();

        loop {
            interval.tick().await;
            let now = Instant::now();
            let delta_ms = u64::try_from(now.duration_since(clock).as_millis()).unwrap_or(u64::MAX);
            // Carry the sub-millisecond remainder into the next tick.
            clock += Duration::from_millis(delta_ms);

            let mut rooms = rooms.write().await;
            rooms.tick_all(now, delta_ms);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::{RwLock, mpsc};
    use xssnake_core::config::GameTuning;
    use xssnake_core::net::messages::RoomMatchMsg;
    use xssnake_core::room::{MatchOptions, RoomPhase};

    use crate::room_manager::RoomManager;

    #[tokio::test]
    async fn ticker_drives_rooms_into_play() {
        let tuning = GameTuning {
            countdown_secs: 0,
            ..GameTuning::default()
        };
        let rooms: SharedRoomManager = Arc::new(RwLock::new(RoomManager::new(Arc::new(tuning))));
        let request = RoomMatchMsg {
            name: "P".to_string(),
            options: MatchOptions {
                capacity: Some(2),
                ..MatchOptions::default()
            },
            room_key: None,
        };
        let (tx1, _rx1) = mpsc::channel(256);
        let (tx2, _rx2) = mpsc::channel(256);
        let key = {
            let mut mgr = rooms.write().await;
            let joined = mgr.join(1, &request, tx1, Instant::now()).unwrap();
            mgr.join(2, &request, tx2, Instant::now()).unwrap();
            joined.key
        };

        let ticker = spawn_ticker(Arc::clone(&rooms), 50);
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mgr = rooms.read().await;
        let room = mgr.room(&key).unwrap();
        assert_eq!(room.phase(), RoomPhase::InProgress);
        assert!(room.game().is_some_and(|g| g.clock_ms() > 0));
        drop(mgr);
        ticker.abort();
    }
}
