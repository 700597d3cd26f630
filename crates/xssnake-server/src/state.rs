use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::RwLock;
use tokio::time::Instant;

use xssnake_core::ClientId;

use crate::config::ServerConfig;
use crate::room_manager::RoomManager;

pub type SharedRoomManager = Arc<RwLock<RoomManager>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    next_client_id: Arc<AtomicU64>,
    /// Epoch for ping timestamps.
    started: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let tuning = Arc::new(config.game.clone());
        Self {
            rooms: Arc::new(RwLock::new(RoomManager::new(tuning))),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            next_client_id: Arc::new(AtomicU64::new(1)),
            started: Instant::now(),
        }
    }

    pub fn next_client_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Milliseconds since the server started.
    pub fn uptime_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Counts a live connection for as long as it is held.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
