use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;

use xssnake_core::ClientId;
use xssnake_core::config::GameTuning;
use xssnake_core::crash::Seat;
use xssnake_core::level::LevelCatalog;
use xssnake_core::net::messages::{RoomMatchMsg, SnakeUpdateMsg};
use xssnake_core::room::{
    RoomError, RoomOptions, clean_name, generate_room_key, is_valid_room_key,
};

use crate::room::{Client, ClientSender, Room};

/// Outcome of a successful match request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub key: String,
    pub seat: Seat,
}

/// Owns every room and knows which room each connection sits in.
pub struct RoomManager {
    rooms: HashMap<String, Room>,
    client_rooms: HashMap<ClientId, String>,
    tuning: Arc<GameTuning>,
    levels: Arc<LevelCatalog>,
}

impl RoomManager {
    pub fn new(tuning: Arc<GameTuning>) -> Self {
        Self {
            rooms: HashMap::new(),
            client_rooms: HashMap::new(),
            tuning,
            levels: Arc::new(LevelCatalog::builtin()),
        }
    }

    /// Seats a connection. With a room key the client joins that room or
    /// fails; without one it is matched into a compatible public room, or a
    /// fresh room is opened.
    pub fn join(
        &mut self,
        client_id: ClientId,
        request: &RoomMatchMsg,
        sender: ClientSender,
        now: Instant,
    ) -> Result<Joined, RoomError> {
        let name = clean_name(&request.name);
        let key = match &request.room_key {
            Some(key) => {
                if !is_valid_room_key(key, self.tuning.room_key_length) {
                    return Err(RoomError::Invalid);
                }
                if !self.rooms.contains_key(key) {
                    return Err(RoomError::NotFound);
                }
                key.clone()
            },
            None => {
                let options = RoomOptions::clean(&request.options, &self.tuning);
                match self.get_preferred_room(&options) {
                    Some(key) => key,
                    None => self.create_room(options),
                }
            },
        };

        let room = self.rooms.get_mut(&key).ok_or(RoomError::NotFound)?;
        let seat = room.join(Client::new(client_id, name, sender), now)?;
        self.client_rooms.insert(client_id, key.clone());
        Ok(Joined { key, seat })
    }

    /// The fullest public room still filling with exactly these options.
    pub fn get_preferred_room(&self, options: &RoomOptions) -> Option<String> {
        if options.private {
            return None;
        }
        self.rooms
            .values()
            .filter(|room| room.is_awaiting() && room.options().matches(options))
            .max_by_key(|room| room.clients().len())
            .map(|room| room.key().to_string())
    }

    fn create_room(&mut self, options: RoomOptions) -> String {
        let key = loop {
            let candidate = generate_room_key(self.tuning.room_key_length);
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let room = Room::new(
            key.clone(),
            options,
            Arc::clone(&self.tuning),
            Arc::clone(&self.levels),
        );
        self.rooms.insert(key.clone(), room);
        tracing::info!(room = %key, capacity = options.capacity, private = options.private, "Room created");
        key
    }

    /// Drops a room, its game, and its pending timers.
    pub fn remove(&mut self, key: &str) -> Option<Room> {
        let room = self.rooms.remove(key)?;
        self.client_rooms.retain(|_, k| k != key);
        tracing::info!(room = %key, round = room.round(), "Room removed");
        Some(room)
    }

    pub fn room(&self, key: &str) -> Option<&Room> {
        self.rooms.get(key)
    }

    pub fn room_of(&self, client_id: ClientId) -> Option<&str> {
        self.client_rooms.get(&client_id).map(String::as_str)
    }

    fn room_of_mut(&mut self, client_id: ClientId) -> Option<&mut Room> {
        let key = self.client_rooms.get(&client_id)?;
        self.rooms.get_mut(key)
    }

    pub fn snake_update(&mut self, client_id: ClientId, update: &SnakeUpdateMsg, now: Instant) {
        if let Some(room) = self.room_of_mut(client_id) {
            room.snake_update(client_id, update, now);
        }
    }

    pub fn chat(&mut self, client_id: ClientId, content: &str) {
        if let Some(room) = self.room_of_mut(client_id) {
            room.chat(client_id, content);
        }
    }

    pub fn record_rtt(&mut self, client_id: ClientId, sample_ms: u64) {
        if let Some(room) = self.room_of_mut(client_id) {
            room.record_rtt(client_id, sample_ms);
        }
    }

    pub fn disconnect(&mut self, client_id: ClientId, now: Instant) {
        let Some(key) = self.client_rooms.remove(&client_id) else {
            return;
        };
        let abandoned = match self.rooms.get_mut(&key) {
            Some(room) => {
                room.disconnect(client_id, now);
                room.is_abandoned()
            },
            None => false,
        };
        if abandoned {
            self.remove(&key);
        }
    }

    /// Advances every room and drops the ones nobody is left in.
    pub fn tick_all(&mut self, now: Instant, delta_ms: u64) {
        for room in self.rooms.values_mut() {
            room.tick(now, delta_ms);
        }
        let abandoned: Vec<String> = self
            .rooms
            .values()
            .filter(|room| room.is_abandoned())
            .map(|room| room.key().to_string())
            .collect();
        for key in abandoned {
            self.remove(&key);
        }
    }

    /// (rooms, connected clients)
    pub fn stats(&self) -> (usize, usize) {
        let clients = self
            .rooms
            .values()
            .map(|r| r.clients().iter().filter(|c| c.is_connected()).count())
            .sum();
        (self.rooms.len(), clients)
    }
}
