use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;

use xssnake_arena::outbox::{Audience, Outbox, Outgoing};
use xssnake_arena::scoring::match_winner;
use xssnake_arena::{Game, GameEvent};
use xssnake_core::ClientId;
use xssnake_core::config::GameTuning;
use xssnake_core::crash::Seat;
use xssnake_core::level::LevelCatalog;
use xssnake_core::net::messages::{
    ChatRelayMsg, GameCountdownMsg, GameStartMsg, MatchEndMsg, Notice, NoticeMsg, RoomIndexMsg,
    ScoreUpdateMsg, ServerMessage, SnakeUpdateMsg,
};
use xssnake_core::net::protocol::encode_server_message;
use xssnake_core::room::{Rank, RoomError, RoomOptions, RoomPhase, rank};

use crate::timers::{TimerKind, Timers};

/// Outbound channel for one connection. Bounded so a slow client cannot
/// exhaust memory; `Bytes` makes fan-out a refcount bump.
pub type ClientSender = mpsc::Sender<Bytes>;

/// Longest chat line relayed, in characters.
pub const MAX_CHAT_LEN: usize = 200;

/// A connection seated in a room.
pub struct Client {
    pub id: ClientId,
    pub name: String,
    sender: ClientSender,
    rtt_ms: Option<u64>,
    connected: bool,
}

impl Client {
    pub fn new(id: ClientId, name: String, sender: ClientSender) -> Self {
        Self {
            id,
            name,
            sender,
            rtt_ms: None,
            connected: true,
        }
    }

    /// Smoothed round-trip estimate, 0 until the first sample.
    pub fn rtt_ms(&self) -> u64 {
        self.rtt_ms.unwrap_or(0)
    }

    pub fn record_rtt(&mut self, sample_ms: u64) {
        self.rtt_ms = Some(match self.rtt_ms {
            Some(rtt) => (rtt.saturating_mul(3).saturating_add(sample_ms)) / 4,
            None => sample_ms,
        });
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&self, data: &Bytes, room: &str) {
        if let Err(e) = self.sender.try_send(data.clone()) {
            tracing::debug!(
                client_id = self.id, room, error = %e,
                "Skipping send to slow client"
            );
        }
    }
}

/// A match between a handful of clients: seats, points, round progression,
/// and the active [`Game`].
pub struct Room {
    key: String,
    options: RoomOptions,
    tuning: Arc<GameTuning>,
    levels: Arc<LevelCatalog>,
    clients: Vec<Client>,
    /// Index-aligned with `clients`.
    points: Vec<i32>,
    /// Rounds completed so far.
    round: u32,
    /// Level selector, advanced every round.
    level: usize,
    phase: RoomPhase,
    game: Option<Game>,
    timers: Timers,
    outbox: Outbox,
}

impl Room {
    pub fn new(
        key: String,
        options: RoomOptions,
        tuning: Arc<GameTuning>,
        levels: Arc<LevelCatalog>,
    ) -> Self {
        Self {
            key,
            options,
            tuning,
            levels,
            clients: Vec::new(),
            points: Vec::new(),
            round: 0,
            level: 0,
            phase: RoomPhase::Filling,
            game: None,
            timers: Timers::new(),
            outbox: Outbox::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &RoomOptions {
        &self.options
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn points(&self) -> &[i32] {
        &self.points
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= usize::from(self.options.capacity)
    }

    /// Open for matchmaking: still filling and a seat is free.
    pub fn is_awaiting(&self) -> bool {
        self.phase == RoomPhase::Filling && !self.is_full()
    }

    /// Nobody left to play; the manager should drop the room.
    pub fn is_abandoned(&self) -> bool {
        !self.clients.iter().any(Client::is_connected)
    }

    pub fn seat_of(&self, client_id: ClientId) -> Option<Seat> {
        self.clients.iter().position(|c| c.id == client_id)
    }

    pub fn rank(&self, seat: Seat) -> Rank {
        rank(&self.points, seat)
    }

    pub fn join(&mut self, client: Client, now: Instant) -> Result<Seat, RoomError> {
        if self.is_full() {
            return Err(RoomError::Full);
        }
        if self.phase != RoomPhase::Filling {
            return Err(RoomError::InProgress);
        }

        let seat = self.clients.len();
        let name = client.name.clone();
        tracing::info!(room = %self.key, client_id = client.id, seat, %name, "Client joined room");
        self.clients.push(client);
        self.points.push(0);

        self.emit_index();
        self.outbox.emit(
            Audience::AllExcept(seat),
            ServerMessage::Notice(NoticeMsg {
                notice: Notice::Join { seat, name },
            }),
        );
        if self.is_full() {
            self.start_countdown(now);
        }
        self.deliver();
        Ok(seat)
    }

    /// Applies the seat policy for a departing client. Mid-round the seat is
    /// held (snake crashed) until the round ends; otherwise seats are
    /// recompacted at once.
    pub fn disconnect(&mut self, client_id: ClientId, now: Instant) {
        let Some(seat) = self.seat_of(client_id) else {
            return;
        };
        let name = self.clients[seat].name.clone();

        if self.phase.round_active() {
            self.clients[seat].connected = false;
            if let Some(game) = self.game.as_mut() {
                let events = game.client_disconnect(seat, &mut self.outbox);
                self.apply_events(events, now);
            }
            tracing::info!(room = %self.key, client_id, seat, "Client left mid-round; seat held");
        } else {
            if self.phase == RoomPhase::Countdown {
                self.timers.cancel(TimerKind::Countdown);
                self.game = None;
                self.phase = RoomPhase::Filling;
                tracing::info!(room = %self.key, "Countdown aborted");
            }
            self.clients.remove(seat);
            self.points.remove(seat);
            tracing::info!(room = %self.key, client_id, seat, "Client left room");
        }

        self.outbox.emit(
            Audience::Room,
            ServerMessage::Notice(NoticeMsg {
                notice: Notice::Disconnect { seat, name },
            }),
        );
        if !self.phase.round_active() {
            self.emit_index();
        }
        self.outbox.flush();
        self.deliver();
    }

    /// Routes a position report into the running round.
    pub fn snake_update(&mut self, client_id: ClientId, update: &SnakeUpdateMsg, now: Instant) {
        if !self.phase.round_active() {
            return;
        }
        let Some(seat) = self.seat_of(client_id) else {
            return;
        };
        let rtt = self.clients[seat].rtt_ms();
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let events = game.update_snake(seat, update, rtt, &mut self.outbox);
        self.apply_events(events, now);
        self.outbox.flush();
        self.deliver();
    }

    pub fn chat(&mut self, client_id: ClientId, content: &str) {
        let Some(seat) = self.seat_of(client_id) else {
            return;
        };
        let content: String = content
            .trim()
            .chars()
            .filter(|c| !c.is_control())
            .take(MAX_CHAT_LEN)
            .collect();
        if content.is_empty() {
            return;
        }
        self.outbox.emit(
            Audience::AllExcept(seat),
            ServerMessage::ChatRelay(ChatRelayMsg {
                seat,
                name: self.clients[seat].name.clone(),
                content,
            }),
        );
        self.deliver();
    }

    pub fn record_rtt(&mut self, client_id: ClientId, sample_ms: u64) {
        if let Some(client) = self.clients.iter_mut().find(|c| c.id == client_id) {
            client.record_rtt(sample_ms);
        }
    }

    /// Advances the round by `delta_ms` and fires due timers.
    pub fn tick(&mut self, now: Instant, delta_ms: u64) {
        if self.phase.round_active()
            && let Some(game) = self.game.as_mut()
        {
            let rtts: Vec<u64> = self.clients.iter().map(Client::rtt_ms).collect();
            let events = game.tick(delta_ms, &rtts, &mut self.outbox);
            self.apply_events(events, now);
        }

        for timer in self.timers.take_due(now) {
            match timer {
                TimerKind::Countdown => self.start_round(),
                TimerKind::Gloat => self.next_round(now),
            }
        }

        self.outbox.flush();
        self.deliver();
    }

    fn start_countdown(&mut self, now: Instant) {
        let Some(level) = self.levels.get(self.level) else {
            tracing::error!(room = %self.key, "No levels available; cannot start a round");
            return;
        };
        let speed = self.tuning.round_speed(self.options.difficulty, self.round);
        let game = Game::new(
            level,
            self.clients.len(),
            speed,
            self.options.powerups,
            Arc::clone(&self.tuning),
        );
        let secs = self.tuning.countdown_secs;
        self.outbox.emit(
            Audience::Room,
            ServerMessage::GameCountdown(GameCountdownMsg {
                secs,
                level: self.level,
                snakes: game.snapshots(),
            }),
        );
        self.game = Some(game);
        self.phase = RoomPhase::Countdown;
        self.timers
            .schedule(TimerKind::Countdown, now + Duration::from_secs(secs));
        tracing::info!(room = %self.key, round = self.round + 1, speed, "Countdown started");
    }

    fn start_round(&mut self) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        self.phase = RoomPhase::InProgress;
        self.outbox.emit(
            Audience::Room,
            ServerMessage::GameStart(GameStartMsg {
                round: self.round + 1,
            }),
        );
        game.start(&mut self.outbox);
        tracing::info!(room = %self.key, round = self.round + 1, players = self.clients.len(), "Round started");
    }

    fn apply_events(&mut self, events: Vec<GameEvent>, now: Instant) {
        for event in events {
            match event {
                GameEvent::AppleEaten { seat } => self.award(seat, self.tuning.apple_points),
                GameEvent::Knockout { survivors } => {
                    for seat in survivors {
                        self.award(seat, self.tuning.knockout_points);
                    }
                },
                GameEvent::RoundEnded => self.end_round(now),
            }
        }
    }

    fn award(&mut self, seat: Seat, amount: i32) {
        if let Some(points) = self.points.get_mut(seat) {
            *points += amount;
            self.outbox.buffer(ServerMessage::ScoreUpdate(ScoreUpdateMsg {
                seat,
                points: *points,
            }));
        }
    }

    fn end_round(&mut self, now: Instant) {
        self.phase = RoomPhase::RoundEnded;
        let gloat_secs = self.tuning.round_gloat_secs;
        self.outbox.emit(
            Audience::Room,
            ServerMessage::Notice(NoticeMsg {
                notice: Notice::NewRound { gloat_secs },
            }),
        );
        self.timers
            .schedule(TimerKind::Gloat, now + Duration::from_secs(gloat_secs));
        tracing::info!(room = %self.key, round = self.round + 1, points = ?self.points, "Round ended");
    }

    fn next_round(&mut self, now: Instant) {
        self.purge_disconnected();
        self.game = None;
        let finished = self.round;
        self.round += 1;
        self.level = self.level.wrapping_add(1);
        if self.clients.is_empty() {
            return;
        }

        if let Some(winner) = match_winner(&self.points, finished, &self.tuning) {
            self.phase = RoomPhase::MatchEnded;
            self.timers.clear();
            self.emit_index();
            self.outbox.emit(
                Audience::Room,
                ServerMessage::MatchEnd(MatchEndMsg {
                    winner,
                    points: self.points.clone(),
                    special: self.options.special,
                    gloat_secs: self.tuning.match_gloat_secs,
                }),
            );
            tracing::info!(room = %self.key, winner, points = ?self.points, "Match ended");
            return;
        }

        self.emit_index();
        let needed = usize::from(self.options.capacity).min(2);
        if self.clients.len() < needed {
            self.phase = RoomPhase::Filling;
            tracing::info!(room = %self.key, players = self.clients.len(), "Waiting for players");
            return;
        }
        self.start_countdown(now);
    }

    /// Drops clients whose seats were held through the round.
    fn purge_disconnected(&mut self) {
        let clients = std::mem::take(&mut self.clients);
        let points = std::mem::take(&mut self.points);
        (self.clients, self.points) = clients
            .into_iter()
            .zip(points)
            .filter(|(client, _)| client.connected)
            .unzip();
    }

    /// Sends every client its personalised room snapshot.
    fn emit_index(&mut self) {
        let names: Vec<String> = self.clients.iter().map(|c| c.name.clone()).collect();
        for seat in 0..self.clients.len() {
            self.outbox.emit(
                Audience::Seat(seat),
                ServerMessage::RoomIndex(RoomIndexMsg {
                    seat,
                    capacity: self.options.capacity,
                    round: self.round,
                    key: self.key.clone(),
                    level: self.level,
                    names: names.clone(),
                    points: self.points.clone(),
                }),
            );
        }
    }

    /// Encodes queued messages once each and hands them to connected clients.
    fn deliver(&mut self) {
        for Outgoing { audience, message } in self.outbox.drain() {
            let data = match encode_server_message(&message) {
                Ok(data) => Bytes::from(data),
                Err(e) => {
                    tracing::error!(room = %self.key, error = %e, "Failed to encode server message");
                    continue;
                },
            };
            for (seat, client) in self.clients.iter().enumerate() {
                let wanted = match audience {
                    Audience::Room => true,
                    Audience::Seat(s) => s == seat,
                    Audience::AllExcept(s) => s != seat,
                };
                if wanted && client.connected {
                    client.send(&data, &self.key);
                }
            }
        }
    }
}
