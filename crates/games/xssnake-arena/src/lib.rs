pub mod collision;
pub mod outbox;
pub mod powerup;
pub mod reconcile;
pub mod scoring;
pub mod spawner;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use xssnake_core::config::GameTuning;
use xssnake_core::crash::{Crash, Seat};
use xssnake_core::grid::Coord;
use xssnake_core::level::Level;
use xssnake_core::net::messages::{
    DespawnMsg, Notice, NoticeMsg, ServerMessage, SnakeActionMsg, SnakeCrashMsg, SnakeSizeMsg,
    SnakeSnapshot, SnakeSpeedMsg, SnakeStateMsg, SnakeUpdateMsg, SpawnKind, SpawnMsg,
};
use xssnake_core::snake::{Snake, SnakeMotion};

use collision::detect_crash;
use outbox::{Audience, Outbox};
use powerup::Powerup;
use reconcile::AuthoritativeMotion;
use spawner::Spawner;

/// Something the room has to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    AppleEaten { seat: Seat },
    /// A snake died; everyone in `survivors` earns the knockout bonus.
    Knockout { survivors: Vec<Seat> },
    /// At most one snake is left standing.
    RoundEnded,
}

/// One round of play: the snakes, the spawns, and the authoritative clock.
pub struct Game {
    level: Arc<dyn Level>,
    snakes: Vec<Snake>,
    spawner: Spawner,
    tuning: Arc<GameTuning>,
    /// Milliseconds of simulated time since the round started.
    clock_ms: u64,
    started: bool,
    round_ended: bool,
    powerups: bool,
    next_spawn_ms: Option<u64>,
    rng: StdRng,
}

impl Game {
    pub fn new(
        level: Arc<dyn Level>,
        seats: usize,
        speed: u64,
        powerups: bool,
        tuning: Arc<GameTuning>,
    ) -> Self {
        let rng = StdRng::from_rng(&mut rand::rng());
        Self::with_rng(level, seats, speed, powerups, tuning, rng)
    }

    pub fn with_rng(
        level: Arc<dyn Level>,
        seats: usize,
        speed: u64,
        powerups: bool,
        tuning: Arc<GameTuning>,
        rng: StdRng,
    ) -> Self {
        let snakes = (0..seats)
            .map(|seat| {
                Snake::new(
                    level.spawn(seat),
                    level.spawn_direction(seat),
                    tuning.snake_size,
                    speed,
                )
            })
            .collect();
        Self {
            level,
            snakes,
            spawner: Spawner::new(),
            tuning,
            clock_ms: 0,
            started: false,
            round_ended: false,
            powerups,
            next_spawn_ms: None,
            rng,
        }
    }

    pub fn snakes(&self) -> &[Snake] {
        &self.snakes
    }

    pub fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_round_ended(&self) -> bool {
        self.round_ended
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn snapshots(&self) -> Vec<SnakeSnapshot> {
        self.snakes
            .iter()
            .enumerate()
            .map(|(seat, s)| SnakeSnapshot {
                seat,
                parts: s.parts.clone(),
                direction: s.direction,
                speed: s.speed,
                size: s.size,
                crashed: s.crashed,
            })
            .collect()
    }

    pub fn snake_state(&self, seat: Seat) -> Option<SnakeStateMsg> {
        self.snakes.get(seat).map(|s| SnakeStateMsg {
            seat,
            parts: s.parts.clone(),
            direction: s.direction,
        })
    }

    /// Messages describing every live spawn, for a client that needs the full board.
    pub fn spawn_messages(&self) -> Vec<ServerMessage> {
        self.spawner
            .spawns()
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| {
                slot.map(|s| {
                    ServerMessage::Spawn(SpawnMsg {
                        id,
                        kind: s.kind,
                        at: s.at,
                    })
                })
            })
            .collect()
    }

    /// Lets the snakes loose and drops the first apple.
    pub fn start(&mut self, out: &mut Outbox) {
        if self.started {
            return;
        }
        self.started = true;
        self.spawn(SpawnKind::Apple, out);
        if self.powerups {
            self.schedule_spawn();
        }
    }

    /// Advances the simulation by `delta_ms`. `rtts` holds each seat's
    /// smoothed round-trip estimate.
    pub fn tick(&mut self, delta_ms: u64, rtts: &[u64], out: &mut Outbox) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !self.started {
            return events;
        }
        self.clock_ms = self.clock_ms.saturating_add(delta_ms);

        if self.next_spawn_ms.is_some_and(|at| self.clock_ms >= at) {
            self.spawn_something(out);
        }

        for seat in 0..self.snakes.len() {
            // Limbo is held for at most one sync window, whatever the client claims.
            let rtt = rtts.get(seat).copied().unwrap_or(0).min(self.tuning.sync_ms);
            self.tick_seat(seat, delta_ms, rtt, out, &mut events);
        }
        events
    }

    /// Merges a client's position report into its snake (see [`reconcile`]).
    /// Rejected reports are answered with the server's own view of the snake.
    pub fn update_snake(
        &mut self,
        seat: Seat,
        update: &SnakeUpdateMsg,
        rtt_ms: u64,
        out: &mut Outbox,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !self.started {
            return events;
        }
        let Some(snake) = self.snakes.get_mut(seat) else {
            tracing::warn!(seat, "Snake update for unknown seat");
            return events;
        };
        if snake.crashed {
            return events;
        }

        let before = snake.parts.clone();
        let mut motion = AuthoritativeMotion::new(&self.tuning, snake.speed, rtt_ms);
        if let Err(rejection) = motion.reconcile(snake, update) {
            tracing::debug!(seat, %rejection, "Rejected snake update");
            if let Some(state) = self.snake_state(seat) {
                out.emit(Audience::Seat(seat), ServerMessage::SnakeState(state));
            }
            return events;
        }

        let parts = self.snakes[seat].parts.clone();
        let crash = detect_crash(
            self.level.as_ref(),
            &self.snakes,
            seat,
            &parts,
            self.tuning.self_collision_min_len,
            self.clock_ms,
        );
        match crash {
            Some(crash) => {
                // The colliding path is only reported; the body stays collision-free.
                let snake = &mut self.snakes[seat];
                snake.parts = before;
                snake.limbo = Some(crash);
                self.crash_snake(seat, true, out);
                self.check_round_ended(&mut events);
            },
            None => {
                self.snakes[seat].limbo = None;
                if let Some(head) = parts.last().copied() {
                    self.handle_hits(seat, head, out, &mut events);
                }
                if let Some(state) = self.snake_state(seat) {
                    out.emit(Audience::AllExcept(seat), ServerMessage::SnakeState(state));
                }
            },
        }
        events
    }

    /// Crashes the snake of a client that left mid-round.
    pub fn client_disconnect(&mut self, seat: Seat, out: &mut Outbox) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(snake) = self.snakes.get_mut(seat) else {
            return events;
        };
        if snake.crashed {
            return events;
        }
        snake.limbo = None;
        self.finalize_crash(seat, false, out);
        self.check_round_ended(&mut events);
        events
    }

    fn tick_seat(
        &mut self,
        seat: Seat,
        delta_ms: u64,
        rtt: u64,
        out: &mut Outbox,
        events: &mut Vec<GameEvent>,
    ) {
        let Some(snake) = self.snakes.get_mut(seat) else {
            return;
        };
        if snake.crashed {
            return;
        }
        snake.accumulate(delta_ms);
        while self.snakes[seat].take_step() {
            self.step(seat, rtt, out, events);
        }
    }

    /// One forced advance of a single snake.
    fn step(&mut self, seat: Seat, rtt: u64, out: &mut Outbox, events: &mut Vec<GameEvent>) {
        let now = self.clock_ms;
        let confirmed = self.snakes[seat]
            .limbo
            .as_ref()
            .is_some_and(|limbo| now.saturating_sub(limbo.time_ms) >= rtt);
        if confirmed {
            self.crash_snake(seat, true, out);
            self.check_round_ended(events);
            return;
        }

        let snake = &mut self.snakes[seat];
        let mut motion = AuthoritativeMotion::new(&self.tuning, snake.speed, rtt);
        let Some(next) = motion.advance(snake) else {
            return;
        };
        let predicted = snake.predict_parts(next);
        let crash = detect_crash(
            self.level.as_ref(),
            &self.snakes,
            seat,
            &predicted,
            self.tuning.self_collision_min_len,
            now,
        );

        let snake = &mut self.snakes[seat];
        match crash {
            Some(crash) => {
                if snake.limbo.is_none() {
                    tracing::debug!(seat, kind = ?crash.kind, "Snake entered limbo");
                    snake.limbo = Some(crash);
                }
            },
            None => {
                snake.limbo = None;
                snake.move_to(next);
                self.handle_hits(seat, next, out, events);
            },
        }
    }

    /// Finalizes a crash, taking a head-on opponent down with it.
    fn crash_snake(&mut self, seat: Seat, notice: bool, out: &mut Outbox) {
        if let Some(crash) = self.finalize_crash(seat, notice, out)
            && crash.draw
            && let Some(opponent) = crash.opponent
        {
            self.finalize_crash(opponent, false, out);
        }
    }

    /// Marks the snake crashed and broadcasts it. Returns the limbo crash the
    /// verdict was based on, if any. Crashed snakes are never finalized twice.
    fn finalize_crash(&mut self, seat: Seat, notice: bool, out: &mut Outbox) -> Option<Crash> {
        let snake = self.snakes.get_mut(seat)?;
        if snake.crashed {
            return None;
        }
        snake.crashed = true;
        let limbo = snake.limbo.take();
        let parts = limbo
            .as_ref()
            .map_or_else(|| snake.parts.clone(), |c| c.parts.clone());

        if let Some(crash) = &limbo {
            tracing::debug!(seat, kind = ?crash.kind, opponent = ?crash.opponent, "Snake crashed");
            if notice {
                out.emit(
                    Audience::Room,
                    ServerMessage::Notice(NoticeMsg {
                        notice: Notice::Crash {
                            seat,
                            kind: crash.kind,
                            opponent: crash.opponent,
                            draw: crash.draw,
                        },
                    }),
                );
            }
        }
        out.emit(
            Audience::Room,
            ServerMessage::SnakeCrash(SnakeCrashMsg { seat, parts }),
        );
        limbo
    }

    fn check_round_ended(&mut self, events: &mut Vec<GameEvent>) {
        let survivors: Vec<Seat> = self
            .snakes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.crashed)
            .map(|(seat, _)| seat)
            .collect();
        let crashed = self.snakes.len() - survivors.len();
        events.push(GameEvent::Knockout { survivors });

        if !self.round_ended && crashed + 1 >= self.snakes.len() {
            self.round_ended = true;
            tracing::debug!(crashed, "Round ended");
            events.push(GameEvent::RoundEnded);
        }
    }

    fn handle_hits(
        &mut self,
        seat: Seat,
        head: Coord,
        out: &mut Outbox,
        events: &mut Vec<GameEvent>,
    ) {
        for (id, spawn) in self.spawner.handle_hits(head) {
            out.buffer(ServerMessage::Despawn(DespawnMsg { id }));
            match spawn.kind {
                SpawnKind::Apple => {
                    let snake = &mut self.snakes[seat];
                    snake.size += self.tuning.apple_growth;
                    out.buffer(ServerMessage::SnakeSize(SnakeSizeMsg {
                        seat,
                        size: snake.size,
                    }));
                    out.buffer(ServerMessage::SnakeAction(SnakeActionMsg {
                        seat,
                        label: "Nom".to_string(),
                    }));
                    events.push(GameEvent::AppleEaten { seat });
                    if self.spawner.num_of_type(SpawnKind::Apple) == 0 {
                        self.spawn(SpawnKind::Apple, out);
                    }
                },
                SpawnKind::Powerup => {
                    let effect = Powerup::random(&mut self.rng);
                    let snake = &mut self.snakes[seat];
                    let outcome = effect.apply(snake, &self.tuning);
                    if outcome.size_changed {
                        out.buffer(ServerMessage::SnakeSize(SnakeSizeMsg {
                            seat,
                            size: snake.size,
                        }));
                    }
                    if outcome.speed_changed {
                        out.buffer(ServerMessage::SnakeSpeed(SnakeSpeedMsg {
                            seat,
                            speed: snake.speed,
                        }));
                    }
                    out.buffer(ServerMessage::SnakeAction(SnakeActionMsg {
                        seat,
                        label: outcome.label.to_string(),
                    }));
                },
            }
        }
    }

    fn spawn(&mut self, kind: SpawnKind, out: &mut Outbox) {
        let occupied: Vec<Coord> = self
            .snakes
            .iter()
            .flat_map(|s| s.parts.iter().copied())
            .collect();
        match self
            .spawner
            .spawn(kind, self.level.as_ref(), &occupied, &mut self.rng)
        {
            Some((id, spawn)) => out.buffer(ServerMessage::Spawn(SpawnMsg {
                id,
                kind,
                at: spawn.at,
            })),
            None => tracing::debug!(?kind, "No free cell to spawn on"),
        }
    }

    fn schedule_spawn(&mut self) {
        let min = self.tuning.spawn_min_secs;
        let max = self.tuning.spawn_max_secs.max(min);
        let delay_ms = self.rng.random_range(min..=max).saturating_mul(1000);
        self.next_spawn_ms = Some(self.clock_ms.saturating_add(delay_ms));
    }

    fn spawn_something(&mut self, out: &mut Outbox) {
        let kind = if self.rng.random::<f64>() < self.tuning.spawn_apple_chance {
            SpawnKind::Apple
        } else {
            SpawnKind::Powerup
        };
        self.spawn(kind, out);
        self.schedule_spawn();
    }
}
