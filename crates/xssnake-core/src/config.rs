use serde::{Deserialize, Serialize};

use crate::room::Difficulty;

/// Data-driven gameplay and netcode tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameTuning {
    /// Length of generated room keys.
    pub room_key_length: usize,
    /// Largest allowed room capacity, also the default.
    pub room_capacity: u8,
    /// Rounds after which a winner may be declared.
    pub rounds_max: u32,
    /// Margin the leader needs over the runner-up to win the match.
    pub win_by_min: i32,
    /// Points for every survivor when a snake is knocked out.
    pub knockout_points: i32,
    pub apple_points: i32,
    /// Cells added to a snake's size per apple.
    pub apple_growth: usize,
    pub countdown_secs: u64,
    /// Pause between the end of a round and the next countdown.
    pub round_gloat_secs: u64,
    /// Pause reported to clients when the match is decided.
    pub match_gloat_secs: u64,
    pub snake_size: usize,
    /// Milliseconds per cell for each difficulty.
    pub speed_easy_ms: u64,
    pub speed_medium_ms: u64,
    pub speed_hard_ms: u64,
    /// Speed-up applied per round already played.
    pub speed_step_ms: u64,
    /// Fastest a snake may get.
    pub speed_floor_ms: u64,
    /// Window of recent movement trusted from a client.
    pub sync_ms: u64,
    /// Extra latency slack in the mismatch budget.
    pub mismatch_slack_ms: u64,
    /// Shortest body that can collide with itself.
    pub self_collision_min_len: usize,
    pub ping_interval_ms: u64,
    pub spawn_min_secs: u64,
    pub spawn_max_secs: u64,
    /// Probability that a periodic spawn is an apple rather than a powerup.
    pub spawn_apple_chance: f64,
    /// Size added by the Grow powerup.
    pub powerup_grow: usize,
    /// Speed change applied by the Haste and Sluggish powerups.
    pub powerup_speed_step_ms: u64,
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            room_key_length: 5,
            room_capacity: 6,
            rounds_max: 3,
            win_by_min: 2,
            knockout_points: 2,
            apple_points: 1,
            apple_growth: 3,
            countdown_secs: 3,
            round_gloat_secs: 5,
            match_gloat_secs: 10,
            snake_size: 4,
            speed_easy_ms: 150,
            speed_medium_ms: 120,
            speed_hard_ms: 100,
            speed_step_ms: 5,
            speed_floor_ms: 60,
            sync_ms: 500,
            mismatch_slack_ms: 20,
            self_collision_min_len: 5,
            ping_interval_ms: 3000,
            spawn_min_secs: 20,
            spawn_max_secs: 60,
            spawn_apple_chance: 0.9,
            powerup_grow: 5,
            powerup_speed_step_ms: 20,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl GameTuning {
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::Parse)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::parse(&contents)
    }

    /// Load tuning from `XSSNAKE_TUNING` or `config/xssnake.toml`, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("XSSNAKE_TUNING") {
            match Self::from_file(&path) {
                Ok(tuning) => return tuning,
                Err(e) => tracing::warn!(path = %path, error = %e, "Ignoring tuning file"),
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/xssnake.toml") {
            match Self::parse(&contents) {
                Ok(tuning) => return tuning,
                Err(e) => tracing::warn!(error = %e, "Ignoring config/xssnake.toml"),
            }
        }
        Self::default()
    }

    /// Starting speed for a round, after `rounds_played` completed rounds.
    pub fn round_speed(&self, difficulty: Difficulty, rounds_played: u32) -> u64 {
        let base = match difficulty {
            Difficulty::Easy => self.speed_easy_ms,
            Difficulty::Medium => self.speed_medium_ms,
            Difficulty::Hard => self.speed_hard_ms,
        };
        let ramp = self.speed_step_ms.saturating_mul(u64::from(rounds_played));
        base.saturating_sub(ramp).max(self.speed_floor_ms).max(1)
    }

    /// Number of most recent cells trusted from a client update.
    pub fn sync_window(&self, speed: u64) -> usize {
        (self.sync_ms / speed.max(1)).max(1) as usize
    }

    /// How many server-side cells past the anchor a client may be missing.
    pub fn max_mismatches(&self, rtt_ms: u64, speed: u64) -> usize {
        let latency = rtt_ms.min(self.sync_ms) + self.mismatch_slack_ms;
        latency.div_ceil(speed.max(1)) as usize
    }

    /// Logs warnings for values that make the game unplayable.
    pub fn validate(&self) {
        if self.room_capacity == 0 {
            tracing::warn!("game.room_capacity is 0; no room can ever be joined");
        }
        if self.spawn_min_secs > self.spawn_max_secs {
            tracing::warn!(
                min = self.spawn_min_secs,
                max = self.spawn_max_secs,
                "game.spawn_min_secs exceeds spawn_max_secs; using min for both"
            );
        }
        if !(0.0..=1.0).contains(&self.spawn_apple_chance) {
            tracing::warn!(
                chance = self.spawn_apple_chance,
                "game.spawn_apple_chance outside 0..=1"
            );
        }
        if self.speed_floor_ms == 0 {
            tracing::warn!("game.speed_floor_ms is 0; snakes may move every tick");
        }
    }
}
