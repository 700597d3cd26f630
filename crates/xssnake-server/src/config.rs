use serde::Deserialize;

use xssnake_core::config::GameTuning;

/// Top-level server configuration, loaded from `xssnake.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Frequency of the shared room ticker.
    pub tick_rate_hz: u32,
    pub limits: LimitsConfig,
    pub game: GameTuning,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            tick_rate_hz: 20,
            limits: LimitsConfig::default(),
            game: GameTuning::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Outgoing frames queued per client before new ones are dropped.
    pub client_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 50.0,
            client_message_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Validate configuration. Exits on values the server cannot run with,
    /// warns about the rest.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.tick_rate_hz == 0 {
            tracing::error!("tick_rate_hz must be > 0");
            std::process::exit(1);
        }
        if self.tick_rate_hz > 1000 {
            tracing::warn!(
                tick_rate_hz = self.tick_rate_hz,
                "tick_rate_hz above 1000 gains nothing at millisecond resolution"
            );
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.client_message_buffer == 0 {
            tracing::error!("limits.client_message_buffer must be > 0");
            std::process::exit(1);
        }

        self.game.validate();
    }

    /// Load config from `XSSNAKE_CONFIG` (default `xssnake.toml`) if it
    /// exists, then apply env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("XSSNAKE_CONFIG").unwrap_or_else(|_| "xssnake.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to parse config, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path, "No config file found, using defaults");
                ServerConfig::default()
            },
        };

        // A dedicated tuning file replaces the [game] table.
        if std::env::var("XSSNAKE_TUNING").is_ok() {
            config.game = GameTuning::load();
        }

        if let Ok(addr) = std::env::var("XSSNAKE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("XSSNAKE_TICK_RATE")
            && let Ok(n) = val.parse::<u32>()
        {
            config.tick_rate_hz = n;
        }
        if let Ok(val) = std::env::var("XSSNAKE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("XSSNAKE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }

        config
    }
}
