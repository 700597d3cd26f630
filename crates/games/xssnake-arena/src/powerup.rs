use rand::Rng;
use xssnake_core::config::GameTuning;
use xssnake_core::snake::Snake;

/// Effect granted by picking up a powerup. Effects last for the rest of the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Powerup {
    Grow,
    Haste,
    Sluggish,
}

/// What a powerup changed, for the events the room needs to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerupOutcome {
    pub label: &'static str,
    pub size_changed: bool,
    pub speed_changed: bool,
}

impl Powerup {
    pub const ALL: [Powerup; 3] = [Powerup::Grow, Powerup::Haste, Powerup::Sluggish];

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    pub fn apply(self, snake: &mut Snake, tuning: &GameTuning) -> PowerupOutcome {
        match self {
            Powerup::Grow => {
                snake.size += tuning.powerup_grow;
                PowerupOutcome {
                    label: "Grow",
                    size_changed: true,
                    speed_changed: false,
                }
            },
            Powerup::Haste => {
                snake.speed = snake
                    .speed
                    .saturating_sub(tuning.powerup_speed_step_ms)
                    .max(tuning.speed_floor_ms)
                    .max(1);
                PowerupOutcome {
                    label: "Haste",
                    size_changed: false,
                    speed_changed: true,
                }
            },
            Powerup::Sluggish => {
                snake.speed = snake.speed.saturating_add(tuning.powerup_speed_step_ms);
                PowerupOutcome {
                    label: "Sluggish",
                    size_changed: false,
                    speed_changed: true,
                }
            },
        }
    }
}
