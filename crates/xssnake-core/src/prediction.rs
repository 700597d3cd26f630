use std::collections::VecDeque;

use crate::grid::{Coord, Direction, is_contiguous};
use crate::net::messages::{SnakeStateMsg, SnakeUpdateMsg};
use crate::snake::{Snake, SnakeMotion, UpdateRejection};

/// Turns a client may queue ahead of its snake.
pub const MAX_PENDING_TURNS: usize = 2;

/// Client-side motion: local turns are applied immediately and the server's
/// corrections replace the local body outright.
#[derive(Debug, Default, Clone)]
pub struct PredictedMotion {
    pending: VecDeque<Direction>,
}

impl PredictedMotion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a turn. Only quarter turns relative to the last queued heading
    /// are accepted, and at most [`MAX_PENDING_TURNS`] may wait.
    pub fn request_turn(&mut self, snake: &Snake, direction: Direction) -> bool {
        if self.pending.len() >= MAX_PENDING_TURNS {
            return false;
        }
        let last = self.pending.back().copied().unwrap_or(snake.direction);
        match last.quarter_turns_to(direction) {
            1 | 3 => {
                self.pending.push_back(direction);
                true
            },
            _ => false,
        }
    }

    pub fn pending_turns(&self) -> usize {
        self.pending.len()
    }

    /// The update a client sends after moving: its most recent `window` cells.
    pub fn update_message(snake: &Snake, window: usize) -> SnakeUpdateMsg {
        SnakeUpdateMsg {
            parts: snake.tail_window(window).to_vec(),
            direction: snake.direction,
        }
    }
}

impl SnakeMotion for PredictedMotion {
    type Update = SnakeStateMsg;

    fn advance(&mut self, snake: &mut Snake) -> Option<Coord> {
        if let Some(direction) = self.pending.pop_front() {
            snake.direction = direction;
        }
        snake.peek_next()
    }

    fn reconcile(
        &mut self,
        snake: &mut Snake,
        update: &SnakeStateMsg,
    ) -> Result<(), UpdateRejection> {
        if update.parts.is_empty() {
            return Err(UpdateRejection::NoCommon);
        }
        if !is_contiguous(&update.parts) {
            return Err(UpdateRejection::Gap);
        }
        snake.parts.clone_from(&update.parts);
        snake.direction = update.direction;
        self.pending.clear();
        Ok(())
    }
}
