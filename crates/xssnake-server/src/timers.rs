use tokio::time::Instant;

/// Room-level scheduled transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Countdown finished; let the snakes loose.
    Countdown,
    /// Post-round pause finished; move on to the next round.
    Gloat,
}

/// Deadlines owned by a room. At most one entry per kind. Dropping the owner
/// drops every pending deadline with it.
#[derive(Debug, Default)]
pub struct Timers {
    entries: Vec<(TimerKind, Instant)>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` at `at`, replacing any earlier deadline of that kind.
    pub fn schedule(&mut self, kind: TimerKind, at: Instant) {
        self.cancel(kind);
        self.entries.push((kind, at));
    }

    /// Returns true if a deadline was pending.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != kind);
        self.entries.len() != before
    }

    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.entries.iter().any(|(k, _)| *k == kind)
    }

    /// Removes and returns every timer whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(TimerKind, Instant)> = Vec::new();
        self.entries.retain(|&(kind, at)| {
            if at <= now {
                due.push((kind, at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(_, at)| at);
        due.into_iter().map(|(kind, _)| kind).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
