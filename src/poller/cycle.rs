//! Poll cycle bookkeeping
//!
//! Pure state machine driven by explicit timestamps: `Idle -> Collecting ->
//! Idle` with an orthogonal paused flag. The worker task and host calls feed
//! it `Instant`s; nothing in here reads the clock.

use std::time::{Duration, Instant};

/// Scheduling state of the background device collection
#[derive(Debug, Clone)]
pub struct PollCycleState {
    next_collection_time: Instant,
    last_cycle_duration: Option<Duration>,
    valid_until: Option<Instant>,
    paused: bool,
    collecting: bool,
    running: bool,
}

impl PollCycleState {
    /// Create the state with an explicit initial pause flag
    ///
    /// The flag holds until the first [`touch`](Self::touch); after that the
    /// pause is derived from the validity window alone.
    #[must_use]
    pub const fn new(now: Instant, paused: bool) -> Self {
        Self {
            next_collection_time: now,
            last_cycle_duration: None,
            valid_until: None,
            paused,
            collecting: false,
            running: false,
        }
    }

    /// Whether the host has stopped consuming data
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Re-evaluate the pause flag at `now` and return it
    pub fn refresh_paused(&mut self, now: Instant) -> bool {
        if let Some(valid_until) = self.valid_until {
            self.paused = now > valid_until;
        }
        self.paused
    }

    /// Record host activity: push the validity window to `now + timeout`
    ///
    /// Returns whether the poller was paused before this touch, i.e. this is
    /// the first host call after an idle period.
    pub fn touch(&mut self, now: Instant, timeout: Duration) -> bool {
        let was_paused = self.refresh_paused(now);
        self.valid_until = Some(now + timeout);
        self.refresh_paused(now);
        was_paused
    }

    /// Make a collection eligible immediately
    pub const fn expedite(&mut self, now: Instant) {
        self.next_collection_time = now;
    }

    /// Whether a collection should start at `now`
    #[must_use]
    pub fn should_collect(&self, now: Instant) -> bool {
        !self.paused && !self.collecting && now >= self.next_collection_time
    }

    /// Enter `Collecting`
    pub const fn begin_collection(&mut self) {
        self.collecting = true;
    }

    /// Leave `Collecting`: schedule the next cycle and record its duration
    pub fn finish_collection(&mut self, now: Instant, started: Instant, interval: Duration) {
        self.collecting = false;
        self.next_collection_time = now + interval;
        self.last_cycle_duration = Some(now.saturating_duration_since(started));
    }

    /// Push the next cycle out without recording a duration
    pub fn reschedule(&mut self, now: Instant, interval: Duration) {
        self.next_collection_time = now + interval;
    }

    /// Back to the freshly constructed, paused state
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now, true);
    }

    #[must_use]
    pub const fn next_collection_time(&self) -> Instant {
        self.next_collection_time
    }

    /// Duration of the last completed collection
    #[must_use]
    pub const fn last_cycle_duration(&self) -> Option<Duration> {
        self.last_cycle_duration
    }

    #[must_use]
    pub const fn valid_until(&self) -> Option<Instant> {
        self.valid_until
    }

    #[must_use]
    pub const fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Whether a worker task is alive
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub const fn set_running(&mut self, running: bool) {
        self.running = running;
    }
}
