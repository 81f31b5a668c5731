//! Timer-driven debounce state machine.
//!
//! A pushed value stays pending until no newer value has arrived for the
//! configured interval; [`Debouncer::poll`] then commits it. Time is passed
//! in explicitly so the machine can be stepped without a runtime clock.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    interval: Duration,
    committed: T,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    pub fn new(initial: T, interval: Duration) -> Self {
        Self {
            interval,
            committed: initial,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Last committed value.
    pub fn value(&self) -> &T {
        &self.committed
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|pending| &pending.value)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Restarts the timer with `value`. Pushing the committed value back
    /// cancels whatever was pending.
    pub fn push(&mut self, value: T, now: Instant) {
        if value == self.committed {
            self.pending = None;
            return;
        }
        self.pending = Some(Pending {
            value,
            deadline: now + self.interval,
        });
    }

    /// Commits the pending value if its deadline has passed. Returns true
    /// when the committed value changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match &self.pending {
            Some(pending) if pending.deadline <= now => self.flush(),
            _ => false,
        }
    }

    /// Commits the pending value immediately.
    pub fn flush(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                let changed = pending.value != self.committed;
                self.committed = pending.value;
                changed
            }
            None => false,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
