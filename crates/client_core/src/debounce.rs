//! Single-slot debounce timer.

use std::time::Duration;

use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

/// Identifies one armed timer; a superseded or cancelled ticket is never current again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DebounceTicket(u64);

/// Owns at most one pending task. `schedule` replaces it, `cancel` drops it.
///
/// Must be used from inside a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(DebounceTicket, JoinHandle<()>)>,
    issued: u64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            issued: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms a new timer; after `delay` without another `schedule`/`cancel`,
    /// `task` runs exactly once with the ticket returned here.
    pub fn schedule<F>(&mut self, task: F) -> DebounceTicket
    where
        F: FnOnce(DebounceTicket) + Send + 'static,
    {
        self.cancel();
        self.issued += 1;
        let ticket = DebounceTicket(self.issued);
        let deadline = Instant::now() + self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            task(ticket);
        });
        debug!(
            ticket = ticket.0,
            delay_ms = self.delay.as_millis() as u64,
            "debounce armed"
        );
        self.pending = Some((ticket, handle));
        ticket
    }

    pub fn cancel(&mut self) {
        if let Some((ticket, handle)) = self.pending.take() {
            handle.abort();
            debug!(ticket = ticket.0, "debounce cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Consumes a fired ticket. Returns false for tickets that were superseded
    /// or cancelled before their notification was handled.
    pub fn acknowledge(&mut self, ticket: DebounceTicket) -> bool {
        match &self.pending {
            Some((current, _)) if *current == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
