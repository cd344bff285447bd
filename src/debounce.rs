//! Depth-1 command window.
//!
//! Requests submitted within `window` of each other collapse into one; the
//! newest request wins and fires once the window has elapsed without a newer
//! submission.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct PendingCommand<T> {
    command: T,
    deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct CommandDebouncer<T> {
    window: Duration,
    pending: Option<PendingCommand<T>>,
}

impl<T> CommandDebouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Queues `command`, replacing any pending one. Returns the replaced command.
    pub fn submit(&mut self, command: T, now: Instant) -> Option<T> {
        let deadline = now + self.window;
        self.pending
            .replace(PendingCommand { command, deadline })
            .map(|replaced| replaced.command)
    }

    /// Takes the pending command if its window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.deadline <= now);
        if !due {
            return None;
        }
        self.pending.take().map(|pending| pending.command)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|pending| &pending.command)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.command)
    }

    /// Rewrites the pending command in place; `None` from `f` drops it.
    pub fn retain_map<F>(&mut self, f: F)
    where
        F: FnOnce(T) -> Option<T>,
    {
        if let Some(pending) = self.pending.take() {
            let deadline = pending.deadline;
            self.pending = f(pending.command).map(|command| PendingCommand { command, deadline });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CommandDebouncer;
    use std::time::{Duration, Instant};

    #[test]
    fn test_command_fires_after_window() {
        let start = Instant::now();
        let mut debouncer = CommandDebouncer::new(Duration::from_millis(300));
        assert!(debouncer.submit("a", start).is_none());
        assert_eq!(debouncer.take_due(start + Duration::from_millis(299)), None);
        assert_eq!(debouncer.take_due(start + Duration::from_millis(300)), Some("a"));
        assert_eq!(debouncer.take_due(start + Duration::from_millis(900)), None);
    }

    #[test]
    fn test_burst_collapses_to_newest_and_extends_window() {
        let start = Instant::now();
        let mut debouncer = CommandDebouncer::new(Duration::from_millis(300));
        debouncer.submit("a", start);
        assert_eq!(
            debouncer.submit("b", start + Duration::from_millis(50)),
            Some("a")
        );
        assert_eq!(debouncer.take_due(start + Duration::from_millis(320)), None);
        assert_eq!(debouncer.take_due(start + Duration::from_millis(350)), Some("b"));
    }

    #[test]
    fn test_retain_map_can_drop_pending_command() {
        let start = Instant::now();
        let mut debouncer = CommandDebouncer::new(Duration::from_millis(300));
        debouncer.submit(3usize, start);
        debouncer.retain_map(|value| Some(value - 1));
        assert_eq!(debouncer.pending(), Some(&2));
        debouncer.retain_map(|_| None);
        assert!(debouncer.next_deadline().is_none());
    }
}
