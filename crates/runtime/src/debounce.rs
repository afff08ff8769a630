use foundation::time::Time;

#[derive(Debug, Clone, PartialEq)]
struct Pending<T> {
    value: T,
    due: Time,
}

/// Trailing-edge debouncer driven by host time.
///
/// Each `schedule` replaces the pending value and restarts the quiet period.
/// The value is released by the first `poll` at or after its due time.
#[derive(Debug, Clone, PartialEq)]
pub struct Debouncer<T> {
    quiet_period_ms: u64,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet_period_ms: u64) -> Self {
        Self {
            quiet_period_ms,
            pending: None,
        }
    }

    pub fn quiet_period_ms(&self) -> u64 {
        self.quiet_period_ms
    }

    /// Schedules `value` and returns the time it becomes due.
    pub fn schedule(&mut self, value: T, now: Time) -> Time {
        let due = now.after_millis(self.quiet_period_ms);
        self.pending = Some(Pending { value, due });
        due
    }

    pub fn poll(&mut self, now: Time) -> Option<T> {
        match &self.pending {
            Some(p) if now >= p.due => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Drops the pending value. Returns `true` if something was discarded.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|p| &p.value)
    }

    pub fn due_at(&self) -> Option<Time> {
        self.pending.as_ref().map(|p| p.due)
    }
}
