use serde::{Deserialize, Serialize};

/// Host-supplied timestamp in seconds.
///
/// The engine never reads a clock itself; hosts pass `Time` in, which keeps
/// debouncing deterministic under test.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Time(pub f64);

impl Time {
    pub fn from_millis(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn as_millis(self) -> f64 {
        self.0 * 1000.0
    }

    pub fn after_millis(self, ms: u64) -> Self {
        Time(self.0 + ms as f64 / 1000.0)
    }
}
