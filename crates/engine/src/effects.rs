use foundation::time::Time;
use serde::Serialize;

/// Side effects the host has to carry out on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEffect {
    /// Scroll the sidebar so the (now first) selected row is visible.
    ScrollListToTop,
    /// Navigate, adding a history entry.
    PushRoute { path: String },
    /// Navigate without a history entry (redirects).
    ReplaceRoute { path: String },
    /// Call `tick` at or after `at`.
    ScheduleTick { at: Time },
}
