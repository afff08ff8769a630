pub mod debounce;
pub mod event_bus;
pub mod metrics;

pub use debounce::*;
pub use event_bus::*;
pub use metrics::*;
