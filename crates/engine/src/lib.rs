pub mod config;
pub mod controller;
pub mod effects;
pub mod error;
pub mod read_model;
pub mod reconcile;
pub mod view_mode;

pub use config::*;
pub use controller::*;
pub use effects::*;
pub use error::*;
