pub mod error;
pub mod recording;
pub mod surface;

pub use error::*;
pub use surface::*;
