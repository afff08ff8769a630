pub mod categories;
pub mod layer;
pub mod popup;
pub mod symbology;

pub use layer::*;
