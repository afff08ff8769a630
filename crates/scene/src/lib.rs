pub mod entity;
pub mod query;
pub mod selection;
pub mod visibility;
pub mod world;

pub use entity::*;
pub use world::*;
