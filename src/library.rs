//! Track table model, loading and the offline analyzer that produces it.

pub mod display;
pub mod model;
pub mod scan;
pub mod table;

pub use model::{Locator, TrackRecord};

#[cfg(test)]
mod tests;
