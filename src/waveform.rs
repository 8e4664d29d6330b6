//! Waveform bars: amplitude resampling and drawing onto a pixel surface.

pub mod render;
pub mod resample;

pub use render::{BarGeometry, DrawSurface, Palette, WaveformFrame, render};
pub use resample::{bar_count, resample};

#[cfg(test)]
mod tests;
