//! Settings for playback, waveform drawing, controls, the library and logging.
//!
//! `schema` holds the typed sections with their defaults, `load` layers the
//! optional config file and `WAVEDECK__` environment variables on top.

mod load;
mod schema;

pub use schema::*;
