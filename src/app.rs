//! Application module: exposes the app model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the transport, the terminal
//! views, the layout of the last frame and the selection.

mod model;

pub use model::*;
