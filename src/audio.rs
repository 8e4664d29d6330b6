//! Playback adapters and their backends.
//!
//! Every track owns one [`PlaybackAdapter`]: either a [`NativeElementAdapter`]
//! streaming a local file, or a [`DecodedBufferAdapter`] that decodes the whole
//! resource and plays it through the shared output.

pub mod adapter;
pub mod buffer;
pub mod decode;
pub mod element;
pub mod sink;
pub mod types;

pub use adapter::{PlaybackAdapter, Subscribers};
pub use buffer::{AudioGraph, BufferLoader, DecodedBufferAdapter, Voice};
pub use decode::DecodedAudio;
pub use element::{MediaElement, NativeElementAdapter};
pub use types::{ElementSignal, PlaybackEvent, SubscriptionId};
