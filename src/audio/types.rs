//! Small shared types of the playback adapters.

/// Occurrences an adapter publishes to its subscribers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlaybackEvent {
    /// Periodic while playing.
    Progress,
    /// Playback ran off the end by itself. Never sent for pause or seek.
    Completed,
    /// The authoritative duration became known.
    Ready,
}

pub type SubscriptionId = u64;

/// Native notifications from a [`MediaElement`](super::element::MediaElement).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ElementSignal {
    TimeUpdate,
    Ended,
    LoadedMetadata,
}
