//! Error type shared by the audio backends, the track table and the analyzer.
//!
//! Nothing in the playback core surfaces these to the user: the adapter
//! boundary turns them into `false` or a fallback value and logs them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch of {locator} failed: {reason}")]
    Fetch { locator: String, reason: String },

    #[error("decode failed: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("no decodable audio track in {0}")]
    NoAudioTrack(String),

    #[error("audio output unavailable: {0}")]
    Output(String),

    #[error("malformed track table: {0}")]
    Table(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("playback start rejected: {0}")]
    PlayRejected(String),

    #[error("invalid locator: {0}")]
    Url(#[from] url::ParseError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
