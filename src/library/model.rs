use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use crate::error::Result;

use super::display::slug_for;

/// One row of the track table.
///
/// Immutable once loaded; every controller holds it behind an `Rc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    /// Audio resource relative to the library base.
    pub file_reference: String,
    pub artist: String,
    pub title: String,
    pub date: String,
    pub genre: String,
    /// Duration from tags, used until the backend knows better.
    pub nominal_duration: f64,
    pub details_markup: Option<String>,
    /// Base64 encoded cover image.
    pub cover_image: Option<String>,
    /// Normalised peaks in `0.0..=1.0`, in chronological order.
    pub amplitude: Vec<f32>,
    pub fingerprint: Option<String>,
}

impl TrackRecord {
    /// Fragment identifier for this track.
    pub fn slug(&self) -> String {
        slug_for(&self.file_reference)
    }

    /// `artist - title`, or whichever of the two is present.
    pub fn display(&self) -> String {
        let artist = self.artist.trim();
        let title = self.title.trim();
        match (artist.is_empty(), title.is_empty()) {
            (false, false) => format!("{artist} - {title}"),
            (true, false) => title.to_string(),
            (false, true) => artist.to_string(),
            (true, true) => self.file_reference.clone(),
        }
    }

    /// Positional encoding written by the analyzer.
    ///
    /// The amplitude summary is stored as a JSON string inside the row.
    pub fn to_row(&self) -> Value {
        let amplitude = Value::Array(
            self.amplitude
                .iter()
                .map(|&a| Value::from(f64::from(a)))
                .collect(),
        );
        let mut row = vec![
            Value::from(self.file_reference.as_str()),
            Value::from(self.artist.as_str()),
            Value::from(self.title.as_str()),
            Value::from(self.date.as_str()),
            Value::from(self.genre.as_str()),
            duration_value(self.nominal_duration),
            Value::from(self.details_markup.clone().unwrap_or_default()),
            Value::from(self.cover_image.clone().unwrap_or_default()),
            Value::from(amplitude.to_string()),
        ];
        if let Some(fp) = &self.fingerprint {
            row.push(Value::from(fp.as_str()));
        }
        Value::Array(row)
    }
}

fn duration_value(seconds: f64) -> Value {
    if seconds.fract() == 0.0 && seconds.abs() < i64::MAX as f64 {
        Value::from(seconds as i64)
    } else {
        Value::from(seconds)
    }
}

/// Where a track's bytes live: a local file or an http(s) resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Path(PathBuf),
    Url(Url),
    /// A reference that could not be joined to the base; loading it fails.
    Unresolved(String),
}

impl Locator {
    /// Resolve `file_reference` against the library base.
    ///
    /// Bases starting with `http://` or `https://` produce URLs, anything else is
    /// treated as a directory.
    pub fn resolve(base: &str, file_reference: &str) -> Result<Self> {
        if is_remote_base(base) {
            let mut base = base.to_string();
            if !base.ends_with('/') {
                base.push('/');
            }
            let url = Url::parse(&base)?.join(file_reference)?;
            return Ok(Locator::Url(url));
        }
        Ok(Locator::Path(Path::new(base).join(file_reference)))
    }

    /// Lowercased extension, used as a decoder hint.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Locator::Path(p) => p.file_name()?.to_str()?.to_string(),
            Locator::Url(u) => u.path_segments()?.next_back()?.to_string(),
            Locator::Unresolved(_) => return None,
        };
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Path(p) => write!(f, "{}", p.display()),
            Locator::Url(u) => write!(f, "{u}"),
            Locator::Unresolved(r) => f.write_str(r),
        }
    }
}

pub fn is_remote_base(base: &str) -> bool {
    let lower = base.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
