use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/wavedeck/config.toml` or `~/.config/wavedeck/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `WAVEDECK__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub waveform: WaveformSettings,
    pub controls: ControlsSettings,
    pub library: LibrarySettings,
    pub analyze: AnalyzeSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendSetting {
    /// Decoded-buffer playback for http(s) bases, element playback for local directories.
    Auto,
    #[serde(alias = "native", alias = "sink")]
    Element,
    #[serde(alias = "decoded", alias = "decoded-buffer")]
    Buffer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub backend: BackendSetting,
    /// Volume applied to every track at startup, 0.0..=1.0.
    pub initial_volume: f64,
    /// Volume restored on unmute when the volume was exactly zero at mute time.
    pub mute_restore_floor: f64,
    /// Cadence of the element backend's progress signal (milliseconds).
    pub progress_interval_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            backend: BackendSetting::Auto,
            initial_volume: 0.8,
            mute_restore_floor: 0.1,
            progress_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveformSettings {
    /// Width of one bar in surface pixels (terminal columns).
    pub bar_width: u32,
    /// Gap after each bar in surface pixels.
    pub bar_spacing: u32,
    /// Terminal rows used by each waveform (two pixels per row).
    pub rows: u16,
    pub played_color: String,
    pub hover_color: String,
    pub unplayed_color: String,
    /// Quiet period before a burst of resize notifications is acted upon.
    pub resize_debounce_ms: u64,
}

impl Default for WaveformSettings {
    fn default() -> Self {
        Self {
            bar_width: 1,
            bar_spacing: 1,
            rows: 2,
            played_color: "#e0a030".to_string(),
            hover_color: "#f5f5f5".to_string(),
            unplayed_color: "#5a5a5a".to_string(),
            resize_debounce_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Seconds skipped by the arrow keys.
    pub seek_small_seconds: f64,
    /// Seconds skipped by the arrow keys with Shift held.
    pub seek_large_seconds: f64,
    /// Step used by `+` / `-`.
    pub volume_step: f64,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            seek_small_seconds: 5.0,
            seek_large_seconds: 30.0,
            volume_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Track table produced by `wavedeck analyze`.
    pub data_file: String,
    /// Directory or http(s) URL that each track's file reference is resolved against.
    pub base: String,
    /// Start the deep-linked track right away instead of only centring it.
    pub autoplay_deep_link: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            data_file: "music/music.js".to_string(),
            base: "music".to_string(),
            autoplay_deep_link: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzeSettings {
    /// File extensions to analyze (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Length of each amplitude summary.
    pub bins: usize,
    /// Output file written by the analyzer.
    pub output: String,
}

impl Default for AnalyzeSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["m4a".into()],
            bins: 200,
            output: "music.js".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file: String,
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: "/tmp/wavedeck.log".to_string(),
            level: "info".to_string(),
        }
    }
}
