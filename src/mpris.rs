use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use zbus::object_server::SignalEmitter;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedValue, Value};

use crate::host::{MediaMetadata, MediaSession, PlaybackState};
use crate::transport::MediaAction;

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Raise,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative offset in microseconds.
    Seek(i64),
    /// Absolute position in microseconds.
    SetPosition(i64),
}

impl ControlCmd {
    /// The transport action behind a bus command; `None` for window-level commands.
    pub fn media_action(&self) -> Option<MediaAction> {
        let action = match *self {
            ControlCmd::Quit | ControlCmd::Raise => return None,
            ControlCmd::Play => MediaAction::Play,
            ControlCmd::Pause => MediaAction::Pause,
            ControlCmd::PlayPause => MediaAction::PlayPause,
            ControlCmd::Stop => MediaAction::Stop,
            ControlCmd::Next => MediaAction::Next,
            ControlCmd::Prev => MediaAction::Previous,
            ControlCmd::Seek(us) if us >= 0 => MediaAction::SeekForward(Some(micros_to_secs(us))),
            ControlCmd::Seek(us) => MediaAction::SeekBackward(Some(micros_to_secs(-us))),
            ControlCmd::SetPosition(us) => MediaAction::SeekTo(micros_to_secs(us.max(0))),
        };
        Some(action)
    }
}

fn micros_to_secs(us: i64) -> f64 {
    us as f64 / 1_000_000.0
}

fn secs_to_micros(secs: f64) -> i64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1_000_000.0).round() as i64
    } else {
        0
    }
}

#[derive(Debug)]
struct SharedState {
    playback: PlaybackState,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    art_url: Option<String>,
    length_micros: Option<i64>,
    position_micros: i64,
    track_id: Option<ObjectPath<'static>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            playback: PlaybackState::Stopped,
            title: None,
            artist: Vec::new(),
            album: None,
            art_url: None,
            length_micros: None,
            position_micros: 0,
            track_id: None,
        }
    }
}

/// UI-side half of the MPRIS bridge.
pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    /// Wakes the bus thread to emit `PropertiesChanged`.
    notify: Sender<()>,
    covers: RefCell<Vec<PathBuf>>,
}

impl MprisHandle {
    fn changed(&self) {
        let _ = self.notify.send(());
    }

    /// Decode a base64 cover into a temp file and return its `file://` URL.
    fn write_cover(&self, index: usize, encoded: &str) -> Option<String> {
        let bytes = match STANDARD.decode(encoded.trim()) {
            Ok(b) if !b.is_empty() => b,
            Ok(_) => return None,
            Err(e) => {
                log::debug!("cover of track {index} is not base64: {e}");
                return None;
            }
        };
        let path = std::env::temp_dir().join(format!(
            "wavedeck-{}-cover-{index}",
            std::process::id()
        ));
        if let Err(e) = std::fs::write(&path, bytes) {
            log::warn!("could not write cover art to {}: {e}", path.display());
            return None;
        }
        let url = url::Url::from_file_path(&path).ok().map(|u| u.to_string());
        let mut covers = self.covers.borrow_mut();
        if !covers.contains(&path) {
            covers.push(path);
        }
        url
    }
}

impl MediaSession for MprisHandle {
    fn set_metadata(&self, meta: &MediaMetadata) {
        let art_url = meta
            .artwork
            .as_deref()
            .and_then(|a| self.write_cover(meta.index, a));
        if let Ok(mut s) = self.state.lock() {
            s.title = Some(meta.title.clone()).filter(|t| !t.trim().is_empty());
            s.artist = if meta.artist.trim().is_empty() {
                Vec::new()
            } else {
                vec![meta.artist.clone()]
            };
            s.album = Some(meta.album.clone()).filter(|a| !a.trim().is_empty());
            s.art_url = art_url;
            s.length_micros = Some(secs_to_micros(meta.duration)).filter(|&l| l > 0);
            s.position_micros = 0;
            s.track_id =
                ObjectPath::try_from(format!("{OBJECT_PATH}/track/{}", meta.index)).ok();
        }
        self.changed();
    }

    fn set_playback_state(&self, playback: PlaybackState) {
        let changed = match self.state.lock() {
            Ok(mut s) => std::mem::replace(&mut s.playback, playback) != playback,
            Err(_) => false,
        };
        if changed {
            self.changed();
        }
    }

    /// Position is polled by clients, so no signal.
    fn set_position(&self, position: f64, duration: f64) {
        if let Ok(mut s) = self.state.lock() {
            s.position_micros = secs_to_micros(position);
            if duration > 0.0 {
                s.length_micros = Some(secs_to_micros(duration));
            }
        }
    }
}

impl Drop for MprisHandle {
    fn drop(&mut self) {
        for path in self.covers.borrow_mut().drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        let _ = self.tx.send(ControlCmd::Raise);
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "wavedeck"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string(), "http".to_string(), "https".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

fn owned(value: Value<'_>) -> Option<OwnedValue> {
    OwnedValue::try_from(value).ok()
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::Seek(offset));
    }

    fn set_position(&self, track_id: ObjectPath<'_>, position: i64) {
        let current = self
            .state
            .lock()
            .ok()
            .and_then(|s| s.track_id.clone());
        // Requests for a track that is no longer current are ignored.
        if current.as_ref().map(|p| p.as_str()) == Some(track_id.as_str()) {
            let _ = self.tx.send(ControlCmd::SetPosition(position));
        }
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.state.lock().map(|s| s.position_micros).unwrap_or(0)
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let mut put = |key: &str, value: Option<OwnedValue>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        };

        put(
            "mpris:trackid",
            s.track_id.clone().and_then(|p| owned(Value::from(p))),
        );
        put(
            "xesam:title",
            owned(Value::from(s.title.clone().unwrap_or_default())),
        );
        if !s.artist.is_empty() {
            put("xesam:artist", owned(Value::from(s.artist.clone())));
        }
        if let Some(album) = &s.album {
            put("xesam:album", owned(Value::from(album.clone())));
        }
        if let Some(url) = &s.art_url {
            put("mpris:artUrl", owned(Value::from(url.clone())));
        }
        if let Some(len) = s.length_micros {
            put("mpris:length", owned(Value::from(len)));
        }
        map
    }
}

/// Emit `PropertiesChanged` for the player whenever the UI side asks.
async fn forward_changes(connection: &Connection, notify: Receiver<()>) {
    let iface_ref = match connection
        .object_server()
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            log::warn!("MPRIS: player interface missing: {e}");
            return;
        }
    };

    loop {
        let mut pending = false;
        loop {
            match notify.try_recv() {
                Ok(()) => pending = true,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if pending {
            let emitter: &SignalEmitter<'static> = iface_ref.signal_emitter();
            let iface = iface_ref.get().await;
            if let Err(e) = iface.playback_status_changed(emitter).await {
                log::debug!("MPRIS: PlaybackStatus signal failed: {e}");
            }
            if let Err(e) = iface.metadata_changed(emitter).await {
                log::debug!("MPRIS: Metadata signal failed: {e}");
            }
        }

        Timer::after(Duration::from_millis(100)).await;
    }
}

pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<()>();

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("wavedeck-mpris".to_string())
        .spawn(move || {
            block_on(async move {
                let connection = match Connection::session().await {
                    Ok(c) => c,
                    Err(e) => {
                        log::warn!("MPRIS: failed to connect to session bus: {e}");
                        return;
                    }
                };

                if let Err(e) = connection
                    .request_name("org.mpris.MediaPlayer2.wavedeck")
                    .await
                {
                    log::warn!("MPRIS: failed to acquire name: {e}");
                    return;
                }

                let object_server = connection.object_server();

                if let Err(e) = object_server
                    .at(OBJECT_PATH, RootIface { tx: tx.clone() })
                    .await
                {
                    log::warn!("MPRIS: failed to register root iface: {e}");
                    return;
                }

                if let Err(e) = object_server
                    .at(
                        OBJECT_PATH,
                        PlayerIface {
                            tx,
                            state: state_for_thread,
                        },
                    )
                    .await
                {
                    log::warn!("MPRIS: failed to register player iface: {e}");
                    return;
                }

                forward_changes(&connection, notify_rx).await;
            });
        });
    if let Err(e) = spawned {
        log::warn!("MPRIS: could not start bus thread: {e}");
    }

    MprisHandle {
        state,
        notify: notify_tx,
        covers: RefCell::new(Vec::new()),
    }
}
