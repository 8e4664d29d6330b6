use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use futures::task::LocalSpawn;
use simplelog::{CombinedLogger, Config, LevelFilter, WriteLogger};

use crate::app::{App, AppViews};
use crate::audio::sink::{RodioGraph, SinkElement, ThreadedLoader};
use crate::audio::{DecodedBufferAdapter, NativeElementAdapter, PlaybackAdapter};
use crate::config::{self, BackendSetting};
use crate::host::{Location, MediaSession, Scheduler, Viewport};
use crate::library::model::is_remote_base;
use crate::library::table::load_table;
use crate::library::{Locator, TrackRecord};
use crate::track::{TrackController, TrackOptions};
use crate::transport::{TransportCoordinator, TransportHost, TransportOptions};
use crate::ui::views::{DeepLink, FooterState, ListViewport, TrackRow};
use crate::waveform::Palette;

/// Which adapter every track of the playlist gets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Backend {
    Element,
    Buffer,
}

/// The element backend streams from disk, so remote bases always decode into buffers.
pub fn choose_backend(setting: BackendSetting, base: &str) -> Backend {
    let remote = is_remote_base(base);
    match setting {
        BackendSetting::Buffer => Backend::Buffer,
        BackendSetting::Auto if remote => Backend::Buffer,
        BackendSetting::Auto => Backend::Element,
        BackendSetting::Element if remote => {
            log::warn!("element backend cannot stream {base}; using decoded buffers");
            Backend::Buffer
        }
        BackendSetting::Element => Backend::Element,
    }
}

pub fn log_level(raw: &str) -> LevelFilter {
    LevelFilter::from_str(raw.trim()).unwrap_or(LevelFilter::Info)
}

pub fn init_logging(settings: &config::LoggingSettings) -> Result<(), Box<dyn Error>> {
    let level = log_level(&settings.level);
    if level == LevelFilter::Off {
        return Ok(());
    }
    CombinedLogger::init(vec![WriteLogger::new(
        level,
        Config::default(),
        File::create(&settings.file)?,
    )])?;
    Ok(())
}

/// Table location and initial deep link, after command line overrides.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub data_file: Option<String>,
    pub base: Option<String>,
    pub deep_link: Option<String>,
}

/// Apply command line overrides to the loaded settings.
pub fn apply_launch_overrides(settings: &mut config::Settings, launch: &LaunchOptions) {
    if let Some(data) = &launch.data_file {
        settings.library.data_file = data.clone();
    }
    if let Some(base) = &launch.base {
        settings.library.base = base.clone();
    }
}

/// Everything the playlist shares besides the transport.
pub struct PlaylistDeps {
    pub scheduler: Rc<Scheduler>,
    pub spawner: Rc<dyn LocalSpawn>,
    pub session: Rc<dyn MediaSession>,
}

/// Load the track table and build the playlist around it.
pub fn bootstrap(
    settings: &config::Settings,
    deep_link: Option<&str>,
    deps: PlaylistDeps,
) -> Result<App, Box<dyn Error>> {
    let data_file = Path::new(&settings.library.data_file);
    let records = load_table(data_file)?;
    log::info!("loaded {} tracks from {}", records.len(), data_file.display());
    build_playlist(
        settings,
        records,
        data_file.display().to_string(),
        deep_link,
        deps,
    )
}

pub fn build_playlist(
    settings: &config::Settings,
    records: Vec<TrackRecord>,
    source: String,
    deep_link: Option<&str>,
    deps: PlaylistDeps,
) -> Result<App, Box<dyn Error>> {
    let base = settings.library.base.as_str();
    let backend = choose_backend(settings.audio.backend, base);
    log::info!("using the {backend:?} backend for {base}");

    let footer = Rc::new(FooterState::default());
    let link = Rc::new(DeepLink::new(deep_link));
    let viewport = Rc::new(ListViewport::default());
    let transport = TransportCoordinator::new(
        TransportHost {
            view: footer.clone(),
            location: link.clone(),
            viewport: viewport.clone(),
            session: deps.session,
        },
        TransportOptions::from(settings),
        Rc::clone(&deps.spawner),
    );

    let graph = Rc::new(RodioGraph::new());
    let loader = Rc::new(ThreadedLoader);
    let interval = Duration::from_millis(settings.audio.progress_interval_ms);
    let track_options = TrackOptions::from(&settings.waveform);

    let mut rows = Vec::with_capacity(records.len());
    let mut tracks = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let locator = Locator::resolve(base, &record.file_reference).unwrap_or_else(|e| {
            log::warn!("{}: cannot resolve against {base}: {e}", record.file_reference);
            Locator::Unresolved(record.file_reference.clone())
        });
        let adapter: Rc<dyn PlaybackAdapter> = match (backend, locator) {
            (Backend::Element, Locator::Path(path)) => Rc::new(NativeElementAdapter::new(
                Rc::new(SinkElement::new(
                    path,
                    Rc::clone(&graph),
                    Rc::clone(&deps.scheduler),
                    interval,
                )),
                record.nominal_duration,
            )),
            (_, locator) => Rc::new(DecodedBufferAdapter::new(
                locator,
                record.nominal_duration,
                graph.clone(),
                loader.clone(),
                Rc::clone(&deps.scheduler),
                Rc::clone(&deps.spawner),
            )),
        };
        let row = Rc::new(TrackRow::default());
        tracks.push(TrackController::new(
            index,
            Rc::new(record),
            adapter,
            row.clone(),
            Rc::clone(&deps.scheduler),
            Rc::downgrade(&transport),
            track_options,
        ));
        rows.push(row);
    }
    transport.attach(tracks);

    let mut app = App::new(
        Rc::clone(&transport),
        AppViews {
            rows,
            footer,
            link: link.clone(),
            viewport: viewport.clone(),
        },
        Palette::resolve(&settings.waveform),
        source,
    );

    match (link.fragment(), transport.fragment_index()) {
        (Some(_), Some(index)) => {
            viewport.center_on(index);
            app.set_selected(index);
            if settings.library.autoplay_deep_link {
                transport.toggle(Some(index));
            }
        }
        (Some(slug), None) => log::warn!("no track matches #{slug}"),
        (None, _) => {}
    }

    Ok(app)
}
