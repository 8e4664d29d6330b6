use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Instant;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use futures::executor::LocalPool;
use futures::task::LocalSpawn;
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::host::{MediaSession, Scheduler};
use crate::library::scan;
use crate::mpris::ControlCmd;

mod event_loop;
mod keymap;
mod settings;
mod startup;

pub use startup::LaunchOptions;

/// Play the track table in the terminal until the user or the media session quits.
pub fn run(launch: LaunchOptions) -> Result<(), Box<dyn std::error::Error>> {
    let (mut settings, problem) = settings::load_settings();
    startup::apply_launch_overrides(&mut settings, &launch);
    if let Err(e) = startup::init_logging(&settings.logging) {
        eprintln!("wavedeck: logging disabled: {e}");
    }
    if let Some(msg) = problem {
        log::warn!("{msg}");
    }

    let mut pool = LocalPool::new();
    let spawner: Rc<dyn LocalSpawn> = Rc::new(pool.spawner());
    let scheduler = Rc::new(Scheduler::new(Instant::now()));

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let session: Rc<dyn MediaSession> = Rc::new(crate::mpris::spawn_mpris(control_tx));

    let mut app = startup::bootstrap(
        &settings,
        launch.deep_link.as_deref(),
        startup::PlaylistDeps {
            scheduler: Rc::clone(&scheduler),
            spawner,
            session,
        },
    )?;

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = event_loop::run(
        &mut terminal,
        &settings,
        &mut app,
        &scheduler,
        &mut pool,
        &control_rx,
    );

    app.transport.pause_all();
    log::info!("shutting down");

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    run_result
}

/// Build a track table from the audio files under `dir`.
pub fn analyze(
    dir: &Path,
    out: Option<&Path>,
    bins: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut settings, problem) = settings::load_settings();
    if let Err(e) = startup::init_logging(&settings.logging) {
        eprintln!("wavedeck: logging disabled: {e}");
    }
    if let Some(msg) = problem {
        log::warn!("{msg}");
    }
    if let Some(bins) = bins {
        settings.analyze.bins = bins.max(1);
    }
    let out = out.map(Path::to_path_buf).unwrap_or_else(|| settings.analyze.output.clone().into());

    let records = scan::analyze_dir(dir, &settings.analyze);
    scan::write_table(&records, &out)?;
    println!("wrote {} tracks to {}", records.len(), out.display());
    Ok(())
}
