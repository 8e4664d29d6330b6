use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use futures::executor::LocalPool;
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::App;
use crate::config;
use crate::host::Scheduler;
use crate::mpris::ControlCmd;
use crate::runtime::keymap;
use crate::ui;

const FRAME: Duration = Duration::from_millis(33);

/// Main terminal event loop: runs timers and pending starts, draws, and feeds
/// input and media-session commands to the app. Returns `Ok(())` when shutdown
/// is requested.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    scheduler: &Scheduler,
    pool: &mut LocalPool,
    control_rx: &mpsc::Receiver<ControlCmd>,
) -> Result<(), Box<dyn std::error::Error>> {
    let wave_rows = settings.waveform.rows;
    loop {
        scheduler.advance(Instant::now());
        pool.run_until_stalled();

        while let Ok(cmd) = control_rx.try_recv() {
            if handle_control_cmd(cmd, app) {
                return Ok(());
            }
        }
        pool.run_until_stalled();

        terminal.draw(|f| {
            app.relayout(f.area(), wave_rows);
            scheduler.run_frame();
            ui::draw(f, app, &settings.controls);
        })?;

        // Wait one frame for input, then take whatever else has queued up.
        let mut timeout = FRAME;
        while event::poll(timeout)? {
            timeout = Duration::ZERO;
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = keymap::map_key(key, &settings.controls)
                        && keymap::apply(action, app)
                    {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => handle_mouse(mouse, app),
                Event::FocusLost => app.mouse_cancel(),
                _ => {}
            }
        }
    }
}

/// Returns `true` when the bus asked the player to quit.
fn handle_control_cmd(cmd: ControlCmd, app: &mut App) -> bool {
    match cmd {
        ControlCmd::Quit => return true,
        // The terminal cannot raise itself.
        ControlCmd::Raise => {}
        other => {
            if let Some(action) = other.media_action() {
                app.transport.handle_media_action(action);
            }
        }
    }
    false
}

fn handle_mouse(mouse: MouseEvent, app: &mut App) {
    let (col, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.mouse_down(col, row),
        MouseEventKind::Drag(MouseButton::Left) => app.mouse_drag(col, row),
        MouseEventKind::Up(MouseButton::Left) => app.mouse_up(col, row),
        MouseEventKind::Moved => app.mouse_move(col, row),
        MouseEventKind::ScrollDown => app.next(),
        MouseEventKind::ScrollUp => app.prev(),
        _ => {}
    }
}
