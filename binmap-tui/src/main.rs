//! Terminal UI for binmap that shows the waste bins around the user on a map.

mod app;
mod config;
mod input;
mod location;
mod modal;
mod terminal_map;
mod ui;

use std::{
    collections::VecDeque, fs::File, io, sync::Arc, sync::Mutex, time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use binmap_core::{
    adapter::MapProviderAdapter,
    controller::{MapPorts, MapViewController, ViewOptions},
};
use binmap_provider_http as http;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;
use crate::config::Config;
use crate::input::Action;
use crate::location::FixLocationPort;
use crate::modal::ModalRoot;
use crate::terminal_map::TerminalMap;

type Backend = CrosstermBackend<io::Stdout>;

#[derive(Debug, Clone, Copy)]
enum Task {
    Mount,
    DismissPrompt,
    Refresh,
}

fn init_tracing(config: &Config) -> Result<()> {
    // The terminal belongs to the UI, so logs go to a file.
    let file = File::options()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("cannot open log file {}", config.log_file.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,binmap_core=debug,binmap_tui=debug,binmap_provider_http=debug".into()
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;
    info!(api = %config.api_url, "binmap starting");

    // HTTP + ports setup
    let client = Client::builder().user_agent("binmap/0.1").build()?;

    let map = TerminalMap::default();
    let modal = ModalRoot::default();
    let ports = MapPorts {
        location: Arc::new(FixLocationPort::new(
            config.fix_file.clone(),
            config.position,
        )),
        receptacles: http::data_source(client, config.api_url.clone()),
        map: Box::new(MapProviderAdapter::new(map.clone())),
        overlay: Arc::new(modal.clone()),
    };
    let options = ViewOptions {
        radius_m: config.radius_m,
        ..ViewOptions::default()
    };
    let controller = MapViewController::new(ports, options, config.viewer());

    // App state
    let app = App::new(controller, map, modal);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    info!("binmap stopped");
    res
}

async fn run(terminal: &mut Terminal<Backend>, mut app: App) -> Result<()> {
    // Keys typed while a task runs, replayed once it is done.
    let mut pending = VecDeque::new();

    if !perform(terminal, &mut app, Task::Mount, &mut pending).await? {
        app.controller.unmount();
        return Ok(());
    }

    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        let key = match pending.pop_front() {
            Some(key) => Some(key),
            // Poll for input (non-blocking, small timeout to keep CPU low)
            None => next_key(StdDuration::from_millis(100))?,
        };
        let Some(key) = key else {
            continue;
        };

        app.status = None;
        let task = match input::handle_key_event(key, &mut app) {
            Action::Quit => break,
            Action::None => continue,
            Action::DismissPrompt => Task::DismissPrompt,
            Action::Refresh => Task::Refresh,
        };
        if !perform(terminal, &mut app, task, &mut pending).await? {
            break;
        }
        app.clamp_selection();
    }

    app.controller.unmount();
    Ok(())
}

/// Run a controller task while still listening for quit keys.
///
/// Returns `false` when the user quit before the task finished; the task is
/// dropped at that point and the caller unmounts the view. Other keys pressed
/// meanwhile are queued on `pending`.
async fn perform(
    terminal: &mut Terminal<Backend>,
    app: &mut App,
    task: Task,
    pending: &mut VecDeque<KeyEvent>,
) -> Result<bool> {
    app.busy = matches!(task, Task::Refresh);
    terminal.draw(|frame| ui::draw(frame, app))?;

    let controller = &mut app.controller;
    let work = async {
        match task {
            Task::Mount => controller.mount().await,
            Task::DismissPrompt => {
                controller.dismiss_location_prompt().await;
            }
            Task::Refresh => {
                if let Some(report) = controller.refresh().await {
                    debug!(
                        placed = report.placed.len(),
                        removed = report.removed.len(),
                        retained = report.retained,
                        "markers refreshed"
                    );
                }
            }
        }
    };

    let finished = tokio::select! {
        () = work => true,
        quit = wait_for_quit(pending) => {
            quit?;
            false
        }
    };

    app.busy = false;
    if !finished {
        debug!(?task, "cancelled by quit");
    }
    Ok(finished)
}

fn next_key(timeout: StdDuration) -> Result<Option<KeyEvent>> {
    if event::poll(timeout)?
        && let CEvent::Key(key) = event::read()?
    {
        return Ok(Some(key));
    }
    Ok(None)
}

async fn wait_for_quit(pending: &mut VecDeque<KeyEvent>) -> Result<()> {
    loop {
        while let Some(key) = next_key(StdDuration::ZERO)? {
            if hold_key(key, pending) {
                return Ok(());
            }
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }
}

/// Queue `key` for later unless it asks to quit. Returns whether it did.
fn hold_key(key: KeyEvent, pending: &mut VecDeque<KeyEvent>) -> bool {
    if input::is_quit(&key) {
        return true;
    }
    pending.push_back(key);
    false
}
