use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use courier_core::driver::Driver;
use courier_core::locator::LocatorEngine;
use courier_core::orchestrator::{self, Orchestrator};
use courier_core::platform::create_platform;
use courier_core::reference::ReferenceStore;
use courier_core::session::SessionManager;
use courier_core::settings::AutomationConfig;
use courier_core::sleep::ThreadPacer;
use courier_core::types::{Command, ElementKind, Event};
use courier_core::workflow::ChatWorkflow;
use courier_core::{contacts, logger};

/// Random +/- fraction applied to every pause.
const PAUSE_JITTER: f64 = 0.15;

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    logger::init(&cwd.join("logs")).context("opening log file")?;

    let config = AutomationConfig::load(&cwd.join("config.json"));
    let targets = contacts::load(&config.contacts_file)?;

    let store = ReferenceStore::new(&config.reference_root);
    store.ensure_layout().context("creating reference directories")?;
    let required: Vec<_> = ElementKind::ALL.iter().map(|e| e.reference_name()).collect();
    let missing = store.missing(&required);
    if !missing.is_empty() {
        logger::warn(&format!(
            "missing reference images under {}: {} (coordinate fallbacks will be used)",
            store.root().display(),
            missing.join(", ")
        ));
    }

    // Channels
    let (event_tx, event_rx) = mpsc::channel::<Event>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    logger::set_event_sender(event_tx.clone());
    logger::info(&format!("courier started with {} contact(s)", targets.len()));

    let platform = create_platform(force_stub);
    let driver = Driver::new(platform, &config.window_title, Box::new(ThreadPacer::jittered(PAUSE_JITTER)));
    let locator = LocatorEngine::new(store, &config);
    let worker = Orchestrator::new(driver, SessionManager::new(&config), ChatWorkflow::new(locator, &config))
        .with_events(event_tx);
    let cancel = worker.cancel_flag();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = courier_tui::App::new(targets, config.contacts_file.clone(), event_rx, cmd_tx, cancel);

    thread::spawn(move || orchestrator::serve(worker, cmd_rx));

    let result = courier_tui::event::run(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}
