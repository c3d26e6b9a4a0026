// main.rs

mod app;
mod config;
mod error;
mod models;
mod parser;
mod query;
mod storage;
mod store;
mod ui;

use crate::app::App;
use crate::config::Config;
use crate::storage::{FileStore, Persistence};
use crate::store::TaskStore;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "taskdeck.log";

// Tracing is opt-in via RUST_LOG and goes to a file, the terminal belongs to the UI
fn init_logging(data_dir: &Path) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        });
    let Some(filter) = filter else {
        return;
    };

    let file = fs::create_dir_all(data_dir).and_then(|_| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join(LOG_FILE))
    });
    match file {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        Err(err) => eprintln!("Could not open log file: {}", err),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::load()?;
    let data_dir = config.data_dir();
    init_logging(&data_dir);
    tracing::info!(data_dir = %data_dir.display(), "starting taskdeck");

    let file_store = FileStore::new(&data_dir);
    let store = TaskStore::open(Persistence::new(file_store.clone()));
    let mut app = App::new(store, Persistence::new(file_store), config);

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
