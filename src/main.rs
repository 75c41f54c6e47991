use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::{error::Error, io};

mod app;

use app::config::Config;
use app::storage::Database;
use app::tasks::{self, Tasks};

// Start the app.
// The terminal handling is based on:
// https://github.com/ratatui-org/ratatui/blob/main/examples/list.rs
pub fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    app::logging::init(&config.log_file)?;

    // Open the database before taking over the terminal, so failures stay readable
    let db = Database::new(config.db_config(), tasks::setup);
    db.start_connection()?;
    let app = app::ui::App::new(Tasks::new(&db))?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = app::ui::run_app(&mut terminal, app, config.tick_rate());

    // Restore previous terminal state after exit
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("UI loop failed: {err}");
        println!("{err:?}");
    }

    Ok(())
}
