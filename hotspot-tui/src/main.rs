//! Terminal dashboard that maps tourism density in South Tyrol by municipality or GPS grid.

mod app;
mod data;
mod input;
mod ui;

use std::{io, time::Duration};

use anyhow::{Context, Result, anyhow};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use hotspot_core::{Config, PathsConfig};
use hotspot_pipeline::logging;
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

use crate::app::App;
use crate::data::DashboardData;
use crate::input::Action;

const LOG_FILE: &str = "hotspot-dashboard.log";

fn main() -> Result<()> {
    let config = Config::load().context("loading configuration")?;
    std::fs::create_dir_all(&config.paths.data_dir)
        .with_context(|| format!("creating {}", config.paths.data_dir.display()))?;
    logging::init_file(&config.paths.data_dir.join(LOG_FILE)).map_err(|err| anyhow!(err))?;

    // Fail before touching the terminal when there is nothing to show
    let data = DashboardData::load(&config.paths).context("loading dashboard data")?;
    let app = App::new(data);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, app, &config.paths);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    paths: &PathsConfig,
) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (small timeout to keep CPU low)
        if event::poll(Duration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            match input::handle_key_event(key, &mut app) {
                Action::Quit => break,
                Action::None => {}
                Action::Reload => match DashboardData::load(paths) {
                    Ok(data) => {
                        app.replace_data(data);
                        app.error_message = None;
                        info!("dashboard data reloaded");
                    }
                    Err(err) => {
                        error!(error = %err, "reloading dashboard data failed");
                        app.error_message = Some(format!("Reload failed: {err}"));
                    }
                },
            }
        }
    }

    Ok(())
}
