mod app;
mod ui;

use std::io;
use std::sync::OnceLock;

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use appdeck::config::Config;
use appdeck::types::*;
use ui::ui;

// Keeps the non-blocking log writer alive for the whole run.
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn init_logging(cfg: &Config) {
    let path = cfg.log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            LOG_GUARD.set(guard).ok();
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
        }
        Err(_) => {
            // The alternate screen owns stdout; stderr is the fallback sink.
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cfg = Config::load();
    init_logging(&cfg);
    info!("starting");

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut app = App::new(cfg)?;

    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        app.poll_refresh();

        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match app.state {
                    AppState::Listing => match key.code {
                        KeyCode::Char('q') => {
                            if app.has_pending_changes() {
                                app.state = AppState::ConfirmExit;
                            } else {
                                break;
                            }
                        }
                        KeyCode::Tab | KeyCode::BackTab => app.cycle_focus(),
                        KeyCode::Up | KeyCode::Char('k') => match app.ui.focused_pane {
                            FocusedPane::Categories => app.move_category_selection(-1),
                            FocusedPane::Applications => app.move_row_selection(-1),
                        },
                        KeyCode::Down | KeyCode::Char('j') => match app.ui.focused_pane {
                            FocusedPane::Categories => app.move_category_selection(1),
                            FocusedPane::Applications => app.move_row_selection(1),
                        },
                        KeyCode::PageUp => app.move_row_selection(-10),
                        KeyCode::PageDown => app.move_row_selection(10),
                        KeyCode::Home | KeyCode::Char('g') => app.move_row_selection(-10000),
                        KeyCode::End | KeyCode::Char('G') => app.move_row_selection(10000),
                        KeyCode::Char(' ') | KeyCode::Enter => {
                            if app.ui.focused_pane == FocusedPane::Applications {
                                app.toggle_current();
                            }
                        }
                        KeyCode::Char('a') => {
                            if app.has_pending_changes() {
                                app.state = AppState::ConfirmApply;
                            } else {
                                app.status_message = "No changes to apply".to_string();
                            }
                        }
                        KeyCode::Char('r') => app.start_refresh(),
                        _ => {}
                    },
                    AppState::ConfirmApply => match key.code {
                        KeyCode::Char('y') | KeyCode::Enter => {
                            // Exit TUI, run the transaction, return
                            disable_raw_mode()?;
                            io::stdout().execute(LeaveAlternateScreen)?;

                            app.apply();

                            enable_raw_mode()?;
                            io::stdout().execute(EnterAlternateScreen)?;
                            terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

                            app.state = AppState::Listing;
                        }
                        KeyCode::Char('n') | KeyCode::Esc => {
                            app.state = AppState::Listing;
                        }
                        _ => {}
                    },
                    AppState::Refreshing => match key.code {
                        KeyCode::Esc => app.cancel_refresh(),
                        _ => {}
                    },
                    AppState::ConfirmExit => match key.code {
                        KeyCode::Char('y') | KeyCode::Enter => break,
                        KeyCode::Char('n') | KeyCode::Esc => {
                            app.state = AppState::Listing;
                        }
                        _ => {}
                    },
                }
            }
    }

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
