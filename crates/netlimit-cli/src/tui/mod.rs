//! Interactive console.
//!
//! Mirrors the one-shot commands: fill in a process name and limits, apply,
//! clear limits, watch the log. Actions run in the background so the screen
//! stays responsive while PowerShell works.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use workflow::Orchestrator;

mod app;
mod dispatch;
mod events;
mod ui;

pub use app::App;
pub use dispatch::Dispatcher;
pub use events::{Action, EventHandler};

pub fn run_console(orchestrator: Orchestrator) -> Result<()> {
    let mut dispatcher = Dispatcher::new(orchestrator)?;
    tracing::info!("console started");

    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut app = App::new();
    let mut event_handler = EventHandler::new(Duration::from_millis(100));

    let result = run_event_loop(&mut terminal, &mut app, &mut event_handler, &mut dispatcher);

    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leave alternate screen")?;
    terminal.show_cursor().context("show cursor")?;

    if app.pending > 0 {
        tracing::warn!(pending = app.pending, "console closed with actions still running");
    }
    dispatcher.shutdown();
    result
}

fn run_event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_handler: &mut EventHandler,
    dispatcher: &mut Dispatcher,
) -> Result<()> {
    while app.running {
        for report in dispatcher.drain() {
            tracing::debug!(run_id = %report.run_id, summary = %report.human_summary(), "action finished");
            app.action_finished(&report);
        }

        terminal.draw(|frame| ui::render(frame, app))?;

        if let Some(event) = event_handler.next_event()? {
            match events::handle_event(app, event) {
                Some(Action::Apply) => {
                    app.action_started();
                    dispatcher.apply(app.apply_request());
                }
                Some(Action::ClearLimits) => {
                    app.action_started();
                    dispatcher.clear_all();
                }
                None => {}
            }
        }
    }
    Ok(())
}
