//! Keyboard handling for the console.

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::tui::app::App;

#[derive(Debug, Clone)]
pub enum TuiEvent {
    Tick,
    Key(KeyEvent),
    Resize,
}

/// Work the render loop has to hand to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Apply,
    ClearLimits,
}

pub struct EventHandler {
    tick_rate: Duration,
    last_tick: Instant,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        Self {
            tick_rate,
            last_tick: Instant::now(),
        }
    }

    pub fn next_event(&mut self) -> anyhow::Result<Option<TuiEvent>> {
        let timeout = self.tick_rate.saturating_sub(self.last_tick.elapsed());

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => Ok(Some(TuiEvent::Key(key))),
                Event::Resize(..) => Ok(Some(TuiEvent::Resize)),
                _ => Ok(None),
            }
        } else {
            self.last_tick = Instant::now();
            Ok(Some(TuiEvent::Tick))
        }
    }
}

pub fn handle_event(app: &mut App, event: TuiEvent) -> Option<Action> {
    match event {
        TuiEvent::Key(key) => handle_key_event(app, key),
        TuiEvent::Tick | TuiEvent::Resize => None,
    }
}

/// Enter applies, F6 clears limits, F7 clears the log, Esc or Ctrl+C quits.
fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')) {
            app.quit();
        }
        return None;
    }

    match key.code {
        KeyCode::Esc => app.quit(),
        KeyCode::Enter => return Some(Action::Apply),
        KeyCode::F(6) => return Some(Action::ClearLimits),
        KeyCode::F(7) => app.clear_log(),

        KeyCode::Tab | KeyCode::Down => app.next_field(),
        KeyCode::BackTab | KeyCode::Up => app.prev_field(),

        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::End => app.scroll_back = 0,

        KeyCode::Backspace => app.pop_char(),
        KeyCode::Char(ch) => app.push_char(ch),
        _ => {}
    }
    None
}
