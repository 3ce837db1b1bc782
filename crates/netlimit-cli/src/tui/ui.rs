//! Console layout: three inputs, a key hint line and the log.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::app::{App, Field, SEPARATOR};

pub fn render(frame: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_inputs(frame, app, layout[0]);
    render_keys(frame, layout[1]);
    render_log(frame, app, layout[2]);
    render_status(frame, app, layout[3]);
}

fn render_inputs(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    for (field, column) in [Field::Process, Field::Inbound, Field::Outbound]
        .into_iter()
        .zip(columns.iter())
    {
        let focused = field == app.focus;
        let border = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let value = app.field(field);
        let input = Paragraph::new(value).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", field.title()))
                .border_style(border),
        );
        frame.render_widget(input, *column);

        if focused {
            let max_x = column.x + column.width.saturating_sub(2);
            let x = (column.x + 1 + value.chars().count() as u16).min(max_x);
            frame.set_cursor_position((x, column.y + 1));
        }
    }
}

fn render_keys(frame: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let hint = Line::from(vec![
        Span::styled(" Enter", key),
        Span::raw(" apply  "),
        Span::styled("F6", key),
        Span::raw(" clear limits  "),
        Span::styled("F7", key),
        Span::raw(" clear log  "),
        Span::styled("Tab", key),
        Span::raw(" next field  "),
        Span::styled("PgUp/PgDn", key),
        Span::raw(" scroll  "),
        Span::styled("Esc", key),
        Span::raw(" quit"),
    ]);
    frame.render_widget(Paragraph::new(hint), area);
}

fn log_line(line: &str) -> Line<'_> {
    let style = if line == SEPARATOR {
        Style::default().fg(Color::DarkGray)
    } else if line.contains("error") || line.starts_with("Error") || line.starts_with("No process") {
        Style::default().fg(Color::Red)
    } else if line.ends_with(": success") {
        Style::default().fg(Color::Green)
    } else if line.starts_with("Warning") {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Line::styled(line, style)
}

/// First log line to show so the view ends `scroll_back` lines above the
/// newest one.
pub(crate) fn first_visible(total: usize, height: usize, scroll_back: usize) -> usize {
    total.saturating_sub(height).saturating_sub(scroll_back)
}

fn render_log(frame: &mut Frame, app: &App, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let start = first_visible(app.log.len(), height, app.scroll_back);
    let lines: Vec<Line> = app
        .log
        .iter()
        .skip(start)
        .take(height)
        .map(|line| log_line(line))
        .collect();

    let title = if app.log.is_empty() {
        " Log ".to_string()
    } else {
        format!(" Log ({} lines) ", app.log.len())
    };
    let log = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(log, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let text = match app.pending {
        0 => " Idle".to_string(),
        1 => " 1 action running".to_string(),
        n => format!(" {n} actions running"),
    };
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_renders_inputs_and_log() {
        let mut app = App::new();
        app.process = "notepad.exe".to_string();
        app.log.push("ClearAllLimits: success".to_string());
        app.pending = 2;

        let text = screen(&app);
        assert!(text.contains("Limit IN (kbps)"));
        assert!(text.contains("notepad.exe"));
        assert!(text.contains("ClearAllLimits: success"));
        assert!(text.contains("2 actions running"));
    }

    #[test]
    fn test_first_visible_line() {
        assert_eq!(first_visible(5, 10, 0), 0);
        assert_eq!(first_visible(30, 10, 0), 20);
        assert_eq!(first_visible(30, 10, 5), 15);
        assert_eq!(first_visible(30, 10, 50), 0);
    }
}
