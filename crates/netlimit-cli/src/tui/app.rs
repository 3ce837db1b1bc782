//! Console state. Only the render loop mutates it.

use workflow::{ApplyRequest, RunReport};

/// Printed before each finished action's log.
pub const SEPARATOR: &str = "----------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Process,
    Inbound,
    Outbound,
}

impl Field {
    pub fn title(&self) -> &'static str {
        match self {
            Field::Process => "Process name (e.g. chrome.exe)",
            Field::Inbound => "Limit IN (kbps)",
            Field::Outbound => "Limit OUT (kbps)",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Field::Process => Field::Inbound,
            Field::Inbound => Field::Outbound,
            Field::Outbound => Field::Process,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Field::Process => Field::Outbound,
            Field::Inbound => Field::Process,
            Field::Outbound => Field::Inbound,
        }
    }
}

#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub focus: Field,
    pub process: String,
    pub inbound: String,
    pub outbound: String,
    pub log: Vec<String>,
    /// Actions dispatched but not yet reported back.
    pub pending: usize,
    /// Lines scrolled up from the bottom of the log; 0 follows new output.
    pub scroll_back: usize,
}

impl App {
    pub fn new() -> Self {
        Self {
            running: true,
            focus: Field::Process,
            process: String::new(),
            inbound: String::new(),
            outbound: String::new(),
            log: Vec::new(),
            pending: 0,
            scroll_back: 0,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Process => &self.process,
            Field::Inbound => &self.inbound,
            Field::Outbound => &self.outbound,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Process => &mut self.process,
            Field::Inbound => &mut self.inbound,
            Field::Outbound => &mut self.outbound,
        }
    }

    pub fn push_char(&mut self, ch: char) {
        self.focused_mut().push(ch);
    }

    pub fn pop_char(&mut self) {
        self.focused_mut().pop();
    }

    pub fn next_field(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn prev_field(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Snapshot of the inputs for a background apply.
    pub fn apply_request(&self) -> ApplyRequest {
        ApplyRequest::new(&self.process, &self.inbound, &self.outbound)
    }

    pub fn action_started(&mut self) {
        self.pending += 1;
    }

    /// Appends a finished action's log as one block, so concurrent actions
    /// never interleave line by line.
    pub fn action_finished(&mut self, report: &RunReport) {
        self.pending = self.pending.saturating_sub(1);
        self.log.push(SEPARATOR.to_string());
        self.log.extend(report.result.log.iter().cloned());
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
        self.scroll_back = 0;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = (self.scroll_back + lines).min(self.log.len());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
