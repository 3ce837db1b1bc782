use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use netlimit_core::{PolicyAction, PolicyRunResult, ProcessTarget, RunId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Apply,
    Clear,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Apply => write!(f, "apply"),
            RunKind::Clear => write!(f, "clear"),
        }
    }
}

/// Everything one user action did, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub kind: RunKind,
    pub started_at: OffsetDateTime,
    pub ended_at: OffsetDateTime,
    /// Set once the process name resolved.
    pub target: Option<ProcessTarget>,
    /// Set once the bandwidth inputs parsed.
    pub action: Option<PolicyAction>,
    pub result: PolicyRunResult,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.result.succeeded
    }

    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }

    pub fn log_text(&self) -> String {
        self.result.text()
    }

    pub fn human_summary(&self) -> String {
        let outcome = if self.succeeded() { "succeeded" } else { "failed" };
        let subject = match (&self.target, self.action) {
            (Some(target), Some(action)) => format!(" ({action} on {})", target.exe_path.display()),
            (None, Some(action)) => format!(" ({action})"),
            _ => String::new(),
        };
        format!(
            "{kind} {outcome}{subject} in {ms} ms [run {id}]",
            kind = self.kind,
            ms = self.duration().whole_milliseconds().max(0),
            id = self.run_id,
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Collects a report while a run is in progress.
pub(crate) struct ReportBuilder {
    run_id: RunId,
    kind: RunKind,
    started_at: OffsetDateTime,
    pub(crate) target: Option<ProcessTarget>,
    pub(crate) action: Option<PolicyAction>,
    pub(crate) result: PolicyRunResult,
}

impl ReportBuilder {
    pub(crate) fn start(kind: RunKind) -> Self {
        Self {
            run_id: RunId::new(),
            kind,
            started_at: OffsetDateTime::now_utc(),
            target: None,
            action: None,
            result: PolicyRunResult::success(),
        }
    }

    pub(crate) fn run_id(&self) -> RunId {
        self.run_id
    }

    pub(crate) fn log(&mut self, line: impl Into<String>) {
        self.result.push(line);
    }

    pub(crate) fn fail(mut self, line: impl Into<String>) -> RunReport {
        self.result.push(line);
        self.result.succeeded = false;
        self.finish()
    }

    pub(crate) fn finish(self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            kind: self.kind,
            started_at: self.started_at,
            ended_at: OffsetDateTime::now_utc(),
            target: self.target,
            action: self.action,
            result: self.result,
        }
    }
}
