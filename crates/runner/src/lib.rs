//! Policy execution: hands rendered scripts to an administrative shell and
//! turns what comes back into log lines.
//!
//! Script side effects are not transactional. A script that fails halfway
//! (clear succeeded, create failed) leaves the host partially cleared.

use std::sync::Arc;

use netlimit_core::{NetLimitError, PolicyRunResult};
use policy_engine::PolicyScript;

pub mod command;
pub mod fake;
pub mod powershell;

pub use fake::FakeBackend;
pub use powershell::PowerShellBackend;

/// Raw outcome of one shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Standard output followed by standard error.
    pub combined: String,
    /// `None` when the process ended without an exit code.
    pub exit_code: Option<i32>,
}

impl ScriptOutput {
    pub fn check(&self) -> Result<(), NetLimitError> {
        match self.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(NetLimitError::PolicyExecution(format!(
                "shell exited with code {code}"
            ))),
            None => Err(NetLimitError::PolicyExecution(
                "shell terminated without an exit code".to_string(),
            )),
        }
    }
}

/// The only way policy reaches the host.
pub trait PolicyBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs `script` to completion. `Err` means the shell could not be run
    /// at all; a script failure is reported through the exit code.
    fn run_script(&self, script: &str) -> Result<ScriptOutput, NetLimitError>;
}

#[derive(Clone)]
pub struct PolicyExecutor {
    backend: Arc<dyn PolicyBackend>,
}

impl PolicyExecutor {
    pub fn new(backend: Arc<dyn PolicyBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Runs the script and reports it. Captured output is logged whether or
    /// not the run succeeded.
    pub fn execute(&self, script: &PolicyScript) -> PolicyRunResult {
        let label = script.kind.label();
        tracing::debug!(target: "netlimit.runner", backend = self.backend.name(), kind = label, "execute");

        let mut result = PolicyRunResult::success();
        let status = match self.backend.run_script(&script.text) {
            Ok(output) => {
                append_output(&mut result, &output.combined);
                output.check()
            }
            Err(err) => Err(err),
        };

        match status {
            Ok(()) => {
                tracing::info!(target: "netlimit.runner", kind = label, "script succeeded");
                result.push(format!("{label}: success"));
            }
            Err(err) => {
                tracing::warn!(target: "netlimit.runner", kind = label, error = %err, "script failed");
                result.push(format!("{label} error: {err}"));
                result.succeeded = false;
            }
        }
        result
    }
}

fn append_output(result: &mut PolicyRunResult, combined: &str) {
    let trimmed = combined.trim_end();
    if trimmed.is_empty() {
        return;
    }
    result.push("Output:");
    for line in trimmed.lines() {
        result.push(line.trim_end());
    }
}
