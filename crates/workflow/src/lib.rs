//! The two user-facing actions: apply a limit to a named process, and clear
//! every limit this tool owns.
//!
//! Neither entry point returns an error. Whatever goes wrong ends up as a
//! log line on the [`RunReport`].

use std::sync::Arc;

use netlimit_core::{BandwidthSpec, Config, NetLimitError, PolicyAction, PolicyRunResult};
use policy_engine::{kbps_to_bits_per_second, render_clear_script, render_for_action};
use process_resolver::{resolve, ProcessTable};
use runner::{PolicyBackend, PolicyExecutor};

pub mod report;

pub use report::{RunKind, RunReport};

use report::ReportBuilder;

/// Raw inputs for an apply, exactly as the user typed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyRequest {
    pub process_name: String,
    pub inbound: String,
    pub outbound: String,
}

impl ApplyRequest {
    pub fn new(
        process_name: impl Into<String>,
        inbound: impl Into<String>,
        outbound: impl Into<String>,
    ) -> Self {
        Self {
            process_name: process_name.into(),
            inbound: inbound.into(),
            outbound: outbound.into(),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    table: Arc<dyn ProcessTable>,
    executor: PolicyExecutor,
    report_multiple_matches: bool,
}

impl Orchestrator {
    pub fn new(table: Arc<dyn ProcessTable>, backend: Arc<dyn PolicyBackend>, config: &Config) -> Self {
        Self {
            table,
            executor: PolicyExecutor::new(backend),
            report_multiple_matches: config.resolver.warn_on_multiple_matches,
        }
    }

    /// Validate, resolve, clear, then install the block or rate limit.
    ///
    /// Nothing touches the host until the inputs are valid and the process
    /// resolved. A failed clear is logged and the run carries on.
    pub fn apply(&self, request: &ApplyRequest) -> RunReport {
        let mut report = ReportBuilder::start(RunKind::Apply);
        let run_id = report.run_id();
        tracing::info!(
            target: "netlimit.workflow",
            %run_id,
            backend = self.executor.backend_name(),
            process = %request.process_name,
            inbound = %request.inbound,
            outbound = %request.outbound,
            "apply requested"
        );

        let name = request.process_name.trim();
        if name.is_empty() {
            return report.fail("Error: process name is required");
        }
        let spec = match BandwidthSpec::parse(&request.inbound, &request.outbound) {
            Ok(spec) => spec,
            Err(err) => return report.fail(format!("Error: {err}")),
        };
        let action = spec.action();
        report.action = Some(action);

        let target = match resolve(self.table.as_ref(), name) {
            Ok(target) => target,
            Err(err @ NetLimitError::NotFound { .. }) => {
                tracing::info!(target: "netlimit.workflow", %run_id, error = %err, "apply aborted");
                return report.fail(format!("No process found with name: {name}"));
            }
            Err(err) => {
                tracing::warn!(target: "netlimit.workflow", %run_id, error = %err, "apply aborted");
                return report.fail(format!("Error finding process: {err}"));
            }
        };
        report.log(format!("Process path: {}", target.exe_path.display()));
        if self.report_multiple_matches && target.pids.len() > 1 {
            report.log(format!(
                "Warning: {} processes named {name}; using PID {} and ignoring {} other(s)",
                target.pids.len(),
                target.pids[0],
                target.pids.len() - 1
            ));
        }

        let cleared = self.run_clear();
        report.result.extend_log(&cleared);
        if !cleared.succeeded {
            tracing::warn!(target: "netlimit.workflow", %run_id, "clear failed; continuing with apply");
            report.log("Warning: clearing previous rules failed; continuing");
        }

        let mut applied = PolicyRunResult::success();
        match action {
            PolicyAction::Block => {
                applied.push(format!("Blocking internet for: {}", target.exe_path.display()));
            }
            PolicyAction::RateLimit { kbps } => {
                applied.push(format!("Applying speed limit for: {}", target.exe_path.display()));
                applied.push(format!(
                    "Requested limit: {kbps} kbps (~{} bits per second)",
                    kbps_to_bits_per_second(i64::from(kbps.get()))
                ));
            }
        }
        let executed = self
            .executor
            .execute(&render_for_action(action, &target.exe_path));
        applied.extend_log(&executed);
        applied.succeeded = executed.succeeded;

        report.result.extend_log(&applied);
        report.result.succeeded = applied.succeeded;
        report.target = Some(target);

        let report = report.finish();
        tracing::info!(
            target: "netlimit.workflow",
            %run_id,
            %action,
            succeeded = report.succeeded(),
            "apply finished"
        );
        report
    }

    /// Removes the QoS policy and both firewall rules. Succeeds when there is
    /// nothing to remove.
    pub fn clear_all(&self) -> RunReport {
        let mut report = ReportBuilder::start(RunKind::Clear);
        let run_id = report.run_id();
        tracing::info!(
            target: "netlimit.workflow",
            %run_id,
            backend = self.executor.backend_name(),
            "clear requested"
        );

        let cleared = self.run_clear();
        report.result.extend_log(&cleared);
        report.result.succeeded = cleared.succeeded;

        let report = report.finish();
        tracing::info!(
            target: "netlimit.workflow",
            %run_id,
            succeeded = report.succeeded(),
            "clear finished"
        );
        report
    }

    fn run_clear(&self) -> PolicyRunResult {
        let mut result = PolicyRunResult::success();
        result.push("Clearing QoS policy and firewall rules...");
        let executed = self.executor.execute(&render_clear_script());
        result.extend_log(&executed);
        result.succeeded = executed.succeeded;
        result
    }
}
