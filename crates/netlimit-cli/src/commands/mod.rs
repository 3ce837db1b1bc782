use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use netlimit_core::{Config, ConfigPaths};
use process_resolver::SysinfoProcessTable;
use runner::PowerShellBackend;
use workflow::{Orchestrator, RunReport};

pub mod apply;
pub mod clear;
pub mod config;
pub mod script;

pub fn load_config(config_path: Option<&Path>) -> Result<(Config, ConfigPaths)> {
    let paths = ConfigPaths::resolve()?;
    let config = Config::load_or_default(config_path, &paths)?;
    Ok((config, paths))
}

/// Orchestrator wired to the live process table and PowerShell.
pub fn orchestrator(config: &Config) -> Orchestrator {
    Orchestrator::new(
        Arc::new(SysinfoProcessTable::new()),
        Arc::new(PowerShellBackend::from_config(&config.shell)),
        config,
    )
}

pub fn render_report(report: &RunReport, json: bool) -> String {
    if json {
        report.to_json()
    } else {
        format!("{}\n{}", report.log_text(), report.human_summary())
    }
}

/// Prints the report and turns a failed run into a non-zero exit.
pub fn finish(report: &RunReport, json: bool) -> Result<()> {
    println!("{}", render_report(report, json));
    if report.succeeded() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{} failed (run {})", report.kind, report.run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use process_resolver::StaticProcessTable;
    use runner::FakeBackend;
    use workflow::ApplyRequest;

    fn fake_orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(StaticProcessTable::new().with_process(1, "app.exe", r"C:\app.exe")),
            Arc::new(FakeBackend::new()),
            &Config::default(),
        )
    }

    #[test]
    fn test_text_report_ends_with_summary() {
        let report = fake_orchestrator().clear_all();
        let text = render_report(&report, false);
        assert!(text.starts_with("Clearing QoS policy and firewall rules...\nClearAllLimits: success\n"));
        assert!(text.ends_with(&report.human_summary()));
    }

    #[test]
    fn test_failed_run_is_error() {
        let report = fake_orchestrator().apply(&ApplyRequest::new("missing.exe", "", ""));
        let err = finish(&report, true).unwrap_err();
        assert!(err.to_string().starts_with("apply failed"));
    }
}
