use std::sync::Arc;

use netlimit_core::config::{FIREWALL_RULE_IN, FIREWALL_RULE_OUT, QOS_POLICY_NAME};
use netlimit_core::{Config, PolicyAction};
use process_resolver::StaticProcessTable;
use runner::fake::{FirewallRule, QosPolicy};
use runner::FakeBackend;
use workflow::{ApplyRequest, Orchestrator, RunKind};

const NOTEPAD: &str = r"C:\Windows\System32\notepad.exe";

fn desktop() -> StaticProcessTable {
    StaticProcessTable::new()
        .with_process(4, "System", r"C:\Windows\System32\ntoskrnl.exe")
        .with_process(3120, "notepad.exe", NOTEPAD)
        .with_process(7788, "notepad.exe", r"C:\Portable\notepad.exe")
        .with_process(5000, "game.exe", r"C:\Games\My $pecial `Game`\game.exe")
}

fn setup() -> (Orchestrator, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::new());
    let orchestrator = Orchestrator::new(Arc::new(desktop()), backend.clone(), &Config::default());
    (orchestrator, backend)
}

#[test]
fn missing_process_runs_no_scripts() {
    let (orchestrator, backend) = setup();
    let report = orchestrator.apply(&ApplyRequest::new("chrome.exe", "100", "100"));

    assert!(!report.succeeded());
    assert_eq!(report.kind, RunKind::Apply);
    assert!(report
        .result
        .log
        .contains(&"No process found with name: chrome.exe".to_string()));
    assert!(report.target.is_none());
    assert!(backend.scripts().is_empty());
}

#[test]
fn zero_limits_block_both_directions() {
    let (orchestrator, backend) = setup();
    let report = orchestrator.apply(&ApplyRequest::new("notepad.exe", "0", "0"));

    assert!(report.succeeded(), "{}", report.log_text());
    assert_eq!(report.action, Some(PolicyAction::Block));

    let scripts = backend.scripts();
    assert_eq!(scripts.len(), 2);
    assert!(scripts[0].contains("Remove-NetQosPolicy"));
    assert!(!scripts[0].contains("New-"));
    assert!(scripts[1].contains("New-NetFirewallRule"));

    let rules = backend.firewall_rules();
    assert_eq!(rules.len(), 2);
    let mut names: Vec<&str> = rules.iter().map(|rule| rule.display_name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec![FIREWALL_RULE_IN, FIREWALL_RULE_OUT]);
    assert!(rules.iter().all(|rule| rule.program == NOTEPAD && rule.action == "Block"));
    assert!(backend.qos_policies().is_empty());

    let log = report.log_text();
    assert!(log.contains(&format!("Blocking internet for: {NOTEPAD}")));
    assert!(log.contains("BlockInternet: success"));
    assert!(log.contains("using PID 3120 and ignoring 1 other(s)"));
}

#[test]
fn lower_limit_becomes_the_throttle() {
    let (orchestrator, backend) = setup();
    let report = orchestrator.apply(&ApplyRequest::new("notepad.exe", "500", "200"));

    assert!(report.succeeded(), "{}", report.log_text());
    assert!(backend.scripts()[1].contains("-ThrottleRateActionBitsPerSecond 200000"));
    let policies = backend.qos_policies();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].name, QOS_POLICY_NAME);
    assert_eq!(policies[0].app_path, NOTEPAD);
    assert_eq!(policies[0].bits_per_second, 200_000);
    assert!(report
        .log_text()
        .contains("Requested limit: 200 kbps (~200000 bits per second)"));
}

#[test]
fn invalid_input_fails_before_resolution() {
    let table = StaticProcessTable::new().failing("enumeration must not run");
    let backend = Arc::new(FakeBackend::new());
    let orchestrator = Orchestrator::new(Arc::new(table), backend.clone(), &Config::default());

    let report = orchestrator.apply(&ApplyRequest::new("notepad.exe", "abc", "0"));
    assert!(!report.succeeded());
    let log = report.log_text();
    assert!(log.contains("Limit IN must be a non-negative integer"), "{log}");
    assert!(!log.contains("enumeration"));
    assert!(backend.scripts().is_empty());
}

#[test]
fn clear_all_on_clean_host_succeeds() {
    let (orchestrator, backend) = setup();
    let report = orchestrator.clear_all();

    assert!(report.succeeded());
    assert_eq!(report.kind, RunKind::Clear);
    assert_eq!(
        report.result.log,
        vec!["Clearing QoS policy and firewall rules...", "ClearAllLimits: success"]
    );
    assert_eq!(backend.scripts().len(), 1);
}

#[test]
fn clear_all_undoes_apply() {
    let (orchestrator, backend) = setup();
    assert!(orchestrator.apply(&ApplyRequest::new("notepad.exe", "0", "")).succeeded());
    assert!(orchestrator.apply(&ApplyRequest::new("game.exe", "", "128")).succeeded());
    assert_eq!(backend.firewall_rules().len(), 0, "apply clears earlier rules");
    assert_eq!(backend.qos_policies().len(), 1);

    assert!(orchestrator.clear_all().succeeded());
    assert!(backend.firewall_rules().is_empty());
    assert!(backend.qos_policies().is_empty());
}

#[test]
fn failed_clear_does_not_stop_apply() {
    let (orchestrator, backend) = setup();
    backend.fail_cmdlet("Remove-NetQosPolicy");

    let report = orchestrator.apply(&ApplyRequest::new("notepad.exe", "0", "0"));
    let log = report.log_text();
    assert!(log.contains("ClearAllLimits error"), "{log}");
    assert!(log.contains("BlockInternet: success"), "{log}");

    let warning = report
        .result
        .log
        .iter()
        .position(|line| line == "Warning: clearing previous rules failed; continuing")
        .expect("clear failure is reported in the log");
    let blocking = report
        .result
        .log
        .iter()
        .position(|line| line.starts_with("Blocking internet for:"))
        .unwrap();
    assert!(warning < blocking, "{log}");
    assert!(report.succeeded());
    assert_eq!(backend.firewall_rules().len(), 2);
}

#[test]
fn failed_install_fails_the_run() {
    let (orchestrator, backend) = setup();
    backend.fail_cmdlet("New-NetQosPolicy");

    let report = orchestrator.apply(&ApplyRequest::new("notepad.exe", "10", "0"));
    assert!(!report.succeeded());
    assert!(report.log_text().contains("ApplyLimit error"));
    assert!(backend.qos_policies().is_empty());
}

#[test]
fn stale_state_from_earlier_runs_is_replaced() {
    let (orchestrator, backend) = setup();
    backend.seed_qos_policy(QosPolicy {
        name: QOS_POLICY_NAME.to_string(),
        app_path: r"C:\old.exe".to_string(),
        bits_per_second: 1000,
    });
    backend.seed_firewall_rule(FirewallRule {
        display_name: FIREWALL_RULE_OUT.to_string(),
        program: r"C:\old.exe".to_string(),
        direction: "Outbound".to_string(),
        action: "Block".to_string(),
    });

    let report = orchestrator.apply(&ApplyRequest::new("game.exe", "300", "300"));
    assert!(report.succeeded(), "{}", report.log_text());
    assert!(backend.firewall_rules().is_empty());
    let policies = backend.qos_policies();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].app_path, r"C:\Games\My $pecial `Game`\game.exe");
    assert_eq!(policies[0].bits_per_second, 300_000);
}

#[test]
fn shell_launch_failure_is_reported() {
    let (orchestrator, backend) = setup();
    backend.fail_launch("launch powershell: program not found");

    let report = orchestrator.clear_all();
    assert!(!report.succeeded());
    assert!(report
        .log_text()
        .contains("ClearAllLimits error: policy execution failed: launch powershell: program not found"));
}
