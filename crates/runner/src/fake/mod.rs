//! In-memory stand-in for an elevated PowerShell session.
//!
//! Interprets the cmdlets the policy scripts use against a private firewall
//! and QoS store, so workflows can be exercised without touching a host.
//! Error handling follows PowerShell's `-ErrorAction` and
//! `$ErrorActionPreference` rules. Every failure lands in `$Error`, silenced
//! or not. The exit code follows `powershell -Command`: the `exit` value if
//! one ran, 1 after a terminating error, otherwise 0 or 1 from `$?` of the
//! last statement.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use netlimit_core::NetLimitError;

use crate::{PolicyBackend, ScriptOutput};

mod parse;

use parse::{parse_script, Param, Piece, Statement, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosPolicy {
    pub name: String,
    pub app_path: String,
    pub bits_per_second: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub display_name: String,
    pub program: String,
    pub direction: String,
    pub action: String,
}

#[derive(Debug, Default)]
struct FakeState {
    qos: Vec<QosPolicy>,
    rules: Vec<FirewallRule>,
    scripts: Vec<String>,
    failing: HashSet<String>,
    launch_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

struct CmdletError {
    message: String,
    /// `CategoryInfo.Category` of the error record.
    category: &'static str,
    forced: bool,
}

impl CmdletError {
    fn new(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category,
            forced: false,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new("ObjectNotFound", message)
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::new("InvalidArgument", message)
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every later call to `cmdlet` fail with a terminating error,
    /// whatever its `-ErrorAction`.
    pub fn fail_cmdlet(&self, cmdlet: &str) {
        self.lock().failing.insert(cmdlet.to_ascii_lowercase());
    }

    /// Makes every later run fail as if the shell could not be started.
    pub fn fail_launch(&self, message: &str) {
        self.lock().launch_error = Some(message.to_string());
    }

    pub fn seed_qos_policy(&self, policy: QosPolicy) {
        self.lock().qos.push(policy);
    }

    pub fn seed_firewall_rule(&self, rule: FirewallRule) {
        self.lock().rules.push(rule);
    }

    /// Every script handed to the backend, including failed ones.
    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    pub fn qos_policies(&self) -> Vec<QosPolicy> {
        self.lock().qos.clone()
    }

    pub fn firewall_rules(&self) -> Vec<FirewallRule> {
        self.lock().rules.clone()
    }
}

impl PolicyBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn run_script(&self, script: &str) -> Result<ScriptOutput, NetLimitError> {
        let mut state = self.lock();
        state.scripts.push(script.to_string());
        if let Some(message) = &state.launch_error {
            return Err(NetLimitError::PolicyExecution(message.clone()));
        }

        let statements = match parse_script(script) {
            Ok(statements) => statements,
            Err(err) => {
                return Ok(ScriptOutput {
                    combined: format!("ParserError: line {}: {}\n", err.line, err.message),
                    exit_code: Some(1),
                })
            }
        };

        let mut session = Session {
            state: &mut *state,
            variables: HashMap::new(),
            output: String::new(),
            errors: Vec::new(),
            last_ok: true,
            exit_code: None,
        };
        session.run(statements);
        let exit_code = session
            .exit_code
            .unwrap_or(if session.last_ok { 0 } else { 1 });
        Ok(ScriptOutput {
            combined: session.output,
            exit_code: Some(exit_code),
        })
    }
}

struct Session<'a> {
    state: &'a mut FakeState,
    variables: HashMap<String, String>,
    output: String,
    /// Categories of the records in `$Error`, oldest first.
    errors: Vec<&'static str>,
    /// `$?` after the most recent statement.
    last_ok: bool,
    exit_code: Option<i32>,
}

impl Session<'_> {
    /// Runs statements in order. Returns false once the script has ended.
    fn run(&mut self, statements: Vec<Statement>) -> bool {
        for statement in statements {
            match statement {
                Statement::Assign { name, value } => {
                    let value = self.eval(&value);
                    self.variables.insert(name.to_ascii_lowercase(), value);
                    self.last_ok = true;
                }
                Statement::Exit(code) => {
                    self.exit_code = Some(code);
                    return false;
                }
                Statement::If {
                    condition,
                    then,
                    otherwise,
                } => {
                    let branch = match self.condition(&condition) {
                        Ok(true) => then,
                        Ok(false) => otherwise,
                        Err(message) => {
                            self.write_error("if", &message);
                            self.exit_code = Some(1);
                            return false;
                        }
                    };
                    if !self.run(branch) {
                        return false;
                    }
                }
                Statement::Invoke { cmdlet, params } => {
                    let params = self.bind(&params);
                    let Err(err) = self.invoke(&cmdlet, &params) else {
                        self.last_ok = true;
                        continue;
                    };
                    self.last_ok = false;
                    let action = if err.forced {
                        "stop".to_string()
                    } else {
                        params
                            .get("erroraction")
                            .cloned()
                            .flatten()
                            .or_else(|| self.variables.get("erroractionpreference").cloned())
                            .unwrap_or_else(|| "continue".to_string())
                            .to_ascii_lowercase()
                    };
                    match action.as_str() {
                        "ignore" => {}
                        "silentlycontinue" => self.errors.push(err.category),
                        "stop" => {
                            self.errors.push(err.category);
                            self.write_error(&cmdlet, &err.message);
                            self.exit_code = Some(1);
                            return false;
                        }
                        _ => {
                            self.errors.push(err.category);
                            self.write_error(&cmdlet, &err.message);
                        }
                    }
                }
            }
        }
        true
    }

    fn write_error(&mut self, cmdlet: &str, message: &str) {
        self.output.push_str(&format!("{cmdlet} : {message}\n"));
    }

    /// Evaluates the `$Error` counting conditions scripts end with:
    /// `$Error.Count -gt N` and
    /// `@($Error | Where-Object { $_.CategoryInfo.Category -ne 'X' }).Count -gt N`,
    /// with any of the comparison operators.
    fn condition(&self, condition: &str) -> Result<bool, String> {
        let unsupported = || format!("unsupported condition ({condition})");
        let words: Vec<&str> = condition.split_whitespace().collect();
        let (count, rest) = match words.as_slice() {
            ["$Error.Count", rest @ ..] => (self.errors.len(), rest),
            ["@($Error", "|", "Where-Object", "{", "$_.CategoryInfo.Category", op, category, "}).Count", rest @ ..] =>
            {
                let category = category.trim_matches('\'');
                let wanted = match op.to_ascii_lowercase().as_str() {
                    "-eq" => true,
                    "-ne" => false,
                    _ => return Err(unsupported()),
                };
                let count = self
                    .errors
                    .iter()
                    .filter(|recorded| recorded.eq_ignore_ascii_case(category) == wanted)
                    .count();
                (count, rest)
            }
            _ => return Err(unsupported()),
        };
        let [op, value] = rest else {
            return Err(unsupported());
        };
        let value: usize = value.parse().map_err(|_| unsupported())?;
        match op.to_ascii_lowercase().as_str() {
            "-gt" => Ok(count > value),
            "-ge" => Ok(count >= value),
            "-lt" => Ok(count < value),
            "-le" => Ok(count <= value),
            "-eq" => Ok(count == value),
            "-ne" => Ok(count != value),
            _ => Err(unsupported()),
        }
    }

    fn eval(&self, token: &Token) -> String {
        match token {
            Token::Bare(word) => word.clone(),
            Token::Variable(name) => self.lookup(name),
            Token::Quoted(pieces) => pieces
                .iter()
                .map(|piece| match piece {
                    Piece::Text(text) => text.clone(),
                    Piece::Variable(name) => self.lookup(name),
                })
                .collect(),
        }
    }

    fn lookup(&self, name: &str) -> String {
        self.variables
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn bind(&self, params: &[Param]) -> HashMap<String, Option<String>> {
        params
            .iter()
            .map(|param| {
                let value = param.value.as_ref().map(|token| self.eval(token));
                (param.name.to_ascii_lowercase(), value)
            })
            .collect()
    }

    fn invoke(
        &mut self,
        cmdlet: &str,
        params: &HashMap<String, Option<String>>,
    ) -> Result<(), CmdletError> {
        let key = cmdlet.to_ascii_lowercase();
        if self.state.failing.contains(&key) {
            return Err(CmdletError {
                message: "Access is denied.".to_string(),
                category: "PermissionDenied",
                forced: true,
            });
        }
        match key.as_str() {
            "remove-netqospolicy" => {
                let name = required(params, "Name")?;
                let before = self.state.qos.len();
                self.state.qos.retain(|policy| !policy.name.eq_ignore_ascii_case(&name));
                if self.state.qos.len() == before {
                    return Err(CmdletError::not_found(format!(
                        "No MSFT_NetQosPolicySettingData objects found with property 'Name' equal to '{name}'"
                    )));
                }
                Ok(())
            }
            "new-netqospolicy" => {
                let name = required(params, "Name")?;
                let app_path = required(params, "AppPathNameMatchCondition")?;
                let raw_rate = required(params, "ThrottleRateActionBitsPerSecond")?;
                let bits_per_second = raw_rate.parse::<u64>().map_err(|_| {
                    CmdletError::invalid(format!(
                        "Cannot convert value \"{raw_rate}\" for ThrottleRateActionBitsPerSecond"
                    ))
                })?;
                if self
                    .state
                    .qos
                    .iter()
                    .any(|policy| policy.name.eq_ignore_ascii_case(&name))
                {
                    return Err(CmdletError::new(
                        "ResourceExists",
                        format!("Policy '{name}' already exists"),
                    ));
                }
                self.output.push_str(&format!(
                    "Name           : {name}\nThrottleRate   : {bits_per_second} Bits/sec\n"
                ));
                self.state.qos.push(QosPolicy {
                    name,
                    app_path,
                    bits_per_second,
                });
                Ok(())
            }
            "remove-netfirewallrule" => {
                let display_name = required(params, "DisplayName")?;
                let before = self.state.rules.len();
                self.state.rules.retain(|rule| rule.display_name != display_name);
                if self.state.rules.len() == before {
                    return Err(CmdletError::not_found(format!(
                        "No MSFT_NetFirewallRule objects found with property 'DisplayName' equal to '{display_name}'"
                    )));
                }
                Ok(())
            }
            "new-netfirewallrule" => {
                let display_name = required(params, "DisplayName")?;
                let program = required(params, "Program")?;
                let direction = one_of(params, "Direction", &["Inbound", "Outbound"])?;
                let action = one_of(params, "Action", &["Block", "Allow"])?;
                self.output.push_str(&format!("DisplayName    : {display_name}\n"));
                self.state.rules.push(FirewallRule {
                    display_name,
                    program,
                    direction,
                    action,
                });
                Ok(())
            }
            _ => Err(CmdletError::not_found(format!(
                "The term '{cmdlet}' is not recognized as a name of a cmdlet"
            ))),
        }
    }
}

fn required(params: &HashMap<String, Option<String>>, name: &str) -> Result<String, CmdletError> {
    params
        .get(&name.to_ascii_lowercase())
        .cloned()
        .flatten()
        .ok_or_else(|| CmdletError::invalid(format!("Missing an argument for parameter '{name}'")))
}

fn one_of(
    params: &HashMap<String, Option<String>>,
    name: &str,
    allowed: &[&str],
) -> Result<String, CmdletError> {
    let value = required(params, name)?;
    allowed
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(&value))
        .map(|candidate| candidate.to_string())
        .ok_or_else(|| {
            CmdletError::invalid(format!("Cannot validate argument on parameter '{name}': {value}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;
    use std::path::PathBuf;

    use netlimit_core::config::{FIREWALL_RULE_IN, FIREWALL_RULE_OUT, QOS_POLICY_NAME};
    use policy_engine::{render_block_script, render_clear_script, render_rate_limit_script};

    fn run(backend: &FakeBackend, script: &str) -> ScriptOutput {
        backend.run_script(script).unwrap()
    }

    #[test]
    fn test_clear_on_empty_store_succeeds() {
        let backend = FakeBackend::new();
        let output = run(&backend, &render_clear_script().text);
        assert_eq!(output.exit_code, Some(0));
        assert!(output.combined.is_empty());
    }

    #[test]
    fn test_block_installs_two_rules() {
        let backend = FakeBackend::new();
        let path = r"C:\Windows\notepad.exe";
        let output = run(&backend, &render_block_script(&PathBuf::from(path)).text);
        assert_eq!(output.exit_code, Some(0));

        let rules = backend.firewall_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].display_name, FIREWALL_RULE_OUT);
        assert_eq!(rules[0].direction, "Outbound");
        assert_eq!(rules[1].display_name, FIREWALL_RULE_IN);
        assert_eq!(rules[1].direction, "Inbound");
        assert!(rules.iter().all(|rule| rule.program == path && rule.action == "Block"));
    }

    #[test]
    fn test_reapplying_block_does_not_stack() {
        let backend = FakeBackend::new();
        let script = render_block_script(&PathBuf::from(r"C:\a.exe")).text;
        run(&backend, &script);
        run(&backend, &script);
        assert_eq!(backend.firewall_rules().len(), 2);
    }

    #[test]
    fn test_hostile_paths_roundtrip_literally() {
        let hostile = [
            r#"C:\odd "quoted" dir\app.exe"#,
            r"C:\tick`n`t\app.exe",
            r"C:\$Recycle.Bin\$env:USERPROFILE.exe",
            r#"C:\x"; Remove-NetFirewallRule -DisplayName "Other"; "\y.exe"#,
            "C:\\\u{201C}smart\u{201D}\\app.exe",
            r"C:\trailing`",
        ];
        for path in hostile {
            let backend = FakeBackend::new();
            let output = run(&backend, &render_block_script(&PathBuf::from(path)).text);
            assert_eq!(output.exit_code, Some(0), "block failed for {path}: {}", output.combined);
            let rules = backend.firewall_rules();
            assert_eq!(rules.len(), 2, "{path}");
            assert!(rules.iter().all(|rule| rule.program == path), "{path}");

            let kbps = NonZeroU32::new(10).unwrap();
            let output = run(&backend, &render_rate_limit_script(&PathBuf::from(path), kbps).text);
            assert_eq!(output.exit_code, Some(0), "limit failed for {path}");
            assert_eq!(backend.qos_policies()[0].app_path, path);
        }
    }

    #[test]
    fn test_unescaped_quote_breaks_script() {
        let backend = FakeBackend::new();
        let output = run(&backend, "$path = \"C:\\a\"b.exe\"\n");
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.starts_with("ParserError"));
    }

    #[test]
    fn test_rate_limit_replaces_policy() {
        let backend = FakeBackend::new();
        let path = PathBuf::from(r"C:\game.exe");
        run(&backend, &render_rate_limit_script(&path, NonZeroU32::new(500).unwrap()).text);
        let output = run(&backend, &render_rate_limit_script(&path, NonZeroU32::new(200).unwrap()).text);
        assert_eq!(output.exit_code, Some(0));

        let policies = backend.qos_policies();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name, QOS_POLICY_NAME);
        assert_eq!(policies[0].bits_per_second, 200_000);
    }

    #[test]
    fn test_duplicate_policy_without_remove_fails() {
        let backend = FakeBackend::new();
        let create = format!(
            "New-NetQosPolicy -Name \"{QOS_POLICY_NAME}\" -AppPathNameMatchCondition \"a\" -ThrottleRateActionBitsPerSecond 1000"
        );
        assert_eq!(run(&backend, &create).exit_code, Some(0));
        let output = run(&backend, &create);
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.contains("already exists"));
    }

    #[test]
    fn test_clear_removes_seeded_state() {
        let backend = FakeBackend::new();
        backend.seed_qos_policy(QosPolicy {
            name: QOS_POLICY_NAME.to_string(),
            app_path: "x".to_string(),
            bits_per_second: 1000,
        });
        backend.seed_firewall_rule(FirewallRule {
            display_name: FIREWALL_RULE_IN.to_string(),
            program: "x".to_string(),
            direction: "Inbound".to_string(),
            action: "Block".to_string(),
        });
        let output = run(&backend, &render_clear_script().text);
        assert_eq!(output.exit_code, Some(0));
        assert!(backend.qos_policies().is_empty());
        assert!(backend.firewall_rules().is_empty());
    }

    #[test]
    fn test_missing_rule_without_silence_fails() {
        let backend = FakeBackend::new();
        let output = run(&backend, "Remove-NetFirewallRule -DisplayName \"nope\"");
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.contains("No MSFT_NetFirewallRule objects found"));
    }

    #[test]
    fn test_silenced_failure_as_last_statement_exits_one() {
        let backend = FakeBackend::new();
        let script = "New-NetFirewallRule -DisplayName \"a\" -Program \"b\" -Direction Inbound -Action Block\nRemove-NetFirewallRule -DisplayName \"nope\" -ErrorAction SilentlyContinue";
        let output = run(&backend, script);
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.is_empty());

        let script = "Remove-NetFirewallRule -DisplayName \"nope\" -ErrorAction SilentlyContinue\n$done = 1";
        assert_eq!(run(&backend, script).exit_code, Some(0));
    }

    #[test]
    fn test_exit_sets_code_and_stops() {
        let backend = FakeBackend::new();
        let script = "exit 3\nNew-NetFirewallRule -DisplayName \"a\" -Program \"b\" -Direction Inbound -Action Block";
        assert_eq!(run(&backend, script).exit_code, Some(3));
        assert!(backend.firewall_rules().is_empty());

        let script = "Remove-NetFirewallRule -DisplayName \"nope\" -ErrorAction SilentlyContinue\nexit";
        assert_eq!(run(&backend, script).exit_code, Some(0));
    }

    #[test]
    fn test_clear_exit_check_counts_unexpected_errors() {
        let backend = FakeBackend::new();
        let clear = render_clear_script().text;
        let check = clear.lines().last().unwrap();

        let only_missing = format!("Remove-NetFirewallRule -DisplayName \"nope\" -ErrorAction SilentlyContinue\n{check}");
        assert_eq!(run(&backend, &only_missing).exit_code, Some(0));

        let bad_argument = format!("Remove-NetQosPolicy -Confirm:$false -ErrorAction SilentlyContinue\n{check}");
        let output = run(&backend, &bad_argument);
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.is_empty());
    }

    #[test]
    fn test_error_count_conditions() {
        let backend = FakeBackend::new();
        let script = "Remove-NetFirewallRule -DisplayName \"nope\" -ErrorAction SilentlyContinue\nif ($Error.Count -eq 1) { exit 7 } else { exit 8 }";
        assert_eq!(run(&backend, script).exit_code, Some(7));

        let script = "if ($Error.Count -gt 0) { exit 7 }\nNew-NetFirewallRule -DisplayName \"a\" -Program \"b\" -Direction Inbound -Action Block";
        assert_eq!(run(&backend, script).exit_code, Some(0));
        assert_eq!(backend.firewall_rules().len(), 1);

        let output = run(&backend, "if ($ready) { exit 0 }");
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.contains("unsupported condition"));
    }

    #[test]
    fn test_stop_preference_halts_script() {
        let backend = FakeBackend::new();
        let script = "$ErrorActionPreference = 'Stop'\nUnknown-Cmdlet -X 1\nNew-NetFirewallRule -DisplayName \"a\" -Program \"b\" -Direction Inbound -Action Block";
        let output = run(&backend, script);
        assert_eq!(output.exit_code, Some(1));
        assert!(backend.firewall_rules().is_empty());
    }

    #[test]
    fn test_injected_failure_ignores_silent_continue() {
        let backend = FakeBackend::new();
        backend.fail_cmdlet("Remove-NetQosPolicy");
        let output = run(&backend, &render_clear_script().text);
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.contains("Access is denied."));
    }

    #[test]
    fn test_launch_failure_and_script_log() {
        let backend = FakeBackend::new();
        backend.fail_launch("powershell not found");
        let err = backend.run_script("Get-Date").unwrap_err();
        assert!(matches!(err, NetLimitError::PolicyExecution(_)));
        assert_eq!(backend.scripts(), vec!["Get-Date".to_string()]);
    }
}
