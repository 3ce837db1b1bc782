use std::process::Command;

use netlimit_core::config::ShellConfig;
use netlimit_core::NetLimitError;

use crate::command::ShellCommand;
use crate::{PolicyBackend, ScriptOutput};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Runs scripts through a real PowerShell process. Needs an elevated
/// session to change firewall or QoS state.
#[derive(Debug, Clone)]
pub struct PowerShellBackend {
    program: String,
    no_window: bool,
}

impl PowerShellBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            no_window: true,
        }
    }

    pub fn from_config(config: &ShellConfig) -> Self {
        Self {
            program: config.program.clone(),
            no_window: config.no_window,
        }
    }

    fn build(&self, script: &str) -> Command {
        let shell = ShellCommand::powershell(&self.program, script);
        let mut cmd = Command::new(&shell.program);
        cmd.args(&shell.args);
        #[cfg(windows)]
        if self.no_window {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        cmd
    }
}

impl PolicyBackend for PowerShellBackend {
    fn name(&self) -> &'static str {
        "powershell"
    }

    fn run_script(&self, script: &str) -> Result<ScriptOutput, NetLimitError> {
        tracing::debug!(
            target: "netlimit.runner",
            program = %self.program,
            no_window = self.no_window,
            "spawn"
        );
        let output = self.build(script).output().map_err(|err| {
            NetLimitError::PolicyExecution(format!("launch {}: {err}", self.program))
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ScriptOutput {
            combined,
            exit_code: output.status.code(),
        })
    }
}
