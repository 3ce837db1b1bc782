/// Flags that keep the shell non-interactive and independent of the
/// machine's profile scripts and execution policy.
const POWERSHELL_FLAGS: [&str; 5] = [
    "-NoProfile",
    "-NonInteractive",
    "-ExecutionPolicy",
    "Bypass",
    "-Command",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Passes `script` inline as the `-Command` body.
    pub fn powershell(program: &str, script: &str) -> Self {
        let mut args: Vec<String> = POWERSHELL_FLAGS.iter().map(|flag| flag.to_string()).collect();
        args.push(script.to_string());
        Self::new(program, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powershell_command_shape() {
        let cmd = ShellCommand::powershell("pwsh", "Get-Date\nGet-Host");
        assert_eq!(cmd.program, "pwsh");
        assert_eq!(
            cmd.args,
            vec![
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-Command",
                "Get-Date\nGet-Host",
            ]
        );
    }
}
