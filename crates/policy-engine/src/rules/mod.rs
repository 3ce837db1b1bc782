pub mod clear;
pub mod firewall;
pub mod qos;

/// Removal never fails the script when the rule is already gone.
pub(crate) const SILENT: &str = "-ErrorAction SilentlyContinue";

/// Makes any non-silenced cmdlet failure terminate the script with a non-zero
/// exit code.
pub(crate) const STOP_ON_ERROR: &str = "$ErrorActionPreference = 'Stop'";

/// Ends a script whose failures were all silenced. `-Command` would otherwise
/// exit with `$?` of the last statement, which is false after a silenced
/// not-found. Anything other than not-found still exits 1.
pub(crate) const EXIT_ON_UNEXPECTED_ERRORS: &str = "if (@($Error | Where-Object { $_.CategoryInfo.Category -ne 'ObjectNotFound' }).Count -gt 0) { exit 1 } else { exit 0 }";
