//! Renders the PowerShell scripts that install and remove this tool's
//! firewall rules and QoS throttle policy.
//!
//! Every script addresses rules by the fixed names in
//! [`netlimit_core::config`], so a clear issued by any run finds whatever an
//! earlier run created.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use netlimit_core::types::PolicyAction;

pub mod escape;
pub mod rules;

pub use escape::escape_for_powershell;
pub use rules::clear::render_clear_script;
pub use rules::firewall::render_block_script;
pub use rules::qos::{kbps_to_bits_per_second, render_rate_limit_script};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Clear,
    Block,
    RateLimit,
}

impl ScriptKind {
    /// Short label used in log lines ("ClearAllLimits: success").
    pub fn label(&self) -> &'static str {
        match self {
            ScriptKind::Clear => "ClearAllLimits",
            ScriptKind::Block => "BlockInternet",
            ScriptKind::RateLimit => "ApplyLimit",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A rendered script plus what it is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyScript {
    pub kind: ScriptKind,
    pub text: String,
}

impl PolicyScript {
    pub fn new(kind: ScriptKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// Renders the install script for an already derived action.
pub fn render_for_action(action: PolicyAction, exe_path: &Path) -> PolicyScript {
    match action {
        PolicyAction::Block => render_block_script(exe_path),
        PolicyAction::RateLimit { kbps } => render_rate_limit_script(exe_path, kbps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;
    use std::path::PathBuf;

    #[test]
    fn test_render_for_action_dispatch() {
        let path = PathBuf::from(r"C:\Windows\notepad.exe");
        assert_eq!(
            render_for_action(PolicyAction::Block, &path).kind,
            ScriptKind::Block
        );

        let kbps = NonZeroU32::new(200).unwrap();
        let script = render_for_action(PolicyAction::RateLimit { kbps }, &path);
        assert_eq!(script.kind, ScriptKind::RateLimit);
        assert!(script.text.contains("-ThrottleRateActionBitsPerSecond 200000"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(ScriptKind::Clear.to_string(), "ClearAllLimits");
        assert_eq!(ScriptKind::Block.label(), "BlockInternet");
        assert_eq!(ScriptKind::RateLimit.label(), "ApplyLimit");
    }
}
