use netlimit_core::config::{FIREWALL_RULE_IN, FIREWALL_RULE_OUT};

use crate::rules::firewall::remove_rule_line;
use crate::rules::qos::remove_policy_line;
use crate::rules::EXIT_ON_UNEXPECTED_ERRORS;
use crate::{PolicyScript, ScriptKind};

/// Removes the QoS policy and both firewall rules, tolerating absent ones.
/// Exits 0 when the only failures were "not found".
pub fn render_clear_script() -> PolicyScript {
    let text = [
        remove_policy_line(),
        remove_rule_line(FIREWALL_RULE_IN),
        remove_rule_line(FIREWALL_RULE_OUT),
        EXIT_ON_UNEXPECTED_ERRORS.to_string(),
    ]
    .join("\n");
    tracing::trace!(target: "netlimit.policy", "rendered clear script");
    PolicyScript::new(ScriptKind::Clear, text + "\n")
}
