use std::path::Path;

use netlimit_core::config::{FIREWALL_RULE_IN, FIREWALL_RULE_OUT};

use crate::escape::quoted;
use crate::rules::{SILENT, STOP_ON_ERROR};
use crate::{PolicyScript, ScriptKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "Inbound",
            Direction::Outbound => "Outbound",
        }
    }
}

pub(crate) fn remove_rule_line(display_name: &str) -> String {
    format!(
        "Remove-NetFirewallRule -DisplayName {} {SILENT}",
        quoted(display_name)
    )
}

fn new_rule_line(display_name: &str, direction: Direction) -> String {
    format!(
        "New-NetFirewallRule -DisplayName {} -Program $path -Direction {} -Action Block -ErrorAction Stop",
        quoted(display_name),
        direction.as_str()
    )
}

/// Blocks all traffic in both directions for `exe_path`.
///
/// Any rules left over under the tool-owned names are removed first, so
/// re-applying never stacks duplicates.
pub fn render_block_script(exe_path: &Path) -> PolicyScript {
    let path = exe_path.to_string_lossy();
    let text = format!(
        "{STOP_ON_ERROR}\n\
         $path = {path}\n\
         \n\
         {remove_in}\n\
         {remove_out}\n\
         \n\
         {new_out}\n\
         {new_in}\n",
        path = quoted(&path),
        remove_in = remove_rule_line(FIREWALL_RULE_IN),
        remove_out = remove_rule_line(FIREWALL_RULE_OUT),
        new_out = new_rule_line(FIREWALL_RULE_OUT, Direction::Outbound),
        new_in = new_rule_line(FIREWALL_RULE_IN, Direction::Inbound),
    );
    tracing::trace!(target: "netlimit.policy", path = %path, "rendered block script");
    PolicyScript::new(ScriptKind::Block, text)
}
