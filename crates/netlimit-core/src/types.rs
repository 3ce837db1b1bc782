use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::NetLimitError;

/// A running process picked out by name, with the executable path that
/// firewall and QoS rules get scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTarget {
    pub name: String,
    pub pids: Vec<u32>,
    pub exe_path: PathBuf,
}

impl ProcessTarget {
    pub fn new(name: String, pids: Vec<u32>, exe_path: PathBuf) -> Result<Self, NetLimitError> {
        if exe_path.as_os_str().is_empty() {
            return Err(NetLimitError::PlatformQuery(format!(
                "empty executable path for process {name}"
            )));
        }
        Ok(Self {
            name,
            pids,
            exe_path,
        })
    }

    /// The PID whose executable path was resolved.
    pub fn primary_pid(&self) -> Option<u32> {
        self.pids.first().copied()
    }
}

/// Requested caps in kbps. Zero in both directions means block, not unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthSpec {
    pub inbound_kbps: u32,
    pub outbound_kbps: u32,
}

impl BandwidthSpec {
    pub fn new(inbound_kbps: u32, outbound_kbps: u32) -> Self {
        Self {
            inbound_kbps,
            outbound_kbps,
        }
    }

    /// Parses the raw user inputs. Blank fields are 0.
    pub fn parse(inbound: &str, outbound: &str) -> Result<Self, NetLimitError> {
        Ok(Self::new(
            parse_kbps("Limit IN", inbound)?,
            parse_kbps("Limit OUT", outbound)?,
        ))
    }

    pub fn action(&self) -> PolicyAction {
        let limit = match (self.inbound_kbps, self.outbound_kbps) {
            (0, 0) => None,
            (inbound, 0) => Some(inbound),
            (0, outbound) => Some(outbound),
            (inbound, outbound) => Some(inbound.min(outbound)),
        };
        match limit.and_then(NonZeroU32::new) {
            Some(kbps) => PolicyAction::RateLimit { kbps },
            None => PolicyAction::Block,
        }
    }
}

fn parse_kbps(field: &str, raw: &str) -> Result<u32, NetLimitError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NetLimitError::Validation(format!(
            "{field} must be a non-negative integer (got {trimmed:?})"
        )));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| NetLimitError::Validation(format!("{field} is out of range (got {trimmed})")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyAction {
    Block,
    RateLimit { kbps: NonZeroU32 },
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyAction::Block => write!(f, "block"),
            PolicyAction::RateLimit { kbps } => write!(f, "rate limit {kbps} kbps"),
        }
    }
}

/// Log text and outcome of one policy run, in the order things happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRunResult {
    pub log: Vec<String>,
    pub succeeded: bool,
}

impl PolicyRunResult {
    pub fn success() -> Self {
        Self {
            log: Vec::new(),
            succeeded: true,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Appends another fragment's log lines. The outcome is left untouched.
    pub fn extend_log(&mut self, other: &PolicyRunResult) {
        self.log.extend(other.log.iter().cloned());
    }

    pub fn text(&self) -> String {
        self.log.join("\n")
    }
}
