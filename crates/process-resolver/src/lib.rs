//! Turns a process name typed by the user into a [`ProcessTarget`].

use netlimit_core::{NetLimitError, ProcessTarget};

pub mod table;

pub use table::{ProcessEntry, ProcessTable, StaticProcessTable, SysinfoProcessTable};

/// Finds running processes named exactly `name` (ignoring case) and
/// resolves the executable path of the first one in table order.
///
/// Every matching PID is kept on the target, the chosen one first.
pub fn resolve(table: &dyn ProcessTable, name: &str) -> Result<ProcessTarget, NetLimitError> {
    let entries = table.processes()?;
    if entries.is_empty() {
        return Err(NetLimitError::PlatformQuery(
            "process enumeration returned no processes".to_string(),
        ));
    }

    let wanted = name.to_lowercase();
    let pids: Vec<u32> = entries
        .iter()
        .filter(|entry| {
            entry
                .name
                .as_deref()
                .is_some_and(|candidate| candidate.to_lowercase() == wanted)
        })
        .map(|entry| entry.pid)
        .collect();

    let Some(&pid) = pids.first() else {
        return Err(NetLimitError::NotFound {
            name: name.to_string(),
        });
    };
    if pids.len() > 1 {
        tracing::warn!(
            target: "netlimit.resolver",
            process = name,
            chosen = pid,
            ignored = pids.len() - 1,
            "multiple processes match; using the first"
        );
    }

    let exe_path = table
        .executable_path(pid)?
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| {
            NetLimitError::PlatformQuery(format!("could not read executable path of PID {pid}"))
        })?;
    tracing::info!(target: "netlimit.resolver", process = name, pid, path = %exe_path.display(), "resolved");
    ProcessTarget::new(name.to_string(), pids, exe_path)
}
