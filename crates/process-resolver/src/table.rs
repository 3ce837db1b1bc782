use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use sysinfo::{Pid, System};

use netlimit_core::NetLimitError;

/// One row of a process listing. `name` is `None` when it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: Option<String>,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: Some(name.into()),
        }
    }

    pub fn unnamed(pid: u32) -> Self {
        Self { pid, name: None }
    }
}

/// Read-only view of the host's running processes.
pub trait ProcessTable: Send + Sync {
    fn processes(&self) -> Result<Vec<ProcessEntry>, NetLimitError>;

    /// Full path of the executable behind `pid`, or `None` when the OS will
    /// not tell us (access denied, process gone).
    fn executable_path(&self, pid: u32) -> Result<Option<PathBuf>, NetLimitError>;
}

/// Live process table backed by `sysinfo`, listed in ascending PID order.
pub struct SysinfoProcessTable {
    system: Mutex<System>,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn processes(&self) -> Result<Vec<ProcessEntry>, NetLimitError> {
        let mut system = self.lock();
        system.refresh_processes();

        let mut entries: Vec<ProcessEntry> = system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let name = process.name();
                ProcessEntry {
                    pid: pid.as_u32(),
                    name: (!name.is_empty()).then(|| name.to_string()),
                }
            })
            .collect();
        entries.sort_by_key(|entry| entry.pid);
        tracing::debug!(target: "netlimit.resolver", count = entries.len(), "enumerated processes");
        Ok(entries)
    }

    fn executable_path(&self, pid: u32) -> Result<Option<PathBuf>, NetLimitError> {
        let mut system = self.lock();
        let pid = Pid::from_u32(pid);
        if !system.refresh_process(pid) {
            return Ok(None);
        }
        Ok(system
            .process(pid)
            .and_then(|process| process.exe())
            .map(|path| path.to_path_buf()))
    }
}

/// Fixed in-memory table.
#[derive(Debug, Clone, Default)]
pub struct StaticProcessTable {
    entries: Vec<ProcessEntry>,
    paths: Vec<(u32, PathBuf)>,
    failure: Option<String>,
}

impl StaticProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, pid: u32, name: &str, exe_path: impl Into<PathBuf>) -> Self {
        self.entries.push(ProcessEntry::new(pid, name));
        self.paths.push((pid, exe_path.into()));
        self
    }

    /// A process whose executable path cannot be read.
    pub fn with_hidden_process(mut self, pid: u32, name: &str) -> Self {
        self.entries.push(ProcessEntry::new(pid, name));
        self
    }

    pub fn with_entry(mut self, entry: ProcessEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Makes enumeration fail with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

impl ProcessTable for StaticProcessTable {
    fn processes(&self) -> Result<Vec<ProcessEntry>, NetLimitError> {
        match &self.failure {
            Some(message) => Err(NetLimitError::PlatformQuery(message.clone())),
            None => Ok(self.entries.clone()),
        }
    }

    fn executable_path(&self, pid: u32) -> Result<Option<PathBuf>, NetLimitError> {
        Ok(self
            .paths
            .iter()
            .find(|(candidate, _)| *candidate == pid)
            .map(|(_, path)| path.clone()))
    }
}
