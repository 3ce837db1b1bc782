//! Runs console actions off the render thread.
//!
//! Every action gets its own blocking task and reports back over a channel
//! that the render loop drains. Actions are not serialized against each
//! other, and nothing bounds how long a shell may run.

use anyhow::{Context, Result};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use workflow::{ApplyRequest, Orchestrator, RunReport};

pub struct Dispatcher {
    runtime: Runtime,
    orchestrator: Orchestrator,
    tx: UnboundedSender<RunReport>,
    rx: UnboundedReceiver<RunReport>,
}

impl Dispatcher {
    pub fn new(orchestrator: Orchestrator) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("netlimit-console")
            .enable_all()
            .build()
            .context("start console runtime")?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            runtime,
            orchestrator,
            tx,
            rx,
        })
    }

    pub fn apply(&self, request: ApplyRequest) {
        let orchestrator = self.orchestrator.clone();
        let tx = self.tx.clone();
        self.runtime.spawn_blocking(move || {
            let report = orchestrator.apply(&request);
            let _ = tx.send(report);
        });
    }

    pub fn clear_all(&self) {
        let orchestrator = self.orchestrator.clone();
        let tx = self.tx.clone();
        self.runtime.spawn_blocking(move || {
            let report = orchestrator.clear_all();
            let _ = tx.send(report);
        });
    }

    /// Reports that arrived since the last call, in arrival order.
    pub fn drain(&mut self) -> Vec<RunReport> {
        let mut reports = Vec::new();
        while let Ok(report) = self.rx.try_recv() {
            reports.push(report);
        }
        reports
    }

    /// Returns without waiting for shells still running.
    pub fn shutdown(self) {
        self.runtime.shutdown_background();
    }
}
