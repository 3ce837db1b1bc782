use anyhow::Result;

use workflow::Orchestrator;

pub fn execute(orchestrator: &Orchestrator, json: bool) -> Result<()> {
    let report = orchestrator.clear_all();
    super::finish(&report, json)
}
