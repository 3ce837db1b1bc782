use anyhow::Result;

use workflow::{ApplyRequest, Orchestrator};

pub struct ApplyInputs {
    pub process: String,
    pub inbound: String,
    pub outbound: String,
    pub json: bool,
}

pub fn execute(orchestrator: &Orchestrator, inputs: ApplyInputs) -> Result<()> {
    let request = ApplyRequest::new(inputs.process, inputs.inbound, inputs.outbound);
    let report = orchestrator.apply(&request);
    super::finish(&report, inputs.json)
}
