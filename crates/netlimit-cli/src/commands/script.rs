use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::Result;

use policy_engine::{render_block_script, render_clear_script, render_rate_limit_script, PolicyScript};

/// Which script to print without running it.
pub enum ScriptRequest {
    Block { path: PathBuf },
    Limit { path: PathBuf, kbps: NonZeroU32 },
    Clear,
}

pub fn render(request: &ScriptRequest) -> PolicyScript {
    match request {
        ScriptRequest::Block { path } => render_block_script(path),
        ScriptRequest::Limit { path, kbps } => render_rate_limit_script(path, *kbps),
        ScriptRequest::Clear => render_clear_script(),
    }
}

pub fn execute(request: ScriptRequest) -> Result<()> {
    let script = render(&request);
    tracing::debug!(kind = %script.kind, "printing script");
    print!("{}", script.text);
    Ok(())
}
