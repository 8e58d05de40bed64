//! `in`: reads `{ source, params }` from stdin, performs the selected operation
//! (`acquire`, `release`, `remove`, `add`/`add_claimed`), writes `{ version, metadata }`
//! to stdout as JSON.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use gitpool::config::OperationInput;
use gitpool::orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading stdin")?;
    let OperationInput { source, params } =
        serde_json::from_str(&input).context("parsing operation input JSON")?;

    let output = orchestrator::dispatch(source, params).await?;

    let stdout = serde_json::to_string(&output)?;
    std::io::stdout().write_all(stdout.as_bytes())?;
    Ok(())
}
