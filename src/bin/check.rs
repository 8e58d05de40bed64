//! `check`: reads `{ source, version? }` from stdin, writes the list of new versions
//! (oldest first) to stdout as JSON.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use gitpool::backend::Backend;
use gitpool::config::CheckInput;
use gitpool::poller;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading stdin")?;
    let check_input: CheckInput =
        serde_json::from_str(&input).context("parsing check input JSON")?;

    let mut backend = Backend::new(check_input.source.clone())?;
    backend.setup().await?;
    backend.reset().await?;

    let versions = poller::check(
        backend.repo()?,
        &check_input.source,
        check_input.version.as_ref(),
    )
    .await?;

    let stdout = serde_json::to_string(&versions)?;
    std::io::stdout().write_all(stdout.as_bytes())?;
    Ok(())
}
