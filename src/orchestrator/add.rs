//! `add`: introduce a new lock into the pool, unclaimed by default or directly into
//! `claimed/` when the caller passes `add_claimed`.

use crate::config::{OperationOutput, Params, SourceConfig};
use crate::{retry, Backend, PoolError, PoolResult};

pub async fn add(source: SourceConfig, params: Params) -> PoolResult<OperationOutput> {
    let Params::Add { dir, already_claimed } = params else {
        return Err(PoolError::InputInvalid(
            "add requires params.add or params.add_claimed".to_string(),
        ));
    };
    let name = Params::read_name(&dir)?;
    let payload = Params::read_metadata(&dir).unwrap_or_default();

    let retry_delay = source.retry_delay();
    let mut backend = Backend::new(source)?;
    backend.setup().await?;

    let version = retry::retry(&backend, retry_delay, || async {
        if already_claimed {
            backend.add_claimed(&name, &payload).await?;
        } else {
            backend.add_unclaimed(&name, &payload).await?;
        }
        backend.publish().await
    })
    .await?;

    Ok(OperationOutput {
        version,
        metadata: Vec::new(),
    })
}
