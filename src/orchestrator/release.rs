//! `release`: move a previously claimed lock back to `unclaimed/`.

use crate::config::{OperationOutput, Params, SourceConfig};
use crate::{retry, Backend, PoolError, PoolResult};

pub async fn release(source: SourceConfig, params: Params) -> PoolResult<OperationOutput> {
    let Params::Release { dir } = params else {
        return Err(PoolError::InputInvalid(
            "release requires params.release".to_string(),
        ));
    };
    let name = Params::read_name(&dir)?;

    let retry_delay = source.retry_delay();
    let mut backend = Backend::new(source)?;
    backend.setup().await?;

    let version = retry::retry(&backend, retry_delay, || async {
        backend.move_to_unclaimed(&name).await?;
        backend.publish().await
    })
    .await?;

    Ok(OperationOutput {
        version,
        metadata: Vec::new(),
    })
}
