//! `remove`: delete a claimed lock from the pool entirely.

use crate::config::{OperationOutput, Params, SourceConfig};
use crate::{retry, Backend, PoolError, PoolResult};

pub async fn remove(source: SourceConfig, params: Params) -> PoolResult<OperationOutput> {
    let Params::Remove { dir } = params else {
        return Err(PoolError::InputInvalid(
            "remove requires params.remove".to_string(),
        ));
    };
    let name = Params::read_name(&dir)?;

    let retry_delay = source.retry_delay();
    let mut backend = Backend::new(source)?;
    backend.setup().await?;

    let version = retry::retry(&backend, retry_delay, || async {
        backend.remove_claimed(&name).await?;
        backend.publish().await
    })
    .await?;

    Ok(OperationOutput {
        version,
        metadata: Vec::new(),
    })
}
