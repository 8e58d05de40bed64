//! `acquire`: claim one unclaimed lock at random.

use rand::seq::SliceRandom;

use crate::config::{Metadata, OperationOutput, SourceConfig};
use crate::{retry, Backend, PoolError, PoolResult};

pub async fn acquire(source: SourceConfig) -> PoolResult<OperationOutput> {
    let retry_delay = source.retry_delay();
    let mut backend = Backend::new(source)?;
    backend.setup().await?;

    let chosen_name = std::sync::Mutex::new(None::<String>);

    let version = retry::retry(&backend, retry_delay, || async {
        let unclaimed = backend.list_unclaimed()?;
        let name = unclaimed
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(PoolError::NoLocksAvailable)?;

        backend.move_to_claimed(&name).await?;
        let version = backend.publish().await?;

        *chosen_name.lock().expect("not poisoned") = Some(name);
        Ok(version)
    })
    .await?;

    let name = chosen_name
        .into_inner()
        .expect("not poisoned")
        .expect("retry loop only returns Ok after recording a name");

    Ok(OperationOutput {
        version,
        metadata: vec![Metadata::new("lock_name", name)],
    })
}
