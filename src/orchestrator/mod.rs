//! Orchestrated operations: `acquire`, `add`, `release`, `remove`. Each sets up a
//! fresh [`Backend`] once, then drives a [`crate::retry::retry`] loop composing the
//! Backend's primitive list/move/add/remove/publish calls.

pub mod acquire;
pub mod add;
pub mod release;
pub mod remove;

pub use acquire::acquire;
pub use add::add;
pub use release::release;
pub use remove::remove;

use crate::config::{OperationOutput, Params, SourceConfig};
use crate::PoolResult;

/// Dispatch to the operation selected by `params`. Shared by the `in` and `out`
/// CLI adapters, which differ only in which operations a Concourse-style pipeline
/// conventionally calls them for, not in how dispatch works.
pub async fn dispatch(source: SourceConfig, params: Params) -> PoolResult<OperationOutput> {
    match params {
        Params::Acquire => acquire(source).await,
        params @ Params::Release { .. } => release(source, params).await,
        params @ Params::Remove { .. } => remove(source, params).await,
        params @ Params::Add { .. } => add(source, params).await,
    }
}
