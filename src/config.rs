//! Source configuration and the JSON-shaped records exchanged with callers.

use std::path::PathBuf;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::PoolError;

fn default_retry_delay_secs() -> u64 {
    10
}

/// The `source` block: everything needed to locate and authenticate against the
/// coordinating branch, plus retry pacing and (for `check` only) a path filter.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Repository location.
    pub uri: String,
    /// Branch holding pool state.
    pub branch: String,
    /// Pool name (sub-directory).
    pub pool: String,
    /// Credential material, opaque to the core.
    #[serde(default)]
    pub private_key: Option<String>,
    /// Seconds between retry attempts.
    #[serde(rename = "retry_delay", default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Optional pool-path filter, `check` only.
    #[serde(default)]
    pub paths: Option<String>,
}

impl SourceConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// An opaque point in pool history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl Version {
    pub fn new(git_ref: impl Into<String>) -> Self {
        Self {
            git_ref: git_ref.into(),
        }
    }
}

/// A single `name`/`value` entry in an operation's metadata list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub value: String,
}

impl Metadata {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Which of the four user-visible operations a `params` object selects, and its
/// operation-specific argument.
///
/// The discriminant is *which key is present*, not a tagged value, so this has a
/// hand-written `Deserialize` impl instead of `#[serde(tag = ...)]`.
#[derive(Debug, Clone)]
pub enum Params {
    Acquire,
    Release { dir: PathBuf },
    Remove { dir: PathBuf },
    Add { dir: PathBuf, already_claimed: bool },
}

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize, Default)]
        struct Raw {
            #[serde(default)]
            acquire: Option<bool>,
            #[serde(default)]
            release: Option<PathBuf>,
            #[serde(default)]
            remove: Option<PathBuf>,
            #[serde(default)]
            add: Option<PathBuf>,
            #[serde(default)]
            add_claimed: Option<PathBuf>,
        }

        let raw = Raw::deserialize(deserializer)?;
        match (raw.acquire, raw.release, raw.remove, raw.add, raw.add_claimed) {
            (Some(true), None, None, None, None) => Ok(Params::Acquire),
            (_, Some(dir), None, None, None) => Ok(Params::Release { dir }),
            (_, None, Some(dir), None, None) => Ok(Params::Remove { dir }),
            (_, None, None, Some(dir), None) => Ok(Params::Add {
                dir,
                already_claimed: false,
            }),
            (_, None, None, None, Some(dir)) => Ok(Params::Add {
                dir,
                already_claimed: true,
            }),
            _ => Err(de::Error::custom(
                "params must specify exactly one of: acquire, release, remove, add, add_claimed",
            )),
        }
    }
}

impl Params {
    /// Read the `name` file out of a params-provided scratch directory.
    pub fn read_name(dir: &std::path::Path) -> Result<String, PoolError> {
        let contents = std::fs::read_to_string(dir.join("name")).map_err(|e| {
            PoolError::InputInvalid(format!("could not read {}/name: {e}", dir.display()))
        })?;
        let name = contents.trim();
        if name.is_empty() {
            return Err(PoolError::InputInvalid(format!(
                "{}/name is empty",
                dir.display()
            )));
        }
        Ok(name.to_string())
    }

    /// Read the `metadata` payload bytes out of a params-provided scratch directory.
    pub fn read_metadata(dir: &std::path::Path) -> Result<Vec<u8>, PoolError> {
        std::fs::read(dir.join("metadata")).map_err(|e| {
            PoolError::InputInvalid(format!("could not read {}/metadata: {e}", dir.display()))
        })
    }
}

/// `check` input: `{ source, version? }`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckInput {
    pub source: SourceConfig,
    #[serde(default)]
    pub version: Option<Version>,
}

/// `acquire`/`release`/`remove`/`add` input: `{ source, params }`.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationInput {
    pub source: SourceConfig,
    pub params: Params,
}

/// `acquire`/`release`/`remove`/`add` output: the published version plus metadata.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutput {
    pub version: Version,
    pub metadata: Vec<Metadata>,
}
