//! Classification of `git push` output into the three outcomes the Backend's publish
//! step can report: success, conflict, or an unexpected failure.

use crate::backend::git_cli::{self, GitCommandOpts};
use crate::PoolError;

/// Outcome of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Remote accepted the update. The caller resolves the new tip via `gix` rather than
    /// asking `git push` to report it back.
    Ok,
    /// Remote rejected the update in a way that means "someone else moved the tip first".
    Conflict,
}

/// The three signals that all collapse to [`PublishOutcome::Conflict`]: the
/// generic "rejected" message, the explicit "remote rejected" message, and the no-op
/// "already up-to-date" message (a concurrent client published an identical-looking
/// change, which is a genuine conflict from the mutual-exclusion standpoint even though
/// git's own history is technically fine).
const CONFLICT_SIGNALS: &[&str] = &[
    "[rejected]",
    "failed to push some refs",
    "non-fast-forward",
    "remote rejected",
    "everything up-to-date",
    "up to date",
];

fn is_conflict_output(combined_lowercase: &str) -> bool {
    CONFLICT_SIGNALS
        .iter()
        .any(|signal| combined_lowercase.contains(signal))
}

/// Attempt to advance `branch` on `remote` to the local working copy's tip.
pub async fn publish(
    branch: &str,
    remote: &str,
    opts: &GitCommandOpts,
) -> Result<PublishOutcome, PoolError> {
    let refspec = format!("{branch}:{branch}");
    let output = git_cli::run(&["push", remote, &refspec], opts).await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout}\n{stderr}").to_lowercase();

    if output.status.success() {
        if is_conflict_output(&combined) {
            return Ok(PublishOutcome::Conflict);
        }
        return Ok(PublishOutcome::Ok);
    }

    if is_conflict_output(&combined) {
        return Ok(PublishOutcome::Conflict);
    }

    Err(PoolError::PublishFailed(stderr.trim().to_string()))
}
