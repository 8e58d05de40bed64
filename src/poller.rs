//! The Poller: answers "what `claiming:` versions landed on the pool since `version`".
//! Walks history with `gix`'s rev-walk, the same idiom used elsewhere in this crate for
//! history inspection, and resolves each commit's touched paths with `gix`'s tree-diff
//! rather than trusting the commit message to encode the lock name — a message is
//! free-form text the Poller does not control, while the tree diff is exactly what
//! changed.

use gix::bstr::ByteSlice;
use gix::object::tree::diff::Action;

use crate::config::{SourceConfig, Version};
use crate::{PoolError, PoolResult, RepoHandle};

const CLAIMING_PREFIX: &str = "claiming:";

/// List `claiming:` versions since `since`, oldest first, narrowed to `source.paths`
/// when set.
///
/// If `since` is absent or no longer resolvable in the repository (history was
/// rewritten out from under it), only the current tip is returned, mirroring how other
/// resource-style checks in this family treat an unknown cursor as "start fresh".
pub async fn check(
    repo: &RepoHandle,
    source: &SourceConfig,
    since: Option<&Version>,
) -> PoolResult<Vec<Version>> {
    let head_id = repo.raw().head_id().map_err(gix_err)?.detach();

    let since_id = since.and_then(|v| {
        repo.raw()
            .rev_parse_single(v.git_ref.as_str())
            .ok()
            .map(|id| id.detach())
    });

    if since_id.is_none() {
        // Cursor missing or unresolvable: report only the tip.
        return Ok(vec![Version::new(head_id.to_string())]);
    }

    let mut walk_ids = Vec::new();
    let platform = repo.raw().rev_walk([head_id]).all().map_err(gix_err)?;
    for info in platform {
        let info = info.map_err(gix_err)?;
        if Some(info.id) == since_id {
            break;
        }
        walk_ids.push(info.id);
    }

    // Oldest first: the walk yields newest-first.
    walk_ids.reverse();

    let mut versions = Vec::new();
    for id in walk_ids {
        let commit = repo
            .raw()
            .find_object(id)
            .map_err(gix_err)?
            .try_into_commit()
            .map_err(gix_err)?;

        let summary = commit
            .message()
            .map(|msg| msg.summary().as_bstr().to_string())
            .unwrap_or_default();
        if !summary.starts_with(CLAIMING_PREFIX) {
            continue;
        }

        let id_str = id.to_string();
        if touches_paths(repo.raw(), &commit, source.paths.as_deref())? {
            versions.push(Version::new(id_str));
        }
    }

    Ok(versions)
}

fn gix_err(e: impl std::error::Error + Send + Sync + 'static) -> PoolError {
    PoolError::Gix(Box::new(e))
}

/// Whether `commit` touched a path under `paths` (`<paths>/...`). When `paths` is unset,
/// every `claiming:` commit passes — no path filter applies.
fn touches_paths(
    repo: &gix::Repository,
    commit: &gix::Commit<'_>,
    paths: Option<&str>,
) -> PoolResult<bool> {
    let Some(paths) = paths else {
        return Ok(true);
    };
    let prefix = format!("{paths}/");

    let tree = commit.tree().map_err(gix_err)?;
    let parent_tree = match commit.parent_ids().next() {
        Some(parent_id) => repo
            .find_object(parent_id)
            .map_err(gix_err)?
            .try_into_commit()
            .map_err(gix_err)?
            .tree()
            .map_err(gix_err)?,
        None => repo.empty_tree(),
    };

    let mut touched = false;
    parent_tree
        .changes()
        .map_err(gix_err)?
        .for_each_to_obtain_tree(&tree, |change| {
            if change.location().to_str_lossy().starts_with(prefix.as_str()) {
                touched = true;
            }
            Ok(Action::Continue)
        })
        .map_err(gix_err)?;

    Ok(touched)
}
