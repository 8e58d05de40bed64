//! Local filesystem + git tree mutation for the four lock mutations: claiming,
//! unclaiming, adding, removing. Each mutation updates the working copy on disk (so
//! later listings and mutations see a consistent tree) and edits the commit tree
//! directly against the object database via `gix`, then commits with the message
//! convention the Poller filters on (`<verb>: <name>`). The actual compare-and-swap
//! happens later, at publish time.

use std::path::Path;

use gix::object::tree::EntryKind;

use crate::{PoolError, PoolResult, RepoHandle};

fn repo_relative(work_dir: &Path, path: &Path) -> PoolResult<String> {
    path.strip_prefix(work_dir)
        .map_err(|_| PoolError::SetupFailed(format!("{} is outside working copy", path.display())))
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

fn gix_err(e: impl std::error::Error + Send + Sync + 'static) -> PoolError {
    PoolError::Gix(Box::new(e))
}

pub async fn move_lock(
    repo: &RepoHandle,
    from_dir: &Path,
    to_dir: &Path,
    name: &str,
    verb: &str,
) -> PoolResult<()> {
    let from_path = from_dir.join(name);
    if !from_path.exists() {
        return Err(PoolError::LockMissing(name.to_string()));
    }

    std::fs::create_dir_all(to_dir).map_err(PoolError::Io)?;
    let to_path = to_dir.join(name);
    std::fs::rename(&from_path, &to_path).map_err(PoolError::Io)?;

    let workdir = repo.workdir()?;
    let from_rel = repo_relative(&workdir, &from_path)?;
    let to_rel = repo_relative(&workdir, &to_path)?;
    let payload = std::fs::read(&to_path).map_err(PoolError::Io)?;

    let repo = repo.clone_inner();
    let message = format!("{verb}: {name}");
    tokio::task::spawn_blocking(move || {
        let blob_id = repo.write_blob(&payload).map_err(gix_err)?.detach();
        let mut editor = repo.edit_tree(head_tree_id(&repo)?).map_err(gix_err)?;
        editor.remove(from_rel.as_str()).map_err(gix_err)?;
        editor
            .upsert(to_rel.as_str(), EntryKind::Blob, blob_id)
            .map_err(gix_err)?;
        let tree_id = editor.write().map_err(gix_err)?.detach();
        commit_tree(&repo, tree_id, &message)
    })
    .await
    .map_err(|e| PoolError::SetupFailed(format!("mutation task panicked: {e}")))?
}

pub async fn remove_lock(repo: &RepoHandle, dir: &Path, name: &str, verb: &str) -> PoolResult<()> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(PoolError::LockMissing(name.to_string()));
    }
    std::fs::remove_file(&path).map_err(PoolError::Io)?;

    let workdir = repo.workdir()?;
    let rel = repo_relative(&workdir, &path)?;

    let repo = repo.clone_inner();
    let message = format!("{verb}: {name}");
    tokio::task::spawn_blocking(move || {
        let mut editor = repo.edit_tree(head_tree_id(&repo)?).map_err(gix_err)?;
        editor.remove(rel.as_str()).map_err(gix_err)?;
        let tree_id = editor.write().map_err(gix_err)?.detach();
        commit_tree(&repo, tree_id, &message)
    })
    .await
    .map_err(|e| PoolError::SetupFailed(format!("mutation task panicked: {e}")))?
}

pub async fn add_lock(
    repo: &RepoHandle,
    dir: &Path,
    name: &str,
    payload: &[u8],
    verb: &str,
) -> PoolResult<()> {
    std::fs::create_dir_all(dir).map_err(PoolError::Io)?;
    let path = dir.join(name);
    std::fs::write(&path, payload).map_err(PoolError::Io)?;

    let workdir = repo.workdir()?;
    let rel = repo_relative(&workdir, &path)?;
    let payload = payload.to_vec();

    let repo = repo.clone_inner();
    let message = format!("{verb}: {name}");
    tokio::task::spawn_blocking(move || {
        let blob_id = repo.write_blob(&payload).map_err(gix_err)?.detach();
        let mut editor = repo.edit_tree(head_tree_id(&repo)?).map_err(gix_err)?;
        editor
            .upsert(rel.as_str(), EntryKind::Blob, blob_id)
            .map_err(gix_err)?;
        let tree_id = editor.write().map_err(gix_err)?.detach();
        commit_tree(&repo, tree_id, &message)
    })
    .await
    .map_err(|e| PoolError::SetupFailed(format!("mutation task panicked: {e}")))?
}

fn head_tree_id(repo: &gix::Repository) -> PoolResult<gix::ObjectId> {
    repo.head_commit()
        .map_err(gix_err)?
        .tree_id()
        .map_err(gix_err)
        .map(|id| id.detach())
}

fn commit_tree(repo: &gix::Repository, tree_id: gix::ObjectId, message: &str) -> PoolResult<()> {
    let parent = repo.head_id().map_err(gix_err)?.detach();
    repo.commit("HEAD", message, tree_id, [parent])
        .map_err(gix_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::repo_relative;
    use std::path::PathBuf;

    #[test]
    fn repo_relative_strips_prefix() {
        let work_dir = PathBuf::from("/tmp/scratch");
        let path = PathBuf::from("/tmp/scratch/pool/unclaimed/lock-a");
        assert_eq!(
            repo_relative(&work_dir, &path).unwrap(),
            "pool/unclaimed/lock-a"
        );
    }

    #[test]
    fn repo_relative_rejects_outside_path() {
        let work_dir = PathBuf::from("/tmp/scratch");
        let path = PathBuf::from("/tmp/elsewhere/lock-a");
        assert!(repo_relative(&work_dir, &path).is_err());
    }
}
