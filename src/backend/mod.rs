//! The Backend: owns a scratch working copy of the pool branch and the primitive
//! operations (`setup`, `reset`, list/move/add/remove, `publish`) the Retry Engine and
//! Orchestrator compose into the four user-visible operations.

pub mod git_cli;
pub mod list;
pub mod mutate;
pub mod publish;

use std::path::{Path, PathBuf};

use gix::refs::transaction as tx;
use gix::refs::Target;
use tempfile::TempDir;

use crate::backend::git_cli::GitCommandOpts;
use crate::config::{SourceConfig, Version};
use crate::{PoolError, PoolResult, RepoHandle};

const REMOTE_NAME: &str = "origin";
const COMMITTER_NAME: &str = "gitpool";
const COMMITTER_EMAIL: &str = "gitpool@localhost";

/// A scratch clone of a pool's coordinating branch, plus the git plumbing needed to
/// mutate and republish it.
pub struct Backend {
    source: SourceConfig,
    scratch: TempDir,
    ssh_command: Option<String>,
    repo: Option<RepoHandle>,
}

impl Backend {
    pub fn new(source: SourceConfig) -> PoolResult<Self> {
        let scratch = TempDir::new().map_err(PoolError::Io)?;
        Ok(Self {
            source,
            scratch,
            ssh_command: None,
            repo: None,
        })
    }

    pub fn pool(&self) -> &str {
        &self.source.pool
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    /// Path to `<pool>/unclaimed` in the working copy.
    pub fn unclaimed_dir(&self) -> PathBuf {
        self.workdir().join(&self.source.pool).join("unclaimed")
    }

    /// Path to `<pool>/claimed` in the working copy.
    pub fn claimed_dir(&self) -> PathBuf {
        self.workdir().join(&self.source.pool).join("claimed")
    }

    pub fn workdir(&self) -> PathBuf {
        self.scratch.path().to_path_buf()
    }

    pub fn repo(&self) -> PoolResult<&RepoHandle> {
        self.repo
            .as_ref()
            .ok_or_else(|| PoolError::SetupFailed("backend not set up".to_string()))
    }

    /// Options for the one thing still funneled through the `git` binary: pushing.
    fn git_opts(&self) -> GitCommandOpts {
        GitCommandOpts::new(self.workdir()).with_ssh_command(self.ssh_command.clone())
    }

    /// Clone the coordinating branch into the scratch directory natively via `gix` and
    /// configure a committer identity. Meant to run exactly once per Backend lifetime;
    /// call [`Backend::reset`] afterwards.
    pub async fn setup(&mut self) -> PoolResult<()> {
        if let Some(ref private_key) = self.source.private_key {
            let ssh_command =
                git_cli::install_private_key(self.scratch.path(), private_key)?;
            // gix's ssh transport shells out to `ssh`; it honors `GIT_SSH_COMMAND` the
            // same way the `git` binary does, so setting it once covers every gix
            // network operation for the rest of this process.
            std::env::set_var("GIT_SSH_COMMAND", &ssh_command);
            self.ssh_command = Some(ssh_command);
        }

        let clone_dir = self.workdir();
        let uri = self.source.uri.clone();
        let branch = self.source.branch.clone();
        let ssh_command = self.ssh_command.clone();

        let repo = tokio::task::spawn_blocking(move || clone_branch(&uri, &clone_dir, &branch, ssh_command))
            .await
            .map_err(|e| PoolError::SetupFailed(format!("clone task panicked: {e}")))??;

        self.repo = Some(RepoHandle::new(repo));

        std::fs::create_dir_all(self.unclaimed_dir()).map_err(PoolError::Io)?;
        std::fs::create_dir_all(self.claimed_dir()).map_err(PoolError::Io)?;

        Ok(())
    }

    /// Fetch and hard-reset the working copy to the remote tip of the coordinating
    /// branch, natively via `gix`. Called once before setup's first use and again after
    /// every publish conflict, so the Retry Engine always mutates against a fresh base.
    pub async fn reset(&self) -> PoolResult<()> {
        let repo = self.repo()?.clone_inner();
        let branch = self.source.branch.clone();
        let workdir = self.workdir();

        tokio::task::spawn_blocking(move || {
            fetch_branch(&repo, &branch)?;
            point_branch_at_remote_tip(&repo, &branch)?;
            checkout_branch_tip(&repo, &branch, &workdir)
        })
        .await
        .map_err(|e| PoolError::ResetFailed(format!("reset task panicked: {e}")))??;

        Ok(())
    }

    pub fn list_unclaimed(&self) -> PoolResult<Vec<String>> {
        list::list_names(&self.unclaimed_dir())
    }

    pub async fn move_to_claimed(&self, name: &str) -> PoolResult<()> {
        mutate::move_lock(
            self.repo()?,
            &self.unclaimed_dir(),
            &self.claimed_dir(),
            name,
            "claiming",
        )
        .await
    }

    pub async fn move_to_unclaimed(&self, name: &str) -> PoolResult<()> {
        mutate::move_lock(
            self.repo()?,
            &self.claimed_dir(),
            &self.unclaimed_dir(),
            name,
            "unclaiming",
        )
        .await
    }

    pub async fn remove_claimed(&self, name: &str) -> PoolResult<()> {
        mutate::remove_lock(self.repo()?, &self.claimed_dir(), name, "removing").await
    }

    pub async fn add_unclaimed(&self, name: &str, payload: &[u8]) -> PoolResult<()> {
        mutate::add_lock(self.repo()?, &self.unclaimed_dir(), name, payload, "adding").await
    }

    pub async fn add_claimed(&self, name: &str, payload: &[u8]) -> PoolResult<()> {
        mutate::add_lock(self.repo()?, &self.claimed_dir(), name, payload, "adding").await
    }

    /// Push the working copy's commits and classify the result. Pushing is the one git
    /// operation `gix` does not support, so this is the sole caller of `git_cli`.
    pub async fn publish(&self) -> PoolResult<Version> {
        match publish::publish(&self.source.branch, REMOTE_NAME, &self.git_opts()).await? {
            publish::PublishOutcome::Ok => {
                let tip = self
                    .repo()?
                    .raw()
                    .head_id()
                    .map_err(|e| PoolError::Gix(Box::new(e)))?;
                Ok(Version::new(tip.to_string()))
            }
            publish::PublishOutcome::Conflict => Err(PoolError::Conflict),
        }
    }
}

fn gix_err(e: impl std::error::Error + Send + Sync + 'static) -> PoolError {
    PoolError::Gix(Box::new(e))
}

/// Clone `branch` from `uri` into `dest`, leaving the working copy checked out at that
/// branch's tip with a configured committer identity.
fn clone_branch(
    uri: &str,
    dest: &Path,
    branch: &str,
    ssh_command: Option<String>,
) -> PoolResult<gix::Repository> {
    let fetch_refspec = format!("+refs/heads/{branch}:refs/remotes/{REMOTE_NAME}/{branch}");

    let mut prepare = gix::prepare_clone(uri, dest)?
        .with_remote_name(REMOTE_NAME)
        .map_err(|e| PoolError::SetupFailed(format!("invalid remote name: {e}")))?
        .configure_remote(move |remote| {
            Ok(remote.with_refspecs([fetch_refspec.as_str()], gix::remote::Direction::Fetch)?)
        });

    if let Some(ref cmd) = ssh_command {
        prepare = prepare.with_in_memory_config_overrides([format!("core.sshCommand={cmd}")]);
    }

    let (mut checkout, _outcome) = prepare
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| PoolError::SetupFailed(format!("clone fetch failed: {e}")))?;

    point_branch_at_remote_tip(checkout.repo(), branch)?;

    let (repo, _) = checkout
        .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| PoolError::SetupFailed(format!("checkout failed: {e}")))?;

    configure_committer(&repo)?;
    Ok(repo)
}

/// Fetch `branch` from `origin` into `refs/remotes/origin/<branch>`.
fn fetch_branch(repo: &gix::Repository, branch: &str) -> PoolResult<()> {
    let mut remote = repo
        .find_remote(REMOTE_NAME)
        .map_err(|e| PoolError::ResetFailed(format!("no {REMOTE_NAME} remote: {e}")))?;

    let refspec = format!("+refs/heads/{branch}:refs/remotes/{REMOTE_NAME}/{branch}");
    remote
        .replace_refspecs(Some(refspec.as_str()), gix::remote::Direction::Fetch)
        .expect("refspec is well-formed");

    remote
        .connect(gix::remote::Direction::Fetch)
        .map_err(|e| PoolError::ResetFailed(format!("could not connect to remote: {e}")))?
        .prepare_fetch(gix::progress::Discard, Default::default())
        .map_err(|e| PoolError::ResetFailed(format!("could not prepare fetch: {e}")))?
        .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| PoolError::ResetFailed(format!("fetch failed: {e}")))?;

    Ok(())
}

/// Force `refs/heads/<branch>` and `HEAD` to track the fetched remote tip, the gix
/// equivalent of `git fetch && git checkout -B <branch> origin/<branch>`'s ref side.
fn point_branch_at_remote_tip(repo: &gix::Repository, branch: &str) -> PoolResult<()> {
    let remote_ref_name = format!("refs/remotes/{REMOTE_NAME}/{branch}");
    let tip = repo
        .find_reference(remote_ref_name.as_str())
        .map_err(|e| PoolError::ResetFailed(format!("remote branch {branch} not found: {e}")))?
        .id()
        .detach();

    let branch_ref_name: gix::refs::FullName = format!("refs/heads/{branch}")
        .try_into()
        .map_err(|e| PoolError::ResetFailed(format!("invalid branch name {branch}: {e}")))?;

    let log = tx::LogChange {
        mode: tx::RefLog::AndReference,
        force_create_reflog: false,
        message: "gitpool: reset to remote tip".into(),
    };

    repo.edit_reference(tx::RefEdit {
        change: tx::Change::Update {
            log: log.clone(),
            expected: tx::PreviousValue::Any,
            new: Target::Peeled(tip),
        },
        name: branch_ref_name.clone(),
        deref: false,
    })
    .map_err(|e| PoolError::ResetFailed(format!("failed to update {branch}: {e}")))?;

    repo.edit_reference(tx::RefEdit {
        change: tx::Change::Update {
            log,
            expected: tx::PreviousValue::Any,
            new: Target::Symbolic(branch_ref_name),
        },
        name: "HEAD".try_into().expect("HEAD is a valid ref name"),
        deref: false,
    })
    .map_err(|e| PoolError::ResetFailed(format!("failed to update HEAD: {e}")))?;

    Ok(())
}

/// Wipe the working tree (except `.git`) and re-checkout it from `<branch>`'s current
/// tree, the gix equivalent of `git reset --hard && git clean -fd`.
fn checkout_branch_tip(repo: &gix::Repository, branch: &str, workdir: &Path) -> PoolResult<()> {
    let tree_id = repo
        .find_reference(format!("refs/heads/{branch}").as_str())
        .and_then(|r| r.into_fully_peeled_id())
        .map_err(|e| PoolError::ResetFailed(format!("could not resolve {branch}: {e}")))?
        .object()
        .map_err(|e| PoolError::ResetFailed(format!("could not load {branch} commit: {e}")))?
        .peel_to_tree()
        .map_err(|e| PoolError::ResetFailed(format!("could not load tree: {e}")))?
        .id;

    for entry in std::fs::read_dir(workdir).map_err(PoolError::Io)? {
        let entry = entry.map_err(PoolError::Io)?;
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(PoolError::Io)?;
        } else {
            std::fs::remove_file(&path).map_err(PoolError::Io)?;
        }
    }

    let mut index = gix::index::State::from_tree(&tree_id, &repo.objects)
        .map_err(|e| PoolError::ResetFailed(format!("could not build index from tree: {e}")))?;

    gix::worktree::state::checkout(
        &mut index,
        workdir.to_path_buf(),
        repo.objects.clone(),
        &gix::progress::Discard,
        &gix::progress::Discard,
        &gix::interrupt::IS_INTERRUPTED,
        gix::worktree::state::checkout::Options::default(),
    )
    .map_err(|e| PoolError::ResetFailed(format!("checkout failed: {e}")))?;

    gix::index::File::from_state(index, repo.index_path())
        .write(gix::index::write::Options::default())
        .map_err(|e| PoolError::ResetFailed(format!("could not write index: {e}")))?;

    Ok(())
}

/// Give every commit this Backend produces a stable, non-default author/committer
/// identity instead of relying on the ambient (often absent) global git config.
fn configure_committer(repo: &gix::Repository) -> PoolResult<()> {
    let mut config = repo.config_snapshot_mut();
    config
        .set_raw_value("committer", None, "name", COMMITTER_NAME)
        .map_err(gix_err)?;
    config
        .set_raw_value("committer", None, "email", COMMITTER_EMAIL)
        .map_err(gix_err)?;
    config
        .set_raw_value("author", None, "name", COMMITTER_NAME)
        .map_err(gix_err)?;
    config
        .set_raw_value("author", None, "email", COMMITTER_EMAIL)
        .map_err(gix_err)?;
    config.commit().map_err(gix_err)?;
    Ok(())
}
