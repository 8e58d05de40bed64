//! Shared test scaffolding: a local bare repository standing in for the remote, seeded
//! with a pool directory layout, so the whole suite runs offline and deterministically.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .args(args)
        .status()
        .unwrap_or_else(|e| panic!("failed to spawn git {args:?}: {e}"));
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// A bare repository (the "remote") plus its `file://`-free local path, seeded with
/// `main` holding `<pool>/unclaimed/<name>` (empty payload) for each of `unclaimed`.
pub struct RemotePool {
    pub bare_dir: TempDir,
    pub pool: String,
    pub branch: String,
}

impl RemotePool {
    pub fn uri(&self) -> String {
        self.bare_dir.path().to_string_lossy().to_string()
    }
}

pub fn seed_remote(pool: &str, unclaimed: &[&str]) -> RemotePool {
    let bare_dir = TempDir::new().expect("tempdir");
    git(bare_dir.path(), &["init", "--bare", "--initial-branch=main"]);

    let seed_dir = TempDir::new().expect("tempdir");
    git(
        Path::new("/"),
        &[
            "clone",
            &bare_dir.path().to_string_lossy(),
            &seed_dir.path().to_string_lossy(),
        ],
    );

    git(seed_dir.path(), &["config", "user.name", "seed"]);
    git(seed_dir.path(), &["config", "user.email", "seed@localhost"]);

    let unclaimed_dir = seed_dir.path().join(pool).join("unclaimed");
    std::fs::create_dir_all(&unclaimed_dir).unwrap();
    std::fs::create_dir_all(seed_dir.path().join(pool).join("claimed")).unwrap();
    std::fs::write(unclaimed_dir.join(".gitkeep"), b"").unwrap();
    for name in unclaimed {
        std::fs::write(unclaimed_dir.join(name), b"").unwrap();
    }
    std::fs::write(
        seed_dir.path().join(pool).join("claimed").join(".gitkeep"),
        b"",
    )
    .unwrap();

    git(seed_dir.path(), &["add", "-A"]);
    git(seed_dir.path(), &["commit", "-m", "seed: initial pool"]);
    git(seed_dir.path(), &["push", "origin", "main"]);

    RemotePool {
        bare_dir,
        pool: pool.to_string(),
        branch: "main".to_string(),
    }
}

pub fn source_config(remote: &RemotePool) -> gitpool::SourceConfig {
    gitpool::SourceConfig {
        uri: remote.uri(),
        branch: remote.branch.clone(),
        pool: remote.pool.clone(),
        private_key: None,
        retry_delay_secs: 1,
        paths: None,
    }
}

/// Add a second, sibling pool directory to an already-seeded remote, pushed as its own
/// commit, so a single branch holds two independently named pools side by side.
pub fn add_sibling_pool(remote: &RemotePool, pool: &str, unclaimed: &[&str]) {
    let seed_dir = TempDir::new().expect("tempdir");
    git(
        Path::new("/"),
        &[
            "clone",
            &remote.uri(),
            &seed_dir.path().to_string_lossy(),
        ],
    );
    git(seed_dir.path(), &["config", "user.name", "seed"]);
    git(seed_dir.path(), &["config", "user.email", "seed@localhost"]);

    let unclaimed_dir = seed_dir.path().join(pool).join("unclaimed");
    std::fs::create_dir_all(&unclaimed_dir).unwrap();
    std::fs::create_dir_all(seed_dir.path().join(pool).join("claimed")).unwrap();
    std::fs::write(unclaimed_dir.join(".gitkeep"), b"").unwrap();
    for name in unclaimed {
        std::fs::write(unclaimed_dir.join(name), b"").unwrap();
    }
    std::fs::write(
        seed_dir.path().join(pool).join("claimed").join(".gitkeep"),
        b"",
    )
    .unwrap();

    git(seed_dir.path(), &["add", "-A"]);
    git(seed_dir.path(), &["commit", "-m", &format!("seed: {pool} pool")]);
    git(seed_dir.path(), &["push", "origin", &remote.branch]);
}

/// The remote branch's current tip commit id, via a disposable clone.
pub fn read_remote_head(remote: &RemotePool) -> String {
    let check_dir = TempDir::new().expect("tempdir");
    git(
        Path::new("/"),
        &[
            "clone",
            "--branch",
            &remote.branch,
            &remote.uri(),
            &check_dir.path().to_string_lossy(),
        ],
    );
    let output = Command::new("git")
        .current_dir(check_dir.path())
        .args(["rev-parse", "HEAD"])
        .output()
        .expect("git rev-parse");
    assert!(output.status.success());
    String::from_utf8(output.stdout)
        .expect("rev-parse output is utf8")
        .trim()
        .to_string()
}

/// Create a commit in `backend`'s local working copy that is not pushed anywhere,
/// simulating a client whose local branch tip has diverged from the remote's.
pub fn commit_local_divergence(backend: &gitpool::backend::Backend, message: &str) {
    let workdir = backend.workdir();
    std::fs::write(workdir.join("divergent-marker"), b"local only").unwrap();
    git(&workdir, &["add", "-A"]);

    let status = Command::new("git")
        .current_dir(&workdir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_AUTHOR_NAME", "seed")
        .env("GIT_AUTHOR_EMAIL", "seed@localhost")
        .env("GIT_COMMITTER_NAME", "seed")
        .env("GIT_COMMITTER_EMAIL", "seed@localhost")
        .args(["commit", "-m", message])
        .status()
        .unwrap_or_else(|e| panic!("failed to spawn git commit: {e}"));
    assert!(status.success(), "git commit failed in {}", workdir.display());
}

/// Read the names currently under `<pool>/<sub>/` directly from the bare remote, via a
/// disposable clone, for assertions independent of any Backend under test.
pub fn read_remote_names(remote: &RemotePool, sub: &str) -> Vec<String> {
    let check_dir = TempDir::new().expect("tempdir");
    git(
        Path::new("/"),
        &[
            "clone",
            "--branch",
            &remote.branch,
            &remote.uri(),
            &check_dir.path().to_string_lossy(),
        ],
    );
    let dir = check_dir.path().join(&remote.pool).join(sub);
    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}
