//! Thin wrapper around the system `git` binary, reserved for the one operation `gix`
//! cannot do: pushing. A single place that sets `GIT_TERMINAL_PROMPT=0` so a missing
//! credential fails fast instead of hanging, forces a stable locale for output parsing,
//! and enforces a timeout per invocation. Clone, fetch, reset, and every local mutation
//! go through `gix` directly instead (see `backend::mod` and `backend::mutate`).

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

use crate::PoolError;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Options for running a single git subprocess.
#[derive(Debug, Clone)]
pub struct GitCommandOpts {
    pub work_dir: PathBuf,
    pub timeout_secs: u64,
    /// `GIT_SSH_COMMAND` override, used to point at a private key written to a
    /// transient file for this invocation.
    pub ssh_command: Option<String>,
}

impl GitCommandOpts {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            ssh_command: None,
        }
    }

    pub fn with_ssh_command(mut self, cmd: Option<String>) -> Self {
        self.ssh_command = cmd;
        self
    }
}

/// Run `git <args>` in `opts.work_dir`, returning the raw process output.
///
/// This is the single place git subprocesses are spawned; `backend::publish` is the
/// only caller.
pub async fn run(args: &[&str], opts: &GitCommandOpts) -> Result<Output, PoolError> {
    let timeout_duration = Duration::from_secs(opts.timeout_secs);

    let mut cmd = TokioCommand::new("git");
    cmd.current_dir(&opts.work_dir);
    cmd.args(args);

    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.env("LC_ALL", "C");
    cmd.env("LANG", "C");
    if let Some(ref ssh_command) = opts.ssh_command {
        cmd.env("GIT_SSH_COMMAND", ssh_command);
    }

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(PoolError::Io)?;

    let status = tokio::select! {
        result = child.wait() => result.map_err(PoolError::Io)?,
        () = tokio::time::sleep(timeout_duration) => {
            let _ = child.kill().await;
            return Err(PoolError::PublishFailed(format!(
                "git {} timed out after {}s",
                args.join(" "),
                opts.timeout_secs
            )));
        }
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_end(&mut stdout).await;
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_end(&mut stderr).await;
    }

    Ok(Output { status, stdout, stderr })
}

/// `run`, but turn a non-zero exit into an error carrying stderr.
pub async fn run_checked(
    args: &[&str],
    opts: &GitCommandOpts,
    on_failure: impl FnOnce(String) -> PoolError,
) -> Result<Output, PoolError> {
    let output = run(args, opts).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(on_failure(stderr));
    }
    Ok(output)
}

pub fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Write `private_key` to a fresh, `0600`-permissioned file under `dir` and return a
/// `GIT_SSH_COMMAND` pointing at it. The core never logs the key material itself.
#[cfg(unix)]
pub fn install_private_key(dir: &Path, private_key: &str) -> Result<String, PoolError> {
    use std::os::unix::fs::PermissionsExt;

    let key_path = dir.join("id_pool");
    std::fs::write(&key_path, private_key).map_err(PoolError::Io)?;
    std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))
        .map_err(PoolError::Io)?;

    Ok(format!(
        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
        key_path.display()
    ))
}

#[cfg(not(unix))]
pub fn install_private_key(dir: &Path, private_key: &str) -> Result<String, PoolError> {
    let key_path = dir.join("id_pool");
    std::fs::write(&key_path, private_key).map_err(PoolError::Io)?;
    Ok(format!("ssh -i {} -o IdentitiesOnly=yes", key_path.display()))
}
