//! Git transport for promotion runs.
//!
//! Every call shells out to `git` through [`run_with_timeout`], so a hung
//! remote surfaces as [`PromotionError::TransportTimeout`] instead of stalling
//! the job. Failures the decision flow cares about (missing branch, rejected
//! push) are classified into their own error kinds.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use crate::error::PromotionError;
use crate::io::config::IdentityConfig;
use crate::io::credentials::{PushUrl, redact_token};
use crate::io::process::{CommandOutput, run_with_timeout};

/// Limits applied to every git invocation.
#[derive(Debug, Clone, Copy)]
pub struct GitLimits {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// A remote repository addressed by URL (no working copy).
#[derive(Debug, Clone)]
pub struct Remote {
    url: String,
    limits: GitLimits,
}

impl Remote {
    pub fn new(url: impl Into<String>, limits: GitLimits) -> Self {
        Self {
            url: url.into(),
            limits,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True if `refs/heads/<branch>` exists on the remote.
    #[instrument(skip_all, fields(branch))]
    pub fn branch_exists(&self, branch: &str) -> Result<bool, PromotionError> {
        let pattern = format!("refs/heads/{branch}");
        let out = run_git(
            None,
            &["ls-remote", "--heads", &self.url, &pattern],
            self.limits,
            None,
        )?;
        let exists = !out.stdout_lossy().trim().is_empty();
        debug!(branch, exists, "checked remote branch");
        Ok(exists)
    }

    /// Clone only `branch` into `dest` and return a handle on the working copy.
    #[instrument(skip_all, fields(branch, dest = %dest.display()))]
    pub fn clone_branch(&self, branch: &str, dest: &Path) -> Result<Git, PromotionError> {
        let dest_str = dest.to_string_lossy();
        run_git(
            None,
            &[
                "clone",
                "--single-branch",
                "--branch",
                branch,
                &self.url,
                &dest_str,
            ],
            self.limits,
            None,
        )?;
        info!(branch, "cloned branch");
        Ok(Git::new(dest, self.limits))
    }
}

/// A local working copy.
#[derive(Debug)]
pub struct Git {
    workdir: PathBuf,
    limits: GitLimits,
    token: Option<SecretString>,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, limits: GitLimits) -> Self {
        Self {
            workdir: workdir.into(),
            limits,
            token: None,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Point `origin` at the push URL; its token is redacted from later errors.
    pub fn set_origin(&mut self, url: &PushUrl) -> Result<(), PromotionError> {
        self.token = url
            .token()
            .map(|token| SecretString::from(token.expose_secret().to_string()));
        self.run_checked(&["remote", "set-url", "origin", url.expose()])?;
        debug!(authenticated = url.is_authenticated(), "origin updated");
        Ok(())
    }

    /// Create and checkout a new branch at current HEAD.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_new_branch(&self, branch: &str) -> Result<(), PromotionError> {
        debug!(branch, "creating and checking out new branch");
        self.run_checked(&["checkout", "-b", branch])?;
        Ok(())
    }

    /// Stage all changes, deletions included.
    pub fn add_all(&self) -> Result<(), PromotionError> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool, PromotionError> {
        let out = self.run_checked(&["diff", "--cached", "--name-only"])?;
        Ok(!out.stdout_lossy().trim().is_empty())
    }

    /// Commit staged changes as `identity`.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(
        &self,
        message: &str,
        identity: &IdentityConfig,
    ) -> Result<bool, PromotionError> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        let name = format!("user.name={}", identity.name);
        let email = format!("user.email={}", identity.email);
        self.run_checked(&["-c", &name, "-c", &email, "commit", "-m", message])?;
        debug!(identity = %identity.name, "committed staged changes");
        Ok(true)
    }

    /// Push `branch` to `origin`, classifying remote refusals as
    /// [`PromotionError::PushRejected`].
    #[instrument(skip_all, fields(branch))]
    pub fn push(&self, branch: &str) -> Result<(), PromotionError> {
        let args = ["push", "origin", branch];
        let out = self.run(&args)?;
        if out.success() {
            info!(branch, "pushed branch");
            return Ok(());
        }
        let stderr = self.redact(&out.stderr_lossy());
        if is_rejection(&stderr) {
            warn!(branch, "push rejected by remote");
            return Err(PromotionError::PushRejected {
                branch: branch.to_string(),
                detail: stderr,
            });
        }
        Err(PromotionError::Git {
            command: args.join(" "),
            stderr,
        })
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput, PromotionError> {
        let out = self.run(args)?;
        if !out.success() {
            return Err(PromotionError::Git {
                command: self.redact(&args.join(" ")),
                stderr: self.redact(&out.stderr_lossy()),
            });
        }
        Ok(out)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput, PromotionError> {
        run_git(Some(&self.workdir), args, self.limits, self.token.as_ref())
    }

    fn redact(&self, text: &str) -> String {
        redact_token(self.token.as_ref(), text)
    }
}

/// Spawn git with the given limits. Timeouts become
/// [`PromotionError::TransportTimeout`]; callers inspect the exit status.
///
/// Without a working directory a non-zero exit is an error as well.
fn run_git(
    workdir: Option<&Path>,
    args: &[&str],
    limits: GitLimits,
    token: Option<&SecretString>,
) -> Result<CommandOutput, PromotionError> {
    let command = redact_token(token, &args.join(" "));
    let mut cmd = Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }

    let out = run_with_timeout(cmd, limits.timeout, limits.output_limit_bytes).map_err(|err| {
        PromotionError::Git {
            command: command.clone(),
            stderr: format!("spawn git: {err}"),
        }
    })?;

    if out.timed_out {
        return Err(PromotionError::TransportTimeout {
            command,
            timeout_secs: limits.timeout.as_secs(),
        });
    }
    if workdir.is_none() && !out.status.success() {
        return Err(PromotionError::Git {
            command,
            stderr: redact_token(token, &out.stderr_lossy()),
        });
    }
    Ok(out)
}

fn is_rejection(stderr: &str) -> bool {
    const MARKERS: [&str; 5] = [
        "[rejected]",
        "[remote rejected]",
        "non-fast-forward",
        "fetch first",
        "already exists",
    ];
    MARKERS.iter().any(|marker| stderr.contains(marker))
}
