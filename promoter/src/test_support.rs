//! Test-only helpers: ledger builders and throwaway git remotes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::branch_name::BranchName;
use crate::core::ledger::{Cell, Ledger};

/// Parse a branch name, panicking on invalid input.
pub fn branch(raw: &str) -> BranchName {
    BranchName::parse(raw).expect("valid branch name")
}

/// Build a ledger from a header and rows of raw cell text (`"X"` = sentinel).
pub fn ledger_with(header: &[&str], rows: &[&[&str]]) -> Ledger {
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|raw| Cell::try_from(Some(raw.to_string())).expect("valid cell"))
                .collect()
        })
        .collect();
    Ledger::from_parts(header.iter().map(|h| h.to_string()).collect(), rows).expect("valid ledger")
}

/// A bare repository standing in for the promotion remote.
///
/// The trunk (`master`) carries `meta-sheet.json`; release branches are cut
/// from it with their own files on top.
pub struct TestRemote {
    /// Owns the bare and seed repositories.
    _temp: TempDir,
    bare: PathBuf,
    seed: PathBuf,
}

impl TestRemote {
    pub fn new(ledger: &Ledger) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let bare = temp.path().join("remote.git");
        let seed = temp.path().join("seed");

        run_git(temp.path(), &["init", "--bare", "--initial-branch=master", "remote.git"])?;
        run_git(temp.path(), &["init", "--initial-branch=master", "seed"])?;

        let remote = Self {
            _temp: temp,
            bare,
            seed,
        };
        remote.write_seed_file("meta-sheet.json", &ledger_json(ledger)?)?;
        remote.commit_seed("seed ledger")?;
        let bare_str = remote.bare.to_string_lossy().to_string();
        run_git(&remote.seed, &["remote", "add", "origin", &bare_str])?;
        run_git(&remote.seed, &["push", "origin", "master"])?;
        Ok(remote)
    }

    /// URL (a local path) to hand to the promoter.
    pub fn url(&self) -> String {
        self.bare.to_string_lossy().to_string()
    }

    /// Create `name` from `master` with `files` committed on top and push it.
    pub fn add_branch(&self, name: &str, files: &[(&str, &str)]) -> Result<()> {
        run_git(&self.seed, &["checkout", "-b", name, "master"])?;
        for (path, contents) in files {
            self.write_seed_file(path, contents)?;
        }
        self.commit_seed(&format!("populate {name}"))?;
        run_git(&self.seed, &["push", "origin", name])?;
        run_git(&self.seed, &["checkout", "master"])?;
        Ok(())
    }

    /// Make the remote refuse every push to `branch`.
    #[cfg(unix)]
    pub fn reject_pushes_to(&self, branch: &str) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let hook = self.bare.join("hooks").join("pre-receive");
        let script = format!(
            "#!/bin/sh\nwhile read old new ref; do\n  if [ \"$ref\" = \"refs/heads/{branch}\" ]; then\n    echo \"{branch} is locked\" >&2\n    exit 1\n  fi\ndone\nexit 0\n"
        );
        fs::write(&hook, script).with_context(|| format!("write {}", hook.display()))?;
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).context("chmod hook")?;
        Ok(())
    }

    pub fn has_branch(&self, name: &str) -> Result<bool> {
        let out = self.git_bare(&["branch", "--list", name])?;
        Ok(!out.trim().is_empty())
    }

    /// File contents at `rev:path`, or `None` if the path does not exist.
    pub fn show(&self, rev: &str, path: &str) -> Result<Option<String>> {
        let out = Command::new("git")
            .arg("--git-dir")
            .arg(&self.bare)
            .args(["show", &format!("{rev}:{path}")])
            .output()
            .context("spawn git show")?;
        if !out.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&out.stdout).to_string()))
    }

    /// Every tracked path at `rev`.
    pub fn files(&self, rev: &str) -> Result<Vec<String>> {
        let out = self.git_bare(&["ls-tree", "-r", "--name-only", rev])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// `git log -1 --pretty=<format> rev`.
    pub fn last_commit(&self, rev: &str, format: &str) -> Result<String> {
        let pretty = format!("--pretty={format}");
        Ok(self.git_bare(&["log", "-1", &pretty, rev])?.trim().to_string())
    }

    /// The ledger as currently stored on `master`.
    pub fn trunk_ledger(&self) -> Result<Ledger> {
        let raw = self
            .show("master", "meta-sheet.json")?
            .ok_or_else(|| anyhow!("meta-sheet.json missing on master"))?;
        serde_json::from_str(&raw).context("parse trunk ledger")
    }

    fn write_seed_file(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.seed.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).with_context(|| format!("mkdir {}", parent.display()))?;
        }
        fs::write(&full, contents).with_context(|| format!("write {}", full.display()))
    }

    fn commit_seed(&self, message: &str) -> Result<()> {
        run_git(&self.seed, &["add", "-A"])?;
        run_git(
            &self.seed,
            &[
                "-c",
                "user.name=seed",
                "-c",
                "user.email=seed@example.com",
                "-c",
                "commit.gpgsign=false",
                "commit",
                "-m",
                message,
            ],
        )?;
        Ok(())
    }

    fn git_bare(&self, args: &[&str]) -> Result<String> {
        let out = Command::new("git")
            .arg("--git-dir")
            .arg(&self.bare)
            .args(args)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !out.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }
}

fn ledger_json(ledger: &Ledger) -> Result<String> {
    let mut buf = serde_json::to_string_pretty(ledger).context("serialize ledger")?;
    buf.push('\n');
    Ok(buf)
}

fn run_git(dir: &Path, args: &[&str]) -> Result<()> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !out.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    Ok(())
}
