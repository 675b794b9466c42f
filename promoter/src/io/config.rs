//! Promoter configuration, read from `promoter.toml` by default.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::git::GitLimits;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "promoter.toml";

/// Promoter configuration (TOML).
///
/// Every field has a default, so a missing file or a partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromoterConfig {
    /// Lowest tier; every release branch originates here.
    pub bootstrap_env: String,

    /// Branch holding the durable ledger.
    pub trunk_branch: String,

    /// Ledger location inside the repository.
    pub ledger_path: PathBuf,

    /// Upper bound for any single git invocation, in seconds.
    pub git_timeout_secs: u64,

    /// Truncate captured git stdout/stderr beyond this many bytes.
    pub git_output_limit_bytes: usize,

    pub credentials: CredentialsConfig,
    pub identity: IdentityConfig,
    pub scrub: ScrubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variable holding the push token for HTTP(S) remotes.
    pub token_env: String,
}

/// Author and committer used for every commit the promoter makes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdentityConfig {
    pub name: String,
    pub email: String,
}

/// Where environment overlays live and how cleared directories are marked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScrubConfig {
    pub charts_root: PathBuf,
    /// Directories under `charts_root` ending with this are overlays.
    pub overlay_suffix: String,
    pub marker_file: String,
}

impl Default for PromoterConfig {
    fn default() -> Self {
        Self {
            bootstrap_env: "dev2".to_string(),
            trunk_branch: "master".to_string(),
            ledger_path: PathBuf::from("meta-sheet.json"),
            git_timeout_secs: 30,
            git_output_limit_bytes: 100_000,
            credentials: CredentialsConfig::default(),
            identity: IdentityConfig::default(),
            scrub: ScrubConfig::default(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_env: "GIT_TOKEN".to_string(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "promotion-bot".to_string(),
            email: "promotion-bot@users.noreply.github.com".to_string(),
        }
    }
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            charts_root: PathBuf::from("helm-charts"),
            overlay_suffix: "-values".to_string(),
            marker_file: "readme.md".to_string(),
        }
    }
}

impl PromoterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_env.trim().is_empty() {
            return Err(anyhow!("bootstrap_env must not be empty"));
        }
        if self.trunk_branch.trim().is_empty() {
            return Err(anyhow!("trunk_branch must not be empty"));
        }
        if !is_plain_relative(&self.ledger_path) {
            return Err(anyhow!(
                "ledger_path must be relative to the repository root (got {})",
                self.ledger_path.display()
            ));
        }
        if self.git_timeout_secs == 0 {
            return Err(anyhow!("git_timeout_secs must be > 0"));
        }
        if self.git_output_limit_bytes == 0 {
            return Err(anyhow!("git_output_limit_bytes must be > 0"));
        }
        if self.credentials.token_env.trim().is_empty() {
            return Err(anyhow!("credentials.token_env must not be empty"));
        }
        if self.identity.name.trim().is_empty() || self.identity.email.trim().is_empty() {
            return Err(anyhow!("identity.name and identity.email must not be empty"));
        }
        if !is_plain_relative(&self.scrub.charts_root) {
            return Err(anyhow!("scrub.charts_root must be relative to the repository root"));
        }
        if self.scrub.overlay_suffix.is_empty() {
            return Err(anyhow!("scrub.overlay_suffix must not be empty"));
        }
        let marker = Path::new(&self.scrub.marker_file);
        if marker.components().count() != 1 || !is_plain_relative(marker) {
            return Err(anyhow!("scrub.marker_file must be a bare file name"));
        }
        Ok(())
    }

    pub fn git_limits(&self) -> GitLimits {
        GitLimits {
            timeout: Duration::from_secs(self.git_timeout_secs),
            output_limit_bytes: self.git_output_limit_bytes,
        }
    }
}

/// Non-empty, relative, and free of `..`.
fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PromoterConfig::default()`.
pub fn load_config(path: &Path) -> Result<PromoterConfig> {
    if !path.exists() {
        let cfg = PromoterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PromoterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
