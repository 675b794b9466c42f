//! Provisioning of a newly minted release branch.
//!
//! Runs only when the decision engine minted a branch. The branch is cut from
//! the base branch with every environment overlay cleared, pushed, and then
//! recorded in the durable ledger on the trunk branch. The engine's own ledger
//! append only touched the run's transient copy; the trunk write-back here is
//! a separate clone, commit, and push.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::branch_name::BranchName;
use crate::core::ledger::LedgerStore;
use crate::error::PromotionError;
use crate::io::config::PromoterConfig;
use crate::io::credentials::PushUrl;
use crate::io::git::Remote;
use crate::io::ledger_store::LedgerFile;
use crate::io::scrub::{ScrubReport, scrub_overlays};
use crate::io::workspace::Workspace;

/// Working copy names inside the run workspace.
const NEW_BRANCH_CHECKOUT: &str = "new_branch";
const TRUNK_CHECKOUT: &str = "trunk";

/// Outcome of a successful provisioning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub target: BranchName,
    pub scrub: ScrubReport,
    /// False when the scrub left nothing to commit and the branch was pushed
    /// as an exact copy of its base.
    pub scrub_committed: bool,
    /// Row recorded in the trunk ledger.
    pub ledger_row: usize,
}

/// Create `target` from `base` on the remote and record it on the trunk ledger.
#[instrument(skip_all, fields(base = %base, target = %target))]
pub fn provision(
    workspace: &Workspace,
    remote: &Remote,
    base: &BranchName,
    target: &BranchName,
    cfg: &PromoterConfig,
) -> Result<ProvisionReport> {
    let base_name = base.to_string();
    let target_name = target.to_string();

    if !remote
        .branch_exists(&base_name)
        .context("check base branch on remote")?
    {
        return Err(PromotionError::BaseBranchNotFound(base_name).into());
    }
    let push_url = PushUrl::from_env(remote.url(), &cfg.credentials.token_env)?;

    let mut git = remote
        .clone_branch(&base_name, &workspace.checkout_dir(NEW_BRANCH_CHECKOUT))
        .with_context(|| format!("clone base branch {base_name}"))?;
    git.set_origin(&push_url)?;
    git.checkout_new_branch(&target_name)
        .with_context(|| format!("create branch {target_name}"))?;

    let scrub = scrub_overlays(git.workdir(), &cfg.scrub)
        .with_context(|| format!("scrub overlays on {target_name}"))?;

    git.add_all()?;
    let scrub_committed = git.commit_staged(
        &format!("Initialize {target_name}: clean environment folders"),
        &cfg.identity,
    )?;
    if !scrub_committed {
        warn!(
            target = %target_name,
            charts_root = %cfg.scrub.charts_root.display(),
            "scrub changed nothing, pushing base branch content unmodified"
        );
    }
    git.push(&target_name)?;
    info!(
        target = %target_name,
        removed_files = scrub.removed_files,
        scrub_committed,
        "release branch pushed"
    );

    let ledger_row = record_on_trunk(workspace, remote, &push_url, target, cfg)?;

    Ok(ProvisionReport {
        target: target.clone(),
        scrub,
        scrub_committed,
        ledger_row,
    })
}

fn record_on_trunk(
    workspace: &Workspace,
    remote: &Remote,
    push_url: &PushUrl,
    target: &BranchName,
    cfg: &PromoterConfig,
) -> Result<usize> {
    let trunk = &cfg.trunk_branch;
    let mut git = remote
        .clone_branch(trunk, &workspace.checkout_dir(TRUNK_CHECKOUT))
        .with_context(|| format!("clone trunk branch {trunk}"))?;
    git.set_origin(push_url)?;

    let mut ledger = LedgerFile::open(&git.workdir().join(&cfg.ledger_path))
        .with_context(|| format!("load ledger from {trunk}"))?;
    let row = ledger.append_event(&cfg.bootstrap_env, target)?;

    git.add_all()?;
    git.commit_staged(&format!("Add {target} to ledger"), &cfg.identity)?;
    git.push(trunk).map_err(|err| match err {
        PromotionError::PushRejected { branch, detail } => {
            PromotionError::LedgerPushRejected { branch, detail }
        }
        other => other,
    })?;
    info!(trunk = %trunk, row, "trunk ledger updated");
    Ok(row)
}
