//! Orchestration for a promotion run.
//!
//! A run clones the trunk into a transient `execution` copy, decides against
//! its ledger, provisions a new branch when one was minted, and hands back the
//! branch and environment pair the caller promotes with. All working copies
//! live in one [`Workspace`] that is removed when the run ends.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::branch_name::{BranchName, normalize_version};
use crate::core::decision::{DecisionInput, PromotionDecision, decide};
use crate::io::config::PromoterConfig;
use crate::io::git::Remote;
use crate::io::ledger_store::LedgerFile;
use crate::io::workspace::Workspace;
use crate::provision::provision;

const EXECUTION_CHECKOUT: &str = "execution";

/// Caller input for one promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRequest {
    pub lower_env: String,
    pub higher_env: String,
    pub repo_url: String,
    pub new_version: Option<String>,
}

/// Final branch and environment pair for the caller's promotion step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionPlan {
    pub base_branch: BranchName,
    pub target_branch: BranchName,
    pub lower_env: String,
    pub higher_env: String,
    pub branch_was_created: bool,
    /// Values flow from the bootstrap tier instead of the requested lower tier.
    pub reverse_promotion: bool,
}

impl PromotionPlan {
    pub fn from_decision(
        decision: &PromotionDecision,
        lower_env: &str,
        higher_env: &str,
        bootstrap_env: &str,
    ) -> Self {
        let lower_env = if decision.lower_env_needs_overwrite {
            bootstrap_env
        } else {
            lower_env
        };
        Self {
            base_branch: decision.base_branch.clone(),
            target_branch: decision.target_branch.clone(),
            lower_env: lower_env.to_string(),
            higher_env: higher_env.to_string(),
            branch_was_created: decision.branch_was_created,
            reverse_promotion: decision.lower_env_needs_overwrite,
        }
    }

    /// One-line summary: `base, target, lower, higher, created`.
    pub fn summary_line(&self) -> String {
        format!(
            "{}, {}, {}, {}, {}",
            self.base_branch,
            self.target_branch,
            self.lower_env,
            self.higher_env,
            self.branch_was_created
        )
    }
}

/// Run a full promotion against the remote at `request.repo_url`.
pub fn run_promotion(request: &PromotionRequest, cfg: &PromoterConfig) -> Result<PromotionPlan> {
    validate_envs(&request.lower_env, &request.higher_env)?;
    info!(
        lower = %request.lower_env,
        higher = %request.higher_env,
        version = ?request.new_version,
        "starting promotion run"
    );

    let workspace = Workspace::new()?;
    let remote = Remote::new(request.repo_url.clone(), cfg.git_limits());

    let execution = remote
        .clone_branch(
            &cfg.trunk_branch,
            &workspace.checkout_dir(EXECUTION_CHECKOUT),
        )
        .with_context(|| format!("clone {} for ledger", cfg.trunk_branch))?;
    let mut ledger = LedgerFile::open(&execution.workdir().join(&cfg.ledger_path))
        .context("load execution ledger")?;

    let decision = decide(
        &mut ledger,
        &decision_input(
            cfg,
            &request.lower_env,
            &request.higher_env,
            request.new_version.as_deref(),
        ),
    )
    .context("decide promotion")?;
    debug!(?decision, "promotion decided");

    if decision.branch_was_created {
        let report = provision(
            &workspace,
            &remote,
            &decision.base_branch,
            &decision.target_branch,
            cfg,
        )
        .with_context(|| format!("provision branch {}", decision.target_branch))?;
        info!(
            target = %report.target,
            overlays = report.scrub.overlays.len(),
            scrub_committed = report.scrub_committed,
            ledger_row = report.ledger_row,
            "branch provisioned"
        );
    }

    let plan = PromotionPlan::from_decision(
        &decision,
        &request.lower_env,
        &request.higher_env,
        &cfg.bootstrap_env,
    );
    info!(summary = %plan.summary_line(), "promotion planned");
    Ok(plan)
}

/// Decide against a local ledger file without writing it or touching git.
pub fn plan_offline(
    ledger_path: &Path,
    lower_env: &str,
    higher_env: &str,
    new_version: Option<&str>,
    cfg: &PromoterConfig,
) -> Result<(PromotionDecision, PromotionPlan)> {
    validate_envs(lower_env, higher_env)?;
    let mut ledger = LedgerFile::open(ledger_path)
        .with_context(|| format!("load ledger {}", ledger_path.display()))?
        .into_ledger();
    let decision = decide(
        &mut ledger,
        &decision_input(cfg, lower_env, higher_env, new_version),
    )
    .context("decide promotion")?;
    let plan = PromotionPlan::from_decision(&decision, lower_env, higher_env, &cfg.bootstrap_env);
    Ok((decision, plan))
}

fn decision_input<'a>(
    cfg: &'a PromoterConfig,
    lower_env: &'a str,
    higher_env: &'a str,
    new_version: Option<&'a str>,
) -> DecisionInput<'a> {
    DecisionInput {
        bootstrap_env: &cfg.bootstrap_env,
        lower_env,
        higher_env,
        new_version: normalize_version(new_version),
    }
}

fn validate_envs(lower_env: &str, higher_env: &str) -> Result<()> {
    if lower_env == higher_env {
        bail!("lower and higher environments must differ (both '{lower_env}')");
    }
    Ok(())
}
