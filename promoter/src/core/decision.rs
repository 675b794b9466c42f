//! Promotion decision: reuse an existing branch or mint a new one.
//!
//! The bootstrap tier is where every release branch originates. When it has
//! caught up with the next tier, a new release branch is minted and must be
//! provisioned. When two higher tiers are in lock-step, the bootstrap tier is
//! re-seeded in the ledger only. Anything else promotes the existing branch.

use serde::Serialize;
use tracing::{debug, info};

use crate::core::branch_name::{BranchName, normalize_version};
use crate::core::ledger::LedgerStore;
use crate::error::PromotionError;

/// Inputs for a single decision.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    /// Lowest tier, where all release branches originate.
    pub bootstrap_env: &'a str,
    pub lower_env: &'a str,
    pub higher_env: &'a str,
    pub new_version: Option<&'a str>,
}

/// Ledger event appended while deciding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    pub env: String,
    pub branch: BranchName,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionDecision {
    /// Branch the promotion (or new branch) starts from.
    pub base_branch: BranchName,
    /// Branch to promote into, or to create.
    pub target_branch: BranchName,
    /// The bootstrap tier's ledger entry was superseded; promote from it.
    pub lower_env_needs_overwrite: bool,
    /// `target_branch` does not exist yet and must be provisioned.
    pub branch_was_created: bool,
    pub recorded: Option<RecordedEvent>,
}

/// Decide how to promote from `lower_env` to `higher_env`.
///
/// Both environments are resolved before anything is appended, so unknown
/// names never leave a partial ledger update behind.
pub fn decide<S: LedgerStore>(
    store: &mut S,
    input: &DecisionInput<'_>,
) -> Result<PromotionDecision, PromotionError> {
    let ledger = store.ledger();
    ledger.column_of(input.lower_env)?;
    ledger.column_of(input.higher_env)?;

    let lower = ledger.last_branch(input.lower_env)?.branch;
    let higher = ledger.last_branch(input.higher_env)?.branch;
    debug!(lower = %lower, higher = %higher, "current branches");

    let converged = lower == higher;

    if input.lower_env == input.bootstrap_env {
        if converged {
            let version = normalize_version(input.new_version).ok_or_else(|| {
                PromotionError::MissingVersion {
                    env: input.lower_env.to_string(),
                    branch: lower.to_string(),
                }
            })?;
            let target = lower.derive(Some(version))?;
            let recorded = record(store, input.bootstrap_env, &target)?;
            info!(base = %lower, target = %target, "bootstrap tier converged, minting release branch");
            return Ok(PromotionDecision {
                base_branch: lower,
                target_branch: target,
                lower_env_needs_overwrite: false,
                branch_was_created: true,
                recorded: Some(recorded),
            });
        }
        info!(base = %higher, target = %lower, "higher tier behind bootstrap, promoting existing branch");
        return Ok(reuse(higher, lower));
    }

    if converged {
        // Ledger-only re-seed: no branch is provisioned for this entry.
        let target = lower.derive(input.new_version)?;
        let recorded = record(store, input.bootstrap_env, &target)?;
        info!(base = %lower, target = %target, "tiers in lock-step, re-seeding bootstrap tier");
        return Ok(PromotionDecision {
            base_branch: lower,
            target_branch: target,
            lower_env_needs_overwrite: true,
            branch_was_created: false,
            recorded: Some(recorded),
        });
    }

    info!(base = %higher, target = %lower, "branches differ, promoting existing branch");
    Ok(reuse(higher, lower))
}

fn reuse(base: BranchName, target: BranchName) -> PromotionDecision {
    PromotionDecision {
        base_branch: base,
        target_branch: target,
        lower_env_needs_overwrite: false,
        branch_was_created: false,
        recorded: None,
    }
}

fn record<S: LedgerStore>(
    store: &mut S,
    env: &str,
    branch: &BranchName,
) -> Result<RecordedEvent, PromotionError> {
    let row = store.append_event(env, branch)?;
    Ok(RecordedEvent {
        env: env.to_string(),
        branch: branch.clone(),
        row,
    })
}
