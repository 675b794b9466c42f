//! Branch promotion across deployment tiers.
//!
//! A ledger records which branch each environment runs. Given two tiers, the
//! promoter decides whether the lower tier's branch is simply promoted or a
//! new release branch must be minted, and provisions that branch when needed.
//!
//! - **[`core`]**: Pure, deterministic logic (branch names, the ledger, the
//!   decision engine). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (git, ledger file, overlay scrub,
//!   scratch workspace).
//!
//! Orchestration modules ([`promote`], [`provision`]) coordinate core logic
//! with I/O to implement CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod promote;
pub mod provision;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
