//! Stable exit codes for promoter CLI commands.

/// Promotion plan produced.
pub const OK: i32 = 0;
/// Unclassified failure (config, filesystem, argument errors).
pub const FAILED: i32 = 1;
/// Bad input: unknown environment, empty ledger column, missing version,
/// malformed branch name or ledger.
pub const INVALID_INPUT: i32 = 2;
/// The remote refused: base branch missing or a push was rejected.
pub const REMOTE_REJECTED: i32 = 3;
/// Transport failure: timeout, missing credential, or any other git error.
pub const TRANSPORT: i32 = 4;
