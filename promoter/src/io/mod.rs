//! I/O adapters for promotion runs: git, the ledger file, and the filesystem.

pub mod config;
pub mod credentials;
pub mod git;
pub mod ledger_store;
pub mod process;
pub mod scrub;
pub mod workspace;
