//! Deterministic, pure promotion logic.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! ledgers and return deterministic outputs suitable for tests.

pub mod branch_name;
pub mod decision;
pub mod ledger;
