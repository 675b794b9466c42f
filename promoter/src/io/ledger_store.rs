//! File-backed ledger with schema validation and atomic saves.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::branch_name::BranchName;
use crate::core::ledger::{Ledger, LedgerStore};
use crate::error::PromotionError;

const LEDGER_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/ledger.schema.json"
));

/// A ledger loaded from disk. Every append is saved immediately.
#[derive(Debug)]
pub struct LedgerFile {
    path: PathBuf,
    ledger: Ledger,
}

impl LedgerFile {
    /// Load and validate the ledger at `path` (schema, then table shape).
    pub fn open(path: &Path) -> Result<Self, PromotionError> {
        let contents = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        let value: Value = serde_json::from_str(&contents).map_err(|err| {
            PromotionError::InvalidLedger(format!("parse {}: {err}", path.display()))
        })?;
        validate_schema(&value)?;
        let ledger: Ledger = serde_json::from_value(value).map_err(|err| {
            PromotionError::InvalidLedger(format!("{}: {err}", path.display()))
        })?;
        debug!(
            path = %path.display(),
            environments = ledger.environments().len(),
            events = ledger.rows().len(),
            "ledger loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            ledger,
        })
    }

    /// Write `ledger` to `path` and return the opened file.
    pub fn create(path: &Path, ledger: Ledger) -> Result<Self, PromotionError> {
        let file = Self {
            path: path.to_path_buf(),
            ledger,
        };
        file.save()?;
        Ok(file)
    }

    /// Atomically write the ledger to disk (temp file + rename).
    pub fn save(&self) -> Result<(), PromotionError> {
        let mut buf = serde_json::to_string_pretty(&self.ledger)
            .map_err(|err| PromotionError::InvalidLedger(format!("serialize ledger: {err}")))?;
        buf.push('\n');
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, buf).map_err(|source| io_error(&tmp_path, source))?;
        fs::rename(&tmp_path, &self.path).map_err(|source| io_error(&self.path, source))?;
        Ok(())
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }
}

impl LedgerStore for LedgerFile {
    fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn append_event(&mut self, env: &str, branch: &BranchName) -> Result<usize, PromotionError> {
        let row = self.ledger.append_event(env, branch)?;
        self.save()?;
        info!(env, branch = %branch, row, path = %self.path.display(), "ledger event recorded");
        Ok(row)
    }
}

fn validate_schema(value: &Value) -> Result<(), PromotionError> {
    let schema: Value = serde_json::from_str(LEDGER_SCHEMA)
        .map_err(|err| PromotionError::InvalidLedger(format!("parse ledger schema: {err}")))?;
    let compiled = validator_for(&schema)
        .map_err(|err| PromotionError::InvalidLedger(format!("invalid ledger schema: {err}")))?;
    if compiled.is_valid(value) {
        return Ok(());
    }
    let messages = compiled
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    Err(PromotionError::InvalidLedger(format!(
        "schema validation failed: {}",
        messages.join("; ")
    )))
}

fn io_error(path: &Path, source: io::Error) -> PromotionError {
    PromotionError::LedgerIo {
        path: path.to_path_buf(),
        source,
    }
}
