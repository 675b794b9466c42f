//! Append-only branch-per-environment ledger.
//!
//! The ledger is a table whose header names one column per environment (tier
//! order, lowest first). Every following row is a single promotion event: one
//! column holds the branch assigned to that environment, all others hold the
//! [`Cell::NoBranch`] sentinel. An environment's current branch is the last
//! branch found scanning its column bottom-up.
//!
//! Rows and columns are addressed 1-based with the header as row 1, the same
//! way the on-disk sheet is addressed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::branch_name::BranchName;
use crate::error::PromotionError;

/// On-disk marker for "no branch recorded in this environment for this event".
pub const SENTINEL: &str = "X";

/// One ledger cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum Cell {
    Branch(BranchName),
    /// Explicit sentinel written by [`Ledger::append_event`].
    NoBranch,
    /// Never written by the ledger itself; tolerated in hand-edited sheets.
    Empty,
}

impl Cell {
    pub fn branch(&self) -> Option<&BranchName> {
        match self {
            Cell::Branch(branch) => Some(branch),
            Cell::NoBranch | Cell::Empty => None,
        }
    }
}

impl TryFrom<Option<String>> for Cell {
    type Error = PromotionError;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let Some(raw) = value else {
            return Ok(Cell::Empty);
        };
        match raw.trim() {
            "" => Ok(Cell::Empty),
            SENTINEL => Ok(Cell::NoBranch),
            name => Ok(Cell::Branch(BranchName::parse(name)?)),
        }
    }
}

impl From<Cell> for Option<String> {
    fn from(value: Cell) -> Self {
        match value {
            Cell::Branch(branch) => Some(branch.to_string()),
            Cell::NoBranch => Some(SENTINEL.to_string()),
            Cell::Empty => None,
        }
    }
}

/// Current branch of an environment and the row it was recorded on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub branch: BranchName,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LedgerParts")]
pub struct Ledger {
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Deserialize)]
struct LedgerParts {
    header: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Cell>>,
}

impl TryFrom<LedgerParts> for Ledger {
    type Error = PromotionError;

    fn try_from(parts: LedgerParts) -> Result<Self, Self::Error> {
        Ledger::from_parts(parts.header, parts.rows)
    }
}

impl Ledger {
    /// Create an empty ledger with the given environment columns.
    pub fn new<I, S>(environments: I) -> Result<Self, PromotionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_parts(environments.into_iter().map(Into::into).collect(), Vec::new())
    }

    /// Build a ledger from a header and event rows, checking the table shape.
    pub fn from_parts(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, PromotionError> {
        if header.is_empty() {
            return Err(PromotionError::InvalidLedger(
                "header must name at least one environment".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for name in &header {
            if name.trim().is_empty() {
                return Err(PromotionError::InvalidLedger(
                    "header contains an empty environment name".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(PromotionError::InvalidLedger(format!(
                    "duplicate environment '{name}' in header"
                )));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                return Err(PromotionError::InvalidLedger(format!(
                    "row {} has {} cells, header has {}",
                    idx + 2,
                    row.len(),
                    header.len()
                )));
            }
        }
        Ok(Self { header, rows })
    }

    pub fn environments(&self) -> &[String] {
        &self.header
    }

    /// Event rows, oldest first (tabular rows 2..).
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Last populated tabular row (1 when only the header exists).
    pub fn max_row(&self) -> usize {
        self.rows.len() + 1
    }

    /// Cell at a 1-based tabular position. Row 1 is the header and has no cells.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        let row_idx = row.checked_sub(2)?;
        let col_idx = col.checked_sub(1)?;
        self.rows.get(row_idx)?.get(col_idx)
    }

    /// 1-based column index of an environment.
    pub fn column_of(&self, env: &str) -> Result<usize, PromotionError> {
        self.header
            .iter()
            .position(|name| name == env)
            .map(|idx| idx + 1)
            .ok_or_else(|| PromotionError::UnknownEnvironment(env.to_string()))
    }

    /// Current branch of `env`: the bottom-most branch cell in its column.
    pub fn last_branch(&self, env: &str) -> Result<LedgerEntry, PromotionError> {
        let col_idx = self.column_of(env)? - 1;
        self.rows
            .iter()
            .enumerate()
            .rev()
            .find_map(|(idx, row)| {
                row[col_idx].branch().map(|branch| LedgerEntry {
                    branch: branch.clone(),
                    row: idx + 2,
                })
            })
            .ok_or_else(|| PromotionError::NoBranchRecorded(env.to_string()))
    }

    /// Append one event assigning `branch` to `env`; returns the new row number.
    ///
    /// Every other column of the new row gets the sentinel. Existing rows are
    /// never touched, and nothing changes when `env` is unknown.
    pub fn append_event(&mut self, env: &str, branch: &BranchName) -> Result<usize, PromotionError> {
        let col_idx = self.column_of(env)? - 1;
        let row = (0..self.header.len())
            .map(|idx| {
                if idx == col_idx {
                    Cell::Branch(branch.clone())
                } else {
                    Cell::NoBranch
                }
            })
            .collect();
        self.rows.push(row);
        Ok(self.max_row())
    }
}

/// Where the decision engine reads the ledger from and records events to.
///
/// [`Ledger`] itself is an in-memory store; `io::ledger_store::LedgerFile`
/// persists every append.
pub trait LedgerStore {
    fn ledger(&self) -> &Ledger;

    fn append_event(&mut self, env: &str, branch: &BranchName) -> Result<usize, PromotionError>;
}

impl LedgerStore for Ledger {
    fn ledger(&self) -> &Ledger {
        self
    }

    fn append_event(&mut self, env: &str, branch: &BranchName) -> Result<usize, PromotionError> {
        Ledger::append_event(self, env, branch)
    }
}
