//! Structured branch names and the derivation of new release branches.
//!
//! Ledger cells are parsed into [`BranchName`] once, at read time. Deriving a
//! new branch keeps the prefix segment and only ever swaps the version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PromotionError;

/// Suffix appended when a branch is derived without an explicit version.
pub const PROMOTION_SUFFIX: &str = "_promotion_branch";

const SEPARATOR: char = '/';

/// A branch name split on its first `/` into prefix and version segments.
///
/// `release/1.0.0` has prefix `release` and version `1.0.0`; a name without a
/// separator is all prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName {
    prefix: String,
    version: Option<String>,
}

impl BranchName {
    pub fn parse(raw: &str) -> Result<Self, PromotionError> {
        validate_ref_name(raw)?;
        match raw.split_once(SEPARATOR) {
            Some((prefix, version)) => {
                if prefix.is_empty() || version.is_empty() {
                    return Err(PromotionError::invalid_branch(
                        raw,
                        "empty segment around '/'",
                    ));
                }
                Ok(Self {
                    prefix: prefix.to_string(),
                    version: Some(version.to_string()),
                })
            }
            None => Ok(Self {
                prefix: raw.to_string(),
                version: None,
            }),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Derive the next branch from this one.
    ///
    /// With a version the prefix is kept and the version replaced
    /// (`release/1.0.0` + `1.1.0` → `release/1.1.0`). Without one the whole
    /// name gets [`PROMOTION_SUFFIX`]. Blank versions count as absent.
    pub fn derive(&self, new_version: Option<&str>) -> Result<Self, PromotionError> {
        match normalize_version(new_version) {
            Some(version) => {
                if self.version.is_none() {
                    return Err(PromotionError::invalid_branch(
                        &self.to_string(),
                        "no '/' separator to take a prefix from",
                    ));
                }
                Self::parse(&format!("{}{SEPARATOR}{version}", self.prefix))
            }
            None => Self::parse(&format!("{self}{PROMOTION_SUFFIX}")),
        }
    }
}

/// Treat empty or whitespace-only version tokens as "no version".
pub fn normalize_version(version: Option<&str>) -> Option<&str> {
    version.map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}{SEPARATOR}{version}", self.prefix),
            None => f.write_str(&self.prefix),
        }
    }
}

impl FromStr for BranchName {
    type Err = PromotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BranchName {
    type Error = PromotionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BranchName> for String {
    fn from(value: BranchName) -> Self {
        value.to_string()
    }
}

/// Reject names git would refuse as a branch ref.
fn validate_ref_name(name: &str) -> Result<(), PromotionError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("must not contain whitespace or control characters")
    } else if name
        .chars()
        .any(|c| matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        Some("must not contain any of ~^:?*[\\")
    } else if name.contains("..") || name.contains("@{") || name.contains("//") {
        Some("must not contain '..', '@{' or '//'")
    } else if name.starts_with('-') || name.starts_with(SEPARATOR) {
        Some("must not start with '-' or '/'")
    } else if name.ends_with(SEPARATOR) || name.ends_with('.') || name.ends_with(".lock") {
        Some("must not end with '/', '.' or '.lock'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(PromotionError::invalid_branch(name, reason)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(raw: &str) -> BranchName {
        BranchName::parse(raw).expect("parse branch")
    }

    #[test]
    fn parse_splits_on_first_separator() {
        let name = branch("PF-release/1.0.0/hotfix");
        assert_eq!(name.prefix(), "PF-release");
        assert_eq!(name.version(), Some("1.0.0/hotfix"));
        assert_eq!(name.to_string(), "PF-release/1.0.0/hotfix");
    }

    #[test]
    fn parse_without_separator_is_all_prefix() {
        let name = branch("foo_branch");
        assert_eq!(name.prefix(), "foo_branch");
        assert_eq!(name.version(), None);
    }

    #[test]
    fn derive_with_version_keeps_prefix() {
        let derived = branch("release/1.0.0").derive(Some("1.2.0")).expect("derive");
        assert_eq!(derived.to_string(), "release/1.2.0");
    }

    #[test]
    fn derive_without_version_appends_suffix() {
        let derived = branch("foo_branch").derive(None).expect("derive");
        assert_eq!(derived.to_string(), "foo_branch_promotion_branch");

        let derived = branch("rel/2.0.0").derive(None).expect("derive");
        assert_eq!(derived.to_string(), "rel/2.0.0_promotion_branch");
        assert_eq!(derived.prefix(), "rel");
    }

    #[test]
    fn derive_treats_blank_version_as_absent() {
        let derived = branch("rel/2.0.0").derive(Some("  ")).expect("derive");
        assert_eq!(derived.to_string(), "rel/2.0.0_promotion_branch");
    }

    #[test]
    fn derive_with_version_requires_separator() {
        let err = branch("foo_branch").derive(Some("1.0.0")).unwrap_err();
        assert!(matches!(err, PromotionError::InvalidBranchFormat { .. }));
    }

    #[test]
    fn derive_rejects_unusable_version() {
        let err = branch("rel/1.0.0").derive(Some("1.1 beta")).unwrap_err();
        assert!(matches!(err, PromotionError::InvalidBranchFormat { .. }));
    }

    #[test]
    fn parse_rejects_invalid_refs() {
        for raw in [
            "", "rel/", "/1.0", "rel/../x", "rel/1.0.lock", "-rel", "rel 1", "rel/1:0", "a//b",
        ] {
            assert!(
                matches!(
                    BranchName::parse(raw),
                    Err(PromotionError::InvalidBranchFormat { .. })
                ),
                "expected '{raw}' to be rejected"
            );
        }
    }

    #[test]
    fn serde_uses_plain_string() {
        let name = branch("release/1.0.0");
        let json = serde_json::to_string(&name).expect("serialize");
        assert_eq!(json, "\"release/1.0.0\"");
        let back: BranchName = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, name);
        assert!(serde_json::from_str::<BranchName>("\"bad name\"").is_err());
    }
}
