//! Core domain types for docmirror.

use serde::{Deserialize, Serialize};

use crate::error::{DocMirrorError, Result};

/// Length of the short revision identifier stamped into artifact names.
pub const SHORT_REVISION_LEN: usize = 7;

/// Sentinel used when the working copy revision cannot be resolved.
pub const UNKNOWN_REVISION: &str = "unknown";

// ---------------------------------------------------------------------------
// RepoDescriptor
// ---------------------------------------------------------------------------

/// A tracked repository: where to fetch it from and where its docs live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDescriptor {
    /// Remote location handed to the version-control tool.
    pub remote: String,
    /// Documentation subtree, relative to the working copy root.
    pub docs_path: String,
    /// Explicit name; derived from `remote` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RepoDescriptor {
    pub fn new(remote: impl Into<String>, docs_path: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            docs_path: docs_path.into(),
            name: None,
        }
    }

    /// Name used for the working copy directory and the artifact file.
    pub fn name(&self) -> Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        repo_name_from_remote(&self.remote).ok_or_else(|| {
            DocMirrorError::validation(format!(
                "cannot derive a repository name from remote '{}'",
                self.remote
            ))
        })
    }
}

/// Derive a repository name from its remote location.
///
/// Takes the last path segment and strips a trailing `.git`, so
/// `https://github.com/hashicorp/vault.git`, `git@github.com:hashicorp/vault.git`
/// and `/srv/git/vault` all yield `vault`.
pub fn repo_name_from_remote(remote: &str) -> Option<String> {
    let trimmed = remote.trim().trim_end_matches(['/', '\\']);
    let last = trimmed.rsplit(['/', '\\', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

// ---------------------------------------------------------------------------
// RevisionId
// ---------------------------------------------------------------------------

/// Short identifier of a working copy revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    /// Truncate a full commit identifier to its short form.
    /// Blank input yields the `unknown` sentinel.
    pub fn from_full(full: &str) -> Self {
        let short: String = full.trim().chars().take(SHORT_REVISION_LEN).collect();
        if short.is_empty() {
            Self::unknown()
        } else {
            Self(short)
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_REVISION.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_REVISION
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Hex-encoded content digest, compared for equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
