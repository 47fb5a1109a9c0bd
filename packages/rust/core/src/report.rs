//! Per-run and per-repository outcomes.

use std::path::PathBuf;

use serde::Serialize;

use docmirror_artifacts::WriteOutcome;
use docmirror_shared::{Checksum, RevisionId};

/// What happened to one repository during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepoStatus {
    /// A new or replaced artifact was written.
    Updated {
        artifact: PathBuf,
        checksum: Checksum,
        revision: RevisionId,
        files: usize,
    },
    /// The same-named artifact already held identical content.
    Unchanged {
        artifact: PathBuf,
        checksum: Checksum,
        revision: RevisionId,
        files: usize,
    },
    /// Clone or pull failed; nothing was collected.
    FetchFailed { error: String },
    /// Collection or artifact writing failed.
    Failed { error: String },
}

impl RepoStatus {
    pub(crate) fn from_write(outcome: WriteOutcome, revision: RevisionId, files: usize) -> Self {
        match outcome {
            WriteOutcome::Written { path, checksum, .. } => Self::Updated {
                artifact: path,
                checksum,
                revision,
                files,
            },
            WriteOutcome::Unchanged { path, checksum } => Self::Unchanged {
                artifact: path,
                checksum,
                revision,
                files,
            },
        }
    }
}

/// Outcome for a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: RepoStatus,
}

impl RepoOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            RepoStatus::FetchFailed { .. } | RepoStatus::Failed { .. }
        )
    }

    /// Operator-facing one-liner.
    pub fn summary_line(&self) -> String {
        let name = &self.name;
        match &self.status {
            RepoStatus::Updated { checksum, .. } => {
                format!("Updated {name} - checksum: {checksum}")
            }
            RepoStatus::Unchanged { checksum, .. } => {
                format!("Skipping {name} - No changes detected. (checksum {checksum})")
            }
            RepoStatus::FetchFailed { error } | RepoStatus::Failed { error } => {
                format!("Failed {name}: {error}")
            }
        }
    }
}

/// Result of a whole mirror run, in descriptor order.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    pub repos: Vec<RepoOutcome>,
    pub elapsed_ms: u64,
}

impl MirrorReport {
    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, RepoStatus::Updated { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, RepoStatus::Unchanged { .. }))
    }

    pub fn failed(&self) -> usize {
        self.repos.iter().filter(|r| r.is_failure()).count()
    }

    /// True when no repository failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&RepoStatus) -> bool) -> usize {
        self.repos.iter().filter(|r| pred(&r.status)).count()
    }
}
