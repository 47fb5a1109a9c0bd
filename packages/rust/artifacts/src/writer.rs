//! Dated, revision-stamped artifact files.
//!
//! An artifact is named `{repo}_{YYYYMMDD}_{revision}.{ext}` and laid out as:
//!
//! ```text
//! Generated on: 2024-05-01 13:37:00
//! Latest Commit SHA: 89abcde
//!
//! <collected document>
//! ```
//!
//! A write is skipped when an artifact with the same name already holds a
//! body with the same checksum.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use docmirror_shared::{Checksum, DocMirrorError, Result, RevisionId};

use crate::fingerprint::checksum;

/// Date component of artifact file names.
pub const FILE_DATE_FORMAT: &str = "%Y%m%d";

/// Timestamp format of the `Generated on:` header line.
pub const HEADER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const GENERATED_PREFIX: &str = "Generated on: ";
const REVISION_PREFIX: &str = "Latest Commit SHA: ";

/// Everything needed to produce one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactRequest<'a> {
    pub repo_name: &'a str,
    pub revision: &'a RevisionId,
    /// The collected document.
    pub content: &'a str,
    /// Local generation time; supplies both the file date and the header.
    pub generated_at: NaiveDateTime,
}

/// What the writer did with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// A new artifact was written, or a same-named one with different content replaced.
    Written {
        path: PathBuf,
        checksum: Checksum,
        replaced: bool,
    },
    /// An artifact with this name and identical content already exists.
    Unchanged { path: PathBuf, checksum: Checksum },
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Written { path, .. } | Self::Unchanged { path, .. } => path,
        }
    }

    pub fn checksum(&self) -> &Checksum {
        match self {
            Self::Written { checksum, .. } | Self::Unchanged { checksum, .. } => checksum,
        }
    }
}

/// A parsed artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArtifact<'a> {
    pub generated_on: &'a str,
    pub revision: &'a str,
    pub body: &'a str,
}

/// `{repo}_{YYYYMMDD}_{revision}.{ext}`
pub fn artifact_file_name(
    repo_name: &str,
    generated_at: &NaiveDateTime,
    revision: &RevisionId,
    extension: &str,
) -> String {
    format!(
        "{repo_name}_{}_{revision}.{extension}",
        generated_at.format(FILE_DATE_FORMAT)
    )
}

/// The two header lines plus the blank separator line.
pub fn render_header(generated_at: &NaiveDateTime, revision: &RevisionId) -> String {
    format!(
        "{GENERATED_PREFIX}{}\n{REVISION_PREFIX}{revision}\n\n",
        generated_at.format(HEADER_TIMESTAMP_FORMAT)
    )
}

/// Split an artifact into header fields and body. `None` if the header is malformed.
pub fn parse_artifact(text: &str) -> Option<ParsedArtifact<'_>> {
    let rest = text.strip_prefix(GENERATED_PREFIX)?;
    let (generated_on, rest) = rest.split_once('\n')?;
    let rest = rest.strip_prefix(REVISION_PREFIX)?;
    let (revision, rest) = rest.split_once('\n')?;
    let body = rest.strip_prefix('\n')?;
    Some(ParsedArtifact {
        generated_on,
        revision,
        body,
    })
}

/// Writes artifacts into a single output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    extension: String,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
        }
    }

    /// Full path of the artifact a request maps to.
    pub fn target_path(&self, req: &ArtifactRequest<'_>) -> PathBuf {
        self.output_dir.join(artifact_file_name(
            req.repo_name,
            &req.generated_at,
            req.revision,
            &self.extension,
        ))
    }

    /// Persist `req` unless an identical same-named artifact already exists.
    #[instrument(skip_all, fields(repo = %req.repo_name, revision = %req.revision))]
    pub fn write(&self, req: &ArtifactRequest<'_>) -> Result<WriteOutcome> {
        let target = self.target_path(req);
        let new_checksum = checksum(req.content);

        let prior = inspect_prior(&target);
        if prior == Prior::Body(new_checksum.clone()) {
            info!(path = %target.display(), checksum = %new_checksum, "artifact unchanged");
            return Ok(WriteOutcome::Unchanged {
                path: target,
                checksum: new_checksum,
            });
        }

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| DocMirrorError::io(&self.output_dir, e))?;

        let mut text = render_header(&req.generated_at, req.revision);
        text.push_str(req.content);
        write_atomic(&target, &text)?;

        let replaced = prior != Prior::Absent;
        info!(
            path = %target.display(),
            checksum = %new_checksum,
            bytes = text.len(),
            replaced,
            "artifact written"
        );

        Ok(WriteOutcome::Written {
            path: target,
            checksum: new_checksum,
            replaced,
        })
    }
}

/// State of a same-named artifact already on disk.
#[derive(Debug, PartialEq, Eq)]
enum Prior {
    /// Nothing to compare against: missing, or unreadable (fail-open).
    Absent,
    /// Present but not in artifact layout; always replaced.
    Malformed,
    /// Present with a parsed body of this checksum.
    Body(Checksum),
}

fn inspect_prior(path: &Path) -> Prior {
    if !path.exists() {
        return Prior::Absent;
    }
    match std::fs::read_to_string(path) {
        Ok(text) => match parse_artifact(&text) {
            Some(parsed) => Prior::Body(checksum(parsed.body)),
            None => {
                debug!(path = %path.display(), "existing artifact has no header, replacing");
                Prior::Malformed
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read existing artifact, rewriting");
            Prior::Absent
        }
    }
}

/// Write to a hidden temp file next to `target`, then rename over it.
fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let dir = target.parent().unwrap_or(Path::new("."));
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.tmp"));

    let result = std::fs::write(&temp, content)
        .map_err(|e| DocMirrorError::io(&temp, e))
        .and_then(|()| std::fs::rename(&temp, target).map_err(|e| DocMirrorError::io(target, e)));

    if result.is_err() && temp.exists() {
        if let Err(e) = std::fs::remove_file(&temp) {
            warn!(path = %temp.display(), error = %e, "failed to remove temp artifact");
        }
    }
    result
}
