//! Documentation collector.
//!
//! Walks a documentation subtree and concatenates every recognised document
//! into one text, each preceded by an HTML comment naming its source path:
//!
//! ```text
//!
//! <!-- cloned_repos/vault/website/content/docs/index.mdx -->
//! ...file content...
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use docmirror_shared::Result;

/// Which files to pick up and in what order.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Extensions without the leading dot, e.g. `["md", "mdx"]`.
    pub extensions: Vec<String>,
    /// Visit entries sorted by file name instead of directory-listing order.
    pub sort_paths: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["md".into(), "mdx".into()],
            sort_paths: true,
        }
    }
}

/// The concatenated documentation of one subtree.
#[derive(Debug, Clone, Default)]
pub struct CollectedDocument {
    /// Marker-prefixed concatenation of every included file.
    pub content: String,
    /// Included files, in concatenation order.
    pub files: Vec<PathBuf>,
    /// Matching files that could not be read as UTF-8 text.
    pub skipped: Vec<PathBuf>,
}

impl CollectedDocument {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Marker line placed before each document.
pub fn marker_line(path: &Path) -> String {
    format!("<!-- {} -->", path.display())
}

/// Whether `path` ends in one of the recognised extensions.
pub fn is_document(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    extensions.iter().any(|ext| {
        name.len() > ext.len() + 1
            && name.ends_with(ext.as_str())
            && name[..name.len() - ext.len()].ends_with('.')
    })
}

/// Concatenate every recognised document under `root`.
///
/// A missing root yields an empty document rather than an error.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn collect(root: &Path, options: &CollectOptions) -> Result<CollectedDocument> {
    let mut doc = CollectedDocument::default();

    if !root.is_dir() {
        warn!("documentation root missing, collecting nothing");
        return Ok(doc);
    }

    let mut walker = WalkDir::new(root);
    if options.sort_paths {
        walker = walker.sort_by_file_name();
    }

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "error walking documentation tree");
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_dir() || !path.is_file() {
            continue;
        }
        if !is_document(path, &options.extensions) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => {
                doc.content.push('\n');
                doc.content.push_str(&marker_line(path));
                doc.content.push('\n');
                doc.content.push_str(&text);
                debug!(path = %path.display(), bytes = text.len(), "collected document");
                doc.files.push(path.to_path_buf());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable document");
                doc.skipped.push(path.to_path_buf());
            }
        }
    }

    info!(
        files = doc.files.len(),
        skipped = doc.skipped.len(),
        bytes = doc.content.len(),
        "collection complete"
    );

    Ok(doc)
}
