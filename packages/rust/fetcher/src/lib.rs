//! Working-copy fetcher for docmirror.
//!
//! Guarantees a local working copy of each tracked repository exists and is
//! current, then reports its short revision id.

pub mod vcs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use docmirror_shared::{DocMirrorError, RepoDescriptor, Result, RevisionId};

pub use vcs::{GitCli, Vcs};

/// A working copy that was cloned or updated during this run.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    /// Repository name (directory name and artifact prefix).
    pub name: String,
    /// Root of the working copy.
    pub path: PathBuf,
    /// Documentation subtree inside the working copy.
    pub docs_path: PathBuf,
    /// Short revision, or the `unknown` sentinel.
    pub revision: RevisionId,
    /// Whether this run created the working copy (clone) or updated it (pull).
    pub freshly_cloned: bool,
}

/// Clones or updates working copies under a common root directory.
#[derive(Clone)]
pub struct Fetcher {
    vcs: Arc<dyn Vcs>,
    clone_root: PathBuf,
}

impl Fetcher {
    pub fn new(vcs: Arc<dyn Vcs>, clone_root: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            clone_root: clone_root.into(),
        }
    }

    /// Local directory for the named repository.
    pub fn working_copy_path(&self, name: &str) -> PathBuf {
        self.clone_root.join(name)
    }

    /// Make sure `repo` has a current working copy and resolve its revision.
    ///
    /// A failed clone or pull is returned as an error; a stale working copy is
    /// left untouched. A failed revision lookup degrades to `unknown`.
    #[instrument(skip_all, fields(remote = %repo.remote))]
    pub fn fetch(&self, repo: &RepoDescriptor) -> Result<WorkingCopy> {
        let name = repo.name()?;
        let path = self.working_copy_path(&name);

        let freshly_cloned = if is_working_copy(&path) {
            debug!(repo = %name, path = %path.display(), "updating existing working copy");
            self.vcs.pull(&path).inspect_err(|e| {
                error!(repo = %name, error = %e, "pull failed, keeping stale working copy");
            })?;
            false
        } else {
            self.clone_fresh(&name, &repo.remote, &path)?;
            true
        };

        let revision = match self.vcs.head_revision(&path) {
            Ok(full) => RevisionId::from_full(&full),
            Err(e) => {
                warn!(repo = %name, error = %e, "could not resolve revision, using sentinel");
                RevisionId::unknown()
            }
        };

        info!(
            repo = %name,
            revision = %revision,
            cloned = freshly_cloned,
            "working copy ready"
        );

        Ok(WorkingCopy {
            docs_path: path.join(&repo.docs_path),
            name,
            path,
            revision,
            freshly_cloned,
        })
    }

    fn clone_fresh(&self, name: &str, remote: &str, path: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.clone_root)
            .map_err(|e| DocMirrorError::io(&self.clone_root, e))?;

        let pre_existing = path.exists();
        debug!(repo = %name, path = %path.display(), "cloning working copy");

        if let Err(e) = self.vcs.clone_shallow(remote, path) {
            error!(repo = %name, error = %e, "clone failed");
            // Leave nothing half-cloned behind, but never remove a directory we did not create.
            if !pre_existing && path.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(path) {
                    warn!(path = %path.display(), error = %cleanup, "failed to remove partial clone");
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

/// A directory counts as a working copy once it has version-control metadata.
fn is_working_copy(path: &Path) -> bool {
    path.join(".git").exists()
}
