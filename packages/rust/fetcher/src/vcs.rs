//! Version-control collaborator.
//!
//! The fetcher only needs three operations from the external tool, so they sit
//! behind the [`Vcs`] trait. [`GitCli`] shells out to `git`; tests plug in an
//! in-process fake.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use docmirror_shared::{DocMirrorError, Result};

/// Operations the fetcher needs from a version-control tool.
///
/// Every call blocks until the external process exits.
pub trait Vcs: Send + Sync {
    /// Shallow (depth 1) clone of `remote` into `dest`.
    fn clone_shallow(&self, remote: &str, dest: &Path) -> Result<()>;
    /// Update an existing working copy in place.
    fn pull(&self, working_copy: &Path) -> Result<()>;
    /// Full identifier of the working copy's current revision.
    fn head_revision(&self, working_copy: &Path) -> Result<String>;
}

/// [`Vcs`] backed by the `git` command-line tool.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, operation: &str, target: &str, args: &[OsString], cwd: Option<&Path>) -> Result<Output> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            // Never block on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!(binary = %self.binary, ?args, ?cwd, "running version-control command");

        let output = cmd.output().map_err(|e| {
            DocMirrorError::vcs(
                operation,
                target,
                format!("failed to launch `{}`: {e}", self.binary),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocMirrorError::vcs(
                operation,
                target,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output)
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

/// Arguments for a depth-1 clone of `remote` into `dest`.
pub fn clone_args(remote: &str, dest: &Path) -> Vec<OsString> {
    vec![
        "clone".into(),
        "--depth".into(),
        "1".into(),
        remote.into(),
        dest.as_os_str().to_owned(),
    ]
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(|a| OsStr::new(a).to_owned()).collect()
}

impl Vcs for GitCli {
    fn clone_shallow(&self, remote: &str, dest: &Path) -> Result<()> {
        self.run("git clone", remote, &clone_args(remote, dest), None)?;
        Ok(())
    }

    fn pull(&self, working_copy: &Path) -> Result<()> {
        let target = working_copy.display().to_string();
        self.run("git pull", &target, &os_args(&["pull"]), Some(working_copy))?;
        Ok(())
    }

    fn head_revision(&self, working_copy: &Path) -> Result<String> {
        let target = working_copy.display().to_string();
        let output = self.run(
            "git rev-parse",
            &target,
            &os_args(&["rev-parse", "HEAD"]),
            Some(working_copy),
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
