//! Application configuration for docmirror.
//!
//! User config lives at `~/.docmirror/docmirror.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocMirrorError, Result};
use crate::types::RepoDescriptor;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docmirror.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docmirror";

// ---------------------------------------------------------------------------
// Config structs (matching docmirror.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Tracked repositories.
    #[serde(default = "default_repos")]
    pub repos: Vec<RepoDescriptor>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            repos: default_repos(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory receiving the generated artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory holding one working copy per repository.
    #[serde(default = "default_clone_root")]
    pub clone_root: String,

    /// Version-control executable.
    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// Concurrent fetches; `0` means available parallelism.
    #[serde(default)]
    pub concurrency: usize,

    /// Recognised documentation file extensions (without the dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Sort walked paths so artifacts are reproducible.
    #[serde(default = "default_true")]
    pub sort_paths: bool,

    /// Extension of generated artifact files.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            clone_root: default_clone_root(),
            git_binary: default_git_binary(),
            concurrency: 0,
            extensions: default_extensions(),
            sort_paths: true,
            artifact_extension: default_artifact_extension(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}
fn default_clone_root() -> String {
    "cloned_repos".into()
}
fn default_git_binary() -> String {
    "git".into()
}
fn default_extensions() -> Vec<String> {
    vec!["md".into(), "mdx".into()]
}
fn default_true() -> bool {
    true
}
fn default_artifact_extension() -> String {
    "mdx".into()
}

/// The upstream documentation trees mirrored out of the box.
fn default_repos() -> Vec<RepoDescriptor> {
    [
        ("https://github.com/hashicorp/boundary.git", "website/content"),
        ("https://github.com/hashicorp/consul.git", "docs"),
        ("https://github.com/hashicorp/nomad.git", "website/content"),
        ("https://github.com/hashicorp/packer.git", "website/content"),
        ("https://github.com/hashicorp/terraform.git", "website/docs"),
        ("https://github.com/hashicorp/tutorials.git", "content/tutorials"),
        ("https://github.com/hashicorp/vagrant.git", "website/content"),
        ("https://github.com/hashicorp/vault.git", "website/content"),
    ]
    .into_iter()
    .map(|(remote, docs)| RepoDescriptor::new(remote, docs))
    .collect()
}

impl AppConfig {
    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.repos.is_empty() {
            return Err(DocMirrorError::config("no repositories configured"));
        }
        if self.defaults.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(DocMirrorError::config(
                "at least one documentation extension is required",
            ));
        }

        validate_repos(&self.repos)
    }
}

/// Check that every descriptor maps to its own directory under the clone root
/// and that its documentation subtree stays inside the working copy.
pub fn validate_repos(repos: &[RepoDescriptor]) -> Result<()> {
    let mut seen = HashSet::new();
    for repo in repos {
        let name = repo.name()?;
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(DocMirrorError::config(format!(
                "repository name '{name}' is not a valid directory name"
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(DocMirrorError::config(format!(
                "duplicate repository name '{name}'; set `name` on one of them"
            )));
        }

        let docs = Path::new(&repo.docs_path);
        if docs.has_root() || docs.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(DocMirrorError::config(format!(
                "docs_path '{}' of '{name}' must be relative to the working copy",
                repo.docs_path
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mirror config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime mirror configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub output_dir: PathBuf,
    pub clone_root: PathBuf,
    pub git_binary: String,
    /// Resolved fetch concurrency (always at least 1).
    pub concurrency: usize,
    pub extensions: Vec<String>,
    pub sort_paths: bool,
    pub artifact_extension: String,
    pub repos: Vec<RepoDescriptor>,
}

impl From<&AppConfig> for MirrorConfig {
    fn from(config: &AppConfig) -> Self {
        let d = &config.defaults;
        Self {
            output_dir: PathBuf::from(&d.output_dir),
            clone_root: PathBuf::from(&d.clone_root),
            git_binary: d.git_binary.clone(),
            concurrency: resolve_concurrency(d.concurrency),
            extensions: d
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            sort_paths: d.sort_paths,
            artifact_extension: d.artifact_extension.clone(),
            repos: config.repos.clone(),
        }
    }
}

/// Map a configured concurrency to a worker count; `0` means "one per core".
pub fn resolve_concurrency(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docmirror/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocMirrorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docmirror/docmirror.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocMirrorError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DocMirrorError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write the default config to `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| DocMirrorError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DocMirrorError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| DocMirrorError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}
