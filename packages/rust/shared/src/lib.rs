//! Shared types, error model, and configuration for docmirror.
//!
//! This crate is the foundation depended on by all other docmirror crates.
//! It provides:
//! - [`DocMirrorError`], the unified error type
//! - Domain types ([`RepoDescriptor`], [`RevisionId`], [`Checksum`])
//! - Configuration ([`AppConfig`], [`MirrorConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, MirrorConfig, config_dir, config_file_path, init_config,
    init_config_at, load_config, load_config_from, resolve_concurrency, validate_repos,
};
pub use error::{DocMirrorError, Result};
pub use types::{
    Checksum, RepoDescriptor, RevisionId, SHORT_REVISION_LEN, UNKNOWN_REVISION,
    repo_name_from_remote,
};
