//! Mirror pipeline orchestration for docmirror.
//!
//! Ties the fetcher, collector, and artifact writer together into a single
//! run over every configured repository (see [`pipeline::mirror_all`]).

pub mod pipeline;
pub mod report;

pub use pipeline::{
    Clock, FetchOutcome, ProgressReporter, SilentProgress, local_now, mirror_all, mirror_all_with_clock,
    mirror_with_git,
};
pub use report::{MirrorReport, RepoOutcome, RepoStatus};
