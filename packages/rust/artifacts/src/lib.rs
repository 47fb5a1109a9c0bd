//! Artifact fingerprinting and persistence for docmirror.

pub mod fingerprint;
pub mod writer;

pub use fingerprint::checksum;
pub use writer::{
    ArtifactRequest, ArtifactWriter, ParsedArtifact, WriteOutcome, artifact_file_name,
    parse_artifact, render_header,
};
