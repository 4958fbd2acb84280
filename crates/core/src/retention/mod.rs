//! Storage reclamation: the dual-rule retention sweep.

mod manager;
mod policy;

pub use manager::{RetentionManager, SweepOptions, SweepReport};
pub use policy::{RetentionPolicy, Verdict};

use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::download::DownloadError;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Artifact store error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Download index error: {0}")]
    Download(#[from] DownloadError),
}
