//! Data types for the materialization flow.

use std::fmt;
use std::path::PathBuf;

use crate::PipelineError;

/// Where the orchestrator is in its single-item lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Idle,
    Transferring,
    Extracting,
    Finalizing,
    Cancelling,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Transferring => "transferring",
            Self::Extracting => "extracting",
            Self::Finalizing => "finalizing",
            Self::Cancelling => "cancelling",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one materialization request.
#[derive(Debug)]
pub enum MaterializeOutcome {
    /// Downloaded (and extracted, for containers) to this path.
    Materialized(PathBuf),
    /// Already on disk; nothing was transferred.
    AlreadyPresent(PathBuf),
    Failed(PipelineError),
    Cancelled,
}

impl MaterializeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Materialized(_) | Self::AlreadyPresent(_))
    }

    /// Final path on disk, for the outcomes that have one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Materialized(path) | Self::AlreadyPresent(path) => Some(path),
            Self::Failed(_) | Self::Cancelled => None,
        }
    }

    /// Status line shown to the user for item `name`.
    pub fn status_message(&self, name: &str) -> String {
        match self {
            Self::Materialized(_) => format!("Downloaded {name} successfully!"),
            Self::AlreadyPresent(path) => {
                let file = path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_else(|| name.to_string());
                format!("{file} already exists.")
            }
            Self::Failed(err) => format!("Failed to download {name}: {err}"),
            Self::Cancelled => format!("Download of {name} cancelled."),
        }
    }
}
