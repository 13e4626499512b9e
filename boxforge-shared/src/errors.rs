//! Error types for the image build pipeline.
//!
//! Errors are categorized by how the pipeline recovers from them:
//! - [`ForgeError::Config`]: bad descriptor or workspace config (absorbed per template)
//! - [`ForgeError::Provisioning`]: a provisioning step exited non-zero (absorbed per template)
//! - [`ForgeError::Transfer`]: staging copy or artifact relocation failed
//! - [`ForgeError::Infrastructure`]: VM or container runtime unavailable (surfaced to operator)
//! - [`ForgeError::Timeout`]: a readiness wait gave up

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the workspace.
pub type ForgeResult<T> = Result<T, ForgeError>;

#[derive(Debug, Error)]
pub enum ForgeError {
    /// Missing or malformed descriptor / workspace configuration.
    #[error("config: {0}")]
    Config(String),

    /// A command run inside a build container failed.
    #[error("provisioning {template} ({step}): exit code {code:?}")]
    Provisioning {
        template: String,
        step: String,
        code: Option<i32>,
    },

    /// Copying inputs into, or artifacts out of, the staging area failed.
    #[error("transfer: {0}")]
    Transfer(String),

    /// VM or container runtime unavailable, or an infrastructure command failed.
    #[error("infrastructure: {0}")]
    Infrastructure(String),

    /// A readiness condition was not met in time.
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// Filesystem operation failed.
    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    /// Create a provisioning error for a failed step.
    pub fn provisioning(
        template: impl Into<String>,
        step: impl Into<String>,
        code: Option<i32>,
    ) -> Self {
        Self::Provisioning {
            template: template.into(),
            step: step.into(),
            code,
        }
    }

    /// Create a timeout error.
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Whether this failure stays scoped to a single template.
    ///
    /// Infrastructure failures and internal bugs are not; everything else is
    /// absorbed at template granularity by the build loops.
    pub fn is_template_scoped(&self) -> bool {
        !matches!(self, Self::Infrastructure(_) | Self::Internal(_))
    }
}
