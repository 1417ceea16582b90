// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Error kinds surfaced by the core.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::coordinate::Artifact;

/// A single request's worth of failure, attached to its `ArtifactResult`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("version resolution failed for {artifact}: {source}")]
    VersionResolution {
        artifact: Artifact,
        #[source]
        source: anyhow::Error,
    },

    #[error("artifact {artifact} not found in {repository}")]
    ArtifactNotFound {
        artifact: Artifact,
        repository: String,
    },

    #[error("metadata {metadata_type} not found in {repository}")]
    MetadataNotFound {
        metadata_type: String,
        repository: String,
    },

    #[error("failed to transfer artifact {artifact} from {repository}: {message}")]
    ArtifactTransfer {
        artifact: Artifact,
        repository: String,
        message: String,
    },

    #[error("failed to transfer metadata {metadata_type} from {repository}: {message}")]
    MetadataTransfer {
        metadata_type: String,
        repository: String,
        message: String,
    },

    #[error("repository {repository} is unreachable while the session is offline")]
    RepositoryOffline { repository: String },

    #[error("no connector accepted repository {repository} ({content_type})")]
    NoRepositoryConnector {
        repository: String,
        content_type: String,
    },

    #[error("failed to install {path}: {message}")]
    Installation { path: PathBuf, message: String },

    #[error("failed to deploy {path} to {repository}: {message}")]
    Deployment {
        path: PathBuf,
        repository: String,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RepositoryError {
    /// `true` for the two conditions the UpdateCheckManager is allowed to
    /// synthesize from a cached touch record rather than a live transfer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepositoryError::ArtifactNotFound { .. } | RepositoryError::MetadataNotFound { .. }
        )
    }
}

/// Raised iff any request in a batch lacks a final file; carries every
/// per-result exception list.
#[derive(Debug, Error)]
#[error("{} of {} artifact requests could not be resolved", failures.len(), total)]
pub struct ArtifactResolutionError {
    pub total: usize,
    pub failures: Vec<(usize, Vec<Arc<RepositoryError>>)>,
}

/// Metadata counterpart of `ArtifactResolutionError`.
#[derive(Debug, Error)]
#[error("{} of {} metadata requests could not be resolved", failures.len(), total)]
pub struct MetadataResolutionError {
    pub total: usize,
    pub failures: Vec<(usize, Vec<Arc<RepositoryError>>)>,
}
