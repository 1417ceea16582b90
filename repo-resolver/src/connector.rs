// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The transport collaborator. Performs the
//! actual network I/O for a batch of downloads/uploads; out of scope for
//! this crate beyond the trait boundary.

use std::path::PathBuf;
use std::sync::Arc;

use crate::coordinate::{Artifact, ChecksumPolicy, Metadata, RemoteRepository};
use crate::error::RepositoryError;

/// One artifact to fetch, gathered by the resolver's batching rules.
#[derive(Debug, Clone)]
pub struct ArtifactDownload {
    pub artifact: Artifact,
    pub file: PathBuf,
    /// `true` asks the connector for HEAD-like confirm-only semantics
    /// (the LRM already has a candidate file; we only need to know whether
    /// the remote still has it).
    pub existence_check: bool,
    pub checksum_policy: ChecksumPolicy,
    /// Other URLs this repository mirrors, attached so the connector can
    /// report which physical source actually served the file.
    pub mirrored_repository_urls: Vec<String>,
    /// Filled in by the connector after the batch completes.
    pub exception: Option<Arc<RepositoryError>>,
}

#[derive(Debug, Clone)]
pub struct MetadataDownload {
    pub metadata: Metadata,
    pub file: PathBuf,
    pub checksum_policy: ChecksumPolicy,
    pub mirrored_repository_urls: Vec<String>,
    pub exception: Option<Arc<RepositoryError>>,
}

#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    pub artifact: Artifact,
    pub file: PathBuf,
    /// Filled in by the connector after the batch completes.
    pub exception: Option<Arc<RepositoryError>>,
}

#[derive(Debug, Clone)]
pub struct MetadataUpload {
    pub metadata: Metadata,
    pub file: PathBuf,
    pub exception: Option<Arc<RepositoryError>>,
}

/// One connector instance is bound to one remote repository (or one
/// repository-manager's mirrored set) for the duration of a batch call.
#[cfg_attr(test, mockall::automock)]
pub trait RepositoryConnector: Send + Sync {
    /// Runs every download in one logical batch call, mutating each entry's
    /// `exception` in place on failure and leaving it `None` on success.
    fn get(&self, artifact_downloads: &mut [ArtifactDownload], metadata_downloads: &mut [MetadataDownload]);

    fn put(&self, artifact_uploads: &mut [ArtifactUpload], metadata_uploads: &mut [MetadataUpload]);

    /// Releases any connection-pool resources. Idempotent.
    fn close(&self);
}

/// Selects (or builds) the connector bound to a given remote. Kept as a
/// separate trait so the resolver does not need to know how connectors are
/// constructed.
pub trait RepositoryConnectorProvider: Send + Sync {
    fn connector_for(&self, repository: &RemoteRepository) -> Result<Arc<dyn RepositoryConnector>, RepositoryError>;
}
