// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Coordinate → path mapping and per-remote availability tracking.

mod enhanced;
mod simple;

pub use enhanced::EnhancedLocalRepositoryManager;
pub use simple::SimpleLocalRepositoryManager;

use std::path::PathBuf;

use crate::coordinate::{Artifact, Metadata, RemoteRepository, RequestContext};

/// One lookup request against the local repository.
#[derive(Debug, Clone)]
pub struct LocalArtifactRequest {
    pub artifact: Artifact,
    /// The remotes the caller is resolving against; availability is scoped
    /// to these.
    pub repositories: Vec<RemoteRepository>,
    pub context: RequestContext,
}

/// The LRM's answer for one artifact lookup.
#[derive(Debug, Clone)]
pub struct LocalArtifactResult {
    pub file: Option<PathBuf>,
    /// `true` means "this file is known to be the correct artifact for one
    /// of the requested remotes, in the requested request-context."
    pub available: bool,
    pub repository: Option<String>,
    pub contexts: Vec<RequestContext>,
}

impl LocalArtifactResult {
    pub fn missing() -> Self {
        Self {
            file: None,
            available: false,
            repository: None,
            contexts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalMetadataRequest {
    pub metadata: Metadata,
    pub context: RequestContext,
}

#[derive(Debug, Clone)]
pub struct LocalMetadataResult {
    pub file: Option<PathBuf>,
}

/// Publishes a successfully resolved/installed artifact into the LRM's
/// bookkeeping. `repository = None` means a local install.
#[derive(Debug, Clone)]
pub struct LocalArtifactRegistration {
    pub artifact: Artifact,
    pub repository: Option<RemoteRepository>,
    pub contexts: Vec<RequestContext>,
}

#[derive(Debug, Clone)]
pub struct LocalMetadataRegistration {
    pub metadata: Metadata,
    pub repository: Option<RemoteRepository>,
}

/// Coordinate → path mapping and per-remote availability tracking.
/// Implemented by `SimpleLocalRepositoryManager` and
/// `EnhancedLocalRepositoryManager`.
pub trait LocalRepositoryManager: Send + Sync {
    fn basedir(&self) -> &std::path::Path;

    fn path_for_local_artifact(&self, artifact: &Artifact) -> PathBuf;
    fn path_for_local_metadata(&self, metadata: &Metadata) -> PathBuf;
    fn path_for_remote_artifact(
        &self,
        artifact: &Artifact,
        remote: &RemoteRepository,
        context: &str,
    ) -> PathBuf;
    fn path_for_remote_metadata(
        &self,
        metadata: &Metadata,
        remote: &RemoteRepository,
        context: &str,
    ) -> PathBuf;

    fn find(&self, request: &LocalArtifactRequest) -> LocalArtifactResult;
    fn find_metadata(&self, request: &LocalMetadataRequest) -> LocalMetadataResult;

    fn add_artifact(&self, registration: &LocalArtifactRegistration);
    fn add_metadata(&self, registration: &LocalMetadataRegistration);
}

/// `g/r/o/u/p/artifactId/version/artifactId-version[-classifier].ext`; dots
/// in groupId become directory separators.
pub(crate) fn artifact_path(basedir: &std::path::Path, artifact: &Artifact) -> PathBuf {
    let mut path = basedir.to_path_buf();
    for segment in artifact.group_id.split('.') {
        path.push(segment);
    }
    path.push(&artifact.artifact_id);
    path.push(artifact.effective_base_version());
    path.push(artifact.local_file_name());
    path
}

/// The directory that would hold `artifact_path`, without the file name.
pub(crate) fn artifact_dir(basedir: &std::path::Path, artifact: &Artifact) -> PathBuf {
    let mut path = artifact_path(basedir, artifact);
    path.pop();
    path
}

/// Metadata path: directory scope narrows with how many of
/// group/artifact/version are specified: missing fields address
/// broader scopes.
pub(crate) fn metadata_path(basedir: &std::path::Path, metadata: &Metadata) -> PathBuf {
    let mut path = basedir.to_path_buf();
    if let Some(group) = &metadata.group_id {
        for segment in group.split('.') {
            path.push(segment);
        }
    }
    if let Some(artifact) = &metadata.artifact_id {
        path.push(artifact);
    }
    if let Some(version) = &metadata.version {
        path.push(version);
    }
    path.push(metadata.file_name());
    path
}

pub(crate) fn metadata_dir(basedir: &std::path::Path, metadata: &Metadata) -> PathBuf {
    let mut path = metadata_path(basedir, metadata);
    path.pop();
    path
}
