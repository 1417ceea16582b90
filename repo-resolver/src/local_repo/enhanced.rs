// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The *enhanced* local repository manager: a per-directory sidecar index
//! records which remote a file was last confirmed against, so `available`
//! only answers `true` for remotes the index actually names.
//!
//! The index is one `_remote.repositories` file per artifact/metadata
//! directory, shared by every file in that directory, keyed
//! `{filename}|{remote_key}|{context}` -> `"1"`. `remote_key` is the
//! remote's normalized URL so that two `RemoteRepository` values pointing at
//! the same physical repository under different ids still share history;
//! see DESIGN.md for the reasoning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::coordinate::{normalize_url, Artifact, Metadata, RemoteRepository, RequestContext};
use crate::touch::TrackingFileStore;

use super::{
    artifact_dir, artifact_path, metadata_dir, metadata_path, LocalArtifactRegistration,
    LocalArtifactRequest, LocalArtifactResult, LocalMetadataRegistration, LocalMetadataRequest,
    LocalMetadataResult, LocalRepositoryManager,
};

const INDEX_FILE: &str = "_remote.repositories";
const LOCAL_MARKER: &str = "";

pub struct EnhancedLocalRepositoryManager {
    basedir: PathBuf,
}

impl EnhancedLocalRepositoryManager {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
        }
    }

    fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    fn index_key(file_name: &str, remote_key: &str, context: &str) -> String {
        format!("{file_name}|{remote_key}|{context}")
    }

    /// `None` means a local install rather than a download from a remote.
    fn remote_key(remote: Option<&RemoteRepository>) -> String {
        remote.map_or_else(|| LOCAL_MARKER.to_owned(), |r| normalize_url(&r.url))
    }

    fn record(dir: &Path, file_name: &str, remote_key: &str, context: &str) {
        let mut updates = BTreeMap::new();
        updates.insert(
            Self::index_key(file_name, remote_key, context),
            Some("1".to_owned()),
        );
        TrackingFileStore::update(&Self::index_path(dir), updates);
    }

    /// A file is available for `(remote, context)` iff the index names that
    /// exact remote for the requested context. A local install does not
    /// satisfy a specific remote query: absence of the requested remote's
    /// key yields `available=false`, even though the file itself is present.
    fn is_available(index: &BTreeMap<String, String>, file_name: &str, remote_key: &str, context: &str) -> bool {
        index.contains_key(&Self::index_key(file_name, remote_key, context))
    }
}

impl LocalRepositoryManager for EnhancedLocalRepositoryManager {
    fn basedir(&self) -> &Path {
        &self.basedir
    }

    fn path_for_local_artifact(&self, artifact: &Artifact) -> PathBuf {
        artifact_path(&self.basedir, artifact)
    }

    fn path_for_local_metadata(&self, metadata: &Metadata) -> PathBuf {
        metadata_path(&self.basedir, metadata)
    }

    fn path_for_remote_artifact(&self, artifact: &Artifact, _remote: &RemoteRepository, _context: &str) -> PathBuf {
        artifact_path(&self.basedir, artifact)
    }

    fn path_for_remote_metadata(&self, metadata: &Metadata, _remote: &RemoteRepository, _context: &str) -> PathBuf {
        metadata_path(&self.basedir, metadata)
    }

    fn find(&self, request: &LocalArtifactRequest) -> LocalArtifactResult {
        let path = artifact_path(&self.basedir, &request.artifact);
        if !path.is_file() {
            return LocalArtifactResult::missing();
        }

        let dir = artifact_dir(&self.basedir, &request.artifact);
        let index = TrackingFileStore::read(&Self::index_path(&dir));
        let file_name = request.artifact.local_file_name();

        let matched_repository = request.repositories.iter().find(|remote| {
            Self::is_available(&index, &file_name, &normalize_url(&remote.url), &request.context)
        });

        // An empty repository list never makes the file "available": that
        // remains `false` here regardless of how the file landed on disk.
        // The resolver's own empty-repository-list rule, not this LRM, is
        // what lets a locally installed artifact skip a remote fetch.
        let available = matched_repository.is_some();

        LocalArtifactResult {
            file: Some(path),
            available,
            repository: matched_repository.map(|r| r.id.clone()),
            contexts: known_contexts(&index, &file_name),
        }
    }

    fn find_metadata(&self, request: &LocalMetadataRequest) -> LocalMetadataResult {
        let path = metadata_path(&self.basedir, &request.metadata);
        LocalMetadataResult {
            file: path.is_file().then_some(path),
        }
    }

    fn add_artifact(&self, registration: &LocalArtifactRegistration) {
        let dir = artifact_dir(&self.basedir, &registration.artifact);
        let file_name = registration.artifact.local_file_name();
        let remote_key = Self::remote_key(registration.repository.as_ref());
        for context in &registration.contexts {
            Self::record(&dir, &file_name, &remote_key, context);
        }
        if registration.contexts.is_empty() {
            Self::record(&dir, &file_name, &remote_key, "");
        }
    }

    fn add_metadata(&self, registration: &LocalMetadataRegistration) {
        let dir = metadata_dir(&self.basedir, &registration.metadata);
        let file_name = registration.metadata.file_name();
        let remote_key = Self::remote_key(registration.repository.as_ref());
        Self::record(&dir, file_name, &remote_key, "");
    }
}

/// Every request-context the index has seen this file registered under,
/// used to populate `LocalArtifactResult::contexts`.
fn known_contexts(index: &BTreeMap<String, String>, file_name: &str) -> Vec<RequestContext> {
    let prefix = format!("{file_name}|");
    let mut contexts: Vec<RequestContext> = index
        .keys()
        .filter_map(|key| key.strip_prefix(&prefix))
        .filter_map(|rest| rest.rsplit_once('|'))
        .map(|(_, ctx)| ctx.to_owned())
        .collect();
    contexts.sort();
    contexts.dedup();
    contexts
}
