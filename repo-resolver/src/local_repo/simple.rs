// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The *simple* local repository manager: remote artifacts land at the same
//! path as local installs, so a download and a local install are
//! indistinguishable. `available` is simply "does the file exist".

use std::path::{Path, PathBuf};

use super::{
    artifact_path, metadata_path, LocalArtifactRegistration, LocalArtifactRequest,
    LocalArtifactResult, LocalMetadataRegistration, LocalMetadataRequest, LocalMetadataResult,
    LocalRepositoryManager,
};
use crate::coordinate::{Artifact, Metadata, RemoteRepository};

pub struct SimpleLocalRepositoryManager {
    basedir: PathBuf,
}

impl SimpleLocalRepositoryManager {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
        }
    }
}

impl LocalRepositoryManager for SimpleLocalRepositoryManager {
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
        if path.is_file() {
            LocalArtifactResult {
                file: Some(path),
                available: true,
                repository: None,
                contexts: vec![request.context.clone()],
            }
        } else {
            LocalArtifactResult::missing()
        }
    }

    fn find_metadata(&self, request: &LocalMetadataRequest) -> LocalMetadataResult {
        let path = metadata_path(&self.basedir, &request.metadata);
        LocalMetadataResult {
            file: path.is_file().then_some(path),
        }
    }

    fn add_artifact(&self, _registration: &LocalArtifactRegistration) {
        // The simple LRM has no bookkeeping beyond the file's presence.
    }

    fn add_metadata(&self, _registration: &LocalMetadataRegistration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_reports_available_whenever_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let lrm = SimpleLocalRepositoryManager::new(dir.path());
        let artifact = Artifact::new("g", "a", "jar", "1.0");
        let path = lrm.path_for_local_artifact(&artifact);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"payload").unwrap();

        let remote = RemoteRepository::new("central", "default", "https://example.org");
        let request = LocalArtifactRequest {
            artifact,
            repositories: vec![remote],
            context: "project".to_owned(),
        };
        let result = lrm.find(&request);
        assert!(result.available);
        assert_eq!(result.file, Some(path));
    }

    #[test]
    fn find_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let lrm = SimpleLocalRepositoryManager::new(dir.path());
        let artifact = Artifact::new("g", "a", "jar", "1.0");
        let request = LocalArtifactRequest {
            artifact,
            repositories: vec![],
            context: "project".to_owned(),
        };
        let result = lrm.find(&request);
        assert!(!result.available);
        assert!(result.file.is_none());
    }
}
