// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The in-IDE/in-build workspace collaborator.
//! Lets a resolver short-circuit to a sibling project's output directory
//! instead of the local repository.

use std::path::PathBuf;

use crate::coordinate::{Artifact, RemoteRepository};

#[cfg_attr(test, mockall::automock)]
pub trait WorkspaceReader: Send + Sync {
    /// The file backing `artifact` in the workspace, if the workspace
    /// produces it.
    fn find_artifact(&self, artifact: &Artifact) -> Option<PathBuf>;

    /// Every version of `artifact`'s (groupId, artifactId) the workspace can
    /// produce, for version-range resolution.
    fn find_versions(&self, artifact: &Artifact) -> Vec<String>;

    /// A synthetic repository identifying the workspace itself, used when a
    /// resolved version's source needs to be reported as "local".
    fn get_repository(&self) -> RemoteRepository;
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MapWorkspaceReader {
        pub artifacts: HashMap<(String, String, String), PathBuf>,
    }

    impl WorkspaceReader for MapWorkspaceReader {
        fn find_artifact(&self, artifact: &Artifact) -> Option<PathBuf> {
            self.artifacts
                .get(&(artifact.group_id.clone(), artifact.artifact_id.clone(), artifact.version.clone()))
                .cloned()
        }

        fn find_versions(&self, artifact: &Artifact) -> Vec<String> {
            self.artifacts
                .keys()
                .filter(|(g, a, _)| g == &artifact.group_id && a == &artifact.artifact_id)
                .map(|(_, _, v)| v.clone())
                .collect()
        }

        fn get_repository(&self) -> RemoteRepository {
            RemoteRepository::new("workspace", "workspace", "workspace://local")
        }
    }
}
