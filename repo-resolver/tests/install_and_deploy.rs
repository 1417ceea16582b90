// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Install-then-resolve: an artifact staged by a build lands in the local
//! repository via the installer, and a subsequent resolve finds it locally
//! without any remote repository configured.

use std::fs;
use std::sync::Arc;

use repo_resolver::connector::{ArtifactDownload, ArtifactUpload, MetadataDownload, MetadataUpload, RepositoryConnector, RepositoryConnectorProvider};
use repo_resolver::coordinate::{Artifact, RemoteRepository};
use repo_resolver::error::RepositoryError;
use repo_resolver::event::DefaultRepositoryEventDispatcher;
use repo_resolver::fileproc::DefaultFileProcessor;
use repo_resolver::installer::{ArtifactInstallRequest, DefaultInstaller, InstallRequest, Installer};
use repo_resolver::local_repo::SimpleLocalRepositoryManager;
use repo_resolver::resolver::{ArtifactRequest, ArtifactResolver, DefaultArtifactResolver};
use repo_resolver::session::{RepositorySystemSession, SessionConfig, SharedSession};
use repo_resolver::version::{VersionRequest, VersionResolver, VersionResult, VersionSource};

struct PanicIfCalledConnector;
impl RepositoryConnector for PanicIfCalledConnector {
    fn get(&self, _a: &mut [ArtifactDownload], _m: &mut [MetadataDownload]) {
        panic!("an artifact just installed locally should never require a remote fetch");
    }
    fn put(&self, _a: &mut [ArtifactUpload], _m: &mut [MetadataUpload]) {}
    fn close(&self) {}
}

struct FixedConnectorProvider(Arc<dyn RepositoryConnector>);
impl RepositoryConnectorProvider for FixedConnectorProvider {
    fn connector_for(&self, _repository: &RemoteRepository) -> Result<Arc<dyn RepositoryConnector>, RepositoryError> {
        Ok(self.0.clone())
    }
}

struct LocalOnlyVersionResolver;
impl VersionResolver for LocalOnlyVersionResolver {
    fn resolve_version(&self, _session: &SharedSession, request: &VersionRequest) -> Result<VersionResult, anyhow::Error> {
        Ok(VersionResult {
            version: request.artifact.version.clone(),
            source: VersionSource::Local,
        })
    }
}

fn session() -> SharedSession {
    Arc::new(RepositorySystemSession::new(SessionConfig::default()))
}

#[test]
fn installed_artifact_is_found_by_a_later_resolve_without_any_remote() {
    let dir = tempfile::tempdir().unwrap();
    let staged = dir.path().join("staged").join("widget-1.0.jar");
    fs::create_dir_all(staged.parent().unwrap()).unwrap();
    fs::write(&staged, b"build output").unwrap();

    let lrm = Arc::new(SimpleLocalRepositoryManager::new(dir.path().join("repo")));
    let installer = DefaultInstaller {
        lrm: lrm.clone(),
        dispatcher: Arc::new(DefaultRepositoryEventDispatcher::new()),
        file_processor: Arc::new(DefaultFileProcessor),
    };

    let artifact = Artifact::new("com.example", "widget", "jar", "1.0");
    let install_result = installer
        .install(
            &session(),
            InstallRequest {
                artifacts: vec![ArtifactInstallRequest {
                    artifact: artifact.clone(),
                    file: staged,
                }],
                metadata: Vec::new(),
            },
        )
        .unwrap();
    assert!(install_result.exceptions.is_empty());

    let resolver = DefaultArtifactResolver {
        version_resolver: Arc::new(LocalOnlyVersionResolver),
        workspace: None,
        lrm,
        connectors: Arc::new(FixedConnectorProvider(Arc::new(PanicIfCalledConnector))),
        dispatcher: Arc::new(DefaultRepositoryEventDispatcher::new()),
        file_processor: Arc::new(DefaultFileProcessor),
    };

    let requests = vec![ArtifactRequest {
        artifact,
        repositories: vec![],
        context: "project".to_owned(),
    }];
    let results = resolver.resolve_artifacts(&session(), requests).unwrap();
    assert_eq!(fs::read(results[0].file.as_ref().unwrap()).unwrap(), b"build output");
}
