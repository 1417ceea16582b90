// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! `ArtifactResolver`: the per-request pipeline — local-path short circuit,
//! version resolution, workspace, LRM lookup, remote grouping, batched
//! download, snapshot normalization, and the terminal event/error pass.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::coordinate::{Artifact, RemoteRepository, RequestContext};
use crate::connector::{ArtifactDownload, MetadataDownload, RepositoryConnectorProvider};
use crate::error::{ArtifactResolutionError, RepositoryError};
use crate::event::{RepositoryEvent, RepositoryEventDispatcher};
use crate::fileproc::FileProcessor;
use crate::local_repo::{LocalArtifactRegistration, LocalArtifactRequest, LocalRepositoryManager};
use crate::offline::OfflineController;
use crate::session::{error_policy, SharedSession};
use crate::update_check::{self, TouchOutcome, UpdateCheck, UpdateCheckManager};
use crate::version::{VersionRequest, VersionResolver, VersionSource};
use crate::workspace::WorkspaceReader;

use super::{cached_outcome_to_artifact_error, group_item, ResolutionGroup};

#[derive(Debug, Clone)]
pub struct ArtifactRequest {
    pub artifact: Artifact,
    pub repositories: Vec<RemoteRepository>,
    pub context: RequestContext,
}

#[derive(Debug, Clone)]
pub struct ArtifactResult {
    pub artifact: Artifact,
    pub file: Option<PathBuf>,
    pub repository: Option<RemoteRepository>,
    pub exceptions: Vec<Arc<RepositoryError>>,
}

impl ArtifactResult {
    pub fn is_resolved(&self) -> bool {
        self.file.is_some()
    }
}

pub trait ArtifactResolver: Send + Sync {
    fn resolve_artifacts(&self, session: &SharedSession, requests: Vec<ArtifactRequest>) -> Result<Vec<ArtifactResult>, ArtifactResolutionError>;
}

pub struct DefaultArtifactResolver {
    pub version_resolver: Arc<dyn VersionResolver>,
    pub workspace: Option<Arc<dyn WorkspaceReader>>,
    pub lrm: Arc<dyn LocalRepositoryManager>,
    pub connectors: Arc<dyn RepositoryConnectorProvider>,
    pub dispatcher: Arc<dyn RepositoryEventDispatcher>,
    pub file_processor: Arc<dyn FileProcessor>,
}

struct WorkItem {
    index: usize,
    request: ArtifactRequest,
    artifact: Artifact,
    remotes: Vec<RemoteRepository>,
    candidate_file: Option<PathBuf>,
    file: Option<PathBuf>,
    repository: Option<RemoteRepository>,
    exceptions: Vec<Arc<RepositoryError>>,
    /// Set once `ARTIFACT_RESOLVED` has already been emitted for this item
    /// (local-path short circuit, failed version resolution, workspace hit,
    /// or a successful download), so the terminal pass does not double-fire.
    resolved: bool,
}

impl DefaultArtifactResolver {
    fn emit(&self, event: RepositoryEvent) {
        self.dispatcher.dispatch(event);
    }
}

impl ArtifactResolver for DefaultArtifactResolver {
    fn resolve_artifacts(&self, session: &SharedSession, requests: Vec<ArtifactRequest>) -> Result<Vec<ArtifactResult>, ArtifactResolutionError> {
        let total = requests.len();
        let mut items: Vec<WorkItem> = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let artifact = request.artifact.clone();
                WorkItem {
                    index,
                    request,
                    artifact,
                    remotes: Vec::new(),
                    candidate_file: None,
                    file: None,
                    repository: None,
                    exceptions: Vec::new(),
                    resolved: false,
                }
            })
            .collect();

        for item in items.iter_mut() {
            self.emit(RepositoryEvent::ArtifactResolving { artifact: item.artifact.clone() });
            self.resolve_one(session, item);
        }

        let (groups, index_by_key) = self.build_groups(session, &mut items);
        let _ = index_by_key;
        for group in &groups {
            self.process_group(session, group, &mut items);
        }

        self.finish(total, items)
    }
}

impl DefaultArtifactResolver {
    /// Local-path short circuit, version resolution, remote narrowing,
    /// workspace consultation, and the LRM lookup, in that order.
    fn resolve_one(&self, session: &SharedSession, item: &mut WorkItem) {
        if let Some(local_path) = item.artifact.local_path.clone() {
            if local_path.is_file() {
                item.file = Some(local_path);
            } else {
                item.exceptions.push(Arc::new(RepositoryError::ArtifactNotFound {
                    artifact: item.artifact.clone(),
                    repository: "local".to_owned(),
                }));
            }
            self.emit(RepositoryEvent::ArtifactResolved {
                artifact: item.artifact.clone(),
                exceptions: item.exceptions.clone(),
            });
            item.resolved = true;
            return;
        }

        let version_request = VersionRequest {
            artifact: item.artifact.clone(),
            repositories: item.request.repositories.clone(),
        };
        let version_result = match self.version_resolver.resolve_version(session, &version_request) {
            Ok(result) => result,
            Err(source) => {
                item.exceptions.push(Arc::new(RepositoryError::VersionResolution {
                    artifact: item.artifact.clone(),
                    source,
                }));
                self.emit(RepositoryEvent::ArtifactResolved {
                    artifact: item.artifact.clone(),
                    exceptions: item.exceptions.clone(),
                });
                item.resolved = true;
                return;
            }
        };
        item.artifact.version = version_result.version;

        item.remotes = match &version_result.source {
            VersionSource::Remote(remote) => vec![remote.clone()],
            VersionSource::Local => Vec::new(),
            VersionSource::Unknown => item.request.repositories.clone(),
        };
        let version_bound_local = matches!(version_result.source, VersionSource::Local);

        if let Some(workspace) = &self.workspace {
            if let Some(file) = workspace.find_artifact(&item.artifact) {
                item.file = Some(file);
                item.repository = Some(workspace.get_repository());
                self.emit(RepositoryEvent::ArtifactResolved {
                    artifact: item.artifact.clone(),
                    exceptions: Vec::new(),
                });
                item.resolved = true;
                return;
            }
        }

        let local_request = LocalArtifactRequest {
            artifact: item.artifact.clone(),
            repositories: item.remotes.clone(),
            context: item.request.context.clone(),
        };
        let local_result = self.lrm.find(&local_request);
        item.candidate_file = local_result.file.clone();

        let is_locally_installed = local_result.available || (local_result.file.is_some() && (version_bound_local || item.remotes.is_empty()));
        if is_locally_installed {
            if let Some(file) = local_result.file {
                if !local_result.available {
                    self.lrm.add_artifact(&LocalArtifactRegistration {
                        artifact: item.artifact.clone(),
                        repository: None,
                        contexts: vec![item.request.context.clone()],
                    });
                }
                item.file = Some(file);
            }
        }
    }

    /// Step 6: groups still-unresolved items by each enabled, reachable
    /// remote's batching key.
    fn build_groups(&self, session: &SharedSession, items: &mut [WorkItem]) -> (Vec<ResolutionGroup>, HashMap<(String, String, bool), usize>) {
        let mut groups: Vec<ResolutionGroup> = Vec::new();
        let mut index_by_key: HashMap<(String, String, bool), usize> = HashMap::new();

        for item in items.iter_mut() {
            if item.resolved || item.file.is_some() {
                continue;
            }
            let is_snapshot = item.artifact.is_snapshot();
            let remotes = item.remotes.clone();
            for remote in &remotes {
                let policy = remote.policy_for(is_snapshot);
                if !policy.enabled {
                    continue;
                }
                if let Err(err) = OfflineController::check_offline(&session.config, remote) {
                    item.exceptions.push(Arc::new(err));
                    continue;
                }
                group_item(&mut groups, &mut index_by_key, remote, item.index);
            }
        }

        (groups, index_by_key)
    }

    /// Step 7: gather rules, a single connector call, then evaluate.
    fn process_group(&self, session: &SharedSession, group: &ResolutionGroup, items: &mut [WorkItem]) {
        let mut downloads: Vec<ArtifactDownload> = Vec::new();
        let mut download_items: Vec<usize> = Vec::new();
        let mut download_checks: Vec<UpdateCheck> = Vec::new();

        let cache_all = session.config.error_policy & error_policy::CACHE_ALL == error_policy::CACHE_ALL;

        for &item_index in &group.item_indices {
            let item = &mut items[item_index];
            if item.file.is_some() {
                continue; // a previous group already resolved this item
            }

            let is_snapshot = item.artifact.is_snapshot();
            let checksum_policy = group.repository.policy_for(is_snapshot).checksum_policy;
            let existence_check = item.candidate_file.is_some();
            let file = item
                .candidate_file
                .clone()
                .unwrap_or_else(|| self.lrm.path_for_remote_artifact(&item.artifact, &group.repository, &item.request.context));

            let check = UpdateCheck {
                file: file.clone(),
                file_valid: true,
                touch_file: artifact_touch_file(&file),
                data_key: update_check::artifact_data_key(&group.repository, &group.repository.mirrored_urls),
                transfer_key: update_check::transfer_key(&group.repository, &group.repository.content_type, "", ""),
                repo_key: group.repository.id.clone(),
                local_last_updated: None,
                policy: group.repository.policy_for(is_snapshot).update_policy.clone(),
            };

            if cache_all {
                let check_result = UpdateCheckManager::check_artifact(Utc::now(), session, &check);
                if !check_result.required {
                    if let Some(cached) = check_result.exception {
                        item.exceptions.push(Arc::new(cached_outcome_to_artifact_error(&item.artifact, &group.repository.id, cached)));
                    }
                    continue;
                }
            }

            self.emit(RepositoryEvent::ArtifactDownloading {
                artifact: item.artifact.clone(),
                repository: group.repository.clone(),
            });

            downloads.push(ArtifactDownload {
                artifact: item.artifact.clone(),
                file,
                existence_check,
                checksum_policy,
                mirrored_repository_urls: group.repository.mirrored_urls.clone(),
                exception: None,
            });
            download_items.push(item_index);
            download_checks.push(check);
        }

        if downloads.is_empty() {
            return;
        }

        let connector = match self.connectors.connector_for(&group.repository) {
            Ok(connector) => connector,
            Err(_) => {
                for &item_index in &download_items {
                    items[item_index].exceptions.push(Arc::new(RepositoryError::NoRepositoryConnector {
                        repository: group.repository.id.clone(),
                        content_type: group.repository.content_type.clone(),
                    }));
                }
                return;
            }
        };

        let mut metadata_downloads: Vec<MetadataDownload> = Vec::new();
        connector.get(&mut downloads, &mut metadata_downloads);

        for ((download, check), item_index) in downloads.into_iter().zip(download_checks).zip(download_items) {
            let item = &mut items[item_index];
            let outcome = match &download.exception {
                None => TouchOutcome::Success,
                Some(err) if err.is_not_found() => TouchOutcome::NotFound { message: err.to_string() },
                Some(err) => TouchOutcome::TransferError { message: err.to_string() },
            };
            UpdateCheckManager::touch_artifact(session, &check, outcome);

            match download.exception {
                None => {
                    if session.config.snapshot_normalization {
                        if let Some(dir) = download.file.parent() {
                            normalize_snapshot(self.file_processor.as_ref(), dir, &item.artifact);
                        }
                    }
                    self.lrm.add_artifact(&LocalArtifactRegistration {
                        artifact: item.artifact.clone(),
                        repository: Some(group.repository.clone()),
                        contexts: vec![item.request.context.clone()],
                    });
                    item.file = Some(download.file.clone());
                    item.repository = Some(group.repository.clone());
                    self.emit(RepositoryEvent::ArtifactDownloaded {
                        artifact: item.artifact.clone(),
                        repository: group.repository.clone(),
                        exception: None,
                    });
                    self.emit(RepositoryEvent::ArtifactResolved {
                        artifact: item.artifact.clone(),
                        exceptions: Vec::new(),
                    });
                    item.resolved = true;
                }
                Some(err) => {
                    item.exceptions.push(err.clone());
                    self.emit(RepositoryEvent::ArtifactDownloaded {
                        artifact: item.artifact.clone(),
                        repository: group.repository.clone(),
                        exception: Some(err),
                    });
                }
            }
        }
    }

    fn finish(&self, total: usize, items: Vec<WorkItem>) -> Result<Vec<ArtifactResult>, ArtifactResolutionError> {
        let mut results = Vec::with_capacity(items.len());
        let mut failures = Vec::new();

        for item in items {
            if !item.resolved {
                self.emit(RepositoryEvent::ArtifactResolved {
                    artifact: item.artifact.clone(),
                    exceptions: item.exceptions.clone(),
                });
            }
            if item.file.is_none() {
                failures.push((item.index, item.exceptions.clone()));
            }
            results.push(ArtifactResult {
                artifact: item.artifact,
                file: item.file,
                repository: item.repository,
                exceptions: item.exceptions,
            });
        }

        if failures.is_empty() {
            Ok(results)
        } else {
            Err(ArtifactResolutionError { total, failures })
        }
    }
}

fn artifact_touch_file(file: &Path) -> PathBuf {
    let mut name = file.file_name().expect("download path has a file name").to_os_string();
    name.push(".lastUpdated");
    file.with_file_name(name)
}

/// Copies the timestamped download to its base-named sibling unless the two
/// are already identical in length and mtime.
fn normalize_snapshot(file_processor: &dyn FileProcessor, dir: &Path, artifact: &Artifact) {
    if !artifact.is_snapshot() {
        return;
    }
    let base_name = artifact.base_file_name();
    let actual_name = artifact.local_file_name();
    if base_name == actual_name {
        return;
    }
    let src = dir.join(&actual_name);
    let dst = dir.join(&base_name);
    if snapshot_already_normalized(&src, &dst) {
        return;
    }
    let _ = file_processor.copy(&src, &dst, None);
}

fn snapshot_already_normalized(src: &Path, dst: &Path) -> bool {
    match (fs::metadata(src), fs::metadata(dst)) {
        (Ok(s), Ok(d)) => s.len() == d.len() && s.modified().ok() == d.modified().ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::fakes::{AlwaysNotFoundConnector, EchoConnector};
    use crate::connector::RepositoryConnector;
    use crate::event::DefaultRepositoryEventDispatcher;
    use crate::fileproc::DefaultFileProcessor;
    use crate::local_repo::SimpleLocalRepositoryManager;
    use crate::session::{RepositorySystemSession, SessionConfig};
    use crate::version::fakes::FixedVersionResolver;
    use crate::version::VersionResult;
    use std::sync::Mutex;

    struct FixedConnectorProvider(Arc<dyn RepositoryConnector>);

    impl RepositoryConnectorProvider for FixedConnectorProvider {
        fn connector_for(&self, _repository: &RemoteRepository) -> Result<Arc<dyn RepositoryConnector>, RepositoryError> {
            Ok(self.0.clone())
        }
    }

    fn resolver(connector: Arc<dyn RepositoryConnector>, basedir: &Path) -> DefaultArtifactResolver {
        DefaultArtifactResolver {
            version_resolver: Arc::new(FixedVersionResolver {
                result: VersionResult {
                    version: String::new(),
                    source: VersionSource::Unknown,
                },
            }),
            workspace: None,
            lrm: Arc::new(SimpleLocalRepositoryManager::new(basedir)),
            connectors: Arc::new(FixedConnectorProvider(connector)),
            dispatcher: Arc::new(DefaultRepositoryEventDispatcher::new()),
            file_processor: Arc::new(DefaultFileProcessor),
        }
    }

    fn session() -> Arc<RepositorySystemSession> {
        Arc::new(RepositorySystemSession::new(SessionConfig::default()))
    }

    #[test]
    fn fresh_download_resolves_and_registers_with_lrm() {
        let dir = tempfile::tempdir().unwrap();
        let connector: Arc<dyn RepositoryConnector> = Arc::new(EchoConnector { payload: b"jar-bytes".to_vec() });
        let resolver = resolver(connector, dir.path());
        let session = session();

        let remote = RemoteRepository::new("central", "default", "https://repo.example.org");
        let requests = vec![ArtifactRequest {
            artifact: Artifact::new("com.example", "widget", "jar", "1.0"),
            repositories: vec![remote],
            context: "project".to_owned(),
        }];

        let results = resolver.resolve_artifacts(&session, requests).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_resolved());
        assert!(results[0].file.as_ref().unwrap().is_file());
    }

    #[test]
    fn not_found_surfaces_as_batch_error() {
        let dir = tempfile::tempdir().unwrap();
        let connector: Arc<dyn RepositoryConnector> = Arc::new(AlwaysNotFoundConnector);
        let resolver = resolver(connector, dir.path());
        let session = session();

        let remote = RemoteRepository::new("central", "default", "https://repo.example.org");
        let requests = vec![ArtifactRequest {
            artifact: Artifact::new("com.example", "widget", "jar", "1.0"),
            repositories: vec![remote],
            context: "project".to_owned(),
        }];

        let err = resolver.resolve_artifacts(&session, requests).unwrap_err();
        assert_eq!(err.total, 1);
        assert_eq!(err.failures.len(), 1);
    }

    #[test]
    fn localpath_artifact_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let external = dir.path().join("external.jar");
        fs::write(&external, b"payload").unwrap();

        let connector: Arc<dyn RepositoryConnector> = Arc::new(EchoConnector { payload: Vec::new() });
        let resolver = resolver(connector, dir.path());
        let session = session();

        let artifact = Artifact::new("com.example", "widget", "jar", "1.0").with_local_path(external.clone());
        let requests = vec![ArtifactRequest {
            artifact,
            repositories: vec![],
            context: "project".to_owned(),
        }];

        let results = resolver.resolve_artifacts(&session, requests).unwrap();
        assert_eq!(results[0].file, Some(external));
    }

    #[test]
    fn two_requests_same_remote_share_one_connector_call() {
        struct CountingConnector {
            calls: Mutex<usize>,
            inner: EchoConnector,
        }
        impl RepositoryConnector for CountingConnector {
            fn get(&self, artifact_downloads: &mut [ArtifactDownload], metadata_downloads: &mut [MetadataDownload]) {
                *self.calls.lock().unwrap() += 1;
                assert_eq!(artifact_downloads.len(), 2);
                self.inner.get(artifact_downloads, metadata_downloads);
            }
            fn put(&self, _a: &mut [crate::connector::ArtifactUpload], _m: &mut [crate::connector::MetadataUpload]) {}
            fn close(&self) {}
        }

        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(CountingConnector {
            calls: Mutex::new(0),
            inner: EchoConnector { payload: b"x".to_vec() },
        });
        let resolver = resolver(connector.clone(), dir.path());
        let session = session();

        let remote = RemoteRepository::new("central", "default", "https://repo.example.org");
        let requests = vec![
            ArtifactRequest {
                artifact: Artifact::new("com.example", "a", "jar", "1.0"),
                repositories: vec![remote.clone()],
                context: "project".to_owned(),
            },
            ArtifactRequest {
                artifact: Artifact::new("com.example", "a", "jar", "2.0"),
                repositories: vec![remote],
                context: "project".to_owned(),
            },
        ];

        let results = resolver.resolve_artifacts(&session, requests).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(*connector.calls.lock().unwrap(), 1);
    }

    #[test]
    fn workspace_hit_short_circuits_before_any_connector_is_consulted() {
        use crate::event::MockRepositoryEventDispatcher;
        use crate::version::MockVersionResolver;
        use crate::workspace::MockWorkspaceReader;

        let dir = tempfile::tempdir().unwrap();
        let workspace_file = dir.path().join("workspace-output.jar");
        fs::write(&workspace_file, b"workspace bytes").unwrap();

        let mut version_resolver = MockVersionResolver::new();
        version_resolver.expect_resolve_version().times(1).returning(|_session, request| {
            Ok(VersionResult {
                version: request.artifact.version.clone(),
                source: VersionSource::Unknown,
            })
        });

        let mut workspace = MockWorkspaceReader::new();
        let expected_file = workspace_file.clone();
        workspace
            .expect_find_artifact()
            .times(1)
            .returning(move |_| Some(expected_file.clone()));
        workspace
            .expect_get_repository()
            .times(1)
            .returning(|| RemoteRepository::new("workspace", "workspace", "workspace://local"));

        let mut dispatcher = MockRepositoryEventDispatcher::new();
        dispatcher.expect_dispatch().times(2).returning(|_event| ());

        struct PanicIfCalledConnector;
        impl RepositoryConnector for PanicIfCalledConnector {
            fn get(&self, _a: &mut [ArtifactDownload], _m: &mut [MetadataDownload]) {
                panic!("a workspace hit must short-circuit before any connector is consulted");
            }
            fn put(&self, _a: &mut [crate::connector::ArtifactUpload], _m: &mut [crate::connector::MetadataUpload]) {}
            fn close(&self) {}
        }
        struct PanicIfCalledConnectorProvider;
        impl RepositoryConnectorProvider for PanicIfCalledConnectorProvider {
            fn connector_for(&self, _repository: &RemoteRepository) -> Result<Arc<dyn RepositoryConnector>, RepositoryError> {
                Ok(Arc::new(PanicIfCalledConnector))
            }
        }

        let resolver = DefaultArtifactResolver {
            version_resolver: Arc::new(version_resolver),
            workspace: Some(Arc::new(workspace)),
            lrm: Arc::new(SimpleLocalRepositoryManager::new(dir.path())),
            connectors: Arc::new(PanicIfCalledConnectorProvider),
            dispatcher: Arc::new(dispatcher),
            file_processor: Arc::new(DefaultFileProcessor),
        };
        let session = session();

        let remote = RemoteRepository::new("central", "default", "https://repo.example.org");
        let requests = vec![ArtifactRequest {
            artifact: Artifact::new("com.example", "widget", "jar", "1.0"),
            repositories: vec![remote],
            context: "project".to_owned(),
        }];

        let results = resolver.resolve_artifacts(&session, requests).unwrap();
        assert_eq!(results[0].file, Some(workspace_file));
    }
}
