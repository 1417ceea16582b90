// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! `MetadataResolver`: a pipeline similar to `ArtifactResolver` minus
//! workspace consultation and version resolution, and without the
//! artifact's `isLocallyInstalled` shortcut (a cached metadata file never
//! substitutes for a remote freshness check; see DESIGN.md).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::coordinate::{Metadata, MetadataNature, RemoteRepository, RequestContext};
use crate::connector::{ArtifactDownload, MetadataDownload, RepositoryConnectorProvider};
use crate::error::{MetadataResolutionError, RepositoryError};
use crate::event::{RepositoryEvent, RepositoryEventDispatcher};
use crate::local_repo::{LocalMetadataRegistration, LocalMetadataRequest, LocalRepositoryManager};
use crate::offline::OfflineController;
use crate::session::{error_policy, SharedSession};
use crate::update_check::{self, TouchOutcome, UpdateCheck, UpdateCheckManager};

use super::{cached_outcome_to_metadata_error, group_item, ResolutionGroup};

#[derive(Debug, Clone)]
pub struct MetadataRequest {
    pub metadata: Metadata,
    pub repositories: Vec<RemoteRepository>,
    pub context: RequestContext,
}

#[derive(Debug, Clone)]
pub struct MetadataResult {
    pub metadata: Metadata,
    pub file: Option<PathBuf>,
    pub repository: Option<RemoteRepository>,
    pub exceptions: Vec<Arc<RepositoryError>>,
}

impl MetadataResult {
    pub fn is_resolved(&self) -> bool {
        self.file.is_some()
    }
}

pub trait MetadataResolver: Send + Sync {
    fn resolve_metadata(&self, session: &SharedSession, requests: Vec<MetadataRequest>) -> Result<Vec<MetadataResult>, MetadataResolutionError>;
}

pub struct DefaultMetadataResolver {
    pub lrm: Arc<dyn LocalRepositoryManager>,
    pub connectors: Arc<dyn RepositoryConnectorProvider>,
    pub dispatcher: Arc<dyn RepositoryEventDispatcher>,
}

struct WorkItem {
    index: usize,
    request: MetadataRequest,
    metadata: Metadata,
    candidate_file: Option<PathBuf>,
    file: Option<PathBuf>,
    repository: Option<RemoteRepository>,
    exceptions: Vec<Arc<RepositoryError>>,
    resolved: bool,
}

impl DefaultMetadataResolver {
    fn emit(&self, event: RepositoryEvent) {
        self.dispatcher.dispatch(event);
    }
}

impl MetadataResolver for DefaultMetadataResolver {
    fn resolve_metadata(&self, session: &SharedSession, requests: Vec<MetadataRequest>) -> Result<Vec<MetadataResult>, MetadataResolutionError> {
        let total = requests.len();
        let mut items: Vec<WorkItem> = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let metadata = request.metadata.clone();
                WorkItem {
                    index,
                    request,
                    metadata,
                    candidate_file: None,
                    file: None,
                    repository: None,
                    exceptions: Vec::new(),
                    resolved: false,
                }
            })
            .collect();

        for item in items.iter_mut() {
            self.emit(RepositoryEvent::MetadataResolving { metadata: item.metadata.clone() });

            let local_request = LocalMetadataRequest {
                metadata: item.metadata.clone(),
                context: item.request.context.clone(),
            };
            let local_result = self.lrm.find_metadata(&local_request);
            item.candidate_file = local_result.file;

            if item.request.repositories.is_empty() {
                item.file = item.candidate_file.clone();
            }
        }

        let mut groups: Vec<ResolutionGroup> = Vec::new();
        let mut index_by_key: HashMap<(String, String, bool), usize> = HashMap::new();
        for item in items.iter_mut() {
            if !item.request.repositories.is_empty() {
                for remote in item.request.repositories.clone() {
                    let policy = remote.policy_for(item.metadata.nature != MetadataNature::Release);
                    if !policy.enabled {
                        continue;
                    }
                    if let Err(err) = OfflineController::check_offline(&session.config, &remote) {
                        item.exceptions.push(Arc::new(err));
                        continue;
                    }
                    group_item(&mut groups, &mut index_by_key, &remote, item.index);
                }
            }
        }

        for group in &groups {
            self.process_group(session, group, &mut items);
        }

        let mut results = Vec::with_capacity(items.len());
        let mut failures = Vec::new();
        for item in items {
            if !item.resolved {
                self.emit(RepositoryEvent::MetadataResolved {
                    metadata: item.metadata.clone(),
                    exceptions: item.exceptions.clone(),
                });
            }
            if item.file.is_none() {
                failures.push((item.index, item.exceptions.clone()));
            }
            results.push(MetadataResult {
                metadata: item.metadata,
                file: item.file,
                repository: item.repository,
                exceptions: item.exceptions,
            });
        }

        if failures.is_empty() {
            Ok(results)
        } else {
            Err(MetadataResolutionError { total, failures })
        }
    }
}

impl DefaultMetadataResolver {
    fn process_group(&self, session: &SharedSession, group: &ResolutionGroup, items: &mut [WorkItem]) {
        let mut downloads: Vec<MetadataDownload> = Vec::new();
        let mut download_items: Vec<usize> = Vec::new();
        let mut download_checks: Vec<UpdateCheck> = Vec::new();

        let cache_all = session.config.error_policy & error_policy::CACHE_ALL == error_policy::CACHE_ALL;

        for &item_index in &group.item_indices {
            let item = &mut items[item_index];
            if item.file.is_some() {
                continue;
            }

            let is_snapshot = item.metadata.nature != MetadataNature::Release;
            let checksum_policy = group.repository.policy_for(is_snapshot).checksum_policy;
            let file = item
                .candidate_file
                .clone()
                .unwrap_or_else(|| self.lrm.path_for_remote_metadata(&item.metadata, &group.repository, &item.request.context));

            let check = UpdateCheck {
                file: file.clone(),
                file_valid: true,
                touch_file: metadata_touch_file(&file),
                data_key: update_check::metadata_data_key(item.metadata.file_name()),
                transfer_key: update_check::transfer_key(&group.repository, &group.repository.content_type, "", ""),
                repo_key: group.repository.id.clone(),
                local_last_updated: None,
                policy: group.repository.policy_for(is_snapshot).update_policy.clone(),
            };

            if cache_all {
                let check_result = UpdateCheckManager::check_metadata(Utc::now(), session, &check);
                if !check_result.required {
                    if let Some(cached) = check_result.exception {
                        item.exceptions.push(Arc::new(cached_outcome_to_metadata_error(&item.metadata, &group.repository.id, cached)));
                    }
                    continue;
                }
            }

            self.emit(RepositoryEvent::MetadataDownloading {
                metadata: item.metadata.clone(),
                repository: group.repository.clone(),
            });

            downloads.push(MetadataDownload {
                metadata: item.metadata.clone(),
                file,
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

        let mut artifact_downloads: Vec<ArtifactDownload> = Vec::new();
        connector.get(&mut artifact_downloads, &mut downloads);

        for ((download, check), item_index) in downloads.into_iter().zip(download_checks).zip(download_items) {
            let item = &mut items[item_index];
            let outcome = match &download.exception {
                None => TouchOutcome::Success,
                Some(err) if err.is_not_found() => TouchOutcome::NotFound { message: err.to_string() },
                Some(err) => TouchOutcome::TransferError { message: err.to_string() },
            };
            UpdateCheckManager::touch_metadata(session, &check, outcome);

            match download.exception {
                None => {
                    self.lrm.add_metadata(&LocalMetadataRegistration {
                        metadata: item.metadata.clone(),
                        repository: Some(group.repository.clone()),
                    });
                    item.file = Some(download.file.clone());
                    item.repository = Some(group.repository.clone());
                    self.emit(RepositoryEvent::MetadataDownloaded {
                        metadata: item.metadata.clone(),
                        repository: group.repository.clone(),
                        exception: None,
                    });
                    self.emit(RepositoryEvent::MetadataResolved {
                        metadata: item.metadata.clone(),
                        exceptions: Vec::new(),
                    });
                    item.resolved = true;
                }
                Some(err) => {
                    item.exceptions.push(err.clone());
                    self.emit(RepositoryEvent::MetadataDownloaded {
                        metadata: item.metadata.clone(),
                        repository: group.repository.clone(),
                        exception: Some(err),
                    });
                }
            }
        }
    }
}

/// One `resolver-status.properties` file per directory, shared by every
/// metadata sibling that lands there, unlike an artifact's
/// per-file `.lastUpdated` touch record.
fn metadata_touch_file(file: &std::path::Path) -> PathBuf {
    file.with_file_name("resolver-status.properties")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::fakes::EchoConnector;
    use crate::connector::RepositoryConnector;
    use crate::coordinate::MetadataNature;
    use crate::event::DefaultRepositoryEventDispatcher;
    use crate::local_repo::SimpleLocalRepositoryManager;
    use crate::session::{RepositorySystemSession, SessionConfig};

    struct FixedConnectorProvider(Arc<dyn RepositoryConnector>);
    impl RepositoryConnectorProvider for FixedConnectorProvider {
        fn connector_for(&self, _repository: &RemoteRepository) -> Result<Arc<dyn RepositoryConnector>, RepositoryError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn fresh_metadata_download_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let connector: Arc<dyn RepositoryConnector> = Arc::new(EchoConnector { payload: b"<metadata/>".to_vec() });
        let resolver = DefaultMetadataResolver {
            lrm: Arc::new(SimpleLocalRepositoryManager::new(dir.path())),
            connectors: Arc::new(FixedConnectorProvider(connector)),
            dispatcher: Arc::new(DefaultRepositoryEventDispatcher::new()),
        };
        let session = Arc::new(RepositorySystemSession::new(SessionConfig::default()));

        let metadata = Metadata::new("maven-metadata", MetadataNature::Release).with_group("com.example");
        let remote = RemoteRepository::new("central", "default", "https://repo.example.org");
        let requests = vec![MetadataRequest {
            metadata,
            repositories: vec![remote],
            context: "project".to_owned(),
        }];

        let results = resolver.resolve_metadata(&session, requests).unwrap();
        assert!(results[0].is_resolved());
    }

    #[test]
    fn empty_repository_list_falls_back_to_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let lrm = SimpleLocalRepositoryManager::new(dir.path());
        let metadata = Metadata::new("maven-metadata", MetadataNature::Release).with_group("com.example");
        let path = lrm.path_for_local_metadata(&metadata);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"<metadata/>").unwrap();

        let connector: Arc<dyn RepositoryConnector> = Arc::new(EchoConnector { payload: Vec::new() });
        let resolver = DefaultMetadataResolver {
            lrm: Arc::new(lrm),
            connectors: Arc::new(FixedConnectorProvider(connector)),
            dispatcher: Arc::new(DefaultRepositoryEventDispatcher::new()),
        };
        let session = Arc::new(RepositorySystemSession::new(SessionConfig::default()));

        let requests = vec![MetadataRequest {
            metadata,
            repositories: vec![],
            context: "project".to_owned(),
        }];

        let results = resolver.resolve_metadata(&session, requests).unwrap();
        assert_eq!(results[0].file, Some(path));
    }
}
