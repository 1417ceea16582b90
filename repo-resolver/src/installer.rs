// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Installer and Deployer: publish a
//! resolved artifact/metadata pair to the local store, or upload it to a
//! remote, each under one exclusive `SyncContext` spanning the whole request.

use std::path::PathBuf;
use std::sync::Arc;

use crate::connector::{ArtifactUpload, MetadataUpload, RepositoryConnectorProvider};
use crate::coordinate::{Artifact, Metadata, RemoteRepository};
use crate::error::RepositoryError;
use crate::event::{RepositoryEvent, RepositoryEventDispatcher};
use crate::fileproc::FileProcessor;
use crate::local_repo::{LocalArtifactRegistration, LocalMetadataRegistration, LocalRepositoryManager};
use crate::session::SharedSession;
use crate::sync::SyncContext;

#[derive(Debug, Clone)]
pub struct ArtifactInstallRequest {
    pub artifact: Artifact,
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MetadataInstallRequest {
    pub metadata: Metadata,
    pub file: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct InstallRequest {
    pub artifacts: Vec<ArtifactInstallRequest>,
    pub metadata: Vec<MetadataInstallRequest>,
}

#[derive(Debug, Default, Clone)]
pub struct InstallResult {
    pub installed_artifacts: Vec<Artifact>,
    pub installed_metadata: Vec<Metadata>,
    pub exceptions: Vec<Arc<RepositoryError>>,
}

pub trait Installer: Send + Sync {
    fn install(&self, session: &SharedSession, request: InstallRequest) -> Result<InstallResult, RepositoryError>;
}

pub struct DefaultInstaller {
    pub lrm: Arc<dyn LocalRepositoryManager>,
    pub dispatcher: Arc<dyn RepositoryEventDispatcher>,
    pub file_processor: Arc<dyn FileProcessor>,
}

impl DefaultInstaller {
    fn emit(&self, event: RepositoryEvent) {
        self.dispatcher.dispatch(event);
    }

    fn validate(file: &std::path::Path) -> Result<(), String> {
        if !file.exists() {
            return Err(format!("source file {} does not exist", file.display()));
        }
        if !file.is_file() {
            return Err(format!("source file {} is not a regular file", file.display()));
        }
        Ok(())
    }
}

impl Installer for DefaultInstaller {
    fn install(&self, _session: &SharedSession, request: InstallRequest) -> Result<InstallResult, RepositoryError> {
        let mut result = InstallResult::default();
        let locks_dir = SyncContext::locks_dir_under(self.lrm.basedir());
        let mut ctx = SyncContext::exclusive(locks_dir);

        for item in request.artifacts {
            self.emit(RepositoryEvent::ArtifactInstalling { artifact: item.artifact.clone() });

            let outcome = (|| -> Result<(), RepositoryError> {
                Self::validate(&item.file).map_err(|message| RepositoryError::Installation {
                    path: item.file.clone(),
                    message,
                })?;
                ctx.acquire_artifact(&item.artifact)?;
                let dst = self.lrm.path_for_local_artifact(&item.artifact);
                self.file_processor.mkdirs(dst.parent().unwrap_or(&dst)).map_err(|err| RepositoryError::Installation {
                    path: dst.clone(),
                    message: err.to_string(),
                })?;
                self.file_processor.copy(&item.file, &dst, None).map_err(|err| RepositoryError::Installation {
                    path: dst.clone(),
                    message: err.to_string(),
                })?;
                self.lrm.add_artifact(&LocalArtifactRegistration {
                    artifact: item.artifact.clone(),
                    repository: None,
                    contexts: Vec::new(),
                });
                Ok(())
            })();

            let exception = outcome.err().map(Arc::new);
            if let Some(exception) = &exception {
                result.exceptions.push(exception.clone());
            } else {
                result.installed_artifacts.push(item.artifact.clone());
            }
            self.emit(RepositoryEvent::ArtifactInstalled {
                artifact: item.artifact,
                exception,
            });
        }

        for item in request.metadata {
            self.emit(RepositoryEvent::MetadataInstalling { metadata: item.metadata.clone() });

            let outcome = (|| -> Result<(), RepositoryError> {
                Self::validate(&item.file).map_err(|message| RepositoryError::Installation {
                    path: item.file.clone(),
                    message,
                })?;
                ctx.acquire_metadata(&item.metadata)?;
                let dst = self.lrm.path_for_local_metadata(&item.metadata);
                self.file_processor.mkdirs(dst.parent().unwrap_or(&dst)).map_err(|err| RepositoryError::Installation {
                    path: dst.clone(),
                    message: err.to_string(),
                })?;
                self.file_processor.copy(&item.file, &dst, None).map_err(|err| RepositoryError::Installation {
                    path: dst.clone(),
                    message: err.to_string(),
                })?;
                self.lrm.add_metadata(&LocalMetadataRegistration {
                    metadata: item.metadata.clone(),
                    repository: None,
                });
                Ok(())
            })();

            let exception = outcome.err().map(Arc::new);
            if let Some(exception) = &exception {
                result.exceptions.push(exception.clone());
            } else {
                result.installed_metadata.push(item.metadata.clone());
            }
            self.emit(RepositoryEvent::MetadataInstalled {
                metadata: item.metadata,
                exception,
            });
        }

        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactDeployRequest {
    pub artifact: Artifact,
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MetadataDeployRequest {
    pub metadata: Metadata,
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub repository: RemoteRepository,
    pub artifacts: Vec<ArtifactDeployRequest>,
    pub metadata: Vec<MetadataDeployRequest>,
}

#[derive(Debug, Default, Clone)]
pub struct DeployResult {
    pub deployed_artifacts: Vec<Artifact>,
    pub deployed_metadata: Vec<Metadata>,
    pub exceptions: Vec<Arc<RepositoryError>>,
}

pub trait Deployer: Send + Sync {
    fn deploy(&self, session: &SharedSession, request: DeployRequest) -> Result<DeployResult, RepositoryError>;
}

pub struct DefaultDeployer {
    pub lrm: Arc<dyn LocalRepositoryManager>,
    pub connectors: Arc<dyn RepositoryConnectorProvider>,
    pub dispatcher: Arc<dyn RepositoryEventDispatcher>,
}

impl DefaultDeployer {
    fn emit(&self, event: RepositoryEvent) {
        self.dispatcher.dispatch(event);
    }
}

impl Deployer for DefaultDeployer {
    fn deploy(&self, _session: &SharedSession, request: DeployRequest) -> Result<DeployResult, RepositoryError> {
        let mut result = DeployResult::default();
        let locks_dir = SyncContext::locks_dir_under(self.lrm.basedir());
        let mut ctx = SyncContext::exclusive(locks_dir);

        for item in &request.artifacts {
            ctx.acquire_artifact(&item.artifact)?;
            self.emit(RepositoryEvent::ArtifactDeploying {
                artifact: item.artifact.clone(),
                repository: request.repository.clone(),
            });
        }
        for item in &request.metadata {
            ctx.acquire_metadata(&item.metadata)?;
            self.emit(RepositoryEvent::MetadataDeploying {
                metadata: item.metadata.clone(),
                repository: request.repository.clone(),
            });
        }

        let connector = self.connectors.connector_for(&request.repository)?;

        let mut artifact_uploads: Vec<ArtifactUpload> = request
            .artifacts
            .iter()
            .map(|item| ArtifactUpload {
                artifact: item.artifact.clone(),
                file: item.file.clone(),
                exception: None,
            })
            .collect();
        let mut metadata_uploads: Vec<MetadataUpload> = request
            .metadata
            .iter()
            .map(|item| MetadataUpload {
                metadata: item.metadata.clone(),
                file: item.file.clone(),
                exception: None,
            })
            .collect();

        connector.put(&mut artifact_uploads, &mut metadata_uploads);

        for upload in artifact_uploads {
            if let Some(exception) = &upload.exception {
                result.exceptions.push(exception.clone());
            } else {
                result.deployed_artifacts.push(upload.artifact.clone());
            }
            self.emit(RepositoryEvent::ArtifactDeployed {
                artifact: upload.artifact,
                repository: request.repository.clone(),
                exception: upload.exception,
            });
        }
        for upload in metadata_uploads {
            if let Some(exception) = &upload.exception {
                result.exceptions.push(exception.clone());
            } else {
                result.deployed_metadata.push(upload.metadata.clone());
            }
            self.emit(RepositoryEvent::MetadataDeployed {
                metadata: upload.metadata,
                repository: request.repository.clone(),
                exception: upload.exception,
            });
        }

        Ok(result)
    }
}
