// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The artifact/metadata resolution and update-check engine: the core of a
//! Maven/Aether-style repository system, minus the wire transports,
//! version-range arithmetic, dependency-graph collection, and descriptor
//! parsing that embedding hosts supply through the traits in [`connector`],
//! [`version`], and [`workspace`].
//!
//! A caller builds a [`session::RepositorySystemSession`], wires a
//! [`local_repo::LocalRepositoryManager`], a [`connector::RepositoryConnectorProvider`],
//! and a [`event::RepositoryEventDispatcher`] into a
//! [`resolver::DefaultArtifactResolver`] / [`resolver::DefaultMetadataResolver`],
//! and calls `resolve_artifacts` / `resolve_metadata` with a batch of
//! requests. [`installer::DefaultInstaller`] and [`installer::DefaultDeployer`]
//! publish resolved files back into the local store or to a remote.

pub mod connector;
pub mod coordinate;
pub mod error;
pub mod event;
pub mod fileproc;
pub mod installer;
pub mod local_repo;
pub mod offline;
pub mod resolver;
pub mod session;
pub mod sync;
pub mod touch;
pub mod update_check;
pub mod update_policy;
pub mod version;
pub mod workspace;

pub use coordinate::{Artifact, ChecksumPolicy, Metadata, MetadataNature, RemoteRepository, RepositoryPolicy, RequestContext};
pub use error::{ArtifactResolutionError, MetadataResolutionError, RepositoryError};
pub use event::{RepositoryEvent, RepositoryEventDispatcher, RepositoryListener};
pub use installer::{DefaultDeployer, DefaultInstaller, Deployer, Installer};
pub use resolver::{ArtifactRequest, ArtifactResolver, ArtifactResult, DefaultArtifactResolver, DefaultMetadataResolver, MetadataRequest, MetadataResolver, MetadataResult};
pub use session::{RepositorySystemSession, SessionConfig, SharedSession};
