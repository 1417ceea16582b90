// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Artifact and metadata resolution pipelines.

pub mod artifact;
pub mod metadata;

pub use artifact::{ArtifactRequest, ArtifactResolver, ArtifactResult, DefaultArtifactResolver};
pub use metadata::{DefaultMetadataResolver, MetadataRequest, MetadataResolver, MetadataResult};

use std::collections::HashMap;

use crate::coordinate::{Artifact, Metadata, RemoteRepository};
use crate::error::RepositoryError;
use crate::session::CachedOutcome;

/// A batching key's group of item indices plus the representative remote the
/// group's single connector call is bound to: find or create a
/// ResolutionGroup that matches the remote's (url, contentType,
/// manager-flag) triple").
pub(crate) struct ResolutionGroup {
    pub repository: RemoteRepository,
    pub item_indices: Vec<usize>,
}

/// Appends `item_index` to the group matching `remote`'s batching key,
/// creating one in insertion order if none exists yet.
pub(crate) fn group_item(groups: &mut Vec<ResolutionGroup>, index_by_key: &mut HashMap<(String, String, bool), usize>, remote: &RemoteRepository, item_index: usize) {
    let key = remote.batching_key();
    if let Some(&group_index) = index_by_key.get(&key) {
        groups[group_index].item_indices.push(item_index);
    } else {
        index_by_key.insert(key, groups.len());
        groups.push(ResolutionGroup {
            repository: remote.clone(),
            item_indices: vec![item_index],
        });
    }
}

/// Turns a session-memo cache hit back into the error it stands in for, so a
/// skipped download still leaves a real exception on the result.
pub(crate) fn cached_outcome_to_artifact_error(artifact: &Artifact, repository: &str, outcome: CachedOutcome) -> RepositoryError {
    match outcome {
        CachedOutcome::NotFound { .. } => RepositoryError::ArtifactNotFound {
            artifact: artifact.clone(),
            repository: repository.to_owned(),
        },
        CachedOutcome::TransferError { message } => RepositoryError::ArtifactTransfer {
            artifact: artifact.clone(),
            repository: repository.to_owned(),
            message,
        },
    }
}

pub(crate) fn cached_outcome_to_metadata_error(metadata: &Metadata, repository: &str, outcome: CachedOutcome) -> RepositoryError {
    match outcome {
        CachedOutcome::NotFound { .. } => RepositoryError::MetadataNotFound {
            metadata_type: metadata.metadata_type.clone(),
            repository: repository.to_owned(),
        },
        CachedOutcome::TransferError { message } => RepositoryError::MetadataTransfer {
            metadata_type: metadata.metadata_type.clone(),
            repository: repository.to_owned(),
            message,
        },
    }
}
