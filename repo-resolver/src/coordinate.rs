// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Coordinates addressing artifacts and metadata, and the remote
//! repositories they may be resolved against.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A versioned binary file addressed by `(groupId, artifactId, extension,
/// classifier, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub group_id: String,
    pub artifact_id: String,
    /// File extension without the leading dot, e.g. `"jar"`.
    pub extension: String,
    /// Empty string means "no classifier".
    pub classifier: String,
    pub version: String,
    /// The unexpanded snapshot version ("1.0-SNAPSHOT"), if different from
    /// `version` ("1.0-20200101.010101-1"). `None` for non-snapshots.
    pub base_version: Option<String>,
    /// An externally-hosted file path. If set, the artifact is resolved by
    /// checking this path exists rather than consulting any repository.
    pub local_path: Option<std::path::PathBuf>,
}

impl Artifact {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        extension: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            extension: extension.into(),
            classifier: String::new(),
            version: version.into(),
            base_version: None,
            local_path: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = classifier.into();
        self
    }

    pub fn with_base_version(mut self, base_version: impl Into<String>) -> Self {
        self.base_version = Some(base_version.into());
        self
    }

    pub fn with_local_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// `true` if this is a timestamped snapshot (its `base_version` differs
    /// from `version`).
    pub fn is_snapshot(&self) -> bool {
        self.base_version
            .as_ref()
            .is_some_and(|base| base != &self.version)
            || self.version.ends_with("-SNAPSHOT")
    }

    /// The version used for path layout and cache keys: the base version for
    /// snapshots, the plain version otherwise.
    pub fn effective_base_version(&self) -> &str {
        self.base_version.as_deref().unwrap_or(&self.version)
    }

    fn file_name(&self, version: &str) -> String {
        if self.classifier.is_empty() {
            format!("{}-{}.{}", self.artifact_id, version, self.extension)
        } else {
            format!(
                "{}-{}-{}.{}",
                self.artifact_id, version, self.classifier, self.extension
            )
        }
    }

    /// `artifactId-version[-classifier].ext`, using the resolved (possibly
    /// timestamped) `version`.
    pub fn local_file_name(&self) -> String {
        self.file_name(&self.version)
    }

    /// Same as `local_file_name` but always uses the base version, i.e. the
    /// snapshot-normalized sibling's name.
    pub fn base_file_name(&self) -> String {
        self.file_name(self.effective_base_version())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.classifier.is_empty() {
            write!(
                f,
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.extension, self.version
            )
        } else {
            write!(
                f,
                "{}:{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.extension, self.classifier, self.version
            )
        }
    }
}

/// What kind of version the metadata document is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataNature {
    Release,
    Snapshot,
    ReleaseOrSnapshot,
}

/// A repository metadata descriptor. Missing `group_id`/`artifact_id`/
/// `version` fields address progressively broader scopes (group-level,
/// artifact-level, version-level metadata).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub metadata_type: String,
    pub nature: MetadataNature,
}

impl Metadata {
    pub fn new(metadata_type: impl Into<String>, nature: MetadataNature) -> Self {
        Self {
            group_id: None,
            artifact_id: None,
            version: None,
            metadata_type: metadata_type.into(),
            nature,
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_artifact(mut self, artifact_id: impl Into<String>) -> Self {
        self.artifact_id = Some(artifact_id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The file name the metadata is stored under. Always
    /// `maven-metadata.xml`; the core treats it as opaque but needs a stable
    /// name to key touch records on, since the metadata dataKey is the
    /// filename, shared across remotes.
    pub fn file_name(&self) -> &'static str {
        "maven-metadata.xml"
    }
}

/// Content validation applied to downloads by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumPolicy {
    Fail,
    Warn,
    Ignore,
}

/// Per-nature policy on a remote repository: whether that nature is served at
/// all, its update policy, and its checksum policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPolicy {
    pub enabled: bool,
    pub update_policy: String,
    pub checksum_policy: ChecksumPolicy,
}

impl RepositoryPolicy {
    pub fn new(enabled: bool, update_policy: impl Into<String>, checksum_policy: ChecksumPolicy) -> Self {
        Self {
            enabled,
            update_policy: update_policy.into(),
            checksum_policy,
        }
    }

    /// The merge used when two mirrored remotes' policies must be combined:
    /// the effective policy is the enabled-ness OR'd and the stricter update
    /// policy (see `UpdatePolicyAnalyzer::effective_policy`).
    pub fn merge(&self, other: &RepositoryPolicy) -> RepositoryPolicy {
        RepositoryPolicy {
            enabled: self.enabled || other.enabled,
            update_policy: crate::update_policy::UpdatePolicyAnalyzer::effective_policy(
                &self.update_policy,
                &other.update_policy,
            ),
            checksum_policy: self.checksum_policy.min_strict(other.checksum_policy),
        }
    }
}

impl ChecksumPolicy {
    fn min_strict(self, other: ChecksumPolicy) -> ChecksumPolicy {
        use ChecksumPolicy::*;
        match (self, other) {
            (Fail, _) | (_, Fail) => Fail,
            (Warn, _) | (_, Warn) => Warn,
            (Ignore, Ignore) => Ignore,
        }
    }
}

/// A remote, network-addressable repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: String,
    pub content_type: String,
    pub url: String,
    pub release_policy: RepositoryPolicy,
    pub snapshot_policy: RepositoryPolicy,
    /// `true` if this remote is a repository manager aggregating a mirrored
    /// set of upstream URLs.
    pub is_repository_manager: bool,
    /// The URLs contributing to this remote, when it is a repository
    /// manager. Used by the connector for checksum-policy merging and by the
    /// resolver to attach a "mirrored repository list".
    pub mirrored_urls: Vec<String>,
}

impl RemoteRepository {
    pub fn new(id: impl Into<String>, content_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            url: url.into(),
            release_policy: RepositoryPolicy::new(true, "daily", ChecksumPolicy::Warn),
            snapshot_policy: RepositoryPolicy::new(true, "daily", ChecksumPolicy::Warn),
            is_repository_manager: false,
            mirrored_urls: Vec::new(),
        }
    }

    pub fn policy_for(&self, is_snapshot: bool) -> &RepositoryPolicy {
        if is_snapshot {
            &self.snapshot_policy
        } else {
            &self.release_policy
        }
    }

    /// Two remotes are equivalent for batching purposes iff their URL,
    /// content type, and repository-manager flag all match.
    pub fn batching_key(&self) -> (String, String, bool) {
        (
            normalize_url(&self.url),
            self.content_type.clone(),
            self.is_repository_manager,
        )
    }

    /// The host, used by `OfflineController` to match against
    /// `aether.offline.hosts`.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
    }

    /// The protocol/scheme, used to match against `aether.offline.protocols`.
    pub fn protocol(&self) -> Option<String> {
        url::Url::parse(&self.url).ok().map(|u| u.scheme().to_owned())
    }
}

/// Normalizes a URL for comparison purposes: strips a trailing slash. This is
/// deliberately shallow; the connector owns full URL semantics.
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

/// A caller-supplied string distinguishing why an artifact was fetched;
/// participates in enhanced-LRM availability tracking.
pub type RequestContext = String;
