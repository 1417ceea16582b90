// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The per-batch session: configuration, the offline allow/deny lists, and
//! the in-session memoization map; no global mutable state, the session
//! is always an explicit parameter.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

/// Bit flags controlling how negative (not-found / transfer-error) results
/// are cached.
pub mod error_policy {
    pub const CACHE_NONE: u8 = 0;
    pub const CACHE_NOT_FOUND: u8 = 1;
    pub const CACHE_TRANSFER_ERROR: u8 = 2;
    pub const CACHE_ALL: u8 = CACHE_NOT_FOUND | CACHE_TRANSFER_ERROR;
}

/// Whether the in-session update-check memo is consulted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStateMode {
    Enabled,
    Bypass,
}

/// Typed view of the session's configuration keys.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub snapshot_normalization: bool,
    pub offline: bool,
    pub offline_protocols: Vec<String>,
    pub offline_hosts: Vec<String>,
    pub update_check_session_state: SessionStateMode,
    pub metadata_resolver_threads: usize,
    pub artifact_resolver_threads: usize,
    pub error_policy: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_normalization: true,
            offline: false,
            offline_protocols: Vec::new(),
            offline_hosts: Vec::new(),
            update_check_session_state: SessionStateMode::Enabled,
            metadata_resolver_threads: num_cpus_fallback(),
            artifact_resolver_threads: num_cpus_fallback(),
            error_policy: error_policy::CACHE_NONE,
        }
    }
}

fn num_cpus_fallback() -> usize {
    num_cpus::get()
}

impl SessionConfig {
    /// Builds a `SessionConfig` from the loose string-keyed configuration map
    /// some embedding hosts still pass at the edges.
    pub fn from_raw(raw: &HashMap<String, String>) -> Self {
        let mut config = SessionConfig::default();
        if let Some(v) = raw.get("aether.artifactResolver.snapshotNormalization") {
            config.snapshot_normalization = v == "true";
        }
        if let Some(v) = raw.get("aether.offline.protocols") {
            config.offline_protocols = split_csv(v);
        }
        if let Some(v) = raw.get("aether.offline.hosts") {
            config.offline_hosts = split_csv(v);
        }
        if let Some(v) = raw.get("aether.updateCheckManager.sessionState") {
            config.update_check_session_state = if v == "bypass" {
                SessionStateMode::Bypass
            } else {
                SessionStateMode::Enabled
            };
        }
        if let Some(v) = raw.get("aether.metadataResolver.threads") {
            if let Ok(n) = v.parse() {
                config.metadata_resolver_threads = n;
            }
        }
        if let Some(v) = raw.get("aether.artifactResolver.threads") {
            if let Ok(n) = v.parse() {
                config.artifact_resolver_threads = n;
            }
        }
        config
    }
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// A lightweight, cloneable stand-in for a `RepositoryError`, synthesized
/// when the UpdateCheckManager answers from a cached touch record rather
/// than a live transfer.
#[derive(Debug, Clone)]
pub enum CachedOutcome {
    NotFound { message: String },
    TransferError { message: String },
}

/// The memoized answer to "does (file, remote) need a re-check?" within one
/// session.
#[derive(Debug, Clone)]
pub struct UpdateMemoEntry {
    pub required: bool,
    pub cached_error: Option<CachedOutcome>,
}

/// Carries configuration and the session-lifetime memoization map consulted
/// by `UpdateCheckManager`. One `RepositorySystemSession` is shared across
/// all calls made as part of a logical build/resolution session, including
/// calls from multiple threads.
pub struct RepositorySystemSession {
    pub config: SessionConfig,
    memo: OnceCell<DashMap<String, UpdateMemoEntry>>,
}

impl RepositorySystemSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            memo: OnceCell::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SessionConfig::default())
    }

    /// Lazily creates the session memo map. Concurrent first-callers
    /// converge on one instance via compare-and-swap.
    fn memo(&self) -> &DashMap<String, UpdateMemoEntry> {
        self.memo.get_or_init(DashMap::new)
    }

    /// Returns the memoized decision for `update_key`, if any, unless the
    /// session state mode is `Bypass`.
    pub fn memo_get(&self, update_key: &str) -> Option<UpdateMemoEntry> {
        if self.config.update_check_session_state == SessionStateMode::Bypass {
            return None;
        }
        self.memo().get(update_key).map(|entry| entry.clone())
    }

    /// Records the decision for `update_key`. A no-op under `Bypass` (so the
    /// next call re-checks, consistent with "session memo never hits").
    pub fn memo_set(&self, update_key: String, entry: UpdateMemoEntry) {
        if self.config.update_check_session_state == SessionStateMode::Bypass {
            return;
        }
        self.memo().insert(update_key, entry);
    }
}

/// Shared-ownership handle, since a session is commonly threaded through many
/// collaborators that outlive any single call.
pub type SharedSession = Arc<RepositorySystemSession>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_offline_is_false() {
        let config = SessionConfig::default();
        assert!(!config.offline);
        assert!(config.snapshot_normalization);
    }

    #[test]
    fn from_raw_parses_csv_lists() {
        let mut raw = HashMap::new();
        raw.insert(
            "aether.offline.hosts".to_owned(),
            "example.org, internal.example.com".to_owned(),
        );
        let config = SessionConfig::from_raw(&raw);
        assert_eq!(config.offline_hosts, vec!["example.org", "internal.example.com"]);
    }

    #[test]
    fn memo_round_trips() {
        let session = RepositorySystemSession::with_defaults();
        assert!(session.memo_get("k").is_none());
        session.memo_set(
            "k".to_owned(),
            UpdateMemoEntry {
                required: false,
                cached_error: None,
            },
        );
        assert!(!session.memo_get("k").unwrap().required);
    }

    #[test]
    fn bypass_mode_never_memoizes() {
        let mut config = SessionConfig::default();
        config.update_check_session_state = SessionStateMode::Bypass;
        let session = RepositorySystemSession::new(config);
        session.memo_set(
            "k".to_owned(),
            UpdateMemoEntry {
                required: true,
                cached_error: None,
            },
        );
        assert!(session.memo_get("k").is_none());
    }
}
