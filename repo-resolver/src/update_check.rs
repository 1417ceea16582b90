// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Per-item "do I need to re-fetch?" decision, combining policy timestamps,
//! the persisted touch record, and the session memo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use crate::coordinate::{normalize_url, RemoteRepository};
use crate::session::{error_policy, CachedOutcome, RepositorySystemSession, UpdateMemoEntry};
use crate::touch::TrackingFileStore;
use crate::update_policy::UpdatePolicyAnalyzer;

/// `dataKey` for an artifact: the normalized remote URL, then each sorted
/// mirror URL joined by `+`.
pub fn artifact_data_key(remote: &RemoteRepository, mirrored_urls: &[String]) -> String {
    let mut mirrors: Vec<String> = mirrored_urls.iter().map(|u| normalize_url(u)).collect();
    mirrors.sort();
    let mut key = normalize_url(&remote.url);
    for mirror in mirrors {
        key.push('+');
        key.push_str(&mirror);
    }
    key
}

/// `dataKey` for metadata is just the shared filename: two remotes
/// publishing metadata under the same filename share one cache record
/// This is a deliberate choice: two metadata files sharing a filename
/// also share a cache record.
pub fn metadata_data_key(file_name: &str) -> String {
    file_name.to_owned()
}

/// `transferKey` encodes the full transport identity (proxy, auth digest,
/// content type, URL) so a retry is allowed the instant any of those change,
/// independent of the `dataKey`'s not-found memory.
pub fn transfer_key(remote: &RemoteRepository, content_type: &str, proxy_digest: &str, authentication_digest: &str) -> String {
    format!(
        "{proxy_digest}|{authentication_digest}|{content_type}|{}",
        normalize_url(&remote.url)
    )
}

/// One update-check request. Artifact and metadata callers fill this in
/// identically; only how `data_key`/`transfer_key` were derived differs.
#[derive(Debug, Clone)]
pub struct UpdateCheck {
    /// The local artifact file, or the metadata file under the LRM path.
    pub file: PathBuf,
    /// `false` lets a caller force `fileExists = false` even when `file`
    /// exists on disk (e.g. a corrupt download awaiting re-verification).
    pub file_valid: bool,
    /// Where the touch record for this file's directory/sibling group lives.
    pub touch_file: PathBuf,
    pub data_key: String,
    pub transfer_key: String,
    /// Distinguishes this (file, remote) pair in the session memo.
    pub repo_key: String,
    /// `None` means "never installed locally" (the `≠ 0` test in step 1).
    pub local_last_updated: Option<DateTime<Utc>>,
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckResult {
    pub required: bool,
    pub exception: Option<CachedOutcome>,
}

/// What a connector attempt produced, recorded by `touch`.
#[derive(Debug, Clone)]
pub enum TouchOutcome {
    Success,
    NotFound { message: String },
    TransferError { message: String },
}

pub struct UpdateCheckManager;

impl UpdateCheckManager {
    pub fn check_artifact(now: DateTime<Utc>, session: &RepositorySystemSession, check: &UpdateCheck) -> UpdateCheckResult {
        Self::decide(now, session, check)
    }

    pub fn check_metadata(now: DateTime<Utc>, session: &RepositorySystemSession, check: &UpdateCheck) -> UpdateCheckResult {
        Self::decide(now, session, check)
    }

    pub fn touch_artifact(session: &RepositorySystemSession, check: &UpdateCheck, outcome: TouchOutcome) {
        Self::touch(session, check, outcome)
    }

    pub fn touch_metadata(session: &RepositorySystemSession, check: &UpdateCheck, outcome: TouchOutcome) {
        Self::touch(session, check, outcome)
    }

    fn decide(now: DateTime<Utc>, session: &RepositorySystemSession, check: &UpdateCheck) -> UpdateCheckResult {
        if let Some(local_last_updated) = check.local_last_updated {
            if !UpdatePolicyAnalyzer::is_update_required(now, local_last_updated, &check.policy) {
                return UpdateCheckResult {
                    required: false,
                    exception: None,
                };
            }
        }

        let file_exists = check.file_valid && check.file.is_file();

        let record = TrackingFileStore::read(&check.touch_file);
        let error_key = format!("{}.error", check.data_key);
        let error = record.get(&error_key);

        let last_updated: i64 = if file_exists {
            file_last_modified_millis(&check.file).unwrap_or(0)
        } else if error.is_none() {
            0
        } else if error.map(String::as_str) == Some("") {
            get_last_updated(&record, &format!("{}.lastUpdated", check.data_key))
        } else {
            get_last_updated(&record, &format!("{}.lastUpdated", check.transfer_key))
        };

        let update_key = format!("{}|{}", check.file.display(), check.repo_key);
        if let Some(memo) = session.memo_get(&update_key) {
            return UpdateCheckResult {
                required: memo.required,
                exception: memo.cached_error,
            };
        }

        if last_updated == 0 {
            return UpdateCheckResult {
                required: true,
                exception: None,
            };
        }

        if UpdatePolicyAnalyzer::is_update_required(now, epoch_millis_to_datetime(last_updated), &check.policy) {
            return UpdateCheckResult {
                required: true,
                exception: None,
            };
        }

        if file_exists {
            return UpdateCheckResult {
                required: false,
                exception: None,
            };
        }

        if error.is_none() {
            if session.config.error_policy & error_policy::CACHE_NOT_FOUND != 0 {
                return UpdateCheckResult {
                    required: false,
                    exception: Some(CachedOutcome::NotFound {
                        message: format!("{} was not found in a previous attempt", check.data_key),
                    }),
                };
            }
            return UpdateCheckResult {
                required: true,
                exception: None,
            };
        }

        if session.config.error_policy & error_policy::CACHE_TRANSFER_ERROR != 0 {
            return UpdateCheckResult {
                required: false,
                exception: Some(CachedOutcome::TransferError {
                    message: error.cloned().unwrap_or_default(),
                }),
            };
        }
        UpdateCheckResult {
            required: true,
            exception: None,
        }
    }

    fn touch(session: &RepositorySystemSession, check: &UpdateCheck, outcome: TouchOutcome) {
        let now_millis = Utc::now().timestamp_millis();
        let mut updates: BTreeMap<String, Option<String>> = BTreeMap::new();

        let cached_error = match &outcome {
            TouchOutcome::Success => {
                updates.insert(format!("{}.lastUpdated", check.data_key), Some(now_millis.to_string()));
                updates.insert(format!("{}.error", check.data_key), None);
                updates.insert(format!("{}.lastUpdated", check.transfer_key), None);
                None
            }
            TouchOutcome::NotFound { message } => {
                updates.insert(format!("{}.lastUpdated", check.data_key), Some(now_millis.to_string()));
                updates.insert(format!("{}.error", check.data_key), Some(String::new()));
                updates.insert(format!("{}.lastUpdated", check.transfer_key), None);
                Some(CachedOutcome::NotFound { message: message.clone() })
            }
            TouchOutcome::TransferError { message } => {
                updates.insert(format!("{}.lastUpdated", check.transfer_key), Some(now_millis.to_string()));
                updates.insert(format!("{}.error", check.data_key), Some(message.clone()));
                updates.insert(format!("{}.lastUpdated", check.data_key), None);
                Some(CachedOutcome::TransferError { message: message.clone() })
            }
        };

        let record = TrackingFileStore::update(&check.touch_file, updates);

        let update_key = format!("{}|{}", check.file.display(), check.repo_key);
        session.memo_set(
            update_key,
            UpdateMemoEntry {
                required: false,
                cached_error,
            },
        );

        if matches!(outcome, TouchOutcome::Success) && check.file.is_file() {
            let has_error_keys = record.keys().any(|k| k.ends_with(".error"));
            if !has_error_keys {
                TrackingFileStore::delete(&check.touch_file);
            }
        }
    }
}

/// Returns 0 if `key` is absent, or the sentinel `1` on a malformed
/// timestamp, deliberately suppressing "treat as first attempt" in that
/// case: a corrupt timestamp should read as "just barely checked", not as
/// "never checked".
fn get_last_updated(record: &BTreeMap<String, String>, key: &str) -> i64 {
    match record.get(key) {
        None => 0,
        Some(raw) => raw.parse().unwrap_or(1),
    }
}

fn file_last_modified_millis(path: &Path) -> Option<i64> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(|modified| DateTime::<Utc>::from(modified).timestamp_millis())
}

fn epoch_millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}
