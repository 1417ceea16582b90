// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Cross-process mutual exclusion keyed by artifact/metadata fingerprints
//! between cooperating processes and threads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};

use crate::coordinate::{Artifact, Metadata};
use crate::error::RepositoryError;

thread_local! {
    /// Reentrancy counters for locks held by *this* thread. SyncContext
    /// acquisition is reentrant per thread within a session: a
    /// resolver that calls into an installer on the same thread for the
    /// same artifact must not deadlock on its own lock.
    static HELD: RefCell<HashMap<String, u32>> = RefCell::new(HashMap::new());
}

/// A stable fingerprint of `(groupId, artifactId, version)`, independent of
/// file path casing/separators, so a resolver and an installer rendezvous on
/// the same lock even when their local paths differ.
pub fn artifact_fingerprint(artifact: &Artifact) -> String {
    fingerprint(&format!(
        "artifact:{}:{}:{}",
        artifact.group_id, artifact.artifact_id, artifact.effective_base_version()
    ))
}

pub fn metadata_fingerprint(metadata: &Metadata) -> String {
    fingerprint(&format!(
        "metadata:{}:{}:{}:{}",
        metadata.group_id.as_deref().unwrap_or(""),
        metadata.artifact_id.as_deref().unwrap_or(""),
        metadata.version.as_deref().unwrap_or(""),
        metadata.metadata_type,
    ))
}

fn fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

struct HeldLock {
    fingerprint: String,
    file: Option<File>,
}

/// Acquires advisory locks over a declared set of fingerprints for the
/// lifetime of the context. Release is guaranteed on drop, including on
/// unwind.
pub struct SyncContext {
    locks_dir: PathBuf,
    shared: bool,
    held: Vec<HeldLock>,
}

impl SyncContext {
    pub fn new(locks_dir: impl Into<PathBuf>, shared: bool) -> Self {
        Self {
            locks_dir: locks_dir.into(),
            shared,
            held: Vec::new(),
        }
    }

    pub fn shared(locks_dir: impl Into<PathBuf>) -> Self {
        Self::new(locks_dir, true)
    }

    pub fn exclusive(locks_dir: impl Into<PathBuf>) -> Self {
        Self::new(locks_dir, false)
    }

    pub fn acquire_artifact(&mut self, artifact: &Artifact) -> Result<(), RepositoryError> {
        self.acquire(artifact_fingerprint(artifact))
    }

    pub fn acquire_metadata(&mut self, metadata: &Metadata) -> Result<(), RepositoryError> {
        self.acquire(metadata_fingerprint(metadata))
    }

    fn acquire(&mut self, fingerprint: String) -> Result<(), RepositoryError> {
        let already_mine = HELD.with(|held| {
            let mut held = held.borrow_mut();
            let count = held.entry(fingerprint.clone()).or_insert(0);
            let was_zero = *count == 0;
            *count += 1;
            !was_zero
        });

        if already_mine {
            self.held.push(HeldLock {
                fingerprint,
                file: None,
            });
            return Ok(());
        }

        let file = match self.lock_file(&fingerprint) {
            Ok(file) => file,
            Err(err) => {
                self.release_one(&fingerprint);
                return Err(err);
            }
        };
        self.held.push(HeldLock {
            fingerprint,
            file: Some(file),
        });
        Ok(())
    }

    fn lock_file(&self, fingerprint: &str) -> Result<File, RepositoryError> {
        fs::create_dir_all(&self.locks_dir)?;
        let path: PathBuf = self.locks_dir.join(format!("{fingerprint}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        if self.shared {
            file.lock_shared()?;
        } else {
            file.lock_exclusive()?;
        }
        Ok(file)
    }

    fn release_one(&self, fingerprint: &str) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(count) = held.get_mut(fingerprint) {
                *count -= 1;
                if *count == 0 {
                    held.remove(fingerprint);
                }
            }
        });
    }

    /// Path layout for lock files under a given local-repository basedir.
    pub fn locks_dir_under(base_dir: &Path) -> PathBuf {
        base_dir.join(".locks")
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        for lock in self.held.drain(..) {
            if let Some(file) = &lock.file {
                let _ = FileExt::unlock(file);
            }
            self.release_one(&lock.fingerprint);
        }
    }
}
