// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The version-resolution collaborator. Turns a
//! possibly-unresolved version (a range, `LATEST`, `RELEASE`) into a
//! concrete one; out of scope for this crate, consumed as a trait object.

use crate::coordinate::{Artifact, RemoteRepository};
use crate::session::SharedSession;

#[derive(Debug, Clone)]
pub struct VersionRequest {
    pub artifact: Artifact,
    pub repositories: Vec<RemoteRepository>,
}

/// Where the resolved version came from, if known: a `Remote` binding
/// narrows the remote list to one repository, a `Local` binding empties it.
#[derive(Debug, Clone)]
pub enum VersionSource {
    Remote(RemoteRepository),
    Local,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct VersionResult {
    pub version: String,
    pub source: VersionSource,
}

#[cfg_attr(test, mockall::automock)]
pub trait VersionResolver: Send + Sync {
    fn resolve_version(&self, session: &SharedSession, request: &VersionRequest) -> Result<VersionResult, anyhow::Error>;
}

#[cfg(test)]
pub mod fakes {
    use super::*;

    /// A fixed-answer fake for tests that do not exercise version-range
    /// semantics themselves.
    pub struct FixedVersionResolver {
        pub result: VersionResult,
    }

    impl VersionResolver for FixedVersionResolver {
        fn resolve_version(&self, _session: &SharedSession, request: &VersionRequest) -> Result<VersionResult, anyhow::Error> {
            let mut result = self.result.clone();
            if result.version.is_empty() {
                result.version = request.artifact.version.clone();
            }
            Ok(result)
        }
    }
}
