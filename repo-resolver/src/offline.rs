// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Decides whether a remote may be contacted given session offline mode
//! plus the force-offline protocol/host lists.
//!
//! The force-offline lists (`aether.offline.protocols` /
//! `aether.offline.hosts`) are treated as an unconditional deny
//! list: a remote matching one of them is offline even when the session's
//! general `offline` flag is false. The general flag denies every other
//! remote. See DESIGN.md for the reasoning.

use crate::coordinate::RemoteRepository;
use crate::error::RepositoryError;
use crate::session::SessionConfig;

pub struct OfflineController;

impl OfflineController {
    pub fn check_offline(config: &SessionConfig, remote: &RemoteRepository) -> Result<(), RepositoryError> {
        if Self::is_forced_offline(config, remote) || config.offline {
            return Err(RepositoryError::RepositoryOffline {
                repository: remote.id.clone(),
            });
        }
        Ok(())
    }

    fn is_forced_offline(config: &SessionConfig, remote: &RemoteRepository) -> bool {
        if let Some(protocol) = remote.protocol() {
            if config.offline_protocols.iter().any(|p| p.eq_ignore_ascii_case(&protocol)) {
                return true;
            }
        }
        Self::matches_host_list(&config.offline_hosts, remote)
    }

    /// A remote matches a list entry by id or by URL host.
    fn matches_host_list(list: &[String], remote: &RemoteRepository) -> bool {
        let host = remote.host();
        list.iter().any(|entry| {
            entry == &remote.id || host.as_deref().is_some_and(|h| h.eq_ignore_ascii_case(entry))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(url: &str) -> RemoteRepository {
        RemoteRepository::new("central", "default", url)
    }

    #[test]
    fn online_session_allows_remote() {
        let config = SessionConfig::default();
        assert!(OfflineController::check_offline(&config, &remote("https://repo.example.org")).is_ok());
    }

    #[test]
    fn offline_session_rejects_every_remote() {
        let mut config = SessionConfig::default();
        config.offline = true;
        assert!(OfflineController::check_offline(&config, &remote("https://repo.example.org")).is_err());
    }

    #[test]
    fn forced_offline_protocol_rejects_even_when_online() {
        let mut config = SessionConfig::default();
        config.offline_protocols = vec!["https".to_owned()];
        assert!(OfflineController::check_offline(&config, &remote("https://repo.example.org")).is_err());
        assert!(OfflineController::check_offline(&config, &remote("file:///tmp/repo")).is_ok());
    }

    #[test]
    fn forced_offline_host_matches_by_id_or_host() {
        let mut config = SessionConfig::default();
        config.offline_hosts = vec!["repo.example.org".to_owned()];
        assert!(OfflineController::check_offline(&config, &remote("https://repo.example.org/x")).is_err());

        let mut config = SessionConfig::default();
        config.offline_hosts = vec!["central".to_owned()];
        assert!(OfflineController::check_offline(&config, &remote("https://other.example.org")).is_err());
    }
}
