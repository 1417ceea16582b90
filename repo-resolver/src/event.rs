// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle events and their fan-out to listeners.

use std::sync::Arc;

use crate::coordinate::{Artifact, Metadata, RemoteRepository};
use crate::error::RepositoryError;

/// One lifecycle notification. Carries enough context for a listener to
/// render a progress line without re-deriving it from the request.
#[derive(Debug, Clone)]
pub enum RepositoryEvent {
    ArtifactResolving {
        artifact: Artifact,
    },
    ArtifactDownloading {
        artifact: Artifact,
        repository: RemoteRepository,
    },
    ArtifactDownloaded {
        artifact: Artifact,
        repository: RemoteRepository,
        exception: Option<Arc<RepositoryError>>,
    },
    ArtifactResolved {
        artifact: Artifact,
        exceptions: Vec<Arc<RepositoryError>>,
    },
    MetadataResolving {
        metadata: Metadata,
    },
    MetadataDownloading {
        metadata: Metadata,
        repository: RemoteRepository,
    },
    MetadataDownloaded {
        metadata: Metadata,
        repository: RemoteRepository,
        exception: Option<Arc<RepositoryError>>,
    },
    MetadataResolved {
        metadata: Metadata,
        exceptions: Vec<Arc<RepositoryError>>,
    },
    ArtifactInstalling {
        artifact: Artifact,
    },
    ArtifactInstalled {
        artifact: Artifact,
        exception: Option<Arc<RepositoryError>>,
    },
    MetadataInstalling {
        metadata: Metadata,
    },
    MetadataInstalled {
        metadata: Metadata,
        exception: Option<Arc<RepositoryError>>,
    },
    ArtifactDeploying {
        artifact: Artifact,
        repository: RemoteRepository,
    },
    ArtifactDeployed {
        artifact: Artifact,
        repository: RemoteRepository,
        exception: Option<Arc<RepositoryError>>,
    },
    MetadataDeploying {
        metadata: Metadata,
        repository: RemoteRepository,
    },
    MetadataDeployed {
        metadata: Metadata,
        repository: RemoteRepository,
        exception: Option<Arc<RepositoryError>>,
    },
}

/// Receives every event the resolver/installer/deployer emits. Implementors
/// are expected to be cheap and non-blocking; slow listeners should hand off
/// to their own worker.
pub trait RepositoryListener: Send + Sync {
    fn on_event(&self, event: &RepositoryEvent);
}

/// Fans a single event out to every registered listener, in registration
/// order, swallowing nothing: a panicking listener is a bug in that
/// listener, not something this dispatcher should paper over by catching
/// unwinds.
#[cfg_attr(test, mockall::automock)]
pub trait RepositoryEventDispatcher: Send + Sync {
    fn dispatch(&self, event: RepositoryEvent);
}

#[derive(Default)]
pub struct DefaultRepositoryEventDispatcher {
    listeners: Vec<Arc<dyn RepositoryListener>>,
}

impl DefaultRepositoryEventDispatcher {
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    pub fn with_listener(mut self, listener: Arc<dyn RepositoryListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl RepositoryEventDispatcher for DefaultRepositoryEventDispatcher {
    fn dispatch(&self, event: RepositoryEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl RepositoryListener for Recorder {
        fn on_event(&self, event: &RepositoryEvent) {
            let label = match event {
                RepositoryEvent::ArtifactResolving { .. } => "RESOLVING",
                RepositoryEvent::ArtifactDownloading { .. } => "DOWNLOADING",
                RepositoryEvent::ArtifactDownloaded { .. } => "DOWNLOADED",
                RepositoryEvent::ArtifactResolved { .. } => "RESOLVED",
                _ => "OTHER",
            };
            self.0.lock().unwrap().push(label.to_owned());
        }
    }

    #[test]
    fn fans_out_in_registration_order_and_preserves_event_order() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let dispatcher = DefaultRepositoryEventDispatcher::new().with_listener(recorder.clone());

        let artifact = Artifact::new("g", "a", "jar", "1.0");
        let repository = RemoteRepository::new("central", "default", "https://repo.example.org");

        dispatcher.dispatch(RepositoryEvent::ArtifactResolving { artifact: artifact.clone() });
        dispatcher.dispatch(RepositoryEvent::ArtifactDownloading {
            artifact: artifact.clone(),
            repository: repository.clone(),
        });
        dispatcher.dispatch(RepositoryEvent::ArtifactDownloaded {
            artifact: artifact.clone(),
            repository,
            exception: None,
        });
        dispatcher.dispatch(RepositoryEvent::ArtifactResolved {
            artifact,
            exceptions: Vec::new(),
        });

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["RESOLVING", "DOWNLOADING", "DOWNLOADED", "RESOLVED"]
        );
    }
}
