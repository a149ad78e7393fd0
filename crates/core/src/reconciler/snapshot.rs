//! Frozen view of download clients and indexers for one reconcile pass.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::download_client::DownloadClient;
use crate::media::{DownloadClientConfig, Indexer, Protocol};

/// A configured download client together with its live connection.
#[derive(Clone)]
pub struct SnapshotClient {
    pub config: DownloadClientConfig,
    pub client: Arc<dyn DownloadClient>,
}

impl std::fmt::Debug for SnapshotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotClient")
            .field("config", &self.config)
            .field("client", &self.client.name())
            .finish()
    }
}

/// Download clients, their protocols and the enabled indexers, as of the
/// start of a pass.
///
/// Built once and shared behind an `Arc` by every concurrent sweep of the
/// pass. There is no way to mutate it after construction, so all readers of
/// one pass see the same clients and indexers.
#[derive(Debug)]
pub struct ReconcileSnapshot {
    time: DateTime<Utc>,
    download_clients: Vec<SnapshotClient>,
    protocols: HashSet<Protocol>,
    indexers: Vec<Indexer>,
    indexer_ids: Vec<i64>,
}

impl ReconcileSnapshot {
    /// Disabled indexers are dropped.
    pub fn new(
        time: DateTime<Utc>,
        download_clients: Vec<SnapshotClient>,
        indexers: Vec<Indexer>,
    ) -> Self {
        let protocols = download_clients.iter().map(|c| c.config.protocol).collect();
        let indexers: Vec<Indexer> = indexers.into_iter().filter(|i| i.enabled).collect();
        let indexer_ids = indexers.iter().map(|i| i.id).collect();

        Self {
            time,
            download_clients,
            protocols,
            indexers,
            indexer_ids,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn download_clients(&self) -> &[SnapshotClient] {
        &self.download_clients
    }

    /// Protocols for which at least one download client exists.
    pub fn protocols(&self) -> &HashSet<Protocol> {
        &self.protocols
    }

    pub fn indexers(&self) -> &[Indexer] {
        &self.indexers
    }

    pub fn indexer_ids(&self) -> &[i64] {
        &self.indexer_ids
    }

    /// The client with the given configuration id.
    pub fn client(&self, id: i64) -> Option<&SnapshotClient> {
        self.download_clients.iter().find(|c| c.config.id == id)
    }

    /// The first client handling `protocol`.
    pub fn client_for_protocol(&self, protocol: Protocol) -> Option<&SnapshotClient> {
        self.download_clients
            .iter()
            .find(|c| c.config.protocol == protocol)
    }
}
