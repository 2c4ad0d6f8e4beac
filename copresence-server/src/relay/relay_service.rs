use crate::relay::relay_connection::RelayConnection;
use crate::relay::ws_handler;
use axum::Router;
use axum::extract::ws::Message;
use axum::routing::get;
use copresence_core::PeerId;
use copresence_signal::MemoryStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

struct RelayInner {
    store: MemoryStore,
    /// Registered peer of each live connection.
    peers: DashMap<PeerId, u64>,
    next_connection: AtomicU64,
}

/// Serves a [`MemoryStore`] to remote `RelayStore` clients, one WebSocket per
/// registered peer.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                store,
                peers: DashMap::new(),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.inner.store
    }

    pub fn connected_peers(&self) -> usize {
        self.inner.peers.len()
    }

    /// `GET /relay` upgrades to the relay protocol.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/relay", get(ws_handler))
            .with_state(self.clone())
    }

    pub(crate) fn open_connection(&self, out: mpsc::UnboundedSender<Message>) -> RelayConnection {
        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        RelayConnection::new(id, self.clone(), out)
    }

    pub(crate) fn track(&self, peer_id: PeerId, connection: u64) {
        self.inner.peers.insert(peer_id, connection);
    }

    pub(crate) fn untrack(&self, peer_id: &PeerId, connection: u64) {
        self.inner
            .peers
            .remove_if(peer_id, |_, owner| *owner == connection);
    }
}
