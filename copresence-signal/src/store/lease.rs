use copresence_core::PeerId;
use std::fmt;

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Keeps a registration alive. Dropping it withdraws the peer from the store,
/// whether the owner shut down cleanly or not.
pub struct Lease {
    peer_id: PeerId,
    release: Option<Release>,
}

impl Lease {
    pub fn new(peer_id: PeerId, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            peer_id,
            release: Some(Box::new(release)),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn release(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("peer_id", &self.peer_id)
            .field("held", &self.release.is_some())
            .finish()
    }
}
