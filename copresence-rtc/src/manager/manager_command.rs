use crate::error::Result;
use crate::manager::PoolSnapshot;
use bytes::Bytes;
use copresence_core::PeerId;
use tokio::sync::oneshot;

/// Requests handled by the manager actor, one at a time.
#[derive(Debug)]
pub(crate) enum ManagerCommand {
    /// Resolves once `remote` is in the established set.
    Connect {
        remote: PeerId,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        remote: PeerId,
        reply: oneshot::Sender<()>,
    },
    Send {
        remote: PeerId,
        data: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Replies with the number of peers the data was handed to.
    Broadcast {
        data: Bytes,
        reply: oneshot::Sender<usize>,
    },
    Pool {
        reply: oneshot::Sender<PoolSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
