use crate::error::{NegotiationError, Result};
use crate::manager::manager_command::ManagerCommand;
use crate::manager::{ListeningSlot, PoolSnapshot, SessionEvent};
use crate::negotiator::{
    NegotiatorContext, NegotiatorEvent, NegotiatorHandle, NegotiatorId, attempt_matches,
    spawn_negotiator,
};
use bytes::Bytes;
use copresence_core::{
    AttemptId, Directory, PeerId, PeerLeave, RejectReason, SignalEnvelope, SignalPayload,
};
use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 100;
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);
const RETIRED_ATTEMPTS: usize = 64;

type Waiter = oneshot::Sender<Result<()>>;

/// Owns every connection of a session: one listening negotiator waiting for
/// an inbound caller, outbound attempts in flight, and established peers.
///
/// Cheap to clone; all clones talk to the same actor. The actor stops on
/// [`shutdown`](Self::shutdown) or when the last clone is dropped.
#[derive(Clone)]
pub struct ConnectionManager {
    local_id: PeerId,
    commands: mpsc::Sender<ManagerCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl ConnectionManager {
    /// Takes the signal channel's mailbox, presence and departure streams and
    /// spawns the manager actor with a fresh listening negotiator.
    pub async fn start(ctx: Arc<NegotiatorContext>) -> Result<Self> {
        let inbound = ctx.signal.inbound().await?;
        let presence = ctx.signal.watch_presence().await?;
        let departures = ctx.signal.watch_departure().await?;

        let local_id = ctx.signal.local_id().clone();
        let events = ctx.events.clone();
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let actor = ManagerActor::new(ctx, command_rx, inbound, presence, departures);
        tokio::spawn(actor.run());

        Ok(Self {
            local_id,
            commands,
            events,
        })
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Calls `remote` and resolves once the connection is established. A
    /// peer that is already connected resolves immediately.
    pub async fn connect(&self, remote: &PeerId) -> Result<()> {
        self.request(|reply| ManagerCommand::Connect {
            remote: remote.clone(),
            reply,
        })
        .await?
    }

    /// Connects to each peer in turn, waiting for one to settle before
    /// calling the next.
    pub async fn connect_all(
        &self,
        peers: impl IntoIterator<Item = PeerId>,
    ) -> Vec<(PeerId, Result<()>)> {
        let mut results = Vec::new();
        for peer in peers {
            let result = self.connect(&peer).await;
            if let Err(e) = &result {
                warn!(peer = %peer.short(), error = %e, "failed to connect to room member");
            }
            results.push((peer, result));
        }
        results
    }

    /// Closes the established connection or in-flight attempt with `remote`.
    /// Does nothing when there is none.
    pub async fn disconnect(&self, remote: &PeerId) -> Result<()> {
        self.request(|reply| ManagerCommand::Disconnect {
            remote: remote.clone(),
            reply,
        })
        .await
    }

    pub async fn send(&self, remote: &PeerId, data: Bytes) -> Result<()> {
        self.request(|reply| ManagerCommand::Send {
            remote: remote.clone(),
            data,
            reply,
        })
        .await?
    }

    /// Returns how many established peers the data was handed to.
    pub async fn broadcast(&self, data: Bytes) -> Result<usize> {
        self.request(|reply| ManagerCommand::Broadcast { data, reply })
            .await
    }

    pub async fn pool(&self) -> Result<PoolSnapshot> {
        self.request(|reply| ManagerCommand::Pool { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| ManagerCommand::Shutdown { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ManagerCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| NegotiationError::Closed)?;
        rx.await.map_err(|_| NegotiationError::Closed)
    }
}

struct Listener {
    handle: NegotiatorHandle,
    bound: Option<Binding>,
}

struct Binding {
    remote: PeerId,
    attempt: Option<AttemptId>,
}

struct Outbound {
    handle: NegotiatorHandle,
    attempt: AttemptId,
    waiters: Vec<Waiter>,
}

struct Established {
    handle: NegotiatorHandle,
    attempt: Option<AttemptId>,
}

struct ManagerActor {
    ctx: Arc<NegotiatorContext>,
    local_id: PeerId,
    commands: mpsc::Receiver<ManagerCommand>,
    negotiator_tx: mpsc::UnboundedSender<NegotiatorEvent>,
    negotiator_rx: mpsc::UnboundedReceiver<NegotiatorEvent>,
    inbound: mpsc::Receiver<SignalEnvelope>,
    presence: mpsc::Receiver<Directory>,
    departures: mpsc::Receiver<PeerLeave>,

    listener: Listener,
    outbound: HashMap<PeerId, Outbound>,
    established: HashMap<PeerId, Established>,
    /// Callers of `connect` whose target turned out to be calling us.
    adopted_waiters: HashMap<PeerId, Vec<Waiter>>,
    /// Attempts that ended; late messages carrying them are dropped.
    retired: VecDeque<AttemptId>,
    next_id: NegotiatorId,
}

impl ManagerActor {
    fn new(
        ctx: Arc<NegotiatorContext>,
        commands: mpsc::Receiver<ManagerCommand>,
        inbound: mpsc::Receiver<SignalEnvelope>,
        presence: mpsc::Receiver<Directory>,
        departures: mpsc::Receiver<PeerLeave>,
    ) -> Self {
        let (negotiator_tx, negotiator_rx) = mpsc::unbounded_channel();
        let first = spawn_negotiator(1, Duration::ZERO, ctx.clone(), negotiator_tx.clone());

        Self {
            local_id: ctx.signal.local_id().clone(),
            ctx,
            commands,
            negotiator_tx,
            negotiator_rx,
            inbound,
            presence,
            departures,
            listener: Listener {
                handle: first,
                bound: None,
            },
            outbound: HashMap::new(),
            established: HashMap::new(),
            adopted_waiters: HashMap::new(),
            retired: VecDeque::new(),
            next_id: 1,
        }
    }

    async fn run(mut self) {
        info!(peer = %self.local_id.short(), "connection manager started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        info!("all manager handles dropped");
                        self.close_all().await;
                        break;
                    }
                },
                Some(event) = self.negotiator_rx.recv() => {
                    self.handle_negotiator_event(event).await;
                }
                Some(envelope) = self.inbound.recv() => {
                    self.route(envelope).await;
                }
                Some(directory) = self.presence.recv() => {
                    let _ = self.ctx.events.send(SessionEvent::UsersChange(directory));
                }
                Some(leave) = self.departures.recv() => {
                    self.handle_departure(leave).await;
                }
            }
        }

        info!(peer = %self.local_id.short(), "connection manager stopped");
    }

    async fn handle_command(&mut self, cmd: ManagerCommand) -> ControlFlow<()> {
        match cmd {
            ManagerCommand::Connect { remote, reply } => self.connect(remote, reply),
            ManagerCommand::Disconnect { remote, reply } => {
                self.disconnect(&remote).await;
                let _ = reply.send(());
            }
            ManagerCommand::Send {
                remote,
                data,
                reply,
            } => {
                let result = match self.established.get(&remote) {
                    Some(established) => match established.handle.send(data) {
                        true => Ok(()),
                        false => Err(NegotiationError::Closed),
                    },
                    None => Err(NegotiationError::PeerUnavailable(remote)),
                };
                let _ = reply.send(result);
            }
            ManagerCommand::Broadcast { data, reply } => {
                let sent = self
                    .established
                    .values()
                    .filter(|established| established.handle.send(data.clone()))
                    .count();
                let _ = reply.send(sent);
            }
            ManagerCommand::Pool { reply } => {
                let _ = reply.send(self.snapshot());
            }
            ManagerCommand::Shutdown { reply } => {
                self.close_all().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn spawn(&mut self, delay: Duration) -> NegotiatorHandle {
        self.next_id += 1;
        spawn_negotiator(self.next_id, delay, self.ctx.clone(), self.negotiator_tx.clone())
    }

    /// Puts a fresh negotiator in the listening slot and returns the old one.
    fn replace_listener(&mut self, delay: Duration) -> Listener {
        let handle = self.spawn(delay);
        debug!(negotiator = handle.id(), ?delay, "new listening negotiator");
        std::mem::replace(&mut self.listener, Listener {
            handle,
            bound: None,
        })
    }

    fn connect(&mut self, remote: PeerId, reply: Waiter) {
        if remote == self.local_id {
            let _ = reply.send(Err(NegotiationError::SignalingConflict(
                "cannot connect to self".to_owned(),
            )));
            return;
        }
        if self.established.contains_key(&remote) {
            let _ = reply.send(Ok(()));
            return;
        }
        if let Some(outbound) = self.outbound.get_mut(&remote) {
            outbound.waiters.push(reply);
            return;
        }
        if self.bound_remote() == Some(&remote) {
            debug!(remote = %remote.short(), "peer is already calling us");
            self.adopted_waiters.entry(remote).or_default().push(reply);
            return;
        }

        let idle = self.listener.bound.is_none() && !self.listener.handle.state().is_terminal();
        let handle = if idle {
            self.replace_listener(Duration::ZERO).handle
        } else {
            self.spawn(Duration::ZERO)
        };

        let attempt = AttemptId::new();
        info!(remote = %remote.short(), negotiator = handle.id(), %attempt, "connecting");
        if !handle.connect(remote.clone(), attempt) {
            let _ = reply.send(Err(NegotiationError::Closed));
            return;
        }
        self.outbound.insert(remote, Outbound {
            handle,
            attempt,
            waiters: vec![reply],
        });
    }

    async fn disconnect(&mut self, remote: &PeerId) {
        if let Some(established) = self.established.remove(remote) {
            info!(remote = %remote.short(), "disconnecting");
            self.retire_attempt(established.attempt);
            established.handle.close().await;
            let _ = self.ctx.events.send(SessionEvent::Close {
                peer_id: remote.clone(),
            });
            self.update_availability().await;
        }

        if let Some(outbound) = self.outbound.remove(remote) {
            info!(remote = %remote.short(), "cancelling outbound attempt");
            self.retire_attempt(Some(outbound.attempt));
            outbound.handle.close().await;
            resolve(outbound.waiters, Err(NegotiationError::Closed));
        }

        if self.bound_remote() == Some(remote) {
            let old = self.replace_listener(Duration::ZERO);
            self.retire_attempt(old.bound.and_then(|binding| binding.attempt));
            old.handle.close().await;
        }

        if let Some(waiters) = self.adopted_waiters.remove(remote) {
            resolve(waiters, Err(NegotiationError::Closed));
        }
    }

    async fn handle_departure(&mut self, leave: PeerLeave) {
        info!(peer = %leave.peer_id.short(), room = %leave.room_id, "roommate left");
        let peer_id = leave.peer_id.clone();
        let _ = self.ctx.events.send(SessionEvent::PeerLeave(leave));
        self.disconnect(&peer_id).await;
    }

    /// Inbound dispatch: established peer, then outbound attempt, then the
    /// listening negotiator.
    async fn route(&mut self, envelope: SignalEnvelope) {
        let sender = envelope.sender_id.clone();
        let kind = envelope.payload.kind();
        let is_offer = matches!(envelope.payload, SignalPayload::Offer(_));

        if envelope
            .attempt
            .is_some_and(|attempt| self.retired.contains(&attempt))
        {
            debug!(sender = %sender.short(), kind, "message for an ended attempt dropped");
            return;
        }

        if let Some(attempt) = self.established.get(&sender).map(|e| e.attempt) {
            if attempt_matches(attempt, envelope.attempt) {
                if let Some(established) = self.established.get(&sender) {
                    established.handle.signal(envelope);
                }
                return;
            }
            if !is_offer {
                debug!(sender = %sender.short(), kind, "stale message dropped");
                return;
            }
            info!(remote = %sender.short(), "peer renegotiating, replacing connection");
            self.disconnect(&sender).await;
        }

        if let Some(attempt) = self.outbound.get(&sender).map(|o| o.attempt) {
            if !is_offer {
                if attempt_matches(Some(attempt), envelope.attempt) {
                    if let Some(outbound) = self.outbound.get(&sender) {
                        outbound.handle.signal(envelope);
                    }
                } else {
                    debug!(sender = %sender.short(), kind, "stale message dropped");
                }
                return;
            }

            // Both sides called each other. The lower peer id keeps its offer.
            if self.local_id < sender {
                debug!(remote = %sender.short(), "glare: keeping our offer");
                return;
            }
            // Yield only to a listener that can take the remote offer.
            if let Some(busy_with) = self.bound_remote().filter(|bound| **bound != sender) {
                info!(
                    remote = %sender.short(),
                    busy_with = %busy_with.short(),
                    "glare while listener busy, keeping our offer"
                );
                self.reject_busy(&sender, envelope.attempt).await;
                return;
            }
            info!(remote = %sender.short(), "glare: answering the remote offer");
            if let Some(outbound) = self.outbound.remove(&sender) {
                self.retire_attempt(Some(outbound.attempt));
                outbound.handle.close().await;
                self.adopted_waiters
                    .entry(sender.clone())
                    .or_default()
                    .extend(outbound.waiters);
            }
        }

        self.route_to_listener(envelope, is_offer).await;
    }

    async fn route_to_listener(&mut self, envelope: SignalEnvelope, is_offer: bool) {
        let sender = envelope.sender_id.clone();
        let bound = self
            .listener
            .bound
            .as_ref()
            .map(|binding| (binding.remote.clone(), binding.attempt));

        match bound {
            None => {
                debug!(
                    remote = %sender.short(),
                    negotiator = self.listener.handle.id(),
                    "listener adopting caller"
                );
                self.listener.bound = Some(Binding {
                    remote: sender,
                    attempt: envelope.attempt,
                });
                self.listener.handle.signal(envelope);
            }
            Some((remote, attempt)) if remote == sender => {
                if attempt_matches(attempt, envelope.attempt) {
                    self.listener.handle.signal(envelope);
                } else if is_offer {
                    info!(remote = %sender.short(), "caller restarted, replacing listener");
                    let old = self.replace_listener(Duration::ZERO);
                    self.retire_attempt(attempt);
                    old.handle.close().await;
                    self.listener.bound = Some(Binding {
                        remote: sender,
                        attempt: envelope.attempt,
                    });
                    self.listener.handle.signal(envelope);
                } else {
                    debug!(sender = %sender.short(), "stale message dropped");
                }
            }
            Some((remote, _)) => {
                if !is_offer {
                    debug!(sender = %sender.short(), "listener busy, message dropped");
                    return;
                }
                info!(
                    caller = %sender.short(),
                    busy_with = %remote.short(),
                    "rejecting call, listener busy"
                );
                self.reject_busy(&sender, envelope.attempt).await;
            }
        }
    }

    async fn reject_busy(&self, caller: &PeerId, attempt: Option<AttemptId>) {
        let reject = SignalPayload::Reject(RejectReason::Busy);
        if let Err(e) = self.ctx.signal.send(caller, attempt, reject).await {
            warn!(caller = %caller.short(), error = %e, "failed to reject call");
        }
    }

    async fn handle_negotiator_event(&mut self, event: NegotiatorEvent) {
        match event {
            NegotiatorEvent::Opened {
                id,
                remote,
                attempt,
            } => self.promote(id, remote, attempt).await,
            NegotiatorEvent::Failed { id, remote, error } => {
                self.retire(id, remote, error).await;
            }
            NegotiatorEvent::Closed { id, remote } => {
                self.retire(id, remote, NegotiationError::Closed).await;
            }
        }
    }

    async fn promote(&mut self, id: NegotiatorId, remote: PeerId, attempt: Option<AttemptId>) {
        let (handle, mut waiters) = if self.listener.handle.id() == id {
            (self.replace_listener(Duration::ZERO).handle, Vec::new())
        } else if let Some((_, outbound)) = self.take_outbound(id) {
            (outbound.handle, outbound.waiters)
        } else {
            debug!(negotiator = id, "open from a negotiator no longer tracked");
            return;
        };
        waiters.extend(self.adopted_waiters.remove(&remote).unwrap_or_default());

        info!(remote = %remote.short(), negotiator = id, "connection established");
        let previous = self.established.insert(remote.clone(), Established { handle, attempt });
        if let Some(previous) = previous {
            self.retire_attempt(previous.attempt);
            previous.handle.close().await;
            let _ = self.ctx.events.send(SessionEvent::Close {
                peer_id: remote.clone(),
            });
        }

        resolve(waiters, Ok(()));
        let _ = self.ctx.events.send(SessionEvent::Open { peer_id: remote });
        self.update_availability().await;
    }

    async fn retire(&mut self, id: NegotiatorId, remote: Option<PeerId>, error: NegotiationError) {
        if self.listener.handle.id() == id {
            // An unbound listener failing means configuration or media is
            // unavailable; back off before preparing the next one.
            let delay = match self.listener.bound {
                Some(_) => Duration::ZERO,
                None => LISTENER_RETRY_DELAY,
            };
            let old = self.replace_listener(delay);
            if let Some(binding) = old.bound {
                self.retire_attempt(binding.attempt);
                if let Some(waiters) = self.adopted_waiters.remove(&binding.remote) {
                    resolve(waiters, Err(error));
                }
            }
            return;
        }

        if let Some((remote, outbound)) = self.take_outbound(id) {
            info!(remote = %remote.short(), error = %error, "outbound attempt failed");
            self.retire_attempt(Some(outbound.attempt));
            resolve(outbound.waiters, Err(error));
            return;
        }

        let Some(remote) = remote else {
            return;
        };
        let tracked = self
            .established
            .get(&remote)
            .is_some_and(|established| established.handle.id() == id);
        if !tracked {
            return;
        }
        if let Some(established) = self.established.remove(&remote) {
            info!(remote = %remote.short(), reason = %error, "connection closed");
            self.retire_attempt(established.attempt);
            let _ = self.ctx.events.send(SessionEvent::Close { peer_id: remote });
            self.update_availability().await;
        }
    }

    fn take_outbound(&mut self, id: NegotiatorId) -> Option<(PeerId, Outbound)> {
        let remote = self
            .outbound
            .iter()
            .find(|(_, outbound)| outbound.handle.id() == id)
            .map(|(remote, _)| remote.clone())?;
        self.outbound.remove_entry(&remote)
    }

    fn bound_remote(&self) -> Option<&PeerId> {
        self.listener.bound.as_ref().map(|binding| &binding.remote)
    }

    fn retire_attempt(&mut self, attempt: Option<AttemptId>) {
        let Some(attempt) = attempt else {
            return;
        };
        if self.retired.len() == RETIRED_ATTEMPTS {
            self.retired.pop_front();
        }
        self.retired.push_back(attempt);
    }

    async fn update_availability(&self) {
        if !self.ctx.config.auto_availability {
            return;
        }
        let available = self.established.is_empty();
        if let Err(e) = self.ctx.signal.set_availability(available).await {
            warn!(error = %e, "failed to update availability");
        }
    }

    fn snapshot(&self) -> PoolSnapshot {
        let mut outbound: Vec<PeerId> = self.outbound.keys().cloned().collect();
        outbound.sort();
        let mut established: Vec<PeerId> = self.established.keys().cloned().collect();
        established.sort();

        PoolSnapshot {
            listening: ListeningSlot {
                state: self.listener.handle.state(),
                bound_to: self.bound_remote().cloned(),
            },
            outbound,
            established,
        }
    }

    async fn close_all(&mut self) {
        self.listener.handle.close().await;

        for (_, outbound) in self.outbound.drain() {
            outbound.handle.close().await;
            resolve(outbound.waiters, Err(NegotiationError::Closed));
        }
        for (_, waiters) in self.adopted_waiters.drain() {
            resolve(waiters, Err(NegotiationError::Closed));
        }

        let established: Vec<_> = self.established.drain().collect();
        for (peer_id, established) in established {
            established.handle.close().await;
            let _ = self.ctx.events.send(SessionEvent::Close { peer_id });
        }
    }
}

fn resolve(waiters: Vec<Waiter>, result: Result<()>) {
    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}
