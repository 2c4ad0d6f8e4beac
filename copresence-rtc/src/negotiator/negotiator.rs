use crate::config::SessionConfig;
use crate::error::{NegotiationError, Result};
use crate::ice::IceConfigProvider;
use crate::manager::SessionEvent;
use crate::media::{LocalStream, MediaCache};
use crate::negotiator::{NegotiationState, NegotiatorCommand, NegotiatorEvent};
use crate::transport::{PeerTransport, TransportEvent, TransportFactory, TransportSettings};
use bytes::Bytes;
use copresence_core::{
    AttemptId, IceCandidate, PeerId, SessionDescription, SignalEnvelope, SignalPayload,
};
use copresence_signal::SignalChannel;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TRANSPORT_EVENT_CAPACITY: usize = 64;

pub type NegotiatorId = u64;

/// Everything a negotiator needs from its session.
pub struct NegotiatorContext {
    pub signal: Arc<SignalChannel>,
    pub ice: Arc<dyn IceConfigProvider>,
    pub media: Arc<MediaCache>,
    pub transports: Arc<dyn TransportFactory>,
    pub config: SessionConfig,
    pub events: broadcast::Sender<SessionEvent>,
}

impl NegotiatorContext {
    pub fn new(
        signal: Arc<SignalChannel>,
        ice: Arc<dyn IceConfigProvider>,
        media: Arc<MediaCache>,
        transports: Arc<dyn TransportFactory>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            signal,
            ice,
            media,
            transports,
            config,
            events,
        }
    }
}

/// `true` unless both sides name an attempt and the names differ.
pub(crate) fn attempt_matches(bound: Option<AttemptId>, incoming: Option<AttemptId>) -> bool {
    match (bound, incoming) {
        (Some(bound), Some(incoming)) => bound == incoming,
        _ => true,
    }
}

#[derive(Clone)]
pub struct NegotiatorHandle {
    id: NegotiatorId,
    commands: mpsc::UnboundedSender<NegotiatorCommand>,
    state: watch::Receiver<NegotiationState>,
    cancel: CancellationToken,
}

impl NegotiatorHandle {
    pub fn id(&self) -> NegotiatorId {
        self.id
    }

    pub fn state(&self) -> NegotiationState {
        self.state.borrow().clone()
    }

    pub(crate) fn connect(&self, remote: PeerId, attempt: AttemptId) -> bool {
        self.commands
            .send(NegotiatorCommand::Connect { remote, attempt })
            .is_ok()
    }

    pub(crate) fn signal(&self, envelope: SignalEnvelope) -> bool {
        self.commands.send(NegotiatorCommand::Signal(envelope)).is_ok()
    }

    pub(crate) fn send(&self, data: Bytes) -> bool {
        self.commands.send(NegotiatorCommand::Send(data)).is_ok()
    }

    /// Tears the negotiator down from whatever state it is in. Returns once
    /// the transport is released; later calls return immediately.
    pub async fn close(&self) {
        self.cancel.cancel();
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(NegotiatorCommand::Close(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

pub(crate) fn spawn_negotiator(
    id: NegotiatorId,
    startup_delay: Duration,
    ctx: Arc<NegotiatorContext>,
    manager: mpsc::UnboundedSender<NegotiatorEvent>,
) -> NegotiatorHandle {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(NegotiationState::Created);
    let cancel = CancellationToken::new();

    let negotiator = Negotiator {
        id,
        ctx,
        commands: command_rx,
        state: state_tx,
        cancel: cancel.clone(),
        manager,
        remote: None,
        attempt: None,
        transport: None,
        media: None,
        local_offer: false,
        remote_description: false,
        early_candidates: Vec::new(),
        deadline: None,
    };
    tokio::spawn(negotiator.run(startup_delay));

    NegotiatorHandle {
        id,
        commands,
        state: state_rx,
        cancel,
    }
}

/// One offer/answer exchange with one remote peer, driven by a single task.
struct Negotiator {
    id: NegotiatorId,
    ctx: Arc<NegotiatorContext>,
    commands: mpsc::UnboundedReceiver<NegotiatorCommand>,
    state: watch::Sender<NegotiationState>,
    cancel: CancellationToken,
    manager: mpsc::UnboundedSender<NegotiatorEvent>,

    remote: Option<PeerId>,
    attempt: Option<AttemptId>,
    transport: Option<Box<dyn PeerTransport>>,
    media: Option<Arc<LocalStream>>,
    local_offer: bool,
    remote_description: bool,
    early_candidates: Vec<IceCandidate>,
    deadline: Option<Instant>,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Negotiator {
    async fn run(mut self, startup_delay: Duration) {
        debug!(negotiator = self.id, "negotiator started");
        let cancel = self.cancel.clone();

        let prepared = tokio::select! {
            _ = cancel.cancelled() => None,
            prepared = async {
                tokio::time::sleep(startup_delay).await;
                self.prepare().await
            } => Some(prepared),
        };
        let mut transport_events = match prepared {
            Some(Ok(events)) => events,
            Some(Err(e)) => {
                self.fail(e).await;
                return;
            }
            None => {
                self.finish().await;
                return;
            }
        };
        self.set_state(NegotiationState::Ready);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.finish().await;
                }
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await.is_break() {
                            break;
                        }
                    }
                    None => self.finish().await,
                },
                event = transport_events.recv() => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => {
                        self.fail(NegotiationError::Transport("transport went away".to_owned()))
                            .await
                    }
                },
                _ = sleep_until(self.deadline) => {
                    let timeout = self.ctx.config.negotiation_timeout();
                    self.fail(NegotiationError::Timeout(timeout)).await;
                }
            }

            if self.state.borrow().is_terminal() {
                break;
            }
        }

        let state = self.state.borrow().name();
        debug!(negotiator = self.id, state, "negotiator stopped");
    }

    async fn prepare(&mut self) -> Result<mpsc::Receiver<TransportEvent>> {
        let ice_servers = self
            .ctx
            .ice
            .ice_servers()
            .await
            .map_err(|e| NegotiationError::ConfigFetch(e.to_string()))?;
        let media = self.ctx.media.acquire().await?;

        let (tx, rx) = mpsc::channel(TRANSPORT_EVENT_CAPACITY);
        let settings = TransportSettings {
            ice_servers,
            data_channel_label: self.ctx.config.data_channel_label.clone(),
        };
        let transport = self
            .ctx
            .transports
            .create(settings, tx)
            .await
            .map_err(|e| NegotiationError::Transport(e.to_string()))?;

        self.media = Some(media);
        self.transport = Some(transport);
        Ok(rx)
    }

    async fn handle_command(&mut self, cmd: NegotiatorCommand) -> ControlFlow<()> {
        match cmd {
            NegotiatorCommand::Connect { remote, attempt } => self.call(remote, attempt).await,
            NegotiatorCommand::Signal(envelope) => self.handle_signal(envelope).await,
            NegotiatorCommand::Send(data) => self.send_data(data).await,
            NegotiatorCommand::Close(ack) => {
                self.finish().await;
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn call(&mut self, remote: PeerId, attempt: AttemptId) {
        if let Some(current) = &self.remote {
            warn!(
                negotiator = self.id,
                current = %current.short(),
                "connect ignored: negotiator already bound"
            );
            return;
        }

        info!(negotiator = self.id, remote = %remote.short(), %attempt, "calling peer");
        self.remote = Some(remote);
        self.attempt = Some(attempt);
        self.set_state(NegotiationState::Offering);
        self.arm_deadline();

        if let Err(e) = self.offer().await {
            self.fail(e).await;
        }
    }

    async fn offer(&mut self) -> Result<()> {
        let transport = self.transport.as_deref().ok_or(NegotiationError::Closed)?;
        if let Some(media) = &self.media {
            transport
                .attach_local_media(media)
                .await
                .map_err(|e| NegotiationError::Transport(e.to_string()))?;
        }
        let sdp = transport
            .create_offer()
            .await
            .map_err(|e| NegotiationError::Transport(e.to_string()))?;
        transport
            .set_local_description(SessionDescription::offer(sdp.clone()))
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))?;
        self.local_offer = true;

        self.relay(SignalPayload::Offer(sdp)).await
    }

    async fn handle_signal(&mut self, envelope: SignalEnvelope) {
        match self.remote.clone() {
            None => {
                info!(
                    negotiator = self.id,
                    remote = %envelope.sender_id.short(),
                    "adopting inbound caller"
                );
                self.remote = Some(envelope.sender_id.clone());
                self.attempt = envelope.attempt;
                self.arm_deadline();
            }
            Some(remote) if remote != envelope.sender_id => {
                warn!(
                    negotiator = self.id,
                    sender = %envelope.sender_id.short(),
                    "signal from unexpected peer dropped"
                );
                return;
            }
            Some(_) => {}
        }

        if !attempt_matches(self.attempt, envelope.attempt) {
            debug!(negotiator = self.id, kind = envelope.payload.kind(), "stale signal dropped");
            return;
        }

        let result = match envelope.payload {
            SignalPayload::Offer(sdp) => self.accept_offer(sdp).await,
            SignalPayload::Answer(sdp) => self.accept_answer(sdp).await,
            SignalPayload::IceCandidate(candidate) => {
                self.add_remote_candidate(candidate).await;
                Ok(())
            }
            SignalPayload::Reject(reason) if self.local_offer => {
                info!(negotiator = self.id, ?reason, "call rejected");
                Err(NegotiationError::PeerUnavailable(envelope.sender_id))
            }
            SignalPayload::Reject(_) => Ok(()),
        };

        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    async fn accept_offer(&mut self, sdp: String) -> Result<()> {
        if self.local_offer || self.remote_description {
            debug!(negotiator = self.id, "unexpected offer ignored");
            return Ok(());
        }
        self.set_state(NegotiationState::Answering);

        let transport = self.transport.as_deref().ok_or(NegotiationError::Closed)?;
        transport
            .set_remote_description(SessionDescription::offer(sdp))
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))?;
        self.remote_description = true;
        self.flush_candidates().await;

        let transport = self.transport.as_deref().ok_or(NegotiationError::Closed)?;
        if let Some(media) = &self.media {
            transport
                .attach_local_media(media)
                .await
                .map_err(|e| NegotiationError::Transport(e.to_string()))?;
        }
        let answer = transport
            .create_answer()
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))?;
        transport
            .set_local_description(SessionDescription::answer(answer.clone()))
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))?;

        self.relay(SignalPayload::Answer(answer)).await
    }

    async fn accept_answer(&mut self, sdp: String) -> Result<()> {
        if !self.local_offer || self.remote_description {
            debug!(negotiator = self.id, "unexpected answer ignored");
            return Ok(());
        }

        let transport = self.transport.as_deref().ok_or(NegotiationError::Closed)?;
        transport
            .set_remote_description(SessionDescription::answer(sdp))
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))?;
        self.remote_description = true;
        self.flush_candidates().await;
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.remote_description {
            self.early_candidates.push(candidate);
            debug!(
                negotiator = self.id,
                buffered = self.early_candidates.len(),
                "candidate buffered until remote description"
            );
            return;
        }
        self.apply_candidate(candidate).await;
    }

    async fn flush_candidates(&mut self) {
        let buffered = std::mem::take(&mut self.early_candidates);
        if !buffered.is_empty() {
            debug!(negotiator = self.id, count = buffered.len(), "applying buffered candidates");
        }
        for candidate in buffered {
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        if let Err(e) = transport.add_ice_candidate(candidate).await {
            let error = NegotiationError::IceApply(e.to_string());
            warn!(negotiator = self.id, %error, "candidate dropped");
        }
    }

    async fn relay(&self, payload: SignalPayload) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(NegotiationError::Closed);
        }
        let remote = self.remote.as_ref().ok_or(NegotiationError::Closed)?;
        self.ctx.signal.send(remote, self.attempt, payload).await?;
        Ok(())
    }

    async fn send_data(&self, data: Bytes) {
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        match transport.send(data).await {
            Ok(true) => {}
            Ok(false) => debug!(negotiator = self.id, "data channel not open, message dropped"),
            Err(e) => warn!(negotiator = self.id, error = %e, "failed to send data"),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                if self.remote.is_none() {
                    return;
                }
                if let Err(e) = self.relay(SignalPayload::IceCandidate(candidate)).await {
                    debug!(negotiator = self.id, error = %e, "local candidate not relayed");
                }
            }
            TransportEvent::Attached => self.open(),
            TransportEvent::RemoteStream(stream) => {
                if let Some(remote) = &self.remote {
                    let _ = self.ctx.events.send(SessionEvent::RemoteStream {
                        peer_id: remote.clone(),
                        stream,
                    });
                }
            }
            TransportEvent::Message(data) => {
                if let Some(remote) = &self.remote {
                    let _ = self.ctx.events.send(SessionEvent::Data {
                        peer_id: remote.clone(),
                        data,
                    });
                }
            }
            TransportEvent::Failed(reason) => {
                self.fail(NegotiationError::Transport(reason)).await;
            }
            TransportEvent::Closed => {
                if *self.state.borrow() == NegotiationState::Connected {
                    info!(negotiator = self.id, "remote side closed the connection");
                    self.finish().await;
                } else {
                    self.fail(NegotiationError::Transport(
                        "connection closed during negotiation".to_owned(),
                    ))
                    .await;
                }
            }
        }
    }

    fn open(&mut self) {
        if *self.state.borrow() == NegotiationState::Connected {
            return;
        }
        let Some(remote) = self.remote.clone() else {
            return;
        };

        self.deadline = None;
        self.set_state(NegotiationState::Connected);
        info!(negotiator = self.id, remote = %remote.short(), "connected");
        let _ = self.manager.send(NegotiatorEvent::Opened {
            id: self.id,
            remote,
            attempt: self.attempt,
        });
    }

    fn arm_deadline(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.ctx.config.negotiation_timeout());
        }
    }

    fn set_state(&self, state: NegotiationState) {
        debug!(negotiator = self.id, state = %state, "state changed");
        self.state.send_replace(state);
    }

    async fn release_transport(&mut self) {
        self.deadline = None;
        self.cancel.cancel();
        self.media = None;
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!(negotiator = self.id, error = %e, "failed to close transport");
            }
        }
    }

    async fn fail(&mut self, error: NegotiationError) {
        if self.state.borrow().is_terminal() {
            return;
        }
        warn!(
            negotiator = self.id,
            remote = ?self.remote.as_ref().map(PeerId::short),
            %error,
            "negotiation failed"
        );
        self.release_transport().await;
        self.set_state(NegotiationState::Error(error.clone()));
        let _ = self.manager.send(NegotiatorEvent::Failed {
            id: self.id,
            remote: self.remote.clone(),
            error,
        });
    }

    async fn finish(&mut self) {
        if self.state.borrow().is_terminal() {
            return;
        }
        self.release_transport().await;
        self.set_state(NegotiationState::Closed);
        let _ = self.manager.send(NegotiatorEvent::Closed {
            id: self.id,
            remote: self.remote.clone(),
        });
    }
}
