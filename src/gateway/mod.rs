pub mod events;
pub mod heartbeat;
pub mod session;
pub mod writer;

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::bus::event::{
    ConnectionClosed, DispatchEvent, Event, GatewayEventName, SessionReady, SessionResumed,
};
use crate::bus::EventBus;
use crate::config::{Config, CLIENT_NAME};
use crate::error::GatewayError;
use events::{
    close_code, opcode, ConnectionProperties, GatewayFrame, HelloPayload, IdentifyPayload,
    ReadyPayload, ResumePayload,
};
use heartbeat::{HeartbeatHandle, HeartbeatMonitor, SharedAcks};
use session::Session;
use writer::{spawn_writer, CloseRequest, Outbound, OutboundSender};

/// How long `close` waits for the writer to flush the close frame.
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Identify,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHello,
    Authenticating(AuthMode),
    Connected,
    Closing,
}

#[derive(Debug)]
enum Control {
    Close(CloseRequest),
}

/// Cloneable remote control for a running [`GatewayConnection`].
#[derive(Clone)]
pub struct GatewayHandle {
    auto_reconnect: Arc<AtomicBool>,
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ConnectionState>,
}

impl GatewayHandle {
    /// Close with 1000 and stop reconnecting.
    pub fn disconnect(&self) {
        self.auto_reconnect.store(false, Ordering::SeqCst);
        self.close(close_code::NORMAL, "Disconnecting");
    }

    /// Close the current connection. Auto-reconnect is left as it is.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        if self
            .control
            .send(Control::Close(CloseRequest::new(code, reason)))
            .is_err()
        {
            tracing::debug!("close requested but the gateway loop is gone");
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect.load(Ordering::SeqCst)
    }
}

/// Resources tied to one socket. Dropping it aborts whatever is still running.
struct Epoch {
    outbound: Option<OutboundSender>,
    writer: Option<JoinHandle<()>>,
    heartbeat: Option<HeartbeatHandle>,
}

impl Epoch {
    fn new(outbound: OutboundSender, writer: Option<JoinHandle<()>>) -> Self {
        Self {
            outbound: Some(outbound),
            writer,
            heartbeat: None,
        }
    }

    fn send(&self, outbound: Outbound) {
        let sent = self
            .outbound
            .as_ref()
            .map(|tx| tx.send(outbound).is_ok())
            .unwrap_or(false);
        if !sent {
            tracing::debug!("gateway writer is closed, dropping outbound frame");
        }
    }

    /// Resolves to `true` when the heartbeat reports a zombied connection.
    /// Never resolves while no heartbeat is running.
    async fn zombied(&mut self) -> bool {
        match self.heartbeat.as_mut() {
            Some(heartbeat) => heartbeat.zombied().await,
            None => std::future::pending().await,
        }
    }
}

impl Drop for Epoch {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

/// Client side of the gateway: connects, authenticates, keeps the
/// heartbeat going and reconnects after every graceful close.
pub struct GatewayConnection {
    config: Arc<Config>,
    bus: Arc<EventBus>,
    session: Session,
    auto_reconnect: Arc<AtomicBool>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    state: watch::Sender<ConnectionState>,
}

impl GatewayConnection {
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            auto_reconnect: Arc::new(AtomicBool::new(config.auto_reconnect)),
            config,
            bus,
            session: Session::default(),
            control_tx,
            control_rx,
            state,
        }
    }

    /// Start from a known session so the first HELLO is answered with RESUME.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            auto_reconnect: self.auto_reconnect.clone(),
            control: self.control_tx.clone(),
            state: self.state.subscribe(),
        }
    }

    /// Connect, and connect again after every close until auto-reconnect is
    /// turned off. Transport faults end the loop with an error.
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        loop {
            self.connect_once().await?;
            if !self.auto_reconnect.load(Ordering::SeqCst) {
                break;
            }
            tracing::info!("reconnecting to gateway");
        }
        Ok(())
    }

    /// One socket lifetime, from connect to close.
    pub async fn connect_once(&mut self) -> Result<(), GatewayError> {
        let result = self.drive_socket().await;
        self.set_state(ConnectionState::Disconnected);
        result
    }

    async fn drive_socket(&mut self) -> Result<(), GatewayError> {
        if self.discard_stale_requests() {
            tracing::info!("disconnect requested before connecting");
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);
        let endpoint = self.config.gateway_endpoint();
        tracing::info!("connecting to gateway at {endpoint}");

        let (socket, _) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
        let (sink, mut stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut epoch = Epoch::new(outbound_tx, Some(spawn_writer(sink, outbound_rx)));
        self.set_state(ConnectionState::AwaitingHello);

        let request = loop {
            tokio::select! {
                Some(control) = self.control_rx.recv() => match control {
                    Control::Close(request) => break request,
                },
                zombied = epoch.zombied() => {
                    if zombied {
                        break CloseRequest::new(close_code::GENERIC_FAILURE, "Failed connection");
                    }
                    epoch.heartbeat = None;
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(request) = self.on_text(text.as_str(), &mut epoch).await? {
                            break request;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => break server_close(frame),
                    Some(Ok(_)) => {}
                    Some(Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake))) | None => {
                        break CloseRequest::new(close_code::ABNORMAL, "Connection lost");
                    }
                    Some(Err(e)) => {
                        tracing::error!("gateway read failed: {e}");
                        return Err(e.into());
                    }
                },
            }
        };

        self.close(request, &mut epoch).await;
        Ok(())
    }

    /// Close requests left over from an earlier socket don't apply to the
    /// next one. Returns `true` when one of them came with a disconnect.
    fn discard_stale_requests(&mut self) -> bool {
        let mut stale = false;
        while let Ok(Control::Close(request)) = self.control_rx.try_recv() {
            tracing::debug!(
                "dropping close request from an earlier connection: {} {}",
                request.code,
                request.reason
            );
            stale = true;
        }
        stale && !self.auto_reconnect.load(Ordering::SeqCst)
    }

    /// Handles one text frame. Returns a close request when the frame
    /// ends the connection.
    async fn on_text(
        &mut self,
        text: &str,
        epoch: &mut Epoch,
    ) -> Result<Option<CloseRequest>, GatewayError> {
        let frame: GatewayFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("ignoring undecodable gateway frame: {e}");
                return Ok(None);
            }
        };
        self.session.observe_sequence(frame.sequence);

        match frame.opcode {
            opcode::HELLO => return self.on_hello(frame, epoch),
            opcode::HEARTBEAT_ACK => {
                if let Some(heartbeat) = epoch.heartbeat.as_ref() {
                    heartbeat.acks().lock().await.record_ack(Instant::now());
                }
            }
            opcode::HEARTBEAT => epoch.send(Outbound::Frame(GatewayFrame::heartbeat())),
            opcode::DISPATCH => self.on_dispatch(frame),
            opcode::INVALID_SESSION => {
                let resumable = frame.payload.as_bool().unwrap_or(false);
                tracing::warn!("invalid session (resumable: {resumable})");
                if !resumable {
                    self.session.clear();
                }
                let wait = random_backoff(&self.config.invalid_session_backoff);
                tokio::time::sleep(wait).await;
                return Ok(Some(CloseRequest::new(
                    close_code::GENERIC_FAILURE,
                    "Invalid session",
                )));
            }
            other => tracing::debug!("ignoring gateway opcode {other}"),
        }
        Ok(None)
    }

    /// Without a heartbeat interval the connection can't be kept alive, so a
    /// malformed HELLO closes it.
    fn on_hello(
        &mut self,
        frame: GatewayFrame,
        epoch: &mut Epoch,
    ) -> Result<Option<CloseRequest>, GatewayError> {
        let hello: HelloPayload = match serde_json::from_value(frame.payload) {
            Ok(hello) => hello,
            Err(e) => {
                tracing::warn!("malformed HELLO: {e}");
                return Ok(Some(CloseRequest::new(
                    close_code::GENERIC_FAILURE,
                    "Malformed hello",
                )));
            }
        };
        let interval = Duration::from_millis(hello.heartbeat_interval);
        tracing::debug!("gateway hello, heartbeat interval {interval:?}");

        // Fresh ack bookkeeping; replacing the handle aborts the old monitor
        if let Some(outbound) = epoch.outbound.clone() {
            epoch.heartbeat =
                Some(HeartbeatMonitor::new(interval, SharedAcks::default(), outbound).spawn());
        }

        let (mode, handshake) = self.handshake_frame()?;
        epoch.send(Outbound::Frame(handshake));
        self.set_state(ConnectionState::Authenticating(mode));
        Ok(None)
    }

    /// RESUME when both the session id and a sequence are known, IDENTIFY
    /// otherwise.
    pub fn handshake_frame(&self) -> Result<(AuthMode, GatewayFrame), serde_json::Error> {
        let token = self.config.credentials.token().to_string();
        if let Some((session_id, sequence)) = self.session.resume_point() {
            tracing::info!("resuming session {session_id} at sequence {sequence}");
            let resume = ResumePayload {
                token,
                session_id: session_id.to_string(),
                sequence,
            };
            return Ok((
                AuthMode::Resume,
                GatewayFrame::command(opcode::RESUME, &resume)?,
            ));
        }

        let identify = IdentifyPayload {
            token,
            properties: ConnectionProperties {
                os: std::env::consts::OS.to_string(),
                browser: CLIENT_NAME.to_string(),
                device: CLIENT_NAME.to_string(),
            },
            compress: Some(self.config.compress),
            large_threshold: self.config.large_threshold,
            shard: self.config.shard,
            guild_subscriptions: self.config.guild_subscriptions,
        };
        Ok((
            AuthMode::Identify,
            GatewayFrame::command(opcode::IDENTIFY, &identify)?,
        ))
    }

    fn on_dispatch(&mut self, frame: GatewayFrame) {
        let name = GatewayEventName::from_wire(frame.event_name.as_deref().unwrap_or_default());
        match name {
            GatewayEventName::Ready => {
                match serde_json::from_value::<ReadyPayload>(frame.payload.clone()) {
                    Ok(ready) => {
                        tracing::info!("gateway session {} ready", ready.session_id);
                        self.session.establish(ready.session_id.clone());
                        self.set_state(ConnectionState::Connected);
                        self.post(SessionReady {
                            session_id: ready.session_id,
                            version: ready.version,
                            shard: ready.shard,
                            user: ready.user,
                            guilds: ready.guilds,
                        });
                    }
                    Err(e) => tracing::warn!("malformed READY dispatch: {e}"),
                }
            }
            GatewayEventName::Resumed => {
                tracing::info!("gateway session resumed");
                self.set_state(ConnectionState::Connected);
                self.post(SessionResumed {
                    sequence: self.session.sequence(),
                });
            }
            _ => {}
        }

        self.post(DispatchEvent {
            name,
            sequence: frame.sequence,
            data: frame.payload,
        });
    }

    async fn close(&mut self, request: CloseRequest, epoch: &mut Epoch) {
        tracing::info!("closing gateway connection: {} {}", request.code, request.reason);
        self.set_state(ConnectionState::Closing);

        epoch.send(Outbound::Close(request.clone()));
        self.post(ConnectionClosed {
            code: request.code,
            reason: request.reason,
        });

        epoch.heartbeat = None;
        epoch.outbound = None;
        if let Some(mut writer) = epoch.writer.take() {
            if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut writer)
                .await
                .is_err()
            {
                tracing::warn!("gateway writer did not stop in time, aborting");
                writer.abort();
            }
        }
    }

    fn post(&self, event: impl Into<Event>) {
        if let Err(e) = self.bus.post(event) {
            tracing::warn!("{e}");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

fn server_close(frame: Option<CloseFrame>) -> CloseRequest {
    match frame {
        Some(frame) => CloseRequest::new(u16::from(frame.code), frame.reason.as_str()),
        None => CloseRequest::new(close_code::NO_STATUS, ""),
    }
}

fn random_backoff(range: &RangeInclusive<Duration>) -> Duration {
    if range.start() >= range.end() {
        return *range.start();
    }
    rand::thread_rng().gen_range(range.clone())
}
