//! Bidirectional live audio session
//!
//! A [`LiveSession`] moves through `Idle -> Connecting -> Open -> Closed`.
//! Outbound microphone frames are queued in capture order from the moment
//! the session exists and are only drained once it is open. Closing while
//! the transport is still connecting lets the connect finish and then shuts
//! the transport down, so a transport is never left open.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::types::{Blob, ClientMessage, LiveSetup, RealtimeInput, ServerMessage};
use crate::config::Config;
use crate::voice::{EncodedFrame, decode_base64};
use crate::{Error, Result};

/// Capacity of the inbound event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Why a session closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by the owner (explicit close or drop)
    Requested,
    /// The remote end closed the socket
    Remote,
    /// Connect or transport failure
    Failed(String),
}

/// Events surfaced to the owner of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Transport is open; frames are flowing
    Opened,
    /// Decoded PCM bytes from the model (24 kHz mono)
    Audio(Vec<u8>),
    /// The student spoke over the model
    Interrupted,
    /// The model finished its turn
    TurnComplete,
    /// The session is over
    Closed { reason: CloseReason },
}

/// Outbound half of an open connection
pub type LiveSink = Pin<Box<dyn Sink<ClientMessage, Error = Error> + Send>>;

/// Inbound half of an open connection
pub type LiveStream = Pin<Box<dyn Stream<Item = Result<ServerMessage>> + Send>>;

/// An open, set-up connection to a live endpoint
pub struct LiveConnection {
    pub sink: LiveSink,
    pub stream: LiveStream,
}

/// Opens live connections
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Connect and complete the setup handshake
    ///
    /// # Errors
    ///
    /// Returns error if the connection or handshake fails
    async fn connect(&self, setup: LiveSetup) -> Result<LiveConnection>;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport to the Gemini live endpoint
pub struct WsTransport {
    url: String,
    api_key: SecretString,
    connect_timeout: Duration,
}

impl WsTransport {
    /// Create a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            url: config.live_url.clone(),
            api_key: SecretString::from(config.require_api_key()?.to_string()),
            connect_timeout: config.connect_timeout,
        })
    }

    async fn open(
        &self,
        setup: LiveSetup,
    ) -> Result<(SplitSink<Socket, Message>, SplitStream<Socket>)> {
        let mut url = url::Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid live url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());

        let (socket, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = socket.split();

        let setup = serde_json::to_string(&ClientMessage::Setup(setup))?;
        write.send(Message::text(setup)).await?;

        while let Some(frame) = read.next().await {
            let payload = match frame? {
                Message::Text(text) => parse_server_message(text.as_bytes())?,
                Message::Binary(data) => parse_server_message(&data)?,
                Message::Close(frame) => {
                    return Err(Error::Live(format!("closed during setup: {frame:?}")));
                }
                _ => continue,
            };
            if payload.setup_complete.is_some() {
                return Ok((write, read));
            }
        }

        Err(Error::Live("socket ended during setup".to_string()))
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn connect(&self, setup: LiveSetup) -> Result<LiveConnection> {
        let (write, read) = tokio::time::timeout(self.connect_timeout, self.open(setup))
            .await
            .map_err(|_| Error::Live("timed out waiting for setup".to_string()))??;

        tracing::debug!("live socket set up");

        let sink = write
            .sink_map_err(Error::from)
            .with(|msg: ClientMessage| async move {
                Ok::<_, Error>(Message::text(serde_json::to_string(&msg)?))
            });

        let stream = read.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(parse_server_message(text.as_bytes())),
                Ok(Message::Binary(data)) => Some(parse_server_message(&data)),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "live socket closed by remote");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            }
        });

        Ok(LiveConnection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn parse_server_message(bytes: &[u8]) -> Result<ServerMessage> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Cloneable handle for queueing microphone frames on a session
///
/// Safe to call from the audio thread: it never blocks.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<EncodedFrame>,
    state: watch::Receiver<SessionState>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Queue a frame behind every frame sent before it
    ///
    /// When the queue is full the frame is dropped and counted.
    ///
    /// # Errors
    ///
    /// Returns `Error::Live` once the session is closed
    pub fn send(&self, frame: EncodedFrame) -> Result<()> {
        if *self.state.borrow() == SessionState::Closed {
            return Err(Error::Live("session closed".to_string()));
        }

        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 {
                    tracing::warn!("outbound audio queue full, dropping frames");
                } else {
                    tracing::trace!(dropped, "dropped outbound frame");
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::Live("session closed".to_string()))
            }
        }
    }

    /// Frames dropped because the queue was full
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// One live conversation with the remote model
pub struct LiveSession {
    transport: Arc<dyn LiveTransport>,
    setup: Option<LiveSetup>,
    state: Arc<watch::Sender<SessionState>>,
    close_tx: watch::Sender<bool>,
    outbound_tx: mpsc::Sender<EncodedFrame>,
    outbound_rx: Option<mpsc::Receiver<EncodedFrame>>,
    events_tx: Option<mpsc::Sender<LiveEvent>>,
    events_rx: Option<mpsc::Receiver<LiveEvent>>,
    dropped: Arc<AtomicU64>,
    driver: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Create an idle session
    #[must_use]
    pub fn new(transport: Arc<dyn LiveTransport>, setup: LiveSetup, queue_capacity: usize) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (close_tx, _) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_capacity.max(1));
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            transport,
            setup: Some(setup),
            state: Arc::new(state),
            close_tx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
            events_tx: Some(events_tx),
            events_rx: Some(events_rx),
            dropped: Arc::new(AtomicU64::new(0)),
            driver: None,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Take the inbound event stream (only once)
    pub const fn take_events(&mut self) -> Option<mpsc::Receiver<LiveEvent>> {
        self.events_rx.take()
    }

    /// A handle for queueing outbound frames
    #[must_use]
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            tx: self.outbound_tx.clone(),
            state: self.state.subscribe(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Start connecting in the background
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the session is idle
    pub fn connect(&mut self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(Error::InvalidState(format!(
                "cannot connect a session that is {state:?}"
            )));
        }
        let (Some(setup), Some(outbound), Some(events)) = (
            self.setup.take(),
            self.outbound_rx.take(),
            self.events_tx.take(),
        ) else {
            return Err(Error::InvalidState("session already connected".to_string()));
        };

        self.state.send_replace(SessionState::Connecting);
        tracing::info!(model = %setup.model, "connecting live session");

        let driver = Driver {
            state: Arc::clone(&self.state),
            close_rx: self.close_tx.subscribe(),
            outbound,
            events,
        };
        self.driver = Some(tokio::spawn(driver.run(Arc::clone(&self.transport), setup)));
        Ok(())
    }

    /// Close the session; safe to call repeatedly and in any state
    pub fn close(&self) {
        if self.state() == SessionState::Idle {
            self.state.send_replace(SessionState::Closed);
            return;
        }
        if !self.close_tx.send_replace(true) {
            tracing::debug!("live session close requested");
        }
    }

    /// Wait for the background driver to finish
    pub async fn closed(&mut self) {
        if let Some(driver) = self.driver.take()
            && let Err(e) = driver.await
        {
            tracing::error!(error = %e, "live session driver panicked");
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background task owning the connection
struct Driver {
    state: Arc<watch::Sender<SessionState>>,
    close_rx: watch::Receiver<bool>,
    outbound: mpsc::Receiver<EncodedFrame>,
    events: mpsc::Sender<LiveEvent>,
}

impl Driver {
    async fn run(mut self, transport: Arc<dyn LiveTransport>, setup: LiveSetup) {
        let connection = transport.connect(setup).await;

        let reason = match connection {
            Err(e) => {
                tracing::error!(error = %e, "live session failed to open");
                CloseReason::Failed(e.to_string())
            }
            Ok(mut conn) if *self.close_rx.borrow() => {
                tracing::debug!("closed while connecting, shutting transport down");
                let _ = conn.sink.close().await;
                CloseReason::Requested
            }
            Ok(conn) => {
                self.state.send_replace(SessionState::Open);
                tracing::info!("live session open");
                self.emit(LiveEvent::Opened).await;
                self.pump(conn).await
            }
        };

        self.state.send_replace(SessionState::Closed);
        self.outbound.close();
        tracing::info!(?reason, "live session closed");
        self.emit(LiveEvent::Closed { reason }).await;
    }

    /// Move frames both ways until something ends the session
    async fn pump(&mut self, conn: LiveConnection) -> CloseReason {
        let LiveConnection {
            mut sink,
            mut stream,
        } = conn;

        let reason = loop {
            tokio::select! {
                changed = self.close_rx.changed() => {
                    if changed.is_err() || *self.close_rx.borrow() {
                        break CloseReason::Requested;
                    }
                }
                frame = self.outbound.recv() => {
                    let Some(frame) = frame else {
                        break CloseReason::Requested;
                    };
                    let message = ClientMessage::RealtimeInput(RealtimeInput {
                        media_chunks: vec![Blob {
                            mime_type: Some(frame.mime_type),
                            data: frame.data,
                        }],
                    });
                    if let Err(e) = sink.send(message).await {
                        tracing::error!(error = %e, "failed to send audio frame");
                        break CloseReason::Failed(e.to_string());
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(message)) => {
                        for event in translate(message) {
                            self.emit(event).await;
                        }
                    }
                    Some(Err(Error::Serialization(e))) => {
                        tracing::warn!(error = %e, "skipping unparseable server message");
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "live transport error");
                        break CloseReason::Failed(e.to_string());
                    }
                    None => break CloseReason::Remote,
                },
            }
        };

        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "error closing live transport");
        }
        reason
    }

    async fn emit(&self, event: LiveEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("live event receiver dropped");
        }
    }
}

/// Turn one server message into owner-facing events
///
/// Audio that fails to decode is logged and skipped.
fn translate(message: ServerMessage) -> Vec<LiveEvent> {
    if message.go_away.is_some() {
        tracing::warn!("live endpoint announced it is going away");
    }

    let Some(content) = message.server_content else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if content.interrupted {
        events.push(LiveEvent::Interrupted);
    }

    events.extend(
        content
            .audio_payloads()
            .filter_map(|payload| match decode_base64(payload) {
                Ok(bytes) => Some(LiveEvent::Audio(bytes)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable audio chunk");
                    None
                }
            }),
    );

    if content.turn_complete {
        events.push(LiveEvent::TurnComplete);
    }
    events
}
