//! **Live Transport** — the persistent channel to the translation service
//!
//! One `LiveConnection` per attempt, never reused. The socket is split
//! into a writer task (drains an outbound queue, so capture never waits on
//! the network) and a reader task (decodes server JSON and folds every
//! inbound signal into one `ConnectionEvent` stream). Handshake rejections
//! are classified before the session ever counts as connected: credential
//! and entitlement failures (401/403/404) are separated from plain
//! connectivity problems.

use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::error::{LiveError, LiveResult};
use crate::wire::{MediaFrame, ServerMessage, SetupFrame};

/// Normal closure status code; anything else on close is an interruption.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code standing in for a close frame that carried no status.
const CLOSE_NO_STATUS: u16 = 1005;

/// Close code synthesized when the socket ends without a close frame.
const CLOSE_ABNORMAL: u16 = 1006;

/// Lifecycle of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Everything the socket can tell the session, as one tagged stream.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Channel open and setup frame delivered.
    Opened,
    /// A decoded server message.
    Message(ServerMessage),
    /// Socket failure after the channel was established.
    Failed(String),
    /// Close frame (or synthesized 1006 when the socket just ended).
    Closed { code: u16, reason: String },
}

/// What `LiveConnection::open` needs to start a session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Full endpoint URL including any credential query parameter. Never
    /// logged.
    pub url: String,
    pub setup: SetupFrame,
}

/// Cheap cloneable handle for queueing frames and closing from tasks.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    state: Arc<Mutex<ConnectionState>>,
    outbound_tx: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Queue one media frame. Fire-and-forget: frames sent while the
    /// channel is closing are dropped silently, anything else that goes
    /// wrong is logged and skipped.
    pub fn send_media(&self, base64_pcm: String) {
        if self.state() != ConnectionState::Connected {
            return;
        }
        let frame = MediaFrame::audio(base64_pcm);
        match serde_json::to_string(&frame) {
            Ok(json) => {
                if self.outbound_tx.send(Message::Text(json)).is_err() {
                    debug!("Transport: media frame dropped, writer gone");
                }
            }
            Err(e) => warn!("Transport: media frame serialization failed: {}", e),
        }
    }

    /// Request a normal close. Idempotent; any state may call it.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Disconnected;
        }
        let _ = self.outbound_tx.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "client disconnect".into(),
        })));
        debug!("Transport: close requested");
    }
}

/// An open channel plus its reader and writer tasks.
pub struct LiveConnection {
    handle: ConnectionHandle,
    reader: JoinHandle<()>,
    _writer: JoinHandle<()>,
}

impl LiveConnection {
    /// Open the socket, deliver the setup frame, and hand back the
    /// connection plus its event stream. Resolves once the channel is
    /// usable; any failure before that is a classified connect error.
    pub async fn open(
        config: TransportConfig,
    ) -> LiveResult<(Self, mpsc::UnboundedReceiver<ConnectionEvent>)> {
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        debug!("Transport: opening channel");

        let (socket, _response) = connect_async(config.url.as_str())
            .await
            .map_err(classify_handshake_error)?;

        let (mut sink, mut stream) = socket.split();

        let setup_json = serde_json::to_string(&config.setup)
            .map_err(|e| LiveError::ConnectFailed(format!("setup frame serialization: {e}")))?;
        sink.send(Message::Text(setup_json))
            .await
            .map_err(|e| LiveError::ConnectFailed(format!("setup frame send: {e}")))?;

        *state.lock().unwrap() = ConnectionState::Connected;
        info!("Transport: channel open, setup delivered");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let _ = event_tx.send(ConnectionEvent::Opened);

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    debug!("Transport: outbound send stopped: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            debug!("Transport: writer finished");
        });

        let reader_state = Arc::clone(&state);
        let reader = tokio::spawn(async move {
            let mut terminal_seen = false;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        forward_server_json(text.as_bytes(), &event_tx);
                    }
                    Ok(Message::Binary(bytes)) => {
                        // The service is free to deliver its JSON in binary
                        // frames; both shapes decode identically.
                        forward_server_json(&bytes, &event_tx);
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (u16::from(f.code), f.reason.to_string()),
                            None => (CLOSE_NO_STATUS, String::new()),
                        };
                        let mut state = reader_state.lock().unwrap();
                        // A close we initiated leaves Disconnected alone;
                        // a server-side abnormal close is an error.
                        if *state == ConnectionState::Connected {
                            *state = if code == CLOSE_NORMAL {
                                ConnectionState::Disconnected
                            } else {
                                ConnectionState::Error
                            };
                        }
                        drop(state);
                        let _ = event_tx.send(ConnectionEvent::Closed { code, reason });
                        terminal_seen = true;
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        let mut state = reader_state.lock().unwrap();
                        if *state == ConnectionState::Connected {
                            *state = ConnectionState::Error;
                        }
                        drop(state);
                        let _ = event_tx.send(ConnectionEvent::Failed(e.to_string()));
                        terminal_seen = true;
                        break;
                    }
                }
            }
            if !terminal_seen {
                let mut state = reader_state.lock().unwrap();
                if *state == ConnectionState::Connected {
                    *state = ConnectionState::Error;
                }
                drop(state);
                let _ = event_tx.send(ConnectionEvent::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: "socket ended without close frame".to_string(),
                });
            }
            debug!("Transport: reader finished");
        });

        Ok((
            Self {
                handle: ConnectionHandle { state, outbound_tx },
                reader,
                _writer: writer,
            },
            event_rx,
        ))
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn close(&self) {
        self.handle.close();
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.handle.close();
        // The writer drains its queue (including the close frame) and
        // exits on its own; the reader may be parked on a dead socket.
        self.reader.abort();
    }
}

fn forward_server_json(bytes: &[u8], event_tx: &mpsc::UnboundedSender<ConnectionEvent>) {
    match serde_json::from_slice::<ServerMessage>(bytes) {
        Ok(message) => {
            let _ = event_tx.send(ConnectionEvent::Message(message));
        }
        Err(e) => warn!("Transport: undecodable server frame dropped: {}", e),
    }
}

/// Split handshake failures into "fix your credentials" (401/403, plus 404
/// for keys without access to the model) and everything else.
fn classify_handshake_error(err: tungstenite::Error) -> LiveError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            let body = response
                .body()
                .as_ref()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .filter(|text| !text.is_empty());
            let reason = body.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("handshake rejected")
                    .to_string()
            });
            match status.as_u16() {
                401 | 403 | 404 => {
                    LiveError::Unauthorized(format!("service returned {}: {}", status, reason))
                }
                code => LiveError::ConnectFailed(format!("handshake failed ({code}): {reason}")),
            }
        }
        other => LiveError::ConnectFailed(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) fn test_handle(
    state: ConnectionState,
) -> (ConnectionHandle, mpsc::UnboundedReceiver<Message>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    (
        ConnectionHandle {
            state: Arc::new(Mutex::new(state)),
            outbound_tx,
        },
        outbound_rx,
    )
}

/// Connection with inert socket tasks, for lifecycle tests. Needs a
/// runtime.
#[cfg(test)]
pub(crate) fn test_connection(
    state: ConnectionState,
) -> (LiveConnection, mpsc::UnboundedReceiver<Message>) {
    let (handle, outbound_rx) = test_handle(state);
    (
        LiveConnection {
            handle,
            reader: tokio::spawn(async {}),
            _writer: tokio::spawn(async {}),
        },
        outbound_rx,
    )
}
