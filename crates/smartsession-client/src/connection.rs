//! WebSocket connection task and its handle.
//!
//! # Lifecycle
//!
//! ```text
//! 1. MessageClient::connect::<Inbound>(&endpoint)
//!       ├─ handle: ClientHandle (is_open / send_json / close)
//!       └─ events: Receiver<ClientEvent<Inbound>>
//! 2. events ◄ Status(Connecting)
//! 3. events ◄ Status(Connected)             ← handshake done, handle.is_open()
//! 4. events ◄ Message(..)                   ← one per well-formed text frame
//! 5. events ◄ Status(Disconnected)          ← close from either side, I/O error
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use smartsession_core::{ConnectionStatus, Endpoint, FrameMessage, FrameSink, ProtocolError, SessionError};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::dispatch::decode_inbound;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frames queued beyond this are dropped rather than buffered.
const OUTBOUND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 256;

/// Output of a connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent<T> {
    Status(ConnectionStatus),
    Message(T),
}

// ── ClientHandle ──────────────────────────────────────────────────────────────

/// Cloneable write side of a connection.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<Inner>,
}

struct Inner {
    url:         String,
    open:        AtomicBool,
    outbound_tx: mpsc::Sender<Message>,
    shutdown_tx: watch::Sender<bool>,
}

impl ClientHandle {
    /// True between the handshake completing and the connection closing.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Serialize `msg` and queue it as a text frame.
    pub fn send_json<T: Serialize>(&self, msg: &T) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::ChannelClosed);
        }
        let text = serde_json::to_string(msg).map_err(ProtocolError::from)?;
        self.inner
            .outbound_tx
            .try_send(Message::Text(text))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SessionError::OutboundFull,
                mpsc::error::TrySendError::Closed(_) => SessionError::ChannelClosed,
            })
    }

    /// Close the connection (sends a WebSocket close frame). Idempotent.
    pub fn close(&self) {
        self.inner.open.store(false, Ordering::Release);
        let _ = self.inner.shutdown_tx.send(true);
    }
}

impl FrameSink for ClientHandle {
    fn is_open(&self) -> bool {
        ClientHandle::is_open(self)
    }

    fn send_frame(&self, frame: FrameMessage) -> Result<(), SessionError> {
        self.send_json(&frame.into_outbound())
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("url", &self.inner.url)
            .field("open", &self.is_open())
            .finish()
    }
}

// ── MessageClient ─────────────────────────────────────────────────────────────

pub struct MessageClient;

impl MessageClient {
    /// Spawn the connection task for `endpoint`, decoding inbound text frames
    /// as `T`. Must be called from within a tokio runtime.
    pub fn connect<T>(endpoint: &Endpoint) -> (ClientHandle, mpsc::Receiver<ClientEvent<T>>)
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent<T>>(EVENT_QUEUE);

        let inner = Arc::new(Inner {
            url: endpoint.url().to_owned(),
            open: AtomicBool::new(false),
            outbound_tx,
            shutdown_tx,
        });

        tokio::spawn(run_connection(
            endpoint.clone(),
            Arc::clone(&inner),
            outbound_rx,
            shutdown_rx,
            event_tx,
        ));

        (ClientHandle { inner }, event_rx)
    }
}

// ── Connection task ───────────────────────────────────────────────────────────

fn build_request(endpoint: &Endpoint) -> anyhow::Result<Request> {
    endpoint
        .url()
        .into_client_request()
        .with_context(|| format!("building WebSocket request for {}", endpoint))
}

async fn open_socket(request: Request, endpoint: &Endpoint) -> anyhow::Result<WsStream> {
    let (ws, response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("WebSocket connect to {}", endpoint))?;
    debug!("Handshake response: {}", response.status());
    Ok(ws)
}

async fn run_connection<T>(
    endpoint: Endpoint,
    inner: Arc<Inner>,
    mut outbound_rx: mpsc::Receiver<Message>,
    mut shutdown_rx: watch::Receiver<bool>,
    event_tx: mpsc::Sender<ClientEvent<T>>,
) where
    T: DeserializeOwned + Send + 'static,
{
    let _ = event_tx.send(ClientEvent::Status(ConnectionStatus::Connecting)).await;
    info!("Connecting to {} ({})", endpoint, endpoint.role);

    let request = match build_request(&endpoint) {
        Ok(r) => r,
        Err(e) => {
            warn!("Connection error: {:#}", e);
            let _ = event_tx
                .send(ClientEvent::Status(ConnectionStatus::Error(format!("{e:#}"))))
                .await;
            return;
        }
    };

    let ws = tokio::select! {
        result = open_socket(request, &endpoint) => match result {
            Ok(ws) => ws,
            Err(e) => {
                warn!("{:#}", e);
                let _ = event_tx.send(ClientEvent::Status(ConnectionStatus::Disconnected)).await;
                return;
            }
        },
        _ = shutdown_rx.changed() => {
            info!("Closed before connecting to {}", endpoint);
            let _ = event_tx.send(ClientEvent::Status(ConnectionStatus::Disconnected)).await;
            return;
        }
    };

    let closed_while_connecting = *shutdown_rx.borrow();
    if !closed_while_connecting {
        inner.open.store(true, Ordering::Release);
    }
    info!("Connected to {}", endpoint);
    if event_tx.send(ClientEvent::Status(ConnectionStatus::Connected)).await.is_err() {
        inner.open.store(false, Ordering::Release);
        return;
    }

    let (mut writer, mut reader) = ws.split();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("Local close requested ({})", endpoint);
                if let Err(e) = writer.send(Message::Close(None)).await {
                    debug!("Close frame not delivered: {}", e);
                }
                break;
            }

            maybe_out = outbound_rx.recv() => {
                let Some(msg) = maybe_out else { break };
                if let Err(e) = writer.send(msg).await {
                    warn!("Send to {} failed: {}", endpoint, e);
                    break;
                }
            }

            maybe_in = reader.next() => {
                match maybe_in {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(msg) = decode_inbound::<T>(&text) {
                            if event_tx.send(ClientEvent::Message(msg)).await.is_err() {
                                debug!("Event receiver dropped; closing {}", endpoint);
                                let _ = writer.send(Message::Close(None)).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("{}", ProtocolError::UnexpectedBinary { len: data.len() });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Server closed {}: {:?}", endpoint, frame);
                        break;
                    }
                    Some(Ok(_)) => {} // ping / pong / raw frame
                    Some(Err(e)) => {
                        warn!("Receive from {} failed: {}", endpoint, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    inner.open.store(false, Ordering::Release);
    info!("Disconnected from {}", endpoint);
    let _ = event_tx.send(ClientEvent::Status(ConnectionStatus::Disconnected)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartsession_core::{StudentIdentity, StudentInbound, TeacherInbound};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    type ServerWs = WebSocketStream<TcpStream>;

    /// Accept exactly one WebSocket client and hand it to `handler`.
    async fn serve_once<F, Fut>(handler: F) -> String
    where
        F: FnOnce(ServerWs) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            handler(ws).await;
        });
        format!("ws://{addr}/ws")
    }

    async fn collect<T>(mut events: mpsc::Receiver<ClientEvent<T>>) -> Vec<ClientEvent<T>> {
        let mut out = Vec::new();
        while let Some(ev) = events.recv().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn dispatches_messages_and_survives_malformed_json() {
        let base = serve_once(|mut ws| async move {
            for text in [
                "{not json",
                r#"{"type":"peer_update","peers":["A","B"]}"#,
                r#"{"type":"mystery"}"#,
                r#"{"type":"teacher_status","status":"ONLINE"}"#,
            ] {
                ws.send(Message::Text(text.to_owned())).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let (handle, events) = MessageClient::connect::<StudentInbound>(&Endpoint::student(&base, "S1"));
        assert!(!handle.is_open());

        let events = collect(events).await;
        assert_eq!(
            events,
            vec![
                ClientEvent::Status(ConnectionStatus::Connecting),
                ClientEvent::Status(ConnectionStatus::Connected),
                ClientEvent::Message(StudentInbound::PeerUpdate { peers: vec!["A".into(), "B".into()] }),
                ClientEvent::Message(StudentInbound::Unknown),
                ClientEvent::Message(StudentInbound::TeacherStatus { status: "ONLINE".into() }),
                ClientEvent::Status(ConnectionStatus::Disconnected),
            ]
        );
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn sends_frames_and_closes_cleanly() {
        let (got_tx, got_rx) = oneshot::channel::<String>();
        let base = serve_once(|mut ws| async move {
            let mut got_tx = Some(got_tx);
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    if let Some(tx) = got_tx.take() {
                        let _ = tx.send(text);
                    }
                }
            }
        })
        .await;

        let (handle, mut events) = MessageClient::connect::<StudentInbound>(&Endpoint::student(&base, "S1"));
        assert_eq!(events.recv().await, Some(ClientEvent::Status(ConnectionStatus::Connecting)));
        assert_eq!(events.recv().await, Some(ClientEvent::Status(ConnectionStatus::Connected)));
        assert!(handle.is_open());

        let who = StudentIdentity::new("S1", "Student 1");
        let frame = FrameMessage::new(&who, "data:image/jpeg;base64,AAAA".into(), 42);
        handle.send_frame(frame).unwrap();

        let text = got_rx.await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "frame");
        assert_eq!(value["studentId"], "S1");
        assert_eq!(value["timestamp"], 42);

        handle.close();
        assert!(!handle.is_open());
        assert_eq!(events.recv().await, Some(ClientEvent::Status(ConnectionStatus::Disconnected)));
        assert_eq!(events.recv().await, None);
        assert!(matches!(handle.send_json(&"late"), Err(SessionError::ChannelClosed)));
    }

    #[tokio::test]
    async fn refused_connection_ends_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (handle, events) =
            MessageClient::connect::<TeacherInbound>(&Endpoint::teacher(&format!("ws://{addr}/ws"), "CLASS_A"));
        let events = collect(events).await;
        assert_eq!(
            events,
            vec![
                ClientEvent::Status(ConnectionStatus::Connecting),
                ClientEvent::Status(ConnectionStatus::Disconnected),
            ]
        );
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn unbuildable_request_is_connection_error() {
        let (_handle, events) =
            MessageClient::connect::<TeacherInbound>(&Endpoint::teacher("not a url", "CLASS_A"));
        let events = collect(events).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ClientEvent::Status(ConnectionStatus::Connecting));
        assert!(matches!(events[1], ClientEvent::Status(ConnectionStatus::Error(_))));
    }

    #[tokio::test]
    async fn send_before_open_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (handle, _events) =
            MessageClient::connect::<StudentInbound>(&Endpoint::student(&format!("ws://{addr}/ws"), "S1"));
        assert!(matches!(handle.send_json(&"early"), Err(SessionError::ChannelClosed)));
        handle.close();
        drop(listener);
    }
}
