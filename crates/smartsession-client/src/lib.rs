//! smartsession-client: WebSocket message client for both roles.
//!
//! # Architecture
//!
//! ```text
//! Student / Teacher view                      SmartSession server
//! ──────────────────────────────              ─────────────────────────────
//! ClientHandle::send_json ─► outbound queue ─► ws://host/ws/{role}/{scope}
//! events rx ◄── ClientEvent::Message(T) ◄──── text frames (JSON, `type`-tagged)
//!           ◄── ClientEvent::Status(..)
//! ```
//!
//! One connection per session. The lifecycle is
//! `CONNECTING → CONNECTED → DISCONNECTED` (or `CONNECTING → CONNECTION ERROR`
//! when the handshake request cannot be built). There is no reconnect: once
//! the status is terminal the event channel closes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use smartsession_client::{ClientEvent, MessageClient};
//! use smartsession_core::{ClientConfig, StudentInbound};
//!
//! # async fn example() {
//! let cfg = ClientConfig::default();
//! let (handle, mut events) = MessageClient::connect::<StudentInbound>(&cfg.student_endpoint("AB12C"));
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Status(status) => println!("{status}"),
//!         ClientEvent::Message(msg) => println!("{msg:?}"),
//!     }
//! }
//! handle.close();
//! # }
//! ```

pub mod connection;
pub mod dispatch;

pub use connection::{ClientEvent, ClientHandle, MessageClient};
pub use dispatch::decode_inbound;
