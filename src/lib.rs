//! trivia-live-sync: live synchronization client for the trivia admin dashboard
//!
//! Keeps every open admin session consistent when one of them mutates shared
//! data. The server broadcasts a JSON frame for each change; this crate owns
//! the WebSocket that receives it, reconnects with exponential backoff when
//! the socket drops, routes frames by `type`, and reconciles them into an
//! ordered question list and a bounded activity feed.
//!
//! # Layout
//!
//! - [`transport`]: connection state machine and the tokio-tungstenite connector
//! - [`backoff`]: reconnect delay policy
//! - [`router`]: frame validation and dispatch
//! - [`reconcile`] / [`activity`]: view-state updates
//! - [`client`]: consumer facade with observers
//! - [`session`]: composition root tying the above together
//!
//! # Example
//!
//! ```ignore
//! use trivia_live_sync::{LiveSession, SyncConfig};
//!
//! let config = SyncConfig::load()?.with_url("ws://localhost:3001/ws");
//! let (mut session, mut events) = LiveSession::start(&config)?;
//! while let Some(event) = events.next().await {
//!     session.handle(event);
//!     println!("{} questions", session.questions().len());
//! }
//! ```

pub mod activity;
pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod monitor;
pub mod protocol;
pub mod reconcile;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod testing;
pub mod transport;

// Re-export commonly used types
pub use activity::ActivityLog;
pub use backoff::ReconnectPolicy;
pub use client::{ClientEvent, LiveClient, SubscriptionId};
pub use config::{Environment, SyncConfig};
pub use error::{Result, SyncError};
pub use event_loop::{LoopEvent, LoopEvents, LoopHandle, SocketEvent};
pub use protocol::{ActivityEntry, EntityId, Frame, MessageKind, Question};
pub use reconcile::{Applied, Entity, EntityCollection, EntityEvent};
pub use router::{MessageRouter, RouteOutcome};
pub use scheduler::{Scheduler, TimerId, TokioScheduler};
pub use session::{default_router, LiveSession, LiveState};
pub use transport::{ConnectionState, Connector, TransportConnection, TransportEvent, WsConnector};
