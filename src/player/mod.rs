//! Player channel module - drives an iframe-embedded player over window messaging.
//!
//! Architecture:
//! - `host.rs` - Embedded frame and host window abstractions, in-process message bus
//! - `protocol.rs` - Outbound control/command shapes and inbound message classification
//! - `registry.rs` - Event listener bookkeeping and failure-isolated dispatch
//! - `correlator.rs` - Matching replies to pending data requests
//! - `client.rs` - High-level client: handshake, subscriptions, commands, getters

mod client;
mod correlator;
mod error;
mod host;
mod protocol;
mod registry;

pub use client::{EventStream, PlayerClient, Subscription, DEFAULT_SEEK_SECONDS};
pub use error::PlayerError;
pub use host::{
  EmbedTarget, HostWindow, ListenerId, LoadHook, MessageEvent, MessageHandler, WindowBus,
};
pub use protocol::{Command, Control, Inbound, Outbound, IFRAME_READY};
pub use registry::{Listener, ListenerError};
