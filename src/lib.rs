//! Remote control for a video player embedded in a cross-origin iframe.
//!
//! The host page talks to the player only through window messages: a
//! readiness handshake, fire-and-forget commands, subscribe/unsubscribe
//! announcements for player events, and data requests answered by
//! `{type, data}` replies.
//!
//! ```ignore
//! let options = ClientOptions::with_origin("https://player.example");
//! let client = PlayerClient::new(iframe, window, options)?;
//! client.on_ready(|| log::info!("player ready"));
//! let _sub = client.on("timeupdate", Listener::infallible(|data| log::debug!("{data}")))?;
//! client.play();
//! let position = client.get_current_time().await?;
//! ```

mod config;
mod player;

pub use config::{ClientOptions, Origin, ANY_ORIGIN};
pub use player::{
  Command, Control, EmbedTarget, EventStream, HostWindow, Inbound, Listener, ListenerError,
  ListenerId, LoadHook, MessageEvent, MessageHandler, Outbound, PlayerClient, PlayerError,
  Subscription, WindowBus, DEFAULT_SEEK_SECONDS, IFRAME_READY,
};
