//! High-level player client with command methods.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_channel::Receiver;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::correlator::Correlator;
use super::error::PlayerError;
use super::host::{EmbedTarget, HostWindow, ListenerId, MessageEvent};
use super::protocol::{Command, Control, Inbound, Outbound};
use super::registry::{self, Listener, ListenerError, ListenerRegistry};
use crate::config::{ClientOptions, Origin};

/// Default seek step for `rewind` / `forward`, in seconds.
pub const DEFAULT_SEEK_SECONDS: f64 = 10.0;

/// Handshake state. `Ready` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
  NotReady,
  Ready,
}

type ReadyCallback = Box<dyn FnOnce() + Send>;

struct ClientState {
  readiness: Readiness,
  ready_callbacks: Vec<ReadyCallback>,
  /// Event names to announce once the player is ready.
  pending_subscriptions: HashSet<String>,
  listeners: ListenerRegistry,
  requests: Correlator,
  closed: bool,
}

/// State shared between the client, its window listener and its load hook.
struct Shared {
  element: Arc<dyn EmbedTarget>,
  origin: Origin,
  state: Mutex<ClientState>,
}

impl Shared {
  /// Post a message to the embedded window. Never called with the state lock held.
  fn post(&self, message: impl Into<Outbound>) {
    if self.state.lock().closed {
      return;
    }
    let message = message.into().to_value();
    if !self.element.post_message(message, self.origin.as_str()) {
      log::debug!("Iframe has no content window, message dropped");
    }
  }

  fn check_ready(&self) {
    log::debug!("Iframe loaded, probing player readiness");
    self.post(Control::CheckReady);
  }

  fn handle_message(&self, event: &MessageEvent) {
    if !self.origin.allows(&event.origin) {
      log::debug!("Ignoring message from disallowed origin {}", event.origin);
      return;
    }

    match Inbound::parse(&event.data) {
      Inbound::Ready => self.handle_ready(),
      Inbound::Named { name, data } => self.handle_named(&name, data),
      Inbound::Untyped => log::debug!("Ignoring message without type from {}", event.origin),
      Inbound::Empty => log::debug!("Received message without type or data: {}", event.data),
    }
  }

  fn handle_ready(&self) {
    let (subscriptions, callbacks) = {
      let mut state = self.state.lock();
      if state.closed || state.readiness == Readiness::Ready {
        return;
      }
      state.readiness = Readiness::Ready;
      let subscriptions: Vec<String> = state.pending_subscriptions.drain().collect();
      (subscriptions, std::mem::take(&mut state.ready_callbacks))
    };

    log::info!(
      "Player ready: flushing {} subscription(s), {} ready callback(s)",
      subscriptions.len(),
      callbacks.len()
    );
    for event_name in subscriptions {
      self.post(Control::Subscribe { event_name });
    }
    for callback in callbacks {
      callback();
    }
  }

  fn handle_named(&self, name: &str, data: Value) {
    let (listeners, data) = {
      let mut state = self.state.lock();
      if state.closed {
        return;
      }
      // A pending request claims the reply before any event listener.
      match state.requests.resolve(name, data) {
        Some(data) => (state.listeners.snapshot(name), data),
        None => return,
      }
    };
    registry::dispatch(name, &listeners, &data);
  }

  fn subscribe(&self, event_name: &str, listener: Listener) -> Result<(), PlayerError> {
    let announce = {
      let mut state = self.state.lock();
      if state.closed {
        return Err(PlayerError::Closed);
      }
      if !state.listeners.add(event_name, listener) {
        false
      } else if state.readiness == Readiness::Ready {
        true
      } else {
        state.pending_subscriptions.insert(event_name.to_string());
        false
      }
    };

    if announce {
      self.post(Control::Subscribe {
        event_name: event_name.to_string(),
      });
    }
    Ok(())
  }

  fn unsubscribe(&self, event_name: &str, listener: &Listener) {
    let removal = {
      let mut state = self.state.lock();
      let removal = state.listeners.remove(event_name, listener);
      if removal.emptied {
        state.pending_subscriptions.remove(event_name);
      }
      removal
    };

    if removal.emptied {
      self.post(Control::Unsubscribe {
        event_name: event_name.to_string(),
      });
    }
  }
}

/// Handle returned by [`PlayerClient::on`], bound to one (event, listener) pair.
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
  shared: Weak<Shared>,
  event_name: String,
  listener: Listener,
}

impl Subscription {
  pub fn event_name(&self) -> &str {
    &self.event_name
  }

  /// Remove the listener; same as [`PlayerClient::off`] for this pair.
  pub fn unsubscribe(self) {
    self.cancel();
  }

  fn cancel(&self) {
    if let Some(shared) = self.shared.upgrade() {
      shared.unsubscribe(&self.event_name, &self.listener);
    }
  }
}

impl std::fmt::Debug for Shared {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Shared").field("origin", &self.origin).finish()
  }
}

/// Async stream of one event's payloads, see [`PlayerClient::events`].
///
/// Unsubscribes when dropped.
#[derive(Debug)]
pub struct EventStream {
  subscription: Subscription,
  receiver: Receiver<Value>,
}

impl EventStream {
  /// Next payload, or None once the client is closed.
  pub async fn recv(&self) -> Option<Value> {
    self.receiver.recv().await.ok()
  }

  pub fn try_recv(&self) -> Option<Value> {
    self.receiver.try_recv().ok()
  }

  pub fn event_name(&self) -> &str {
    self.subscription.event_name()
  }
}

impl Drop for EventStream {
  fn drop(&mut self) {
    self.subscription.cancel();
  }
}

/// Remote control for a player embedded in an iframe.
pub struct PlayerClient {
  shared: Arc<Shared>,
  window: Arc<dyn HostWindow>,
  listener_id: ListenerId,
  request_timeout: Option<Duration>,
}

impl PlayerClient {
  /// Wrap an iframe element. Installs a load hook on the element and one
  /// message listener on the host window, both kept until [`close`](Self::close).
  pub fn new(
    element: Arc<dyn EmbedTarget>,
    window: Arc<dyn HostWindow>,
    options: ClientOptions,
  ) -> Result<Self, PlayerError> {
    if !element.tag_name().eq_ignore_ascii_case("iframe") {
      return Err(PlayerError::NotAnIframe(element.tag_name().to_string()));
    }
    options.validate().map_err(PlayerError::InvalidOptions)?;

    let shared = Arc::new(Shared {
      element: element.clone(),
      origin: options.effective_origin(),
      state: Mutex::new(ClientState {
        readiness: Readiness::NotReady,
        ready_callbacks: Vec::new(),
        pending_subscriptions: HashSet::new(),
        listeners: ListenerRegistry::default(),
        requests: Correlator::default(),
        closed: false,
      }),
    });

    let on_load = Arc::downgrade(&shared);
    element.set_load_hook(Some(Arc::new(move || {
      if let Some(shared) = on_load.upgrade() {
        shared.check_ready();
      }
    })));

    let on_message = Arc::downgrade(&shared);
    let listener_id = window.add_message_listener(Arc::new(move |event: &MessageEvent| {
      if let Some(shared) = on_message.upgrade() {
        shared.handle_message(event);
      }
    }));

    log::info!("Player client attached (origin: {})", shared.origin.as_str());
    Ok(Self {
      shared,
      window,
      listener_id,
      request_timeout: options.request_timeout(),
    })
  }

  /// Allowed origin, `"*"` when unrestricted.
  pub fn origin(&self) -> &str {
    self.shared.origin.as_str()
  }

  /// Check if the player has announced readiness.
  pub fn is_ready(&self) -> bool {
    self.shared.state.lock().readiness == Readiness::Ready
  }

  /// Run `callback` once the player is ready; immediately if it already is.
  pub fn on_ready<F>(&self, callback: F)
  where
    F: FnOnce() + Send + 'static,
  {
    let mut state = self.shared.state.lock();
    if state.closed {
      return;
    }
    if state.readiness == Readiness::NotReady {
      state.ready_callbacks.push(Box::new(callback));
      return;
    }
    drop(state);
    callback();
  }

  /// Listen to a player event. The first listener for a name subscribes to it
  /// on the player side, immediately or once the player is ready.
  pub fn on(&self, event_name: &str, listener: Listener) -> Result<Subscription, PlayerError> {
    if event_name.is_empty() {
      return Err(PlayerError::InvalidArgument(
        "Event name cannot be empty".to_string(),
      ));
    }
    self.shared.subscribe(event_name, listener.clone())?;
    Ok(Subscription {
      shared: Arc::downgrade(&self.shared),
      event_name: event_name.to_string(),
      listener,
    })
  }

  /// Remove a listener. Removing the last one unsubscribes on the player side.
  pub fn off(&self, event_name: &str, listener: &Listener) {
    self.shared.unsubscribe(event_name, listener);
  }

  /// Receive an event's payloads through an async channel instead of a callback.
  pub fn events(&self, event_name: &str) -> Result<EventStream, PlayerError> {
    let (tx, receiver) = async_channel::unbounded();
    let listener = Listener::new(move |data| {
      tx.try_send(data.clone())
        .map_err(|_| ListenerError::from("event stream closed"))
    });
    let subscription = self.on(event_name, listener)?;
    Ok(EventStream {
      subscription,
      receiver,
    })
  }

  pub fn has_listeners(&self, event_name: &str) -> bool {
    self.shared.state.lock().listeners.contains(event_name)
  }

  /// Post `{action, data}` to the player. Fire-and-forget.
  pub fn send_command(&self, action: &str, data: Option<Value>) {
    log::debug!("Sending player command: {}", action);
    self.shared.post(Command::new(action, data));
  }

  pub fn play(&self) {
    self.send_command("play", None);
  }

  pub fn pause(&self) {
    self.send_command("pause", None);
  }

  pub fn mute(&self) {
    self.send_command("mute", None);
  }

  pub fn unmute(&self) {
    self.send_command("unmute", None);
  }

  /// Ask the player to reload its iframe document.
  pub fn reload_iframe(&self) {
    self.send_command("reloadIframe", None);
  }

  /// Set volume (0-1).
  pub fn set_sound(&self, volume: f64) -> Result<(), PlayerError> {
    if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
      return Err(PlayerError::VolumeOutOfRange(volume));
    }
    self.send_command("setSound", Some(json!({ "volume": volume })));
    Ok(())
  }

  pub fn set_loop(&self, enabled: bool) {
    self.send_command("setLoop", Some(json!({ "loop": enabled })));
  }

  pub fn enter_fullscreen(&self) {
    self.send_command("enterFullscreen", None);
  }

  pub fn leave_fullscreen(&self) {
    self.send_command("leaveFullscreen", None);
  }

  /// Seek back by the default step.
  pub fn rewind(&self) {
    self.rewind_by(DEFAULT_SEEK_SECONDS);
  }

  /// Seek back by `seconds`. Not validated; a non-finite value reaches the
  /// player as `null`, the only JSON form it has.
  pub fn rewind_by(&self, seconds: f64) {
    self.send_command("rewind", Some(json!({ "duration": seconds })));
  }

  /// Seek forward by the default step.
  pub fn forward(&self) {
    self.forward_by(DEFAULT_SEEK_SECONDS);
  }

  /// Seek forward by `seconds`. Not validated; a non-finite value reaches the
  /// player as `null`.
  pub fn forward_by(&self, seconds: f64) {
    self.send_command("forward", Some(json!({ "duration": seconds })));
  }

  /// Send `action` and resolve with the `data` of the next `{type: action}`
  /// reply, decoded into `T`.
  ///
  /// The request is registered before this returns, so a reply delivered
  /// before the future is first polled still resolves it. Without a
  /// configured timeout the future waits forever.
  pub fn request_video_data<T>(
    &self,
    action: &str,
  ) -> impl Future<Output = Result<T, PlayerError>> + Send + 'static
  where
    T: DeserializeOwned + 'static,
  {
    let action = action.to_string();
    let timeout = self.request_timeout;
    let shared = Arc::downgrade(&self.shared);
    let reply = {
      let mut state = self.shared.state.lock();
      (!state.closed).then(|| state.requests.register(&action))
    };
    if reply.is_some() {
      self.send_command(&action, None);
    }

    async move {
      let reply = reply.ok_or(PlayerError::Closed)?;
      let data = match timeout {
        None => reply.await.map_err(|_| PlayerError::Closed)?,
        Some(limit) => match tokio::time::timeout(limit, reply).await {
          Ok(data) => data.map_err(|_| PlayerError::Closed)?,
          Err(_) => {
            if let Some(shared) = shared.upgrade() {
              shared.state.lock().requests.prune(&action);
            }
            log::warn!("No reply to {} within {:?}", action, limit);
            return Err(PlayerError::Timeout {
              action,
              timeout: limit,
            });
          }
        },
      };
      serde_json::from_value(data).map_err(|source| PlayerError::Decode { action, source })
    }
  }

  /// Generic video information; the shape is player-defined.
  pub fn get_video_infos<T>(&self) -> impl Future<Output = Result<T, PlayerError>> + Send + 'static
  where
    T: DeserializeOwned + 'static,
  {
    self.request_video_data("getVideoInfos")
  }

  /// Current playback position in seconds.
  pub fn get_current_time(
    &self,
  ) -> impl Future<Output = Result<f64, PlayerError>> + Send + 'static {
    self.request_video_data("getCurrentTime")
  }

  pub fn get_loop(&self) -> impl Future<Output = Result<bool, PlayerError>> + Send + 'static {
    self.request_video_data("getLoop")
  }

  /// Current volume (0-1).
  pub fn get_sound(&self) -> impl Future<Output = Result<f64, PlayerError>> + Send + 'static {
    self.request_video_data("getSound")
  }

  pub fn get_quality(&self) -> impl Future<Output = Result<String, PlayerError>> + Send + 'static {
    self.request_video_data("getQuality")
  }

  pub fn get_qualities(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, PlayerError>> + Send + 'static {
    self.request_video_data("getQualities")
  }

  pub fn is_fullscreen(&self) -> impl Future<Output = Result<bool, PlayerError>> + Send + 'static {
    self.request_video_data("isFullscreen")
  }

  /// Detach from the iframe and the host window. Pending requests fail with
  /// [`PlayerError::Closed`]; later commands are dropped. Idempotent.
  pub fn close(&self) {
    // Listeners and callbacks may own client handles whose drop locks the
    // state again, so they are released after the guard.
    let released = {
      let mut state = self.shared.state.lock();
      if state.closed {
        return;
      }
      state.closed = true;
      state.pending_subscriptions.clear();
      state.requests.clear();
      (
        state.listeners.take_all(),
        std::mem::take(&mut state.ready_callbacks),
      )
    };
    drop(released);

    self.window.remove_message_listener(self.listener_id);
    self.shared.element.set_load_hook(None);
    log::info!("Player client closed");
  }
}

impl Drop for PlayerClient {
  fn drop(&mut self) {
    self.close();
  }
}
