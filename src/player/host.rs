//! Host-side plumbing: the embedded frame and the window message bus.
//!
//! The client never touches a browser directly. An embedder implements
//! [`EmbedTarget`] for its iframe element and either implements
//! [`HostWindow`] or forwards its `message` events into a [`WindowBus`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Hook fired when the embedded document finishes loading.
pub type LoadHook = Arc<dyn Fn() + Send + Sync>;

/// Listener for window `message` events.
pub type MessageHandler = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// The iframe-like element hosting the remote player.
pub trait EmbedTarget: Send + Sync {
  /// Lowercase or uppercase tag name; only `iframe` is accepted by the client.
  fn tag_name(&self) -> &str;

  /// Install (or with `None`, remove) the load hook.
  fn set_load_hook(&self, hook: Option<LoadHook>);

  /// Post a structured message to the content window, restricted to
  /// `target_origin`. Returns false when there is no content window to post
  /// to, in which case the message is dropped.
  fn post_message(&self, message: Value, target_origin: &str) -> bool;
}

/// A message delivered to the host window.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
  pub origin: String,
  pub data: Value,
}

impl MessageEvent {
  pub fn new(origin: impl Into<String>, data: Value) -> Self {
    Self {
      origin: origin.into(),
      data,
    }
  }
}

/// Handle to a registered message listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The host window's message bus.
pub trait HostWindow: Send + Sync {
  fn add_message_listener(&self, handler: MessageHandler) -> ListenerId;
  fn remove_message_listener(&self, id: ListenerId);
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
  ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::SeqCst))
}

/// In-process message bus delivering events to listeners in registration order.
#[derive(Default)]
pub struct WindowBus {
  listeners: Mutex<Vec<(ListenerId, MessageHandler)>>,
}

impl WindowBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Deliver one message to every listener registered at the time of the call.
  pub fn dispatch(&self, event: &MessageEvent) {
    // Snapshot so handlers can add or remove listeners while we iterate.
    let handlers: Vec<MessageHandler> = self
      .listeners
      .lock()
      .iter()
      .map(|(_, handler)| handler.clone())
      .collect();

    for handler in handlers {
      handler(event);
    }
  }

  /// Convenience for `dispatch(&MessageEvent::new(origin, data))`.
  pub fn post(&self, origin: &str, data: Value) {
    self.dispatch(&MessageEvent::new(origin, data));
  }

  pub fn listener_count(&self) -> usize {
    self.listeners.lock().len()
  }
}

impl HostWindow for WindowBus {
  fn add_message_listener(&self, handler: MessageHandler) -> ListenerId {
    let id = next_listener_id();
    self.listeners.lock().push((id, handler));
    id
  }

  fn remove_message_listener(&self, id: ListenerId) {
    self.listeners.lock().retain(|(existing, _)| *existing != id);
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::atomic::AtomicUsize;

  #[test]
  fn test_bus_delivers_in_registration_order() {
    let bus = WindowBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
      let seen = seen.clone();
      bus.add_message_listener(Arc::new(move |event: &MessageEvent| {
        seen.lock().push((tag, event.data.clone()));
      }));
    }

    bus.post("*", json!({"type": "play"}));
    assert_eq!(
      *seen.lock(),
      vec![
        ("first", json!({"type": "play"})),
        ("second", json!({"type": "play"}))
      ]
    );
  }

  #[test]
  fn test_bus_listener_can_remove_itself() {
    let bus = Arc::new(WindowBus::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

    let handler_bus = bus.clone();
    let handler_calls = calls.clone();
    let handler_slot = slot.clone();
    let id = bus.add_message_listener(Arc::new(move |_: &MessageEvent| {
      handler_calls.fetch_add(1, Ordering::SeqCst);
      if let Some(id) = handler_slot.lock().take() {
        handler_bus.remove_message_listener(id);
      }
    }));
    *slot.lock() = Some(id);

    bus.post("*", json!({}));
    bus.post("*", json!({}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(bus.listener_count(), 0);
  }
}
