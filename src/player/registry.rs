//! Event listener bookkeeping and dispatch.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

/// Error a listener may return; it is logged and never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type ListenerFn = dyn Fn(&Value) -> Result<(), ListenerError> + Send + Sync;

/// Callback for a named player event.
///
/// Identity is the underlying allocation: clones of one `Listener` are the
/// same listener, two `Listener::new` calls never are.
#[derive(Clone)]
pub struct Listener(Arc<ListenerFn>);

impl Listener {
  pub fn new<F>(f: F) -> Self
  where
    F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
  {
    Self(Arc::new(f))
  }

  /// Listener that cannot fail.
  pub fn infallible<F>(f: F) -> Self
  where
    F: Fn(&Value) + Send + Sync + 'static,
  {
    Self::new(move |data| {
      f(data);
      Ok(())
    })
  }

  fn call(&self, data: &Value) -> Result<(), ListenerError> {
    (self.0)(data)
  }
}

impl PartialEq for Listener {
  fn eq(&self, other: &Self) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
  }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Listener({:p})", Arc::as_ptr(&self.0))
  }
}

/// Event name to listener set. A name is present iff it has a listener.
#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
  listeners: HashMap<String, Vec<Listener>>,
}

impl ListenerRegistry {
  /// Add a listener; a listener already registered for the event is ignored.
  /// Returns true when this is the first listener for `event_name`.
  pub fn add(&mut self, event_name: &str, listener: Listener) -> bool {
    match self.listeners.get_mut(event_name) {
      Some(set) => {
        if !set.contains(&listener) {
          set.push(listener);
        }
        false
      }
      None => {
        self.listeners.insert(event_name.to_string(), vec![listener]);
        true
      }
    }
  }

  /// Remove a listener. The removed entry is handed back so the caller can
  /// drop it after releasing any lock around the registry.
  pub fn remove(&mut self, event_name: &str, listener: &Listener) -> Removal {
    let Some(set) = self.listeners.get_mut(event_name) else {
      return Removal::default();
    };
    let Some(index) = set.iter().position(|existing| existing == listener) else {
      return Removal::default();
    };
    let removed = set.remove(index);
    let emptied = set.is_empty();
    if emptied {
      self.listeners.remove(event_name);
    }
    Removal {
      listener: Some(removed),
      emptied,
    }
  }

  pub fn contains(&self, event_name: &str) -> bool {
    self.listeners.contains_key(event_name)
  }

  /// Snapshot of the listeners for an event, so dispatch runs without
  /// borrowing the registry.
  pub fn snapshot(&self, event_name: &str) -> Vec<Listener> {
    self.listeners.get(event_name).cloned().unwrap_or_default()
  }

  /// Empty the registry, handing every listener back to the caller.
  pub fn take_all(&mut self) -> HashMap<String, Vec<Listener>> {
    std::mem::take(&mut self.listeners)
  }
}

/// Outcome of [`ListenerRegistry::remove`].
#[derive(Debug, Default)]
pub(crate) struct Removal {
  pub listener: Option<Listener>,
  /// The event lost its last listener and left the registry.
  pub emptied: bool,
}

/// Invoke each listener with `data`. A listener that fails or panics is
/// logged and does not stop the others.
pub(crate) fn dispatch(event_name: &str, listeners: &[Listener], data: &Value) {
  for listener in listeners {
    match panic::catch_unwind(AssertUnwindSafe(|| listener.call(data))) {
      Ok(Ok(())) => {}
      Ok(Err(e)) => log::error!("Error in {} listener: {}", event_name, e),
      Err(payload) => log::error!(
        "Error in {} listener: panicked: {}",
        event_name,
        panic_message(payload.as_ref())
      ),
    }
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message
  } else {
    "unknown panic"
  }
}
