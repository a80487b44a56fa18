//! Matches inbound replies to pending data requests.
//!
//! Replies carry no request id, only the action name they answer, so
//! requests for the same action are answered first-in first-out.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tokio::sync::oneshot;

/// Pending request waiting for its reply.
type PendingRequest = oneshot::Sender<Value>;

#[derive(Debug, Default)]
pub(crate) struct Correlator {
  pending: HashMap<String, VecDeque<PendingRequest>>,
}

impl Correlator {
  /// Register interest in the next reply to `action`. Requests whose caller
  /// already stopped waiting are dropped first.
  pub fn register(&mut self, action: &str) -> oneshot::Receiver<Value> {
    let (tx, rx) = oneshot::channel();
    let queue = self.pending.entry(action.to_string()).or_default();
    queue.retain(|tx| !tx.is_closed());
    queue.push_back(tx);
    rx
  }

  /// Hand `data` to the oldest live request for `name`. Gives the data back
  /// when nobody was waiting, so the caller can dispatch it as an event.
  pub fn resolve(&mut self, name: &str, data: Value) -> Option<Value> {
    let Some(queue) = self.pending.get_mut(name) else {
      return Some(data);
    };

    let mut data = data;
    while let Some(tx) = queue.pop_front() {
      match tx.send(data) {
        Ok(()) => {
          if queue.is_empty() {
            self.pending.remove(name);
          }
          log::debug!("Resolved pending {} request", name);
          return None;
        }
        // Caller gave up on this one (dropped or timed out); try the next.
        Err(returned) => data = returned,
      }
    }

    self.pending.remove(name);
    Some(data)
  }

  /// Forget requests whose caller stopped waiting.
  pub fn prune(&mut self, name: &str) {
    if let Some(queue) = self.pending.get_mut(name) {
      queue.retain(|tx| !tx.is_closed());
      if queue.is_empty() {
        self.pending.remove(name);
      }
    }
  }

  #[cfg(test)]
  pub fn pending_count(&self, name: &str) -> usize {
    self.pending.get(name).map_or(0, VecDeque::len)
  }

  /// Drop every pending request; their receivers observe a closed channel.
  pub fn clear(&mut self) {
    self.pending.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_unmatched_reply_is_handed_back() {
    let mut correlator = Correlator::default();
    assert_eq!(
      correlator.resolve("getLoop", json!(true)),
      Some(json!(true))
    );
  }

  #[test]
  fn test_reply_resolves_oldest_request_first() {
    let mut correlator = Correlator::default();
    let mut first = correlator.register("getCurrentTime");
    let mut second = correlator.register("getCurrentTime");
    assert_eq!(correlator.pending_count("getCurrentTime"), 2);

    assert_eq!(correlator.resolve("getCurrentTime", json!(1.5)), None);
    assert_eq!(first.try_recv().unwrap(), json!(1.5));
    assert!(second.try_recv().is_err());

    assert_eq!(correlator.resolve("getCurrentTime", json!(3.0)), None);
    assert_eq!(second.try_recv().unwrap(), json!(3.0));
    assert_eq!(correlator.pending_count("getCurrentTime"), 0);
  }

  #[test]
  fn test_abandoned_request_is_skipped() {
    let mut correlator = Correlator::default();
    let abandoned = correlator.register("getSound");
    let mut live = correlator.register("getSound");
    drop(abandoned);

    assert_eq!(correlator.resolve("getSound", json!(0.4)), None);
    assert_eq!(live.try_recv().unwrap(), json!(0.4));
  }

  #[test]
  fn test_reply_falls_through_when_all_abandoned() {
    let mut correlator = Correlator::default();
    drop(correlator.register("getQuality"));

    assert_eq!(
      correlator.resolve("getQuality", json!("720p")),
      Some(json!("720p"))
    );
    assert_eq!(correlator.pending_count("getQuality"), 0);
  }

  #[test]
  fn test_register_drops_abandoned_requests() {
    let mut correlator = Correlator::default();
    for _ in 0..1000 {
      drop(correlator.register("getCurrentTime"));
    }
    assert_eq!(correlator.pending_count("getCurrentTime"), 1);

    let mut live = correlator.register("getCurrentTime");
    assert_eq!(correlator.pending_count("getCurrentTime"), 1);
    assert_eq!(correlator.resolve("getCurrentTime", json!(9)), None);
    assert_eq!(live.try_recv().unwrap(), json!(9));
  }

  #[test]
  fn test_prune_and_clear() {
    let mut correlator = Correlator::default();
    drop(correlator.register("isFullscreen"));
    let mut kept = correlator.register("getLoop");

    correlator.prune("isFullscreen");
    assert_eq!(correlator.pending_count("isFullscreen"), 0);
    assert_eq!(correlator.pending_count("getLoop"), 1);

    correlator.clear();
    assert!(matches!(
      kept.try_recv(),
      Err(oneshot::error::TryRecvError::Closed)
    ));
  }
}
