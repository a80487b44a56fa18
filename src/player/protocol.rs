//! Message shapes exchanged with the embedded player.
//!
//! Outbound control messages carry a `type` field; commands carry `action`
//! and `data`. Everything inbound is `{type, data}`.

use serde::Serialize;
use serde_json::Value;

/// Inbound readiness announcement.
pub const IFRAME_READY: &str = "IFRAME_READY";

/// Control message sent to the player (handshake and announcements).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Control {
  /// Liveness probe sent once the iframe has loaded.
  #[serde(rename = "CHECK_READY")]
  CheckReady,
  #[serde(rename = "subscribe")]
  Subscribe {
    #[serde(rename = "eventName")]
    event_name: String,
  },
  #[serde(rename = "unsubscribe")]
  Unsubscribe {
    #[serde(rename = "eventName")]
    event_name: String,
  },
}

/// Command sent to the player. Also used for data requests, where `action`
/// doubles as the key the reply is matched on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
  pub action: String,
  pub data: Option<Value>,
}

impl Command {
  pub fn new(action: impl Into<String>, data: Option<Value>) -> Self {
    Self {
      action: action.into(),
      data,
    }
  }

  /// Command without payload.
  pub fn bare(action: impl Into<String>) -> Self {
    Self::new(action, None)
  }
}

/// Anything the client posts to the embedded window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
  Control(Control),
  Command(Command),
}

impl Outbound {
  /// Structured payload handed to the embed target.
  pub fn to_value(&self) -> Value {
    // Serializing these shapes into a Value cannot fail: every key is a string.
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

impl From<Control> for Outbound {
  fn from(control: Control) -> Self {
    Outbound::Control(control)
  }
}

impl From<Command> for Outbound {
  fn from(command: Command) -> Self {
    Outbound::Command(command)
  }
}

/// Message received from the player, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
  /// `{type: "IFRAME_READY"}`.
  Ready,
  /// `{type: <name>, data: <payload>}`: an event or a reply to a data request.
  Named { name: String, data: Value },
  /// A `data` field without a usable `type`. Ignored.
  Untyped,
  /// Neither `type` nor `data`. Ignored.
  Empty,
}

impl Inbound {
  /// Classify a raw message payload.
  pub fn parse(payload: &Value) -> Self {
    let name = payload
      .get("type")
      .and_then(Value::as_str)
      .filter(|name| !name.is_empty());
    let data = payload.get("data").filter(|data| !data.is_null());

    match (name, data) {
      (Some(IFRAME_READY), _) => Inbound::Ready,
      (Some(name), data) => Inbound::Named {
        name: name.to_string(),
        data: data.cloned().unwrap_or(Value::Null),
      },
      (None, Some(_)) => Inbound::Untyped,
      (None, None) => Inbound::Empty,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_control_serialization() {
    assert_eq!(
      Outbound::from(Control::CheckReady).to_value(),
      json!({"type": "CHECK_READY"})
    );
    assert_eq!(
      Outbound::from(Control::Subscribe {
        event_name: "play".into()
      })
      .to_value(),
      json!({"type": "subscribe", "eventName": "play"})
    );
    assert_eq!(
      Outbound::from(Control::Unsubscribe {
        event_name: "play".into()
      })
      .to_value(),
      json!({"type": "unsubscribe", "eventName": "play"})
    );
  }

  #[test]
  fn test_command_serialization_keeps_null_data() {
    assert_eq!(
      Outbound::from(Command::bare("play")).to_value(),
      json!({"action": "play", "data": null})
    );
    assert_eq!(
      Outbound::from(Command::new("setSound", Some(json!({"volume": 0.8})))).to_value(),
      json!({"action": "setSound", "data": {"volume": 0.8}})
    );
  }

  #[test]
  fn test_inbound_parsing() {
    assert_eq!(Inbound::parse(&json!({"type": "IFRAME_READY"})), Inbound::Ready);
    assert_eq!(
      Inbound::parse(&json!({"type": "getCurrentTime", "data": 42})),
      Inbound::Named {
        name: "getCurrentTime".into(),
        data: json!(42)
      }
    );
    assert_eq!(
      Inbound::parse(&json!({"type": "ended"})),
      Inbound::Named {
        name: "ended".into(),
        data: Value::Null
      }
    );
    assert_eq!(Inbound::parse(&json!({"data": {}})), Inbound::Untyped);
    assert_eq!(Inbound::parse(&json!({"type": 3, "data": 1})), Inbound::Untyped);
  }

  #[test]
  fn test_inbound_without_shape_is_empty() {
    assert_eq!(Inbound::parse(&Value::Null), Inbound::Empty);
    assert_eq!(Inbound::parse(&json!({})), Inbound::Empty);
    assert_eq!(Inbound::parse(&json!("hello")), Inbound::Empty);
    assert_eq!(Inbound::parse(&json!({"type": "", "data": null})), Inbound::Empty);
  }
}
