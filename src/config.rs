//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Origin value meaning "any origin": no inbound check, no outbound restriction.
pub const ANY_ORIGIN: &str = "*";

/// Options accepted by [`crate::PlayerClient::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
  /// Allowed origin of the embedded player (`"*"` = no check).
  #[serde(default = "default_origin")]
  pub origin: String,

  /// Upper bound on how long a data request waits for its reply, in
  /// milliseconds (None = wait forever).
  #[serde(default)]
  pub request_timeout_ms: Option<u64>,
}

fn default_origin() -> String {
  ANY_ORIGIN.to_string()
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      request_timeout_ms: None,
    }
  }
}

impl ClientOptions {
  /// Options restricted to a single origin.
  pub fn with_origin(origin: impl Into<String>) -> Self {
    Self {
      origin: origin.into(),
      ..Self::default()
    }
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.origin.chars().any(char::is_whitespace) {
      return Err(format!("Origin cannot contain whitespace: {:?}", self.origin));
    }
    if self.request_timeout_ms == Some(0) {
      return Err("Request timeout must be at least 1 millisecond".to_string());
    }
    Ok(())
  }

  /// Effective origin; an empty value falls back to the wildcard.
  pub(crate) fn effective_origin(&self) -> Origin {
    match self.origin.as_str() {
      "" | ANY_ORIGIN => Origin::Any,
      origin => Origin::Exact(origin.to_string()),
    }
  }

  pub(crate) fn request_timeout(&self) -> Option<Duration> {
    self.request_timeout_ms.map(Duration::from_millis)
  }
}

/// Origin allow-list applied to both directions of the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
  Any,
  Exact(String),
}

impl Origin {
  /// Target origin string used for outbound messages.
  pub fn as_str(&self) -> &str {
    match self {
      Origin::Any => ANY_ORIGIN,
      Origin::Exact(origin) => origin,
    }
  }

  /// Whether an inbound message from `origin` may be processed.
  pub fn allows(&self, origin: &str) -> bool {
    match self {
      Origin::Any => true,
      Origin::Exact(expected) => expected == origin,
    }
  }
}
