//! Player client error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when driving the embedded player.
#[derive(Debug, Error)]
pub enum PlayerError {
  /// The element handed to the client is not an iframe.
  #[error("Element must be an iframe, got <{0}>")]
  NotAnIframe(String),

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  /// Volume outside `[0, 1]` or not finite.
  #[error("Volume must be a number between 0 and 1, got {0}")]
  VolumeOutOfRange(f64),

  #[error("Invalid options: {0}")]
  InvalidOptions(String),

  /// The reply to a data request could not be decoded into the expected type.
  #[error("Failed to decode reply to {action}: {source}")]
  Decode {
    action: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("No reply to {action} within {timeout:?}")]
  Timeout { action: String, timeout: Duration },

  #[error("Player client closed")]
  Closed,
}
