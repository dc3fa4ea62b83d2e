//! Error type for Confluence API operations.

use std::error::Error as StdError;
use std::fmt;
use std::path::Path;

use serde_json::Value;

/// Boxed underlying cause.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used throughout the Confluence module.
pub type Result<T> = std::result::Result<T, ConfluenceError>;

/// Broad classification of a Confluence failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// The page or attachment does not exist (HTTP 404).
  RemoteNotFound,
  /// The supplied version is stale (HTTP 409).
  VersionConflict,
  /// Connection failure, timeout or server error (HTTP 5xx).
  TransportFailure,
  /// Any other client error, e.g. bad credentials or permissions.
  Rejected,
  /// A success response whose body could not be understood.
  InvalidResponse,
  /// A local attachment file could not be read.
  LocalFile,
  /// The client configuration is unusable.
  ValidationFailure,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      ErrorKind::RemoteNotFound => "not found",
      ErrorKind::VersionConflict => "version conflict",
      ErrorKind::TransportFailure => "transport failure",
      ErrorKind::Rejected => "request rejected",
      ErrorKind::InvalidResponse => "invalid response",
      ErrorKind::LocalFile => "local file error",
      ErrorKind::ValidationFailure => "invalid configuration",
    };
    f.write_str(label)
  }
}

/// Error from a Confluence API operation.
#[derive(Debug, thiserror::Error)]
#[error("{kind}{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct ConfluenceError {
  /// Classification used by callers to decide how to react.
  pub kind: ErrorKind,
  /// HTTP status code, when the server answered.
  pub status: Option<u16>,
  /// Server-supplied message, or a description of the local failure.
  pub message: String,
  /// Request body that was sent, for diagnostics.
  pub payload: Option<Value>,
  #[source]
  source: Option<BoxError>,
}

impl ConfluenceError {
  fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      status: None,
      message: message.into(),
      payload: None,
      source: None,
    }
  }

  /// Classify a non-success HTTP response.
  ///
  /// # Arguments
  /// * `status` - HTTP status code returned by the server.
  /// * `body` - Raw response body; its JSON `message` field is preferred when
  ///   present.
  /// * `payload` - Request body that was sent, if any.
  pub fn from_status(status: u16, body: &str, payload: Option<Value>) -> Self {
    let kind = match status {
      404 => ErrorKind::RemoteNotFound,
      409 => ErrorKind::VersionConflict,
      500.. => ErrorKind::TransportFailure,
      _ => ErrorKind::Rejected,
    };

    Self {
      status: Some(status),
      payload,
      ..Self::new(kind, response_message(body))
    }
  }

  /// Request could not be sent or no response was received.
  pub fn transport(context: impl fmt::Display, source: reqwest::Error) -> Self {
    Self::new(ErrorKind::TransportFailure, format!("{context}: {source}")).with_source(source)
  }

  /// Response body could not be decoded.
  pub fn invalid_response(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InvalidResponse, message)
  }

  /// Attachment file could not be read.
  pub fn local_file(path: &Path, source: std::io::Error) -> Self {
    Self::new(ErrorKind::LocalFile, format!("Failed to read {}: {source}", path.display())).with_source(source)
  }

  /// Configuration rejected before any request was made.
  pub fn validation(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::ValidationFailure, message)
  }

  /// Attach an underlying cause.
  pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
    self.source = Some(source.into());
    self
  }

  /// Attach the request body that triggered the error.
  pub fn with_payload(mut self, payload: Value) -> Self {
    self.payload = Some(payload);
    self
  }

  /// Whether the remote resource does not exist.
  pub fn is_not_found(&self) -> bool {
    self.kind == ErrorKind::RemoteNotFound
  }
}

/// Pull the human-readable message out of a Confluence error body.
fn response_message(body: &str) -> String {
  let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
    value
      .get("message")
      .and_then(Value::as_str)
      .map(str::to_string)
  });

  match from_json {
    Some(message) => message,
    None if body.trim().is_empty() => String::from("(no error details)"),
    None => body.trim().to_string(),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_from_status_classifies() {
    assert_eq!(ConfluenceError::from_status(404, "", None).kind, ErrorKind::RemoteNotFound);
    assert_eq!(ConfluenceError::from_status(409, "", None).kind, ErrorKind::VersionConflict);
    assert_eq!(ConfluenceError::from_status(500, "", None).kind, ErrorKind::TransportFailure);
    assert_eq!(ConfluenceError::from_status(503, "", None).kind, ErrorKind::TransportFailure);
    assert_eq!(ConfluenceError::from_status(401, "", None).kind, ErrorKind::Rejected);
    assert_eq!(ConfluenceError::from_status(400, "", None).kind, ErrorKind::Rejected);
  }

  #[test]
  fn test_message_prefers_json_message_field() {
    let body = r#"{"statusCode":409,"message":"Version must be incremented on update. Current version is: 4"}"#;
    let error = ConfluenceError::from_status(409, body, Some(json!({"id": "1"})));

    assert_eq!(error.status, Some(409));
    assert_eq!(error.message, "Version must be incremented on update. Current version is: 4");
    assert_eq!(error.payload, Some(json!({"id": "1"})));
    assert_eq!(
      error.to_string(),
      "version conflict (HTTP 409): Version must be incremented on update. Current version is: 4"
    );
  }

  #[test]
  fn test_message_falls_back_to_raw_body() {
    assert_eq!(ConfluenceError::from_status(502, " Bad Gateway \n", None).message, "Bad Gateway");
    assert_eq!(ConfluenceError::from_status(500, "", None).message, "(no error details)");
  }

  #[test]
  fn test_local_errors_have_no_status() {
    let error = ConfluenceError::local_file(
      Path::new("/vault/missing.png"),
      std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
    );
    assert_eq!(error.kind, ErrorKind::LocalFile);
    assert_eq!(error.status, None);
    assert!(error.source().is_some());
    assert!(error.to_string().starts_with("local file error: Failed to read /vault/missing.png"));
  }
}
