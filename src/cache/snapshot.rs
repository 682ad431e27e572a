//! Captured copies of network responses.

/// An immutable captured copy of a network response.
///
/// Snapshots are stored wholesale under their request's identity and only ever
/// replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
  /// HTTP status code.
  pub status: u16,
  /// Response headers in arrival order.
  pub headers: Vec<(String, String)>,
  /// Raw response body.
  pub body: Vec<u8>,
}

impl ResponseSnapshot {
  pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
    Self {
      status,
      headers,
      body,
    }
  }

  /// Synthesized not-found result with a small plain-text body.
  ///
  /// Used when an uncached resource is unreachable and the category policy
  /// converts the failure into a response instead of an error.
  pub fn not_found(message: &str) -> Self {
    Self {
      status: 404,
      headers: vec![("content-type".to_string(), "text/plain".to_string())],
      body: message.as_bytes().to_vec(),
    }
  }

  /// Whether the status code counts as success (2xx).
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}
