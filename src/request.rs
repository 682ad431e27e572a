//! Resource request model and category classification.

use url::Url;

/// How a request was issued by the application shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level page load.
  Navigate,
  /// Any other resource fetch (script, stylesheet, image, audio, ...).
  Subresource,
}

/// Request method. Only reads are routed through the cache.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Head,
  Post,
}

impl Method {
  /// Whether this method is a cache-eligible read.
  pub fn is_read(self) -> bool {
    matches!(self, Method::Get | Method::Head)
  }
}

/// An outbound resource request intercepted on behalf of the shell.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
  url: Url,
  mode: RequestMode,
  method: Method,
}

impl ResourceRequest {
  pub fn new(url: Url, mode: RequestMode, method: Method) -> Self {
    Self { url, mode, method }
  }

  /// A GET request for a top-level page load.
  pub fn navigation(url: Url) -> Self {
    Self::new(url, RequestMode::Navigate, Method::Get)
  }

  /// A GET request for any non-navigation resource.
  pub fn subresource(url: Url) -> Self {
    Self::new(url, RequestMode::Subresource, Method::Get)
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  pub fn mode(&self) -> RequestMode {
    self.mode
  }

  pub fn method(&self) -> Method {
    self.method
  }

  /// Cache identity of this request.
  ///
  /// The app is single-origin, so the URL path alone identifies a resource.
  pub fn key(&self) -> &str {
    self.url.path()
  }
}

/// Closed set of routing categories, checked in this priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCategory {
  /// Sound assets: narration clips and effect files.
  Audio,
  /// Top-level page loads.
  Navigation,
  /// Script and stylesheet assets.
  ScriptOrStyle,
  /// Everything else: icons, the app manifest, unclassified statics.
  Other,
}

impl RequestCategory {
  /// Classify a request by URL shape alone.
  ///
  /// The server-declared content type is deliberately not consulted.
  pub fn classify(request: &ResourceRequest) -> Self {
    let path = request.url().path();

    if path.contains("/sounds/") {
      RequestCategory::Audio
    } else if request.mode() == RequestMode::Navigate {
      RequestCategory::Navigation
    } else if path.ends_with(".js") || path.ends_with(".css") {
      RequestCategory::ScriptOrStyle
    } else {
      RequestCategory::Other
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(path: &str) -> Url {
    Url::parse("http://localhost:5173").unwrap().join(path).unwrap()
  }

  #[test]
  fn test_audio_classification() {
    let request = ResourceRequest::subresource(url("/sounds/numbers/5.mp3"));
    assert_eq!(RequestCategory::classify(&request), RequestCategory::Audio);

    let request = ResourceRequest::subresource(url("/sounds/effects/correct.mp3"));
    assert_eq!(RequestCategory::classify(&request), RequestCategory::Audio);
  }

  #[test]
  fn test_audio_takes_priority_over_navigation() {
    // A navigation whose path points at a sound asset still routes as audio.
    let request = ResourceRequest::navigation(url("/sounds/numbers/1.mp3"));
    assert_eq!(RequestCategory::classify(&request), RequestCategory::Audio);
  }

  #[test]
  fn test_navigation_classification() {
    let request = ResourceRequest::navigation(url("/"));
    assert_eq!(RequestCategory::classify(&request), RequestCategory::Navigation);

    let request = ResourceRequest::navigation(url("/index.html"));
    assert_eq!(RequestCategory::classify(&request), RequestCategory::Navigation);
  }

  #[test]
  fn test_script_and_style_classification() {
    let request = ResourceRequest::subresource(url("/assets/index.js"));
    assert_eq!(
      RequestCategory::classify(&request),
      RequestCategory::ScriptOrStyle
    );

    let request = ResourceRequest::subresource(url("/assets/index.css"));
    assert_eq!(
      RequestCategory::classify(&request),
      RequestCategory::ScriptOrStyle
    );
  }

  #[test]
  fn test_default_classification() {
    for path in ["/icon.svg", "/manifest.json", "/images/card.png"] {
      let request = ResourceRequest::subresource(url(path));
      assert_eq!(RequestCategory::classify(&request), RequestCategory::Other);
    }
  }

  #[test]
  fn test_key_is_url_path() {
    let request = ResourceRequest::subresource(url("/sounds/numbers/5.mp3"));
    assert_eq!(request.key(), "/sounds/numbers/5.mp3");

    let request = ResourceRequest::navigation(url("/"));
    assert_eq!(request.key(), "/");
  }

  #[test]
  fn test_only_reads_are_cache_eligible() {
    assert!(Method::Get.is_read());
    assert!(Method::Head.is_read());
    assert!(!Method::Post.is_read());
  }
}
