//! Network fetch primitive used by the cache controller.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::cache::ResponseSnapshot;
use crate::request::{Method, ResourceRequest};

/// Trait for the outbound network capability.
///
/// An HTTP error status is still a successful fetch and comes back as a
/// snapshot; implementations return `Err` only for transport failures (DNS,
/// refused connection, timeout).
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
  async fn fetch(&self, request: &ResourceRequest) -> Result<ResponseSnapshot>;
}

#[async_trait]
impl<F: NetworkFetcher> NetworkFetcher for Arc<F> {
  async fn fetch(&self, request: &ResourceRequest) -> Result<ResponseSnapshot> {
    (**self).fetch(request).await
  }
}

/// Fetcher backed by a shared reqwest client.
///
/// Timeouts and cancellation are left to the transport; this layer adds none.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
  async fn fetch(&self, request: &ResourceRequest) -> Result<ResponseSnapshot> {
    let method = match request.method() {
      Method::Get => reqwest::Method::GET,
      Method::Head => reqwest::Method::HEAD,
      Method::Post => reqwest::Method::POST,
    };

    let response = self
      .client
      .request(method, request.url().clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url(), e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .map(|(name, value)| {
        (
          name.as_str().to_string(),
          String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url(), e))?
      .to_vec();

    Ok(ResponseSnapshot::new(status, headers, body))
  }
}
