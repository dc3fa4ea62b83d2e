//! HTTP client implementation for talking to the Confluence REST API.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

use super::api::ConfluenceApi;
use super::error::{ConfluenceError, Result};
use super::models::{Attachment, AttachmentUpdateRequest, AttachmentsResponse, Page, PageDefaults, UserInfo};
use crate::config::PublisherConfig;

/// Path prefix of the content REST API.
const CONTENT_API: &str = "/wiki/rest/api/content";

/// Confluence API client.
#[derive(Clone)]
pub struct ConfluenceClient {
  base_url: String,
  username: String,
  token: String,
  defaults: Arc<PageDefaults>,
  client: reqwest::Client,
  rate_limiter: Arc<RequestRateLimiter>,
}

/// Simple fixed-window rate limiter to cap the number of requests per interval.
#[derive(Debug)]
struct RequestRateLimiter {
  max_requests: usize,
  window: Duration,
  timestamps: Mutex<VecDeque<Instant>>,
}

impl RequestRateLimiter {
  fn new(max_requests: usize, window: Duration) -> Self {
    Self {
      max_requests,
      window,
      timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
    }
  }

  /// Wait until the caller can perform another request without exceeding the
  /// rate limit.
  async fn acquire(&self) {
    loop {
      let mut timestamps = self.timestamps.lock().await;
      let now = Instant::now();

      while let Some(earliest) = timestamps.front()
        && now.duration_since(*earliest) >= self.window
      {
        timestamps.pop_front();
      }

      let earliest = match timestamps.front().copied() {
        Some(earliest) if timestamps.len() >= self.max_requests => earliest,
        _ => {
          timestamps.push_back(now);
          return;
        }
      };

      let wait_duration = self.window.saturating_sub(now.duration_since(earliest));
      drop(timestamps);

      if !wait_duration.is_zero() {
        sleep(wait_duration).await;
      }
    }
  }
}

impl ConfluenceClient {
  /// Create a new Confluence client.
  ///
  /// # Arguments
  /// * `base_url` - The base URL of the Confluence instance (e.g., https://example.atlassian.net)
  /// * `username` - The user's email address
  /// * `token` - The API token or password
  /// * `defaults` - Space and parent page applied to every page write
  /// * `timeout_secs` - Request timeout in seconds
  /// * `rate_limit` - Maximum requests per second
  ///
  /// # Errors
  /// Returns a `ValidationFailure` if the rate limit is zero, or a
  /// `TransportFailure` if the underlying `reqwest::Client` cannot be built.
  pub fn new(
    base_url: impl Into<String>,
    username: impl Into<String>,
    token: impl Into<String>,
    defaults: PageDefaults,
    timeout_secs: u64,
    rate_limit: usize,
  ) -> Result<Self> {
    if rate_limit == 0 {
      return Err(ConfluenceError::validation(
        "Rate limit must be at least 1 request per second",
      ));
    }

    let base_url = base_url.into().trim_end_matches('/').to_string();

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .user_agent(format!(
        "confluence-publish/{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("TARGET")
      ))
      .build()
      .map_err(|err| ConfluenceError::transport("Failed to create HTTP client", err))?;

    Ok(Self {
      base_url,
      username: username.into(),
      token: token.into(),
      defaults: Arc::new(defaults),
      client,
      rate_limiter: Arc::new(RequestRateLimiter::new(rate_limit, Duration::from_secs(1))),
    })
  }

  /// Create a client from validated publisher configuration.
  pub fn from_config(config: &PublisherConfig) -> Result<Self> {
    config.validate()?;
    Self::new(
      &config.base_url,
      &config.username,
      &config.password,
      config.page_defaults(),
      config.timeout_secs,
      config.rate_limit,
    )
  }

  /// Base URL requests are sent to.
  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Fetch the profile of the authenticated user.
  ///
  /// Used to confirm that the configured credentials are accepted.
  pub async fn current_user(&self) -> Result<UserInfo> {
    let url = format!("{}/wiki/rest/api/user/current", self.base_url);
    self.send(self.client.get(url), None).await
  }

  /// Get the authorization header value (Basic auth).
  fn auth_header(&self) -> String {
    let credentials = format!("{}:{}", self.username, self.token);
    format!("Basic {}", BASE64.encode(credentials.as_bytes()))
  }

  fn content_url(&self, path: &str) -> String {
    format!("{}{CONTENT_API}{path}", self.base_url)
  }

  /// Send a JSON body with `method` and decode the JSON response.
  async fn send_json<B, T>(&self, method: Method, url: String, body: &B) -> Result<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let payload = serde_json::to_value(body)
      .map_err(|err| ConfluenceError::invalid_response(format!("Failed to encode request: {err}")))?;
    debug!("{method} {url} ({} bytes)", payload.to_string().len());
    let request = self.client.request(method, url).json(&payload);
    self.send(request, Some(payload)).await
  }

  /// Apply rate limiting and authentication, send, and decode the response.
  async fn send<T>(&self, request: RequestBuilder, payload: Option<Value>) -> Result<T>
  where
    T: DeserializeOwned,
  {
    self.rate_limiter.acquire().await;

    let response = request
      .header("Authorization", self.auth_header())
      .header("Accept", "application/json")
      .send()
      .await
      .map_err(|err| ConfluenceError::transport("Failed to send request to Confluence API", err))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|err| ConfluenceError::transport("Failed to read response from Confluence API", err))?;

    if !status.is_success() {
      return Err(ConfluenceError::from_status(status.as_u16(), &body, payload));
    }

    serde_json::from_str(&body).map_err(|err| {
      let error = ConfluenceError::invalid_response(format!("Failed to parse response from Confluence API: {err}"))
        .with_source(err);
      match payload {
        Some(payload) => error.with_payload(payload),
        None => error,
      }
    })
  }
}

#[async_trait]
impl ConfluenceApi for ConfluenceClient {
  async fn get_page(&self, page_id: &str) -> Result<Page> {
    info!("Fetching page {page_id}");
    let url = self.content_url(&format!("/{page_id}?expand=version,space"));
    self.send(self.client.get(url), None).await
  }

  async fn create_page(&self, title: &str, content: &str) -> Result<Page> {
    info!("Creating page '{title}' in space {}", self.defaults.space_key());
    let request = self.defaults.create_request(title, content);
    self.send_json(Method::POST, self.content_url(""), &request).await
  }

  async fn update_page(&self, page_id: &str, title: &str, version: u64, content: &str) -> Result<Page> {
    info!("Updating page {page_id} to version {version}");
    let request = self.defaults.update_request(page_id, title, version, content);
    self
      .send_json(Method::PUT, self.content_url(&format!("/{page_id}")), &request)
      .await
  }

  async fn upload_attachment(&self, page_id: &str, title: &str, path: &Path) -> Result<Attachment> {
    let data = tokio::fs::read(path)
      .await
      .map_err(|err| ConfluenceError::local_file(path, err))?;

    let file_name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| title.to_string());

    info!("Uploading attachment '{title}' ({} bytes) to page {page_id}", data.len());

    let form = Form::new().part("file", Part::bytes(data).file_name(file_name));
    let request = self
      .client
      .put(self.content_url(&format!("/{page_id}/child/attachment")))
      .header("X-Atlassian-Token", "nocheck")
      .multipart(form);

    let uploaded: AttachmentsResponse = self.send(request, None).await?;
    let attachment = uploaded
      .results
      .into_iter()
      .next()
      .ok_or_else(|| ConfluenceError::invalid_response(format!("Empty attachment response for '{title}'")))?;

    let update = AttachmentUpdateRequest::retitle(&attachment, title);
    let url = self.content_url(&format!("/{page_id}/child/attachment/{}", attachment.id));
    self.send_json(Method::PUT, url, &update).await
  }
}
