//! Publisher configuration.

use crate::confluence::{ConfluenceError, PageDefaults};
use crate::markup::StorageOptions;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default request ceiling per second.
pub const DEFAULT_RATE_LIMIT: usize = 10;

/// Default number of attachment uploads in flight per page.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Everything needed to publish notes to one Confluence space.
///
/// Built once per run and only ever borrowed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
  /// Account used for Basic auth (usually an email address).
  pub username: String,
  /// API token or password.
  pub password: String,
  /// Site root, e.g. `https://acme.atlassian.net`.
  pub base_url: String,
  /// Key of the space pages are created in.
  pub space: String,
  /// Page new pages are created under.
  pub parent_page_id: Option<String>,
  /// Prepend the "exported from" info banner to every page.
  pub include_provenance_banner: bool,
  /// Create a fresh page when a note's stored page id no longer exists.
  pub recreate_missing_pages: bool,
  /// Request timeout in seconds.
  pub timeout_secs: u64,
  /// Maximum requests per second.
  pub rate_limit: usize,
  /// Maximum concurrent attachment uploads per page.
  pub upload_concurrency: usize,
}

impl PublisherConfig {
  /// Configuration with default limits and no optional features.
  pub fn new(
    base_url: impl Into<String>,
    username: impl Into<String>,
    password: impl Into<String>,
    space: impl Into<String>,
  ) -> Self {
    Self {
      username: username.into(),
      password: password.into(),
      base_url: base_url.into(),
      space: space.into(),
      parent_page_id: None,
      include_provenance_banner: false,
      recreate_missing_pages: false,
      timeout_secs: DEFAULT_TIMEOUT_SECS,
      rate_limit: DEFAULT_RATE_LIMIT,
      upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
    }
  }

  /// Reject configurations that cannot possibly work.
  ///
  /// # Errors
  /// Returns a `ValidationFailure` naming the first offending field.
  pub fn validate(&self) -> Result<(), ConfluenceError> {
    let required = [
      ("username", &self.username),
      ("password", &self.password),
      ("base URL", &self.base_url),
      ("space", &self.space),
    ];
    if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
      return Err(ConfluenceError::validation(format!("Confluence {name} must not be empty")));
    }

    if self.rate_limit == 0 {
      return Err(ConfluenceError::validation("Rate limit must be at least 1"));
    }
    if self.upload_concurrency == 0 {
      return Err(ConfluenceError::validation("Upload concurrency must be at least 1"));
    }
    if self.timeout_secs == 0 {
      return Err(ConfluenceError::validation("Timeout must be at least 1 second"));
    }

    Ok(())
  }

  /// Options for the storage-format rewrite.
  pub fn storage_options(&self) -> StorageOptions {
    StorageOptions {
      include_provenance_banner: self.include_provenance_banner,
    }
  }

  /// Request defaults shared by every page write.
  pub fn page_defaults(&self) -> PageDefaults {
    PageDefaults::new(&self.space, self.parent_page_id.as_deref())
  }
}
