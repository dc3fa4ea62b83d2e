//! Fake Confluence client for testing
//!
//! Keeps pages in memory, records every call, and enforces the same version
//! rules as the real REST API so the publisher can be tested without HTTP.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use confluence_publish::confluence::error::Result;
use confluence_publish::confluence::models::{PageBody, StorageFormat};
use confluence_publish::confluence::{Attachment, ConfluenceApi, ConfluenceError, Page, Version};

/// A call made against the fake client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  GetPage(String),
  CreatePage {
    title: String,
    content: String,
  },
  UpdatePage {
    page_id: String,
    title: String,
    version: u64,
    content: String,
  },
  UploadAttachment {
    page_id: String,
    title: String,
    path: PathBuf,
  },
}

#[derive(Default)]
struct State {
  pages: HashMap<String, Page>,
  calls: Vec<Call>,
  next_id: u64,
  failing_uploads: HashSet<String>,
  update_failure: Option<u16>,
}

/// Fake Confluence client that serves pages from memory.
pub struct FakeConfluenceClient {
  state: Mutex<State>,
  upload_delay: Option<Duration>,
  uploads_in_flight: AtomicUsize,
  max_uploads_in_flight: AtomicUsize,
}

impl FakeConfluenceClient {
  /// Create an empty fake client. Created pages get ids from 1000 upwards.
  pub fn new() -> Self {
    Self {
      state: Mutex::new(State {
        next_id: 1000,
        ..State::default()
      }),
      upload_delay: None,
      uploads_in_flight: AtomicUsize::new(0),
      max_uploads_in_flight: AtomicUsize::new(0),
    }
  }

  /// Seed an existing page at `version`.
  pub fn with_page(self, id: &str, title: &str, version: u64) -> Self {
    self
      .state
      .lock()
      .unwrap()
      .pages
      .insert(id.to_string(), page(id, title, version, ""));
    self
  }

  /// Make every upload sleep, so concurrent uploads overlap.
  pub fn with_upload_delay(mut self, delay: Duration) -> Self {
    self.upload_delay = Some(delay);
    self
  }

  /// Fail uploads of the attachment titled `title` with HTTP 500.
  pub fn fail_upload(&self, title: &str) {
    self.state.lock().unwrap().failing_uploads.insert(title.to_string());
  }

  /// Fail every page update with `status`.
  pub fn fail_updates_with(&self, status: u16) {
    self.state.lock().unwrap().update_failure = Some(status);
  }

  /// Remove a page, as if someone deleted it in the UI.
  pub fn delete_page(&self, id: &str) {
    self.state.lock().unwrap().pages.remove(id);
  }

  /// Every call made so far, in order.
  pub fn calls(&self) -> Vec<Call> {
    self.state.lock().unwrap().calls.clone()
  }

  /// Titles passed to `create_page`.
  pub fn created_titles(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        Call::CreatePage { title, .. } => Some(title),
        _ => None,
      })
      .collect()
  }

  /// `(title, path)` of every upload attempt.
  pub fn uploads(&self) -> Vec<(String, PathBuf)> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        Call::UploadAttachment { title, path, .. } => Some((title, path)),
        _ => None,
      })
      .collect()
  }

  /// `(version, content)` of every page update.
  pub fn updates(&self) -> Vec<(u64, String)> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        Call::UpdatePage { version, content, .. } => Some((version, content)),
        _ => None,
      })
      .collect()
  }

  /// Current copy of a page.
  pub fn page(&self, id: &str) -> Option<Page> {
    self.state.lock().unwrap().pages.get(id).cloned()
  }

  /// Highest number of uploads that were running at the same time.
  pub fn max_concurrent_uploads(&self) -> usize {
    self.max_uploads_in_flight.load(Ordering::SeqCst)
  }

  fn record(&self, call: Call) {
    self.state.lock().unwrap().calls.push(call);
  }
}

impl Default for FakeConfluenceClient {
  fn default() -> Self {
    Self::new()
  }
}

fn page(id: &str, title: &str, version: u64, content: &str) -> Page {
  Page {
    id: id.to_string(),
    title: title.to_string(),
    page_type: "page".to_string(),
    status: "current".to_string(),
    version: Some(Version::write(version, false)),
    space: None,
    ancestors: None,
    body: Some(PageBody {
      storage: Some(StorageFormat::new(content)),
    }),
    links: None,
  }
}

fn not_found(id: &str) -> ConfluenceError {
  ConfluenceError::from_status(
    404,
    &format!(r#"{{"statusCode":404,"message":"No content found with id: ContentId{{id={id}}}"}}"#),
    None,
  )
}

#[async_trait]
impl ConfluenceApi for FakeConfluenceClient {
  async fn get_page(&self, page_id: &str) -> Result<Page> {
    self.record(Call::GetPage(page_id.to_string()));
    self.page(page_id).ok_or_else(|| not_found(page_id))
  }

  async fn create_page(&self, title: &str, content: &str) -> Result<Page> {
    self.record(Call::CreatePage {
      title: title.to_string(),
      content: content.to_string(),
    });

    let mut state = self.state.lock().unwrap();
    let id = state.next_id.to_string();
    state.next_id += 1;

    let created = page(&id, title, 1, content);
    state.pages.insert(id, created.clone());
    Ok(created)
  }

  async fn update_page(&self, page_id: &str, title: &str, version: u64, content: &str) -> Result<Page> {
    self.record(Call::UpdatePage {
      page_id: page_id.to_string(),
      title: title.to_string(),
      version,
      content: content.to_string(),
    });

    let mut state = self.state.lock().unwrap();
    if let Some(status) = state.update_failure {
      return Err(ConfluenceError::from_status(
        status,
        r#"{"message":"Version must be incremented on update."}"#,
        None,
      ));
    }

    let Some(existing) = state.pages.get_mut(page_id) else {
      return Err(not_found(page_id));
    };

    let current = existing.version_number().unwrap_or_default();
    if version != current + 1 {
      return Err(ConfluenceError::from_status(
        409,
        &format!(r#"{{"message":"Version must be incremented on update. Current version is: {current}"}}"#),
        None,
      ));
    }

    *existing = page(page_id, title, version, content);
    Ok(existing.clone())
  }

  async fn upload_attachment(&self, page_id: &str, title: &str, path: &Path) -> Result<Attachment> {
    self.record(Call::UploadAttachment {
      page_id: page_id.to_string(),
      title: title.to_string(),
      path: path.to_path_buf(),
    });

    let running = self.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_uploads_in_flight.fetch_max(running, Ordering::SeqCst);
    if let Some(delay) = self.upload_delay {
      tokio::time::sleep(delay).await;
    }
    self.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);

    if self.state.lock().unwrap().failing_uploads.contains(title) {
      return Err(ConfluenceError::from_status(500, "Internal Server Error", None));
    }

    Ok(Attachment {
      id: format!("att-{title}"),
      title: title.to_string(),
      attachment_type: "attachment".to_string(),
      version: Some(Version::write(2, true)),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_fake_client_missing_page_is_not_found() {
    let client = FakeConfluenceClient::new();
    let err = client.get_page("123456").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn test_fake_client_enforces_version_increment() {
    let client = FakeConfluenceClient::new().with_page("42", "Page", 3);

    let err = client.update_page("42", "Page", 3, "<p/>").await.unwrap_err();
    assert_eq!(err.status, Some(409));

    let page = client.update_page("42", "Page", 4, "<p/>").await.unwrap();
    assert_eq!(page.version_number(), Some(4));
  }

  #[tokio::test]
  async fn test_fake_client_assigns_ids() {
    let client = FakeConfluenceClient::new();
    let first = client.create_page("One", "x").await.unwrap();
    let second = client.create_page("Two", "x").await.unwrap();
    assert_eq!(first.id, "1000");
    assert_eq!(second.id, "1001");
    assert_eq!(client.created_titles(), vec!["One", "Two"]);
  }
}
