//! Trait definitions for interacting with Confluence.

use std::path::Path;

use async_trait::async_trait;

use super::error::Result;
use super::models::{Attachment, Page};

/// Confluence content operations used by the publisher (enables testing with
/// fake implementations).
#[async_trait]
pub trait ConfluenceApi: Send + Sync {
  /// Fetch a page by ID, including its current version.
  ///
  /// # Arguments
  /// * `page_id` - Unique Confluence identifier for the page to retrieve.
  ///
  /// # Returns
  /// The `Page` record with `version` and `space` expanded.
  async fn get_page(&self, page_id: &str) -> Result<Page>;

  /// Create a page in the configured space, under the configured parent.
  ///
  /// # Arguments
  /// * `title` - Page title.
  /// * `content` - Initial storage-format body.
  ///
  /// # Returns
  /// The created page, carrying the server-assigned id.
  async fn create_page(&self, title: &str, content: &str) -> Result<Page>;

  /// Replace the title and body of an existing page.
  ///
  /// # Arguments
  /// * `page_id` - Page to update.
  /// * `title` - New title.
  /// * `version` - New version number; must be exactly one more than the
  ///   server's current version.
  /// * `content` - New storage-format body.
  async fn update_page(&self, page_id: &str, title: &str, version: u64, content: &str) -> Result<Page>;

  /// Upload a local file as a page attachment and give it `title`.
  ///
  /// # Arguments
  /// * `page_id` - Page the attachment belongs to.
  /// * `title` - Attachment title, as referenced from the page content.
  /// * `path` - Local file to upload.
  ///
  /// # Returns
  /// The attachment metadata after the title update.
  async fn upload_attachment(&self, page_id: &str, title: &str, path: &Path) -> Result<Attachment>;
}
