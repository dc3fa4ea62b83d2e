//! Publish pipeline: render a note, reconcile it with its Confluence page,
//! upload its attachments and replace the page content.
//!
//! A publish moves through [`PublishStage`]s in order. Attachment uploads run
//! concurrently with the content update and both are awaited before the
//! publish completes; a failed upload is reported but never aborts the
//! publish.

use std::collections::HashSet;
use std::fmt;

use futures::future;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::attachments::{AttachmentReference, extract_attachments};
use crate::config::PublisherConfig;
use crate::confluence::{Attachment, ConfluenceApi, ConfluenceError, ErrorKind, Page};
use crate::markup::{StorageOptions, to_storage_format};
use crate::note::{Note, NoteStore, StoreError};

/// Body of a freshly created page until the real content is written.
pub const PLACEHOLDER_CONTENT: &str = "Upload in progress";

/// Steps of a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishStage {
  /// Converting the note body to storage format.
  Rendering,
  /// Creating the page if needed and fetching its current version.
  Reconciling,
  /// Uploading referenced local files.
  UploadingAttachments,
  /// Writing the rendered content as the next page version.
  UpdatingContent,
  /// Finished.
  Done,
}

impl fmt::Display for PublishStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      PublishStage::Rendering => "rendering",
      PublishStage::Reconciling => "reconciling",
      PublishStage::UploadingAttachments => "uploading attachments",
      PublishStage::UpdatingContent => "updating content",
      PublishStage::Done => "done",
    };
    f.write_str(label)
  }
}

/// Fatal publish failure.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
  /// The note could not be turned into a document tree.
  #[error("Failed to render note '{note}'")]
  Render {
    /// Note id.
    note: String,
    #[source]
    source: StoreError,
  },

  /// The new page id could not be written back to the note.
  #[error("Failed to save page id {page_id} for note '{note}'")]
  Store {
    /// Note id.
    note: String,
    /// Id of the page that was created remotely.
    page_id: String,
    #[source]
    source: StoreError,
  },

  /// A Confluence call failed.
  #[error("Publishing note '{note}' failed while {stage}")]
  Remote {
    /// Note id.
    note: String,
    /// Stage that issued the failing call.
    stage: PublishStage,
    #[source]
    source: ConfluenceError,
  },
}

impl PublishError {
  fn remote(note: &Note, stage: PublishStage, source: ConfluenceError) -> Self {
    PublishError::Remote {
      note: note.id.clone(),
      stage,
      source,
    }
  }

  /// Stage the publish stopped at.
  pub fn stage(&self) -> PublishStage {
    match self {
      PublishError::Render { .. } => PublishStage::Rendering,
      PublishError::Store { .. } => PublishStage::Reconciling,
      PublishError::Remote { stage, .. } => *stage,
    }
  }

  /// Classification of the remote failure, if this was one.
  pub fn remote_kind(&self) -> Option<ErrorKind> {
    match self {
      PublishError::Remote { source, .. } => Some(source.kind),
      _ => None,
    }
  }
}

/// An attachment that could not be uploaded.
#[derive(Debug)]
pub struct AttachmentFailure {
  /// The reference that failed.
  pub reference: AttachmentReference,
  /// Why it failed.
  pub error: ConfluenceError,
}

/// Outcome of a successful publish.
#[derive(Debug)]
pub struct PublishReport {
  /// The page after the content update.
  pub page: Page,
  /// Whether the page was created during this publish.
  pub created: bool,
  /// Attachments uploaded successfully, in reference order.
  pub uploaded: Vec<Attachment>,
  /// Attachments that failed, in reference order.
  pub failed_uploads: Vec<AttachmentFailure>,
}

impl PublishReport {
  /// Whether any attachment failed to upload.
  pub fn has_failures(&self) -> bool {
    !self.failed_uploads.is_empty()
  }
}

/// Render a note's body into Confluence storage format.
///
/// # Arguments
/// * `store` - Builds the document tree and resolves cross-links.
/// * `note` - Note to render.
/// * `options` - Storage-format rewrite options.
pub fn render_note<S>(store: &S, note: &Note, options: &StorageOptions) -> Result<String, PublishError>
where
  S: NoteStore + ?Sized,
{
  let tree = store.document_tree(note).map_err(|source| PublishError::Render {
    note: note.id.clone(),
    source,
  })?;

  Ok(to_storage_format(tree, store, options))
}

/// Attachments to upload for `content`, first occurrence of each title only.
pub fn attachment_references(note: &Note, content: &str) -> Vec<AttachmentReference> {
  let mut seen = HashSet::new();
  extract_attachments(content)
    .into_iter()
    .filter(|title| seen.insert(title.clone()))
    .map(|title| AttachmentReference::resolve(title, &note.vault_path))
    .collect()
}

/// Publishes notes to Confluence.
pub struct Publisher<'a> {
  client: &'a dyn ConfluenceApi,
  notes: &'a dyn NoteStore,
  config: &'a PublisherConfig,
}

impl<'a> Publisher<'a> {
  /// Create a publisher.
  ///
  /// # Arguments
  /// * `client` - Confluence API implementation.
  /// * `notes` - Host note store used for rendering, lookups and write-back.
  /// * `config` - Publisher configuration.
  pub fn new(client: &'a dyn ConfluenceApi, notes: &'a dyn NoteStore, config: &'a PublisherConfig) -> Self {
    Self { client, notes, config }
  }

  /// Publish `note`, creating its page on first publish.
  ///
  /// On first publish the note gains a `custom.pageId` which is persisted
  /// through the note store before any content is written.
  ///
  /// # Returns
  /// A report with the updated page and the attachment outcomes.
  pub async fn publish(&self, note: &mut Note) -> Result<PublishReport, PublishError> {
    info!("Publishing note '{}'", note.id);

    debug!("Stage: {}", PublishStage::Rendering);
    let content = self.render(note)?;
    debug!("Rendered '{}' to {} bytes of storage format", note.id, content.len());

    debug!("Stage: {}", PublishStage::Reconciling);
    let (page, created) = self.fetch_or_create_page(note).await?;

    let (page, uploaded, failed_uploads) = self.update_page(note, &page, &content).await?;

    debug!("Stage: {}", PublishStage::Done);
    info!(
      "Published '{}' as page {} (version {})",
      note.title,
      page.id,
      page.version_number().map_or_else(|| "?".to_string(), |v| v.to_string())
    );

    Ok(PublishReport {
      page,
      created,
      uploaded,
      failed_uploads,
    })
  }

  /// Render the note with the configured options.
  pub fn render(&self, note: &Note) -> Result<String, PublishError> {
    render_note(self.notes, note, &self.config.storage_options())
  }

  /// Return the note's page with its current version, creating the page first
  /// when the note has never been published.
  ///
  /// # Returns
  /// The page and whether it was created by this call.
  pub async fn fetch_or_create_page(&self, note: &mut Note) -> Result<(Page, bool), PublishError> {
    let (page_id, mut created) = match note.page_id() {
      Some(page_id) => (page_id, false),
      None => (self.create_page(note).await?, true),
    };

    let page = match self.client.get_page(&page_id).await {
      Ok(page) => page,
      Err(err) if err.is_not_found() && !created && self.config.recreate_missing_pages => {
        warn!(
          "Page {page_id} for note '{}' no longer exists; creating a new page",
          note.id
        );
        let page_id = self.create_page(note).await?;
        created = true;
        self
          .client
          .get_page(&page_id)
          .await
          .map_err(|err| PublishError::remote(note, PublishStage::Reconciling, err))?
      }
      Err(err) => return Err(PublishError::remote(note, PublishStage::Reconciling, err)),
    };

    let Some(remote_version) = page.version_number() else {
      let err = ConfluenceError::invalid_response(format!("Page {} has no version", page.id));
      return Err(PublishError::remote(note, PublishStage::Reconciling, err));
    };

    if let Some(stored) = note.page_version()
      && stored != remote_version
    {
      warn!(
        "Page {} is at version {remote_version} but note '{}' was last published as version {stored}; remote edits will be overwritten",
        page.id, note.id
      );
    }

    Ok((page, created))
  }

  /// Upload the content's attachments while writing the content as the next
  /// page version.
  ///
  /// # Returns
  /// The updated page, the uploaded attachments and the failed uploads.
  pub async fn update_page(
    &self,
    note: &Note,
    page: &Page,
    content: &str,
  ) -> Result<(Page, Vec<Attachment>, Vec<AttachmentFailure>), PublishError> {
    let current = page.version_number().ok_or_else(|| {
      let err = ConfluenceError::invalid_response(format!("Page {} has no version", page.id));
      PublishError::remote(note, PublishStage::UpdatingContent, err)
    })?;

    let references = attachment_references(note, content);
    if !references.is_empty() {
      debug!("Stage: {} ({} files)", PublishStage::UploadingAttachments, references.len());
    }

    let uploads = stream::iter(references)
      .map(|reference| async move {
        let result = self
          .client
          .upload_attachment(&page.id, &reference.title, &reference.path)
          .await;
        (reference, result)
      })
      .buffered(self.config.upload_concurrency.max(1))
      .collect::<Vec<_>>();

    debug!("Stage: {}", PublishStage::UpdatingContent);
    let update = self.client.update_page(&page.id, &note.title, current + 1, content);

    let (uploads, updated) = future::join(uploads, update).await;

    let mut uploaded = Vec::new();
    let mut failed = Vec::new();
    for (reference, result) in uploads {
      match result {
        Ok(attachment) => uploaded.push(attachment),
        Err(error) => {
          warn!(
            "Failed to upload attachment '{}' from {}: {error}",
            reference.title,
            reference.path.display()
          );
          failed.push(AttachmentFailure { reference, error });
        }
      }
    }

    let page = updated.map_err(|err| PublishError::remote(note, PublishStage::UpdatingContent, err))?;
    Ok((page, uploaded, failed))
  }

  /// Create a placeholder page and persist its id into the note.
  async fn create_page(&self, note: &mut Note) -> Result<String, PublishError> {
    let page = self
      .client
      .create_page(&note.title, PLACEHOLDER_CONTENT)
      .await
      .map_err(|err| PublishError::remote(note, PublishStage::Reconciling, err))?;

    info!("Created page {} for note '{}'", page.id, note.id);
    note.set_page_id(&page.id);

    self.notes.write_note(note).await.map_err(|source| PublishError::Store {
      note: note.id.clone(),
      page_id: page.id.clone(),
      source,
    })?;

    Ok(page.id)
  }
}
