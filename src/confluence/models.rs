//! Data transfer objects exchanged with the Confluence REST API.

use serde::{Deserialize, Serialize};

/// Confluence page metadata and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
  /// Unique numeric identifier assigned by Confluence.
  pub id: String,
  /// Human-readable title displayed in the UI.
  pub title: String,
  #[serde(rename = "type", default)]
  /// Content type (typically `"page"`).
  pub page_type: String,
  /// Publication status such as `"current"` or `"draft"`.
  #[serde(default)]
  pub status: String,
  /// Version information; present when expanded or returned from a write.
  #[serde(default)]
  pub version: Option<Version>,
  /// Space metadata describing where the page lives.
  #[serde(default)]
  pub space: Option<PageSpace>,
  /// Parent pages, nearest last.
  #[serde(default)]
  pub ancestors: Option<Vec<Ancestor>>,
  /// Page body, when expanded.
  #[serde(default)]
  pub body: Option<PageBody>,
  #[serde(rename = "_links", default)]
  /// Useful hyperlinks, including the canonical UI URL.
  pub links: Option<PageLinks>,
}

impl Page {
  /// Server version number, if the response carried one.
  pub fn version_number(&self) -> Option<u64> {
    self.version.as_ref().map(|version| version.number)
  }
}

/// Content version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
  /// Monotonically increasing version number.
  pub number: u64,
  #[serde(rename = "minorEdit", default, skip_serializing_if = "Option::is_none")]
  /// Whether watchers are notified of the change.
  pub minor_edit: Option<bool>,
}

impl Version {
  /// Version stamp for an outgoing write.
  pub fn write(number: u64, minor_edit: bool) -> Self {
    Self {
      number,
      minor_edit: Some(minor_edit),
    }
  }
}

/// Page body content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBody {
  /// Confluence storage-format XHTML representation.
  pub storage: Option<StorageFormat>,
}

/// Storage format (Confluence's internal format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageFormat {
  /// Raw XHTML markup.
  pub value: String,
  /// Representation name (always `"storage"`).
  pub representation: String,
}

impl StorageFormat {
  /// Wrap storage-format markup.
  pub fn new(value: impl Into<String>) -> Self {
    Self {
      value: value.into(),
      representation: "storage".to_string(),
    }
  }
}

/// Space information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpace {
  /// Short key that uniquely identifies the space.
  pub key: String,
  /// Human-readable space name.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

/// Reference to a parent page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
  /// Page id of the ancestor.
  pub id: String,
  #[serde(rename = "type", default = "page_type")]
  /// Content type of the ancestor.
  pub content_type: String,
}

fn page_type() -> String {
  "page".to_string()
}

/// Page links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLinks {
  #[serde(rename = "webui")]
  /// Path to the page within the Confluence web UI.
  pub web_ui: Option<String>,
  /// Base URL of the site, when the API supplies it.
  pub base: Option<String>,
}

/// Attachment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
  /// Unique attachment identifier.
  pub id: String,
  /// Attachment title as shown on the page.
  pub title: String,
  #[serde(rename = "type", default)]
  /// Attachment content type (usually `"attachment"`).
  pub attachment_type: String,
  /// Current attachment version.
  #[serde(default)]
  pub version: Option<Version>,
}

/// Attachments response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsResponse {
  /// Attachments included in the API response.
  pub results: Vec<Attachment>,
}

/// User information for the authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
  #[serde(rename = "accountId")]
  /// Stable Atlassian account identifier.
  pub account_id: String,
  /// Primary email address if the API caller is permitted to view it.
  pub email: Option<String>,
  #[serde(rename = "displayName")]
  /// Full display name configured in the Atlassian profile.
  pub display_name: String,
}

/// Body of a page create or update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  /// Page id; only sent on update.
  pub id: Option<String>,
  #[serde(rename = "type")]
  /// Always `"page"`.
  pub content_type: String,
  /// Page title.
  pub title: String,
  /// Target space.
  pub space: SpaceKey,
  /// Page body.
  pub body: RequestBody,
  #[serde(skip_serializing_if = "Option::is_none")]
  /// New version; only sent on update.
  pub version: Option<Version>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  /// Parent page, when configured.
  pub ancestors: Vec<Ancestor>,
}

/// Space reference in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceKey {
  /// Space key.
  pub key: String,
}

/// Body wrapper in a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
  /// Storage-format content.
  pub storage: StorageFormat,
}

/// Body of the attachment metadata update sent after an upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentUpdateRequest {
  /// Attachment id.
  pub id: String,
  /// Attachment title as written in the page content.
  pub title: String,
  #[serde(rename = "type")]
  /// Always `"attachment"`.
  pub content_type: String,
  /// Always `"current"`.
  pub status: String,
  /// Next attachment version.
  pub version: Version,
}

impl AttachmentUpdateRequest {
  /// Retitle `attachment`, bumping its version as a minor edit.
  pub fn retitle(attachment: &Attachment, title: &str) -> Self {
    let current = attachment.version.map_or(1, |version| version.number);
    Self {
      id: attachment.id.clone(),
      title: title.to_string(),
      content_type: "attachment".to_string(),
      status: "current".to_string(),
      version: Version::write(current + 1, true),
    }
  }
}

/// Request fields shared by every page write: the target space and the
/// optional parent page.
///
/// Built once from configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDefaults {
  space_key: String,
  ancestors: Vec<Ancestor>,
}

impl PageDefaults {
  /// Defaults for pages in `space_key`, optionally nested under a parent.
  pub fn new(space_key: impl Into<String>, parent_page_id: Option<&str>) -> Self {
    let ancestors = parent_page_id
      .map(str::trim)
      .filter(|id| !id.is_empty())
      .map(|id| Ancestor {
        id: id.to_string(),
        content_type: page_type(),
      })
      .into_iter()
      .collect();

    Self {
      space_key: space_key.into(),
      ancestors,
    }
  }

  /// Space key pages are written to.
  pub fn space_key(&self) -> &str {
    &self.space_key
  }

  /// Parent page reference, if configured.
  pub fn ancestors(&self) -> &[Ancestor] {
    &self.ancestors
  }

  /// Request body for creating a page.
  pub fn create_request(&self, title: &str, content: &str) -> PageRequest {
    PageRequest {
      id: None,
      content_type: page_type(),
      title: title.to_string(),
      space: SpaceKey {
        key: self.space_key.clone(),
      },
      body: RequestBody {
        storage: StorageFormat::new(content),
      },
      version: None,
      ancestors: self.ancestors.clone(),
    }
  }

  /// Request body for replacing the content of an existing page.
  pub fn update_request(&self, page_id: &str, title: &str, version: u64, content: &str) -> PageRequest {
    PageRequest {
      id: Some(page_id.to_string()),
      version: Some(Version::write(version, false)),
      ..self.create_request(title, content)
    }
  }
}
