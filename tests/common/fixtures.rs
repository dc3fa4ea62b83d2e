//! Sample Confluence API responses and notes for tests.

use serde_json::{Value, json};

use confluence_publish::config::PublisherConfig;

/// Page response as returned by `GET /content/{id}?expand=version,space`.
pub fn page_response(id: &str, title: &str, version: u64) -> Value {
  json!({
    "id": id,
    "type": "page",
    "status": "current",
    "title": title,
    "version": {
      "number": version,
      "minorEdit": false
    },
    "space": {
      "key": "DOCS",
      "name": "Documentation",
      "type": "global"
    },
    "_links": {
      "webui": format!("/spaces/DOCS/pages/{id}"),
      "self": format!("https://example.atlassian.net/wiki/rest/api/content/{id}")
    }
  })
}

/// Response to a multipart attachment upload.
pub fn attachment_upload_response(id: &str, file_name: &str, version: u64) -> Value {
  json!({
    "results": [
      {
        "id": id,
        "type": "attachment",
        "status": "current",
        "title": file_name,
        "version": { "number": version }
      }
    ],
    "size": 1
  })
}

/// Response to an attachment metadata update.
pub fn attachment_response(id: &str, title: &str, version: u64) -> Value {
  json!({
    "id": id,
    "type": "attachment",
    "status": "current",
    "title": title,
    "version": { "number": version, "minorEdit": true }
  })
}

/// Publisher configuration pointing at a fake site.
pub fn config() -> PublisherConfig {
  PublisherConfig::new("https://example.atlassian.net", "user@example.com", "token", "DOCS")
}
