//! Multipart bodies for entity create/update requests.

use crate::error::{Error, Result};
use reqwest::multipart::{Form, Part};

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain";
const PLACEHOLDER_FILE_NAME: &str = "test.txt";

/// The file attached to an entity create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl FilePart {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    /// A `text/plain` file.
    pub fn text(file_name: impl Into<String>, content: &str) -> Self {
        Self::new(file_name, TEXT_CONTENT_TYPE, content.as_bytes())
    }

    /// Dummy attachment sent with a create.
    pub fn create_placeholder() -> Self {
        Self::text(PLACEHOLDER_FILE_NAME, "dummy content")
    }

    /// Dummy attachment sent with an update. Differs from the create payload.
    pub fn update_placeholder() -> Self {
        Self::text(PLACEHOLDER_FILE_NAME, "dummy update content")
    }
}

/// Build the two-part form: `body` carries the JSON record (no file name),
/// `file` carries the attachment.
pub(crate) fn entity_form(body_json: String, file: &FilePart) -> Result<Form> {
    let body = Part::text(body_json)
        .mime_str(JSON_CONTENT_TYPE)
        .map_err(|e| Error::InvalidHeader(format!("content type {JSON_CONTENT_TYPE}: {e}")))?;

    let attachment = Part::bytes(file.content.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|e| Error::InvalidHeader(format!("content type {}: {e}", file.content_type)))?;

    Ok(Form::new().part("body", body).part("file", attachment))
}
