//! Catalog entries and filename handling.

use serde::{Deserialize, Serialize};

/// One entry of the shared file catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    /// Opaque locator of the backing resource, usually a local path.
    #[serde(rename = "path", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Sanitize a filename: strip path components, reject traversal attempts.
pub fn sanitize_filename(raw: &str) -> String {
    // Take only the final path component (handles both / and \ separators)
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    // Remove leading dots (no hidden files / no ".." tricks)
    let trimmed = base.trim_start_matches('.');

    let clean: String = trimmed
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if clean.is_empty() {
        "download".to_string()
    } else {
        clean
    }
}
