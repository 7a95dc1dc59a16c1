//! Serialisable summary of a stored file.

use serde::Serialize;

/// Summary of a stored file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub id: i64,
    pub name: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub created: String,
    pub human_size: Option<String>,
    /// Base64-encoded content, absent when excluded by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
