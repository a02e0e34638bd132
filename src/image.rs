use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset reported when there are no further result pages.
pub const NO_MORE_DATA: i64 = -1;

/// One picture known to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    /// Unique name of the picture within the index.
    pub pic_name: String,
    pub product_id: String,
    /// Anything that identifies the picture: a full URL, a URL fragment or a
    /// content hash. The configured URL transform turns it into a download URL.
    #[serde(default)]
    pub image_url: String,
}

/// Settings shared by every item of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAttachment {
    pub instance_name: String,
    #[serde(default)]
    pub category_id: Option<u32>,
    #[serde(default)]
    pub str_attr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Add,
    Delete,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::Add => write!(f, "add"),
            SyncOperation::Delete => write!(f, "delete"),
        }
    }
}

/// An item that ended in a terminal failure, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedImage {
    pub image: ImageItem,
    pub reason: String,
}

/// Everything a batch call found out about its items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedImage>,
    /// Items whose round ended before they reported back.
    pub dropped: Vec<ImageItem>,
    /// Throttled items left over when the attempt budget ran out.
    pub exhausted: Vec<ImageItem>,
    pub rounds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParam {
    pub image_url: String,
    /// Download `image_url` as given, skipping the configured URL transform.
    pub use_origin_image: bool,
    pub offset: i64,
    /// 0 means the service maximum (100).
    pub limit: i64,
    pub str_attr: String,
    /// Drop repeated product ids, keeping the first occurrence.
    pub is_removal: bool,
    pub instance_name: String,
    pub category_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub image_url: String,
    /// Offset of the next page, or [`NO_MORE_DATA`].
    pub offset: i64,
    pub product_ids: Vec<String>,
    pub docs_found: i64,
    pub docs_return: i64,
    pub search_time: i64,
}

impl SearchResult {
    pub fn empty(image_url: &str) -> Self {
        Self {
            image_url: image_url.to_string(),
            offset: NO_MORE_DATA,
            product_ids: Vec::new(),
            docs_found: 0,
            docs_return: 0,
            search_time: 0,
        }
    }
}
