use serde::{Deserialize, Serialize};

/// The v3 `{data, meta}` response wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The payload.
    pub data: T,
    /// Response metadata.
    #[serde(default)]
    pub meta: Meta,
}

/// Metadata of a v3 response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Pagination details, on collection responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Page-based pagination details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    /// Total number of items.
    pub total: u64,
    /// Items on this page.
    pub count: u64,
    /// Page size.
    pub per_page: u64,
    /// 1-based page number.
    pub current_page: u64,
    /// Number of pages.
    pub total_pages: u64,
}
