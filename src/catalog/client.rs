use async_trait::async_trait;
use color_eyre::Result;
use serde_json::Value;

/// One zero-argument invocation of an operation, optionally resumed from a
/// continuation token returned by the previous page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub service: String,
    pub operation: String,
    pub starting_token: Option<String>,
}

/// A single page of an operation's response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub body: Value,
    pub next_token: Option<String>,
}

/// Network client that runs operations one page at a time.
#[async_trait]
pub trait PageClient: Send + Sync {
    /// Fetch one page. Dropping the returned future must abandon the request.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page>;
}
