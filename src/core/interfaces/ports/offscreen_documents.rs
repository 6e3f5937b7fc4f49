use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffscreenReason {
    Workers,
    Blobs,
}

#[async_trait]
pub trait OffscreenDocuments: Send + Sync {
    async fn has_document(&self, path: &str) -> Result<bool>;

    /// Errors if a document already exists.
    async fn create_document(
        &self,
        path: &str,
        reasons: &[OffscreenReason],
        justification: &str,
    ) -> Result<()>;

    async fn close_document(&self) -> Result<()>;
}
