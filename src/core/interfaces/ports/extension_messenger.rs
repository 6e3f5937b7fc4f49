use anyhow::Result;
use async_trait::async_trait;

use crate::core::models::{ExtensionMessage, MessageResponse, TabId};

/// Host messaging transport. Both calls fail when nothing is listening on
/// the other end.
#[async_trait]
pub trait ExtensionMessenger: Send + Sync {
    async fn send_to_tab(&self, tab_id: TabId, message: ExtensionMessage) -> Result<MessageResponse>;

    /// Reaches extension pages, which is where the offscreen document listens.
    async fn send_to_runtime(&self, message: ExtensionMessage) -> Result<MessageResponse>;
}
