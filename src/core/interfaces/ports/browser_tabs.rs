use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::core::models::{EncodedImage, TabId, TabInfo, TabUpdate};

#[async_trait]
pub trait BrowserTabs: Send + Sync {
    /// Grabs the visible area of the focused window's active tab as a PNG.
    async fn capture_visible_tab(&self) -> Result<EncodedImage>;

    async fn create_tab(&self, url: &str, active: bool) -> Result<TabInfo>;

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo>;

    /// Stream of load-status changes for every tab.
    fn subscribe_updates(&self) -> broadcast::Receiver<TabUpdate>;
}
