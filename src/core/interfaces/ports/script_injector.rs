use anyhow::Result;
use async_trait::async_trait;

use crate::core::models::TabId;

#[async_trait]
pub trait ScriptInjector: Send + Sync {
    /// Resolves once the script has been executed in the tab.
    async fn inject_script(&self, tab_id: TabId, file: &str) -> Result<()>;
}
