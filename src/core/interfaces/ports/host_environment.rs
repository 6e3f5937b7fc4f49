use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait HostEnvironment: Send + Sync {
    /// Current browser UI locale, e.g. `en-US`.
    fn ui_language(&self) -> String;

    /// Keyboard shortcut bound to a manifest command, if the user set one.
    async fn command_shortcut(&self, command: &str) -> Result<Option<String>>;
}
