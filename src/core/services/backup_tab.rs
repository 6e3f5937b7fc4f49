use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use super::session_store::SessionStore;
use crate::core::interfaces::ports::{BrowserTabs, ExtensionMessenger};
use crate::core::models::{
    CoordinatorError, EncodedImage, ExtensionMessage, Result, TabId, TabStatus, TabUpdate,
};
use crate::global_constants::{BACKUP_PAGE_PATH, LOG_TAG_BACKUP};

/// Opens the bundled backup page when the active tab cannot host the UI.
pub struct BackupTabLauncher {
    tabs: Arc<dyn BrowserTabs>,
    messenger: Arc<dyn ExtensionMessenger>,
}

impl BackupTabLauncher {
    pub fn new(tabs: Arc<dyn BrowserTabs>, messenger: Arc<dyn ExtensionMessenger>) -> Self {
        Self { tabs, messenger }
    }

    /// Creates the backup tab, waits for it to finish loading, hands the
    /// session over to it and transfers the captured image.
    pub async fn launch(&self, session: &SessionStore, captured: &EncodedImage) -> Result<TabId> {
        let mut updates = self.tabs.subscribe_updates();

        let tab = self
            .tabs
            .create_tab(BACKUP_PAGE_PATH, true)
            .await
            .map_err(CoordinatorError::host)?;
        log::info!("{} Created backup tab {}", LOG_TAG_BACKUP, tab.id);

        if !tab.is_complete() {
            self.wait_until_complete(tab.id, &mut updates).await?;
        }
        log::debug!("{} Backup tab {} finished loading", LOG_TAG_BACKUP, tab.id);

        session.set_owner_tab(tab.id).await?;

        let response = self
            .messenger
            .send_to_tab(tab.id, ExtensionMessage::initialize_backup(captured.clone()))
            .await
            .map_err(CoordinatorError::host)?;

        if !response.is_ok() {
            return Err(CoordinatorError::HostPrimitive(format!(
                "backup tab rejected initialization: {}",
                response.message.unwrap_or_default()
            )));
        }

        log::info!("{} Transferred capture to backup tab {}", LOG_TAG_BACKUP, tab.id);
        Ok(tab.id)
    }

    async fn wait_until_complete(&self, tab_id: TabId, updates: &mut Receiver<TabUpdate>) -> Result<()> {
        loop {
            match updates.recv().await {
                Ok(TabUpdate {
                    tab_id: updated,
                    status: TabStatus::Complete,
                }) if updated == tab_id => return Ok(()),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "{} Missed {} tab updates, checking {} directly",
                        LOG_TAG_BACKUP,
                        skipped,
                        tab_id
                    );
                    let tab = self
                        .tabs
                        .get_tab(tab_id)
                        .await
                        .map_err(CoordinatorError::host)?;
                    if tab.is_complete() {
                        return Ok(());
                    }
                }
                Err(RecvError::Closed) => {
                    return Err(CoordinatorError::HostPrimitive(format!(
                        "tab update stream closed before {} finished loading",
                        tab_id
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStorage;
    use crate::core::models::{MessageResponse, TabInfo};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    struct MockTabs {
        updates: broadcast::Sender<TabUpdate>,
        created: Mutex<Vec<String>>,
    }

    impl MockTabs {
        fn new() -> Self {
            Self {
                updates: broadcast::channel(16).0,
                created: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BrowserTabs for MockTabs {
        async fn capture_visible_tab(&self) -> anyhow::Result<EncodedImage> {
            anyhow::bail!("not used")
        }

        async fn create_tab(&self, url: &str, _active: bool) -> anyhow::Result<TabInfo> {
            self.created.lock().unwrap().push(url.to_string());
            let sender = self.updates.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                let _ = sender.send(TabUpdate {
                    tab_id: TabId(99),
                    status: TabStatus::Complete,
                });
                let _ = sender.send(TabUpdate {
                    tab_id: TabId(50),
                    status: TabStatus::Loading,
                });
                let _ = sender.send(TabUpdate {
                    tab_id: TabId(50),
                    status: TabStatus::Complete,
                });
            });
            Ok(TabInfo::new(TabId(50), Some(url.to_string()), TabStatus::Loading))
        }

        async fn get_tab(&self, tab_id: TabId) -> anyhow::Result<TabInfo> {
            Ok(TabInfo::new(tab_id, None, TabStatus::Complete))
        }

        fn subscribe_updates(&self) -> broadcast::Receiver<TabUpdate> {
            self.updates.subscribe()
        }
    }

    struct RecordingMessenger {
        sent: Mutex<Vec<(TabId, ExtensionMessage)>>,
        reply: MessageResponse,
    }

    #[async_trait]
    impl ExtensionMessenger for RecordingMessenger {
        async fn send_to_tab(
            &self,
            tab_id: TabId,
            message: ExtensionMessage,
        ) -> anyhow::Result<MessageResponse> {
            self.sent.lock().unwrap().push((tab_id, message));
            Ok(self.reply.clone())
        }

        async fn send_to_runtime(&self, _message: ExtensionMessage) -> anyhow::Result<MessageResponse> {
            anyhow::bail!("not used")
        }
    }

    fn captured() -> EncodedImage {
        EncodedImage::from_data_url("data:image/png;base64,CAPTURE")
    }

    #[tokio::test]
    async fn test_launch_waits_for_load_then_transfers_image_and_ownership() {
        let tabs = Arc::new(MockTabs::new());
        let messenger = Arc::new(RecordingMessenger {
            sent: Mutex::new(Vec::new()),
            reply: MessageResponse::ok(),
        });
        let session = SessionStore::new(Arc::new(InMemoryStorage::new()));
        session.begin(TabId(1), captured()).await.unwrap();
        let launcher = BackupTabLauncher::new(tabs.clone(), messenger.clone());

        let backup_id = launcher.launch(&session, &captured()).await.unwrap();

        assert_eq!(backup_id, TabId(50));
        assert_eq!(session.owner_tab().await.unwrap(), TabId(50));
        assert_eq!(*tabs.created.lock().unwrap(), vec![BACKUP_PAGE_PATH.to_string()]);
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            (TabId(50), ExtensionMessage::initialize_backup(captured()))
        );
    }

    #[tokio::test]
    async fn test_rejected_initialization_is_host_error() {
        let launcher = BackupTabLauncher::new(
            Arc::new(MockTabs::new()),
            Arc::new(RecordingMessenger {
                sent: Mutex::new(Vec::new()),
                reply: MessageResponse::error("no image"),
            }),
        );
        let session = SessionStore::new(Arc::new(InMemoryStorage::new()));

        let result = launcher.launch(&session, &captured()).await;

        assert!(matches!(result, Err(CoordinatorError::HostPrimitive(_))));
        assert_eq!(session.owner_tab().await.unwrap(), TabId(50));
    }
}
