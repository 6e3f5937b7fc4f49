//! In-process stand-in for the browser's extension APIs.
//!
//! Tabs, the offscreen document and the messaging transport are simulated
//! closely enough to drive the coordinator end to end: restricted pages
//! refuse injection, new tabs load asynchronously and report completion on
//! the update stream, and runtime messages reach a real [`OffscreenHost`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::core::interfaces::adapters::OcrEngineFactory;
use crate::core::interfaces::ports::{
    BrowserTabs, ExtensionMessenger, HostEnvironment, KeyValueStorage, OffscreenDocuments,
    OffscreenReason, ScriptInjector,
};
use crate::core::models::{
    EncodedImage, ExtensionMessage, MessageResponse, MessageSender, TabId, TabInfo, TabStatus,
    TabUpdate,
};
use crate::core::orchestrators::{CoordinatorPorts, OffscreenHost};
use crate::core::services::{is_restricted_url, MessageRouter};
use crate::global_constants::{
    ACTION_COMMAND_NAME, BACKUP_PAGE_PATH, LOG_TAG_BROWSER, MESSAGE_NO_RECEIVER, MESSAGE_PONG,
};

const TAB_UPDATE_CAPACITY: usize = 64;

struct SimulatedTab {
    info: TabInfo,
    injectable: bool,
    listening: bool,
    inbox: Vec<ExtensionMessage>,
}

struct OffscreenDocument {
    path: String,
    host: Arc<OffscreenHost>,
    router: Arc<MessageRouter<OffscreenHost>>,
}

pub struct SimulatedBrowser {
    tabs: Arc<Mutex<HashMap<TabId, SimulatedTab>>>,
    next_tab_id: AtomicI64,
    updates: broadcast::Sender<TabUpdate>,
    visible_capture: Mutex<Option<EncodedImage>>,
    engine_factory: Arc<dyn OcrEngineFactory>,
    offscreen: Mutex<Option<OffscreenDocument>>,
    offscreen_creations: AtomicUsize,
    ui_language: Mutex<String>,
    shortcut: Mutex<Option<String>>,
}

impl SimulatedBrowser {
    pub fn new(engine_factory: Arc<dyn OcrEngineFactory>) -> Arc<Self> {
        Arc::new(Self {
            tabs: Arc::new(Mutex::new(HashMap::new())),
            next_tab_id: AtomicI64::new(1),
            updates: broadcast::channel(TAB_UPDATE_CAPACITY).0,
            visible_capture: Mutex::new(None),
            engine_factory,
            offscreen: Mutex::new(None),
            offscreen_creations: AtomicUsize::new(0),
            ui_language: Mutex::new("en-US".to_string()),
            shortcut: Mutex::new(None),
        })
    }

    /// Wires every port to this browser, with the given durable storage.
    pub fn ports(self: &Arc<Self>, storage: Arc<dyn KeyValueStorage>) -> CoordinatorPorts {
        CoordinatorPorts {
            tabs: self.clone(),
            injector: self.clone(),
            messenger: self.clone(),
            offscreen: self.clone(),
            storage,
            environment: self.clone(),
        }
    }

    pub fn set_ui_language(&self, locale: impl Into<String>) {
        *lock(&self.ui_language) = locale.into();
    }

    pub fn set_shortcut(&self, shortcut: Option<&str>) {
        *lock(&self.shortcut) = shortcut.map(str::to_string);
    }

    /// What the next `capture_visible_tab` returns.
    pub fn set_visible_capture(&self, image: EncodedImage) {
        *lock(&self.visible_capture) = Some(image);
    }

    /// Makes the next `capture_visible_tab` fail.
    pub fn clear_visible_capture(&self) {
        *lock(&self.visible_capture) = None;
    }

    /// Opens an already loaded page with no extension script in it.
    pub fn open_tab(&self, url: &str) -> TabInfo {
        let info = TabInfo::new(self.allocate_tab_id(), Some(url.to_string()), TabStatus::Complete);
        lock(&self.tabs).insert(
            info.id,
            SimulatedTab {
                info: info.clone(),
                injectable: !is_restricted_url(Some(url)),
                listening: false,
                inbox: Vec::new(),
            },
        );
        log::debug!("{} Opened {} at {}", LOG_TAG_BROWSER, info.id, url);
        info
    }

    /// Makes script injection into the tab fail, as it does for pages the
    /// extension has no host permission for.
    pub fn block_injection(&self, tab_id: TabId) {
        if let Some(tab) = lock(&self.tabs).get_mut(&tab_id) {
            tab.injectable = false;
        }
    }

    pub fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
        lock(&self.tabs).get(&tab_id).map(|tab| tab.info.clone())
    }

    pub fn tabs_at(&self, url: &str) -> Vec<TabInfo> {
        let mut found: Vec<TabInfo> = lock(&self.tabs)
            .values()
            .filter(|tab| tab.info.url.as_deref() == Some(url))
            .map(|tab| tab.info.clone())
            .collect();
        found.sort_by_key(|info| info.id.0);
        found
    }

    /// Every message delivered to the tab, oldest first.
    pub fn messages_for(&self, tab_id: TabId) -> Vec<ExtensionMessage> {
        lock(&self.tabs)
            .get(&tab_id)
            .map(|tab| tab.inbox.clone())
            .unwrap_or_default()
    }

    pub fn offscreen_creations(&self) -> usize {
        self.offscreen_creations.load(Ordering::SeqCst)
    }

    pub fn offscreen_host(&self) -> Option<Arc<OffscreenHost>> {
        lock(&self.offscreen).as_ref().map(|document| Arc::clone(&document.host))
    }

    /// Drops the offscreen document the way the browser does when it
    /// reclaims an idle one.
    pub fn discard_offscreen(&self) {
        if lock(&self.offscreen).take().is_some() {
            log::info!("{} Offscreen document discarded", LOG_TAG_BROWSER);
        }
    }

    fn allocate_tab_id(&self) -> TabId {
        TabId(self.next_tab_id.fetch_add(1, Ordering::SeqCst))
    }

    fn offscreen_router(&self) -> Option<Arc<MessageRouter<OffscreenHost>>> {
        lock(&self.offscreen).as_ref().map(|document| Arc::clone(&document.router))
    }
}

#[async_trait]
impl BrowserTabs for SimulatedBrowser {
    async fn capture_visible_tab(&self) -> Result<EncodedImage> {
        lock(&self.visible_capture)
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No visible tab to capture"))
    }

    async fn create_tab(&self, url: &str, active: bool) -> Result<TabInfo> {
        let info = TabInfo::new(self.allocate_tab_id(), Some(url.to_string()), TabStatus::Loading);
        // Extension pages carry their own listener once loaded.
        let is_extension_page = url == BACKUP_PAGE_PATH;

        lock(&self.tabs).insert(
            info.id,
            SimulatedTab {
                info: info.clone(),
                injectable: !is_restricted_url(Some(url)),
                listening: is_extension_page,
                inbox: Vec::new(),
            },
        );
        log::info!("{} Created {} at {} (active: {})", LOG_TAG_BROWSER, info.id, url, active);

        let tabs = Arc::clone(&self.tabs);
        let updates = self.updates.clone();
        let tab_id = info.id;
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            if let Some(tab) = lock(&tabs).get_mut(&tab_id) {
                tab.info.status = TabStatus::Complete;
            }
            let _ = updates.send(TabUpdate {
                tab_id,
                status: TabStatus::Complete,
            });
        });

        Ok(info)
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo> {
        self.tab(tab_id)
            .ok_or_else(|| anyhow::anyhow!("No tab with id: {}", tab_id.0))
    }

    fn subscribe_updates(&self) -> broadcast::Receiver<TabUpdate> {
        self.updates.subscribe()
    }
}

#[async_trait]
impl ScriptInjector for SimulatedBrowser {
    async fn inject_script(&self, tab_id: TabId, file: &str) -> Result<()> {
        let mut tabs = lock(&self.tabs);
        let tab = tabs
            .get_mut(&tab_id)
            .ok_or_else(|| anyhow::anyhow!("No tab with id: {}", tab_id.0))?;

        if !tab.injectable {
            anyhow::bail!(
                "Cannot access contents of url \"{}\"",
                tab.info.url.as_deref().unwrap_or_default()
            );
        }

        tab.listening = true;
        log::debug!("{} Injected {} into {}", LOG_TAG_BROWSER, file, tab_id);
        Ok(())
    }
}

#[async_trait]
impl ExtensionMessenger for SimulatedBrowser {
    async fn send_to_tab(&self, tab_id: TabId, message: ExtensionMessage) -> Result<MessageResponse> {
        let mut tabs = lock(&self.tabs);
        let tab = match tabs.get_mut(&tab_id) {
            Some(tab) if tab.listening => tab,
            _ => anyhow::bail!(MESSAGE_NO_RECEIVER),
        };

        log::debug!("{} {} <- {}", LOG_TAG_BROWSER, tab_id, message.action());
        let response = match message {
            ExtensionMessage::PingContent => MessageResponse::ok().with_message(MESSAGE_PONG),
            _ => MessageResponse::ok(),
        };
        tab.inbox.push(message);
        Ok(response)
    }

    async fn send_to_runtime(&self, message: ExtensionMessage) -> Result<MessageResponse> {
        let router = self
            .offscreen_router()
            .ok_or_else(|| anyhow::anyhow!(MESSAGE_NO_RECEIVER))?;

        router
            .request(message, MessageSender::extension_page())
            .await
            .ok_or_else(|| {
                anyhow::anyhow!("The message port closed before a response was received.")
            })
    }
}

#[async_trait]
impl OffscreenDocuments for SimulatedBrowser {
    async fn has_document(&self, path: &str) -> Result<bool> {
        Ok(lock(&self.offscreen)
            .as_ref()
            .is_some_and(|document| document.path == path))
    }

    async fn create_document(
        &self,
        path: &str,
        reasons: &[OffscreenReason],
        justification: &str,
    ) -> Result<()> {
        tokio::task::yield_now().await;

        let mut offscreen = lock(&self.offscreen);
        if offscreen.is_some() {
            anyhow::bail!("Only a single offscreen document may be created.");
        }
        if reasons.is_empty() || justification.is_empty() {
            anyhow::bail!("Offscreen documents need a reason and a justification");
        }

        let host = OffscreenHost::build(Arc::clone(&self.engine_factory));
        let router = Arc::new(host.router());
        *offscreen = Some(OffscreenDocument {
            path: path.to_string(),
            host,
            router,
        });
        self.offscreen_creations.fetch_add(1, Ordering::SeqCst);

        log::info!("{} Created offscreen document {} for {:?}", LOG_TAG_BROWSER, path, reasons);
        Ok(())
    }

    async fn close_document(&self) -> Result<()> {
        if lock(&self.offscreen).take().is_none() {
            anyhow::bail!("No current offscreen document");
        }
        Ok(())
    }
}

#[async_trait]
impl HostEnvironment for SimulatedBrowser {
    fn ui_language(&self) -> String {
        lock(&self.ui_language).clone()
    }

    async fn command_shortcut(&self, command: &str) -> Result<Option<String>> {
        if command != ACTION_COMMAND_NAME {
            return Ok(None);
        }
        Ok(lock(&self.shortcut).clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::ocr_worker_pool::test_support::ScriptedEngineFactory;
    use crate::global_constants::CONTENT_SCRIPT_PATH;

    fn browser() -> Arc<SimulatedBrowser> {
        SimulatedBrowser::new(Arc::new(ScriptedEngineFactory::default()))
    }

    #[tokio::test]
    async fn test_restricted_pages_refuse_injection() {
        let browser = browser();
        let store = browser.open_tab("https://chromewebstore.google.com/detail/x");
        let article = browser.open_tab("https://example.com/article");

        assert!(browser.inject_script(store.id, CONTENT_SCRIPT_PATH).await.is_err());
        assert!(browser.inject_script(article.id, CONTENT_SCRIPT_PATH).await.is_ok());
        assert!(browser.send_to_tab(article.id, ExtensionMessage::PingContent).await.is_ok());
    }

    #[tokio::test]
    async fn test_messages_to_tabs_without_listener_fail() {
        let browser = browser();
        let tab = browser.open_tab("https://example.com");

        let error = browser
            .send_to_tab(tab.id, ExtensionMessage::PingContent)
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), MESSAGE_NO_RECEIVER);
        assert!(browser.messages_for(tab.id).is_empty());
    }

    #[tokio::test]
    async fn test_created_tab_reports_completion_on_update_stream() {
        let browser = browser();
        let mut updates = browser.subscribe_updates();

        let tab = browser.create_tab(BACKUP_PAGE_PATH, true).await.unwrap();
        assert_eq!(tab.status, TabStatus::Loading);

        let update = updates.recv().await.unwrap();
        assert_eq!(update, TabUpdate { tab_id: tab.id, status: TabStatus::Complete });
        assert!(browser.get_tab(tab.id).await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_runtime_messages_need_an_offscreen_document() {
        let browser = browser();

        assert!(browser.send_to_runtime(ExtensionMessage::PingOffscreen).await.is_err());

        browser
            .create_document("offscreen.html", &[OffscreenReason::Workers], "ocr")
            .await
            .unwrap();
        let reply = browser.send_to_runtime(ExtensionMessage::PingOffscreen).await.unwrap();

        assert_eq!(reply.message.as_deref(), Some(MESSAGE_PONG));
        assert!(browser
            .create_document("offscreen.html", &[OffscreenReason::Workers], "ocr")
            .await
            .is_err());
        assert_eq!(browser.offscreen_creations(), 1);
    }
}
