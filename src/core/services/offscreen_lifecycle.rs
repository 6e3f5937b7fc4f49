//! Keeps exactly one offscreen document alive for the OCR engine.
//!
//! Creation is single-flight: the first caller that finds the document
//! missing stores a shared creation future in `pending_creation`, and every
//! caller that arrives while it runs awaits the same future.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::core::interfaces::ports::{ExtensionMessenger, OffscreenDocuments, OffscreenReason};
use crate::core::models::ExtensionMessage;
use crate::global_constants::{LOG_TAG_OFFSCREEN, OFFSCREEN_DOCUMENT_PATH, OFFSCREEN_JUSTIFICATION};

type CreationFuture = Shared<BoxFuture<'static, Result<(), String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffscreenState {
    Absent,
    Creating,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffscreenReadiness {
    Ready,
    NotReady,
}

impl OffscreenReadiness {
    pub fn is_ready(self) -> bool {
        self == OffscreenReadiness::Ready
    }
}

pub struct OffscreenLifecycleManager {
    offscreen: Arc<dyn OffscreenDocuments>,
    messenger: Arc<dyn ExtensionMessenger>,
    document_path: String,
    pending_creation: Mutex<Option<CreationFuture>>,
    state: Arc<Mutex<OffscreenState>>,
}

impl OffscreenLifecycleManager {
    pub fn new(offscreen: Arc<dyn OffscreenDocuments>, messenger: Arc<dyn ExtensionMessenger>) -> Self {
        Self::with_document_path(offscreen, messenger, OFFSCREEN_DOCUMENT_PATH)
    }

    pub fn with_document_path(
        offscreen: Arc<dyn OffscreenDocuments>,
        messenger: Arc<dyn ExtensionMessenger>,
        document_path: impl Into<String>,
    ) -> Self {
        Self {
            offscreen,
            messenger,
            document_path: document_path.into(),
            pending_creation: Mutex::new(None),
            state: Arc::new(Mutex::new(OffscreenState::Absent)),
        }
    }

    pub fn state(&self) -> OffscreenState {
        *lock(&self.state)
    }

    /// Ping, create if needed, ping once more. Never loops beyond that.
    pub async fn ensure_alive(&self) -> OffscreenReadiness {
        if ping(self.messenger.as_ref()).await {
            set_state(&self.state, OffscreenState::Present);
            return OffscreenReadiness::Ready;
        }

        log::info!("{} Document not answering, ensuring it exists", LOG_TAG_OFFSCREEN);

        let creation = self.join_or_start_creation();
        let created = creation.clone().await;
        self.finish_creation(&creation);

        if let Err(error) = created {
            log::error!("{} Creating offscreen document failed: {}", LOG_TAG_OFFSCREEN, error);
            set_state(&self.state, OffscreenState::Absent);
            return OffscreenReadiness::NotReady;
        }

        if ping(self.messenger.as_ref()).await {
            set_state(&self.state, OffscreenState::Present);
            log::info!("{} Offscreen document ready", LOG_TAG_OFFSCREEN);
            OffscreenReadiness::Ready
        } else {
            log::error!("{} Offscreen document still not answering after creation", LOG_TAG_OFFSCREEN);
            set_state(&self.state, OffscreenState::Absent);
            OffscreenReadiness::NotReady
        }
    }

    fn join_or_start_creation(&self) -> CreationFuture {
        let mut pending = lock(&self.pending_creation);
        if let Some(existing) = pending.as_ref() {
            log::debug!("{} Joining in-flight creation", LOG_TAG_OFFSCREEN);
            return existing.clone();
        }

        set_state(&self.state, OffscreenState::Creating);
        let creation = create_document(
            Arc::clone(&self.offscreen),
            Arc::clone(&self.messenger),
            self.document_path.clone(),
        )
        .boxed()
        .shared();
        *pending = Some(creation.clone());
        creation
    }

    fn finish_creation(&self, finished: &CreationFuture) {
        let mut pending = lock(&self.pending_creation);
        let is_same = pending
            .as_ref()
            .is_some_and(|current| Shared::ptr_eq(current, finished));
        if is_same {
            *pending = None;
        }
    }
}

async fn create_document(
    offscreen: Arc<dyn OffscreenDocuments>,
    messenger: Arc<dyn ExtensionMessenger>,
    document_path: String,
) -> Result<(), String> {
    let exists = offscreen
        .has_document(&document_path)
        .await
        .map_err(|error| format!("{:#}", error))?;

    if exists {
        if ping(messenger.as_ref()).await {
            log::debug!("{} Existing document answered, skipping creation", LOG_TAG_OFFSCREEN);
            return Ok(());
        }
        log::warn!("{} Closing unresponsive offscreen document", LOG_TAG_OFFSCREEN);
        offscreen
            .close_document()
            .await
            .map_err(|error| format!("{:#}", error))?;
    }

    log::info!("{} Creating offscreen document {}", LOG_TAG_OFFSCREEN, document_path);
    offscreen
        .create_document(&document_path, &[OffscreenReason::Workers], OFFSCREEN_JUSTIFICATION)
        .await
        .map_err(|error| format!("{:#}", error))
}

async fn ping(messenger: &dyn ExtensionMessenger) -> bool {
    match messenger.send_to_runtime(ExtensionMessage::PingOffscreen).await {
        Ok(_) => true,
        Err(error) => {
            log::debug!("{} Ping failed: {:#}", LOG_TAG_OFFSCREEN, error);
            false
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_state(state: &Mutex<OffscreenState>, next: OffscreenState) {
    *lock(state) = next;
}
