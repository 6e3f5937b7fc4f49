use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::interfaces::ports::{
    BrowserTabs, ExtensionMessenger, HostEnvironment, KeyValueStorage, OffscreenDocuments,
    ScriptInjector,
};
use crate::core::models::{
    is_supported_language, CoordinatorError, CropPayload, EncodedImage, ExtensionAction,
    ExtensionMessage, MessageResponse, MessageSender, OcrOutcome, OcrResultPayload, Result,
    SelectionRect, SessionPhase, TabId, TabInfo,
};
use crate::core::services::{
    is_restricted_url, BackupTabLauncher, CaptureService, ContentScriptGate, LanguageResolver,
    MessageRouter, OffscreenLifecycleManager, SessionStore,
};
use crate::global_constants::{
    ACTION_COMMAND_NAME, LOG_TAG_COORDINATOR, MESSAGE_SUPERSEDED, SHORTCUTS_PAGE_URL,
};

/// Host primitives the coordinator runs on.
#[derive(Clone)]
pub struct CoordinatorPorts {
    pub tabs: Arc<dyn BrowserTabs>,
    pub injector: Arc<dyn ScriptInjector>,
    pub messenger: Arc<dyn ExtensionMessenger>,
    pub offscreen: Arc<dyn OffscreenDocuments>,
    pub storage: Arc<dyn KeyValueStorage>,
    pub environment: Arc<dyn HostEnvironment>,
}

/// The background context: owns the session and drives every capture from
/// toolbar click to delivered OCR result.
pub struct BackgroundCoordinator {
    tabs: Arc<dyn BrowserTabs>,
    messenger: Arc<dyn ExtensionMessenger>,
    environment: Arc<dyn HostEnvironment>,
    session: SessionStore,
    capture: CaptureService,
    gate: ContentScriptGate,
    backup: BackupTabLauncher,
    offscreen: OffscreenLifecycleManager,
    language: LanguageResolver,
    phase: Mutex<SessionPhase>,
    selection_epoch: AtomicU64,
}

impl BackgroundCoordinator {
    pub fn build(ports: CoordinatorPorts) -> Arc<Self> {
        log::info!("{} Building background coordinator", LOG_TAG_COORDINATOR);

        Arc::new(Self {
            session: SessionStore::new(Arc::clone(&ports.storage)),
            capture: CaptureService::new(Arc::clone(&ports.tabs)),
            gate: ContentScriptGate::new(Arc::clone(&ports.messenger), ports.injector),
            backup: BackupTabLauncher::new(Arc::clone(&ports.tabs), Arc::clone(&ports.messenger)),
            offscreen: OffscreenLifecycleManager::new(ports.offscreen, Arc::clone(&ports.messenger)),
            language: LanguageResolver::new(ports.storage, Arc::clone(&ports.environment)),
            tabs: ports.tabs,
            messenger: ports.messenger,
            environment: ports.environment,
            phase: Mutex::new(SessionPhase::Idle),
            selection_epoch: AtomicU64::new(0),
        })
    }

    /// Message table for everything UI hosts send to the background.
    pub fn router(self: &Arc<Self>) -> MessageRouter<Self> {
        MessageRouter::new(Arc::clone(self))
            .on_async(ExtensionAction::CaptureSuccess, |coordinator: Arc<Self>, message, sender| {
                coordinator.handle_capture_success(message, sender)
            })
            .on_async(ExtensionAction::RequestLanguageUpdate, |coordinator: Arc<Self>, message, _| {
                coordinator.handle_language_update(message)
            })
            .on_async(ExtensionAction::GetShortcut, |coordinator: Arc<Self>, _, _| {
                coordinator.handle_get_shortcut()
            })
            .on_async(ExtensionAction::EnsureOffscreen, |coordinator: Arc<Self>, _, _| {
                coordinator.handle_ensure_offscreen()
            })
            .on_sync(ExtensionAction::OpenShortcutsPage, |coordinator: Arc<Self>, _, _| {
                coordinator.handle_open_shortcuts_page();
                None
            })
            .on_sync(ExtensionAction::CleanupStorage, |coordinator: Arc<Self>, _, _| {
                coordinator.handle_cleanup_storage();
                None
            })
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Toolbar click (or its keyboard shortcut). Returns the tab that ends
    /// up owning the session.
    pub async fn on_action_clicked(self: &Arc<Self>, tab: TabInfo) -> Result<TabId> {
        log::info!(
            "{} Action clicked on {} ({})",
            LOG_TAG_COORDINATOR,
            tab.id,
            tab.url.as_deref().unwrap_or("no url")
        );
        self.enter_phase(SessionPhase::Capturing);

        let captured = match self.capture.capture_visible_tab().await {
            Ok(image) => image,
            Err(error) => {
                self.report_failure(tab.id, None, &error).await;
                return Err(error);
            }
        };

        if let Err(error) = self.session.begin(tab.id, captured.clone()).await {
            self.report_failure(tab.id, Some(captured), &error).await;
            return Err(error);
        }

        self.spawn_engine_warm_up();

        if is_restricted_url(tab.url.as_deref()) {
            log::info!("{} {} is restricted, using backup tab", LOG_TAG_COORDINATOR, tab.id);
            return self.activate_in_backup_tab(&captured).await;
        }

        self.enter_phase(SessionPhase::Activating);
        match self.activate_in_tab(tab.id, &captured).await {
            Ok(()) => {
                self.enter_phase(SessionPhase::OverlayActive);
                Ok(tab.id)
            }
            Err(error) => {
                if error.is_recoverable() {
                    log::info!(
                        "{} {} refused injection ({}), using backup tab",
                        LOG_TAG_COORDINATOR,
                        tab.id,
                        error
                    );
                } else {
                    log::warn!(
                        "{} Direct activation in {} failed ({}), using backup tab",
                        LOG_TAG_COORDINATOR,
                        tab.id,
                        error
                    );
                }
                self.activate_in_backup_tab(&captured).await
            }
        }
    }

    async fn activate_in_tab(&self, tab_id: TabId, captured: &EncodedImage) -> Result<()> {
        self.gate.ensure_ready(tab_id).await?;

        let response = self
            .messenger
            .send_to_tab(tab_id, ExtensionMessage::activate_overlay(Some(captured.clone())))
            .await
            .map_err(CoordinatorError::messaging)?;

        if !response.is_ok() {
            return Err(CoordinatorError::Messaging(format!(
                "overlay activation rejected: {}",
                response.message.unwrap_or_default()
            )));
        }

        log::info!("{} Overlay active in {}", LOG_TAG_COORDINATOR, tab_id);
        Ok(())
    }

    async fn activate_in_backup_tab(&self, captured: &EncodedImage) -> Result<TabId> {
        self.enter_phase(SessionPhase::CreatingBackupTab);

        match self.backup.launch(&self.session, captured).await {
            Ok(tab_id) => {
                self.enter_phase(SessionPhase::OverlayActive);
                Ok(tab_id)
            }
            Err(error) => {
                self.fail_session(&error).await;
                Err(error)
            }
        }
    }

    /// Gets the offscreen engine loading while the user is still selecting.
    fn spawn_engine_warm_up(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = coordinator.warm_up_engine().await {
                log::warn!("{} Engine warm-up failed: {}", LOG_TAG_COORDINATOR, error);
            }
        });
    }

    async fn warm_up_engine(&self) -> Result<String> {
        if !self.offscreen.ensure_alive().await.is_ready() {
            return Err(CoordinatorError::OffscreenUnavailable);
        }

        let language = self.language.resolve().await;
        let response = self
            .messenger
            .send_to_runtime(ExtensionMessage::warm_up_engine(language.code.clone()))
            .await
            .map_err(CoordinatorError::messaging)?;

        if !response.is_ok() {
            return Err(CoordinatorError::EngineInitialization(
                response.message.unwrap_or_default(),
            ));
        }

        log::debug!("{} Engine warmed up for {}", LOG_TAG_COORDINATOR, language.code);
        Ok(response.language.unwrap_or(language.code))
    }

    async fn handle_capture_success(
        self: Arc<Self>,
        message: ExtensionMessage,
        sender: MessageSender,
    ) -> Result<MessageResponse> {
        let selection = match message {
            ExtensionMessage::CaptureSuccess(selection) => selection,
            other => return Err(unexpected_payload(&other)),
        };

        let owner = self.session.owner_tab().await?;
        if let Some(sender_tab) = sender.tab_id {
            if sender_tab != owner {
                log::warn!(
                    "{} Ignoring selection from {}, session belongs to {}",
                    LOG_TAG_COORDINATOR,
                    sender_tab,
                    owner
                );
                return Err(CoordinatorError::Messaging(format!(
                    "selection sent from {} but the session belongs to {}",
                    sender_tab, owner
                )));
            }
        }

        let epoch = self.selection_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!(
            "{} Selection #{} in {}: {}x{} at ({}, {})",
            LOG_TAG_COORDINATOR,
            epoch,
            owner,
            selection.width,
            selection.height,
            selection.x,
            selection.y
        );

        match self.process_selection(owner, &selection, epoch).await {
            Ok(response) => Ok(response),
            Err(error) => {
                if self.is_current_selection(epoch) {
                    let image_context = self.session.image_context().await;
                    self.report_failure(owner, image_context, &error).await;
                }
                Err(error)
            }
        }
    }

    async fn process_selection(
        &self,
        owner: TabId,
        selection: &SelectionRect,
        epoch: u64,
    ) -> Result<MessageResponse> {
        let captured = self.session.captured_image().await?;
        let cropped = captured.crop_selection(selection)?;
        self.session.set_cropped_image(cropped.clone()).await?;
        self.enter_phase(SessionPhase::Cropped);

        let show_crop = ExtensionMessage::ShowCrop(CropPayload {
            cropped_image_url: cropped.clone(),
        });
        if let Err(error) = self.messenger.send_to_tab(owner, show_crop).await {
            log::warn!("{} Could not show crop in {}: {:#}", LOG_TAG_COORDINATOR, owner, error);
        }

        let language = self.language.resolve().await;
        let recognized = self.recognize(&cropped, &language.code).await;

        if !self.is_current_selection(epoch) {
            log::info!(
                "{} Dropping result of selection #{}, a newer one exists",
                LOG_TAG_COORDINATOR,
                epoch
            );
            return Ok(MessageResponse::ok().with_message(MESSAGE_SUPERSEDED));
        }

        let outcome = recognized?;
        self.deliver_result(owner, OcrResultPayload::succeeded(&outcome, cropped))
            .await?;
        self.enter_phase(SessionPhase::ResultDelivered);

        Ok(MessageResponse::ok())
    }

    async fn handle_language_update(self: Arc<Self>, message: ExtensionMessage) -> Result<MessageResponse> {
        let payload = match message {
            ExtensionMessage::RequestLanguageUpdate(payload) => payload,
            other => return Err(unexpected_payload(&other)),
        };
        log::info!("{} Language update to {}", LOG_TAG_COORDINATOR, payload.language);

        match self.rerun_in_language(&payload.language).await {
            Ok(response) => Ok(response),
            Err(error) => {
                log::error!("{} Language update failed: {}", LOG_TAG_COORDINATOR, error);
                let mut response = MessageResponse::error(error.to_string());
                response.cropped_image_url = self.session.image_context().await;
                Ok(response)
            }
        }
    }

    async fn rerun_in_language(&self, language: &str) -> Result<MessageResponse> {
        if !is_supported_language(language) {
            return Err(CoordinatorError::UnsupportedLanguage(language.to_string()));
        }

        let cropped = self.session.cropped_image().await?;
        self.session.set_cropped_image(cropped.clone()).await?;

        let outcome = self.recognize(&cropped, language).await?;
        self.enter_phase(SessionPhase::ResultDelivered);

        let mut response = MessageResponse::from_outcome(&outcome);
        response.cropped_image_url = Some(cropped);
        Ok(response)
    }

    async fn handle_get_shortcut(self: Arc<Self>) -> Result<MessageResponse> {
        let shortcut = self
            .environment
            .command_shortcut(ACTION_COMMAND_NAME)
            .await
            .map_err(CoordinatorError::host)?
            .unwrap_or_default();

        log::debug!("{} Shortcut is {:?}", LOG_TAG_COORDINATOR, shortcut);
        Ok(MessageResponse {
            shortcut: Some(shortcut),
            ..MessageResponse::ok()
        })
    }

    async fn handle_ensure_offscreen(self: Arc<Self>) -> Result<MessageResponse> {
        let language = self.warm_up_engine().await?;
        Ok(MessageResponse {
            language: Some(language),
            ..MessageResponse::ok()
        })
    }

    fn handle_open_shortcuts_page(self: Arc<Self>) {
        tokio::spawn(async move {
            if let Err(error) = self.tabs.create_tab(SHORTCUTS_PAGE_URL, true).await {
                log::warn!("{} Could not open shortcuts page: {:#}", LOG_TAG_COORDINATOR, error);
            }
        });
    }

    /// Drops the stored screenshots and returns to idle. The owner tab id
    /// stays so a late message can still be attributed.
    pub async fn cleanup_storage(&self) -> Result<()> {
        self.enter_phase(SessionPhase::Idle);
        self.session.clear_images().await
    }

    fn handle_cleanup_storage(self: Arc<Self>) {
        tokio::spawn(async move {
            if let Err(error) = self.cleanup_storage().await {
                log::warn!("{} Storage cleanup failed: {}", LOG_TAG_COORDINATOR, error);
            }
        });
    }

    async fn recognize(&self, image: &EncodedImage, language: &str) -> Result<OcrOutcome> {
        self.enter_phase(SessionPhase::RecognizingOcr);

        if !self.offscreen.ensure_alive().await.is_ready() {
            return Err(CoordinatorError::OffscreenUnavailable);
        }

        let response = self
            .messenger
            .send_to_runtime(ExtensionMessage::perform_ocr(image.clone(), language))
            .await
            .map_err(CoordinatorError::messaging)?;

        response
            .into_outcome(language)
            .map_err(CoordinatorError::Recognition)
    }

    async fn deliver_result(&self, owner: TabId, payload: OcrResultPayload) -> Result<()> {
        let success = payload.success;
        self.messenger
            .send_to_tab(owner, ExtensionMessage::OcrResult(payload))
            .await
            .map_err(CoordinatorError::messaging)?;

        log::info!(
            "{} Delivered {} result to {}",
            LOG_TAG_COORDINATOR,
            if success { "OCR" } else { "error" },
            owner
        );
        Ok(())
    }

    /// Reports to whichever tab owns the started session. Only valid once
    /// `begin` has succeeded.
    async fn fail_session(&self, error: &CoordinatorError) {
        match self.session.owner_tab().await {
            Ok(owner) => {
                let image_context = self.session.image_context().await;
                self.report_failure(owner, image_context, error).await;
            }
            Err(lookup_error) => {
                log::error!(
                    "{} Session failed with no owner to tell ({}): {}",
                    LOG_TAG_COORDINATOR,
                    lookup_error,
                    error
                );
                self.enter_phase(SessionPhase::Idle);
            }
        }
    }

    /// Best effort: tells `tab_id` what went wrong, then resets the phase.
    async fn report_failure(
        &self,
        tab_id: TabId,
        image_context: Option<EncodedImage>,
        error: &CoordinatorError,
    ) {
        log::error!("{} Session failed: {}", LOG_TAG_COORDINATOR, error);

        let payload = OcrResultPayload::failed(error.to_string(), image_context);
        if let Err(delivery_error) = self.deliver_result(tab_id, payload).await {
            log::warn!(
                "{} Could not report failure to {}: {}",
                LOG_TAG_COORDINATOR,
                tab_id,
                delivery_error
            );
        }

        self.enter_phase(SessionPhase::Idle);
    }

    fn is_current_selection(&self, epoch: u64) -> bool {
        self.selection_epoch.load(Ordering::SeqCst) == epoch
    }

    fn enter_phase(&self, next: SessionPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !phase.can_transition_to(next) {
            log::warn!("{} Unexpected phase change {} -> {}", LOG_TAG_COORDINATOR, *phase, next);
        }
        log::debug!("{} Phase {} -> {}", LOG_TAG_COORDINATOR, *phase, next);
        *phase = next;
    }
}

fn unexpected_payload(message: &ExtensionMessage) -> CoordinatorError {
    CoordinatorError::Messaging(format!("unexpected payload for {}", message.action()))
}
