use std::sync::Arc;

use crate::core::interfaces::adapters::OcrEngineFactory;
use crate::core::models::{
    CoordinatorError, ExtensionAction, ExtensionMessage, MessageResponse, Result,
};
use crate::core::services::{MessageRouter, OcrWorkerPool};
use crate::global_constants::{LOG_TAG_OFFSCREEN, MESSAGE_PONG};

/// The offscreen context: answers liveness pings and runs OCR jobs on the
/// single engine it owns.
pub struct OffscreenHost {
    pool: OcrWorkerPool,
}

impl OffscreenHost {
    pub fn build(factory: Arc<dyn OcrEngineFactory>) -> Arc<Self> {
        log::info!("{} Offscreen host starting", LOG_TAG_OFFSCREEN);
        Arc::new(Self {
            pool: OcrWorkerPool::new(factory),
        })
    }

    pub fn pool(&self) -> &OcrWorkerPool {
        &self.pool
    }

    pub fn router(self: &Arc<Self>) -> MessageRouter<Self> {
        MessageRouter::new(Arc::clone(self))
            .on_sync(ExtensionAction::PingOffscreen, |_, _, _| {
                Some(MessageResponse::ok().with_message(MESSAGE_PONG))
            })
            .on_async(ExtensionAction::PerformOcr, |host: Arc<Self>, message, _| {
                host.handle_perform_ocr(message)
            })
            .on_async(ExtensionAction::WarmUpEngine, |host: Arc<Self>, message, _| {
                host.handle_warm_up(message)
            })
    }

    async fn handle_perform_ocr(self: Arc<Self>, message: ExtensionMessage) -> Result<MessageResponse> {
        let payload = match message {
            ExtensionMessage::PerformOcr(payload) => payload,
            other => return Err(unexpected_payload(&other)),
        };

        let outcome = self.pool.recognize(&payload.image, &payload.language).await?;
        Ok(MessageResponse::from_outcome(&outcome))
    }

    async fn handle_warm_up(self: Arc<Self>, message: ExtensionMessage) -> Result<MessageResponse> {
        let payload = match message {
            ExtensionMessage::WarmUpEngine(payload) => payload,
            other => return Err(unexpected_payload(&other)),
        };

        let language = self.pool.warm_up(&payload.language).await?;
        Ok(MessageResponse {
            language: Some(language),
            ..MessageResponse::ok()
        })
    }
}

fn unexpected_payload(message: &ExtensionMessage) -> CoordinatorError {
    CoordinatorError::Messaging(format!("unexpected payload for {}", message.action()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{MessageSender, ResponseStatus};
    use crate::core::services::ocr_worker_pool::test_support::{sample_image, ScriptedEngineFactory};

    #[tokio::test]
    async fn test_ping_is_answered_synchronously() {
        let host = OffscreenHost::build(Arc::new(ScriptedEngineFactory::default()));

        let response = host
            .router()
            .request(ExtensionMessage::PingOffscreen, MessageSender::extension_page())
            .await
            .unwrap();

        assert_eq!(response.message.as_deref(), Some(MESSAGE_PONG));
    }

    #[tokio::test]
    async fn test_perform_ocr_replies_with_text_confidence_and_language() {
        let host = OffscreenHost::build(Arc::new(ScriptedEngineFactory::default()));

        let response = host
            .router()
            .request(
                ExtensionMessage::perform_ocr(sample_image(), "deu"),
                MessageSender::extension_page(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.message.as_deref(), Some("text in deu"));
        assert_eq!(response.language.as_deref(), Some("deu"));
        assert_eq!(response.confidence, Some(88.0));
    }

    #[tokio::test]
    async fn test_engine_failure_becomes_error_reply() {
        let host = OffscreenHost::build(Arc::new(ScriptedEngineFactory::with_broken(&["eng"])));

        let response = host
            .router()
            .request(ExtensionMessage::warm_up_engine("eng"), MessageSender::extension_page())
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(host.pool().current_language().await, None);
    }
}
