use std::sync::Arc;

use crate::core::interfaces::ports::BrowserTabs;
use crate::core::models::{CoordinatorError, EncodedImage, Result};
use crate::global_constants::{CAPTURE_MIME_TYPE, LOG_TAG_CAPTURE};

pub struct CaptureService {
    tabs: Arc<dyn BrowserTabs>,
}

impl CaptureService {
    pub fn new(tabs: Arc<dyn BrowserTabs>) -> Self {
        log::debug!("{} initializing capture service", LOG_TAG_CAPTURE);
        Self { tabs }
    }

    pub async fn capture_visible_tab(&self) -> Result<EncodedImage> {
        log::debug!("{} capturing visible tab", LOG_TAG_CAPTURE);

        let image = self
            .tabs
            .capture_visible_tab()
            .await
            .map_err(CoordinatorError::host)?;

        if image.mime_type() != Some(CAPTURE_MIME_TYPE) {
            return Err(CoordinatorError::HostPrimitive(format!(
                "capture returned {:?}, expected {}",
                image.mime_type(),
                CAPTURE_MIME_TYPE
            )));
        }

        log::info!(
            "{} captured visible tab ({} bytes encoded)",
            LOG_TAG_CAPTURE,
            image.as_data_url().len()
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{TabId, TabInfo, TabUpdate};
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    struct MockTabs {
        capture: std::result::Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl BrowserTabs for MockTabs {
        async fn capture_visible_tab(&self) -> anyhow::Result<EncodedImage> {
            match self.capture {
                Ok(url) => Ok(EncodedImage::from_data_url(url)),
                Err(reason) => anyhow::bail!(reason),
            }
        }

        async fn create_tab(&self, _url: &str, _active: bool) -> anyhow::Result<TabInfo> {
            anyhow::bail!("not used")
        }

        async fn get_tab(&self, _tab_id: TabId) -> anyhow::Result<TabInfo> {
            anyhow::bail!("not used")
        }

        fn subscribe_updates(&self) -> broadcast::Receiver<TabUpdate> {
            broadcast::channel(1).1
        }
    }

    #[tokio::test]
    async fn test_capture_returns_png_image() {
        let service = CaptureService::new(Arc::new(MockTabs {
            capture: Ok("data:image/png;base64,AAAA"),
        }));

        let image = service.capture_visible_tab().await.unwrap();

        assert_eq!(image.as_data_url(), "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn test_capture_failure_is_host_primitive_error() {
        let service = CaptureService::new(Arc::new(MockTabs {
            capture: Err("activeTab permission not granted"),
        }));

        let result = service.capture_visible_tab().await;

        assert!(matches!(result, Err(CoordinatorError::HostPrimitive(message)) if message.contains("activeTab")));
    }

    #[tokio::test]
    async fn test_capture_in_unexpected_format_is_rejected() {
        let service = CaptureService::new(Arc::new(MockTabs {
            capture: Ok("data:image/jpeg;base64,AAAA"),
        }));

        let result = service.capture_visible_tab().await;

        assert!(matches!(result, Err(CoordinatorError::HostPrimitive(_))));
    }
}
