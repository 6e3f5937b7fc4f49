use std::sync::Arc;

use crate::core::interfaces::ports::{ExtensionMessenger, ScriptInjector};
use crate::core::models::{CoordinatorError, ExtensionMessage, Result, TabId};
use crate::global_constants::{CONTENT_SCRIPT_PATH, LOG_TAG_GATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    AlreadyPresent,
    Injected,
}

/// Makes sure a UI host script is listening in a tab before the coordinator
/// messages it.
pub struct ContentScriptGate {
    messenger: Arc<dyn ExtensionMessenger>,
    injector: Arc<dyn ScriptInjector>,
}

impl ContentScriptGate {
    pub fn new(messenger: Arc<dyn ExtensionMessenger>, injector: Arc<dyn ScriptInjector>) -> Self {
        Self {
            messenger,
            injector,
        }
    }

    /// Pings the tab and injects the UI host on failure. Injection is
    /// complete when it resolves, so no second ping is sent.
    pub async fn ensure_ready(&self, tab_id: TabId) -> Result<GateOutcome> {
        match self
            .messenger
            .send_to_tab(tab_id, ExtensionMessage::PingContent)
            .await
        {
            Ok(_) => {
                log::debug!("{} UI host already listening in {}", LOG_TAG_GATE, tab_id);
                return Ok(GateOutcome::AlreadyPresent);
            }
            Err(error) => {
                log::debug!(
                    "{} No UI host in {} ({:#}), injecting {}",
                    LOG_TAG_GATE,
                    tab_id,
                    error,
                    CONTENT_SCRIPT_PATH
                );
            }
        }

        self.injector
            .inject_script(tab_id, CONTENT_SCRIPT_PATH)
            .await
            .map_err(|error| {
                log::warn!("{} Injection into {} failed: {:#}", LOG_TAG_GATE, tab_id, error);
                CoordinatorError::InjectionFailed(format!("{:#}", error))
            })?;

        log::info!("{} Injected UI host into {}", LOG_TAG_GATE, tab_id);
        Ok(GateOutcome::Injected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::MessageResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockMessenger {
        listening: bool,
        pings: AtomicUsize,
    }

    #[async_trait]
    impl ExtensionMessenger for MockMessenger {
        async fn send_to_tab(
            &self,
            _tab_id: TabId,
            _message: ExtensionMessage,
        ) -> anyhow::Result<MessageResponse> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.listening {
                Ok(MessageResponse::ok())
            } else {
                anyhow::bail!("Receiving end does not exist")
            }
        }

        async fn send_to_runtime(&self, _message: ExtensionMessage) -> anyhow::Result<MessageResponse> {
            anyhow::bail!("not used")
        }
    }

    struct MockInjector {
        allowed: bool,
        injections: AtomicUsize,
    }

    #[async_trait]
    impl ScriptInjector for MockInjector {
        async fn inject_script(&self, _tab_id: TabId, file: &str) -> anyhow::Result<()> {
            assert_eq!(file, CONTENT_SCRIPT_PATH);
            self.injections.fetch_add(1, Ordering::SeqCst);
            if self.allowed {
                Ok(())
            } else {
                anyhow::bail!("Cannot access contents of the page")
            }
        }
    }

    fn create_gate(listening: bool, allowed: bool) -> (ContentScriptGate, Arc<MockMessenger>, Arc<MockInjector>) {
        let messenger = Arc::new(MockMessenger {
            listening,
            pings: AtomicUsize::new(0),
        });
        let injector = Arc::new(MockInjector {
            allowed,
            injections: AtomicUsize::new(0),
        });
        let gate = ContentScriptGate::new(messenger.clone(), injector.clone());
        (gate, messenger, injector)
    }

    #[tokio::test]
    async fn test_responsive_tab_is_not_injected() {
        let (gate, _, injector) = create_gate(true, true);

        let outcome = gate.ensure_ready(TabId(3)).await.unwrap();

        assert_eq!(outcome, GateOutcome::AlreadyPresent);
        assert_eq!(injector.injections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_silent_tab_is_injected_once_without_second_ping() {
        let (gate, messenger, injector) = create_gate(false, true);

        let outcome = gate.ensure_ready(TabId(3)).await.unwrap();

        assert_eq!(outcome, GateOutcome::Injected);
        assert_eq!(injector.injections.load(Ordering::SeqCst), 1);
        assert_eq!(messenger.pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_injection_failure_is_reported_as_recoverable() {
        let (gate, _, injector) = create_gate(false, false);

        let error = gate.ensure_ready(TabId(3)).await.unwrap_err();

        assert!(matches!(error, CoordinatorError::InjectionFailed(_)));
        assert!(error.is_recoverable());
        assert_eq!(injector.injections.load(Ordering::SeqCst), 1);
    }
}
