//! Action dispatch for one messaging context.
//!
//! Every registration declares up front whether its reply is synchronous
//! (the channel closes as soon as the handler returns) or asynchronous (the
//! handler runs in its own task and the channel stays open until it
//! replies). A [`ReplyHandle`] is consumed by the reply, so a second reply
//! cannot be written, and one dropped unanswered still sends an error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::oneshot;

use crate::core::models::{ExtensionAction, ExtensionMessage, MessageResponse, MessageSender, Result};
use crate::global_constants::{LOG_TAG_ROUTER, MESSAGE_UNANSWERED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Synchronous,
    Asynchronous,
}

/// What happened to the reply channel when a message was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Closed,
    KeptOpen,
    Unhandled,
}

pub struct ReplyHandle {
    action: ExtensionAction,
    sender: Option<oneshot::Sender<MessageResponse>>,
}

impl ReplyHandle {
    pub fn channel(action: ExtensionAction) -> (Self, oneshot::Receiver<MessageResponse>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                action,
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn send(mut self, response: MessageResponse) {
        if let Some(sender) = self.sender.take() {
            if sender.send(response).is_err() {
                log::debug!("{} Reply to {} had no listener", LOG_TAG_ROUTER, self.action);
            }
        }
    }

    /// Closes the channel without a reply.
    pub fn close(mut self) {
        self.sender.take();
    }
}

impl Drop for ReplyHandle {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            log::warn!("{} {} handler finished without replying", LOG_TAG_ROUTER, self.action);
            let _ = sender.send(MessageResponse::error(MESSAGE_UNANSWERED));
        }
    }
}

type SyncHandler<C> =
    Box<dyn Fn(Arc<C>, ExtensionMessage, MessageSender) -> Option<MessageResponse> + Send + Sync>;
type AsyncHandler<C> = Box<
    dyn Fn(Arc<C>, ExtensionMessage, MessageSender) -> BoxFuture<'static, Result<MessageResponse>>
        + Send
        + Sync,
>;

enum Handler<C> {
    Synchronous(SyncHandler<C>),
    Asynchronous(AsyncHandler<C>),
}

pub struct MessageRouter<C> {
    context: Arc<C>,
    handlers: HashMap<ExtensionAction, Handler<C>>,
}

impl<C> MessageRouter<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(context: Arc<C>) -> Self {
        Self {
            context,
            handlers: HashMap::new(),
        }
    }

    pub fn on_sync<F>(mut self, action: ExtensionAction, handler: F) -> Self
    where
        F: Fn(Arc<C>, ExtensionMessage, MessageSender) -> Option<MessageResponse> + Send + Sync + 'static,
    {
        self.register(action, Handler::Synchronous(Box::new(handler)));
        self
    }

    pub fn on_async<F, Fut>(mut self, action: ExtensionAction, handler: F) -> Self
    where
        F: Fn(Arc<C>, ExtensionMessage, MessageSender) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<MessageResponse>> + Send + 'static,
    {
        let boxed: AsyncHandler<C> =
            Box::new(move |context, message, sender| handler(context, message, sender).boxed());
        self.register(action, Handler::Asynchronous(boxed));
        self
    }

    fn register(&mut self, action: ExtensionAction, handler: Handler<C>) {
        if self.handlers.insert(action, handler).is_some() {
            log::warn!("{} Replacing handler for {}", LOG_TAG_ROUTER, action);
        }
    }

    pub fn reply_mode(&self, action: ExtensionAction) -> Option<ReplyMode> {
        self.handlers.get(&action).map(|handler| match handler {
            Handler::Synchronous(_) => ReplyMode::Synchronous,
            Handler::Asynchronous(_) => ReplyMode::Asynchronous,
        })
    }

    pub fn dispatch(&self, message: ExtensionMessage, sender: MessageSender, reply: ReplyHandle) -> Dispatch {
        let action = message.action();

        match self.handlers.get(&action) {
            None => {
                log::debug!("{} No handler for {}", LOG_TAG_ROUTER, action);
                reply.close();
                Dispatch::Unhandled
            }
            Some(Handler::Synchronous(handler)) => {
                match handler(Arc::clone(&self.context), message, sender) {
                    Some(response) => reply.send(response),
                    None => reply.close(),
                }
                Dispatch::Closed
            }
            Some(Handler::Asynchronous(handler)) => {
                let pending = handler(Arc::clone(&self.context), message, sender);
                tokio::spawn(async move {
                    let response = match pending.await {
                        Ok(response) => response,
                        Err(error) => {
                            log::warn!("{} {} failed: {}", LOG_TAG_ROUTER, action, error);
                            MessageResponse::error(error.to_string())
                        }
                    };
                    reply.send(response);
                });
                Dispatch::KeptOpen
            }
        }
    }

    /// Dispatches and waits for the reply. `None` when the channel closed
    /// without one.
    pub async fn request(&self, message: ExtensionMessage, sender: MessageSender) -> Option<MessageResponse> {
        let (reply, receiver) = ReplyHandle::channel(message.action());
        self.dispatch(message, sender, reply);
        receiver.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{CoordinatorError, ResponseStatus, TabId};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Context {
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    fn router(context: Arc<Context>) -> MessageRouter<Context> {
        MessageRouter::new(context)
            .on_sync(ExtensionAction::PingOffscreen, |_, _, _| {
                Some(MessageResponse::ok().with_message("pong"))
            })
            .on_sync(ExtensionAction::CleanupStorage, |_, _, _| None)
            .on_async(ExtensionAction::GetShortcut, |context: Arc<Context>, _, _| async move {
                let gate = context.release.lock().unwrap().take();
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok::<_, CoordinatorError>(MessageResponse::ok().with_message("Ctrl+Shift+S"))
            })
            .on_async(ExtensionAction::EnsureOffscreen, |_, _, _| async {
                Err::<MessageResponse, _>(CoordinatorError::OffscreenUnavailable)
            })
    }

    fn from_tab() -> MessageSender {
        MessageSender::from_tab(TabId(3))
    }

    #[tokio::test]
    async fn test_sync_handler_replies_immediately() {
        let router = router(Arc::new(Context::default()));
        let (reply, mut receiver) = ReplyHandle::channel(ExtensionAction::PingOffscreen);

        let dispatch = router.dispatch(ExtensionMessage::PingOffscreen, from_tab(), reply);

        assert_eq!(dispatch, Dispatch::Closed);
        assert_eq!(receiver.try_recv().unwrap().message.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_sync_handler_without_reply_closes_channel() {
        let router = router(Arc::new(Context::default()));

        let response = router.request(ExtensionMessage::CleanupStorage, from_tab()).await;

        assert_eq!(response, None);
    }

    #[tokio::test]
    async fn test_async_handler_keeps_channel_open_until_reply() {
        let (release, gate) = oneshot::channel();
        let context = Arc::new(Context {
            release: Mutex::new(Some(gate)),
        });
        let router = router(context);
        let (reply, receiver) = ReplyHandle::channel(ExtensionAction::GetShortcut);

        let dispatch = router.dispatch(ExtensionMessage::GetShortcut, from_tab(), reply);
        assert_eq!(dispatch, Dispatch::KeptOpen);

        // Other messages are served while the async handler is parked.
        let ping = router.request(ExtensionMessage::PingOffscreen, from_tab()).await;
        assert!(ping.is_some());

        release.send(()).unwrap();
        let response = receiver.await.unwrap();
        assert_eq!(response.message.as_deref(), Some("Ctrl+Shift+S"));
    }

    #[tokio::test]
    async fn test_async_error_becomes_error_reply() {
        let router = router(Arc::new(Context::default()));

        let response = router
            .request(ExtensionMessage::EnsureOffscreen, from_tab())
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn test_unregistered_action_is_unhandled() {
        let router = router(Arc::new(Context::default()));
        let (reply, receiver) = ReplyHandle::channel(ExtensionAction::PingContent);

        let dispatch = router.dispatch(ExtensionMessage::PingContent, from_tab(), reply);

        assert_eq!(dispatch, Dispatch::Unhandled);
        assert!(receiver.await.is_err());
    }

    #[test]
    fn test_dropped_handle_sends_error_reply() {
        let (reply, mut receiver) = ReplyHandle::channel(ExtensionAction::PerformOcr);

        drop(reply);

        let response = receiver.try_recv().unwrap();
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.message.as_deref(), Some(MESSAGE_UNANSWERED));
    }

    #[test]
    fn test_reply_mode_is_declared_at_registration() {
        let router = router(Arc::new(Context::default()));

        assert_eq!(router.reply_mode(ExtensionAction::PingOffscreen), Some(ReplyMode::Synchronous));
        assert_eq!(router.reply_mode(ExtensionAction::GetShortcut), Some(ReplyMode::Asynchronous));
        assert_eq!(router.reply_mode(ExtensionAction::PerformOcr), None);
    }
}
