//! Handler registration and the reply-emission handle

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use mw_protocol::{Action, Frame};

/// Write-only handle a handler uses to emit reply frames.
///
/// Replies are queued to the dispatch router, which forwards each one to
/// the connection owning the frame's session. Emitting is best-effort:
/// once the router has shut down the frame is dropped.
#[derive(Clone)]
pub struct ReplyHandle {
    tx: mpsc::Sender<Frame>,
}

impl ReplyHandle {
    pub(crate) fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }

    /// Queue a reply frame for routing.
    ///
    /// Blocks while the router's outbound queue is full.
    pub async fn send(&self, frame: Frame) {
        if self.tx.send(frame).await.is_err() {
            tracing::debug!("reply dropped: dispatch router has shut down");
        }
    }
}

/// Callback invoked with each inbound frame matching its registered
/// action.
///
/// Handlers may run concurrently with themselves and with each other, and
/// may emit any number of replies through the handle, targeting any
/// session (normally the one carried by the inbound frame).
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Process one inbound frame
    async fn handle(&self, frame: Frame, replies: ReplyHandle);
}

/// Adapter implementing [`Handler`] for plain async closures
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Frame, ReplyHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, frame: Frame, replies: ReplyHandle) {
        (self.0)(frame, replies).await;
    }
}

/// Registry mapping an action code to its ordered list of handlers
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<Action, Vec<Arc<dyn Handler>>>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Append a handler to the action's list, creating the list if
    /// absent.
    ///
    /// Repeated registrations accumulate in insertion order; nothing is
    /// replaced.
    pub async fn register(&self, action: Action, handler: Arc<dyn Handler>) {
        self.handlers
            .write()
            .await
            .entry(action)
            .or_default()
            .push(handler);
    }

    /// Handlers registered for an action, in registration order.
    ///
    /// An empty list means no handler is registered and the frame is
    /// dropped; that is not an error.
    pub async fn lookup(&self, action: Action) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .read()
            .await
            .get(&action)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_protocol::SessionId;
    use tokio::sync::Mutex;

    fn probe_handler(
        log: Arc<Mutex<Vec<u32>>>,
        tag: u32,
    ) -> Arc<dyn Handler> {
        Arc::new(FnHandler(move |_frame: Frame, _replies: ReplyHandle| {
            let log = Arc::clone(&log);
            async move {
                log.lock().await.push(tag);
            }
        }))
    }

    #[tokio::test]
    async fn test_lookup_unknown_action_is_empty() {
        let registry = HandlerRegistry::new();
        assert!(registry.lookup(99).await.is_empty());
    }

    #[tokio::test]
    async fn test_registration_order_preserved() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register(5, probe_handler(Arc::clone(&log), 1)).await;
        registry.register(5, probe_handler(Arc::clone(&log), 2)).await;
        registry.register(5, probe_handler(Arc::clone(&log), 3)).await;

        let handlers = registry.lookup(5).await;
        assert_eq!(handlers.len(), 3);

        let (reply_tx, _reply_rx) = mpsc::channel(4);
        let frame = Frame::new(SessionId::ZERO, 5, bytes::Bytes::new());
        for handler in &handlers {
            handler
                .handle(frame.clone(), ReplyHandle::new(reply_tx.clone()))
                .await;
        }

        assert_eq!(*log.lock().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_registrations_for_other_actions_are_separate() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register(1, probe_handler(Arc::clone(&log), 1)).await;
        registry.register(2, probe_handler(Arc::clone(&log), 2)).await;

        assert_eq!(registry.lookup(1).await.len(), 1);
        assert_eq!(registry.lookup(2).await.len(), 1);
        assert!(registry.lookup(3).await.is_empty());
    }
}
