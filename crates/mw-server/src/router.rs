//! Dispatch router: the routing authority between connections and
//! handlers
//!
//! Inbound frames (from any connection) are fanned out to the handlers
//! registered for their action; outbound frames (from any handler) are
//! forwarded to the sink of the connection owning their session. Each
//! queued item is processed on its own task, so a slow handler or a slow
//! writer never stalls routing of unrelated frames.
//!
//! No ordering is guaranteed across handlers or across connections.
//! Within one connection, delivery order is whatever order frames reach
//! its sink, which concurrent handler tasks may race on.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use mw_protocol::Frame;

use crate::registry::{HandlerRegistry, ReplyHandle, SessionRegistry};

/// Capacity of the router's inbound and outbound queues.
///
/// Senders block when a queue fills, trading backpressure for unbounded
/// memory growth.
pub const ROUTER_QUEUE_CAPACITY: usize = 1024;

/// Routes inbound frames to handlers and outbound frames to connections.
pub(crate) struct DispatchRouter {
    sessions: Arc<SessionRegistry>,
    handlers: Arc<HandlerRegistry>,
    inbound: mpsc::Receiver<Frame>,
    outbound: mpsc::Receiver<Frame>,
    /// Cloned into every [`ReplyHandle`] handed to handlers
    reply_tx: mpsc::Sender<Frame>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl DispatchRouter {
    pub(crate) fn new(
        sessions: Arc<SessionRegistry>,
        handlers: Arc<HandlerRegistry>,
        inbound: mpsc::Receiver<Frame>,
        outbound: mpsc::Receiver<Frame>,
        reply_tx: mpsc::Sender<Frame>,
        tracker: TaskTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sessions,
            handlers,
            inbound,
            outbound,
            reply_tx,
            tracker,
            cancel,
        }
    }

    /// Run the routing loop until cancelled.
    ///
    /// Both queues are polled with no priority between them; whichever
    /// has a ready item wins the race.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = self.inbound.recv() => match frame {
                    Some(frame) => self.route_inbound(frame),
                    None => break,
                },
                frame = self.outbound.recv() => match frame {
                    Some(frame) => self.route_outbound(frame),
                    None => break,
                },
            }
        }

        tracing::debug!("dispatch router stopped");
    }

    /// Fan an inbound frame out to its action's handlers on a fresh task
    fn route_inbound(&self, frame: Frame) {
        let handlers = Arc::clone(&self.handlers);
        let replies = ReplyHandle::new(self.reply_tx.clone());

        self.tracker.spawn(async move {
            let matched = handlers.lookup(frame.action).await;
            if matched.is_empty() {
                tracing::trace!(action = frame.action, "no handlers registered, frame dropped");
                return;
            }

            join_all(
                matched
                    .iter()
                    .map(|handler| handler.handle(frame.clone(), replies.clone())),
            )
            .await;
        });
    }

    /// Forward an outbound frame to the sink of its target session
    fn route_outbound(&self, frame: Frame) {
        let sessions = Arc::clone(&self.sessions);

        self.tracker.spawn(async move {
            match sessions.lookup(frame.session).await {
                Some(sink) => {
                    // A send error means the connection tore down between
                    // the lookup and the send; the frame is dropped.
                    if sink.send(frame).await.is_err() {
                        tracing::trace!("outbound frame dropped: connection closed");
                    }
                }
                None => {
                    tracing::trace!(
                        session = %frame.session,
                        "outbound frame dropped: unknown session"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FnHandler;
    use bytes::Bytes;
    use mw_protocol::{SessionId, SESSION_ID_LEN};
    use std::time::Duration;
    use tokio::time::timeout;

    struct TestRouter {
        inbound_tx: mpsc::Sender<Frame>,
        outbound_tx: mpsc::Sender<Frame>,
        sessions: Arc<SessionRegistry>,
        handlers: Arc<HandlerRegistry>,
        cancel: CancellationToken,
    }

    fn start_router() -> TestRouter {
        let sessions = Arc::new(SessionRegistry::new());
        let handlers = Arc::new(HandlerRegistry::new());
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (outbound_tx, outbound_rx) = mpsc::channel(16);
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();

        let router = DispatchRouter::new(
            Arc::clone(&sessions),
            Arc::clone(&handlers),
            inbound_rx,
            outbound_rx,
            outbound_tx.clone(),
            tracker,
            cancel.clone(),
        );
        tokio::spawn(router.run());

        TestRouter {
            inbound_tx,
            outbound_tx,
            sessions,
            handlers,
            cancel,
        }
    }

    fn session(tag: u8) -> SessionId {
        SessionId::new([tag; SESSION_ID_LEN])
    }

    async fn recv_frame(rx: &mut mpsc::Receiver<Frame>) -> Frame {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_handlers() {
        let router = start_router();
        let (probe_tx, mut probe_rx) = mpsc::channel(4);

        router
            .handlers
            .register(
                9,
                Arc::new(FnHandler(move |frame: Frame, _replies: ReplyHandle| {
                    let probe_tx = probe_tx.clone();
                    async move {
                        let _ = probe_tx.send(frame).await;
                    }
                })),
            )
            .await;

        let frame = Frame::new(session(1), 9, Bytes::from_static(b"inbound"));
        router.inbound_tx.send(frame.clone()).await.unwrap();

        assert_eq!(recv_frame(&mut probe_rx).await, frame);
        router.cancel.cancel();
    }

    #[tokio::test]
    async fn test_outbound_frames_reach_registered_sink() {
        let router = start_router();
        let (sink_tx, mut sink_rx) = mpsc::channel(4);

        let s = session(2);
        router.sessions.register(s, sink_tx).await;

        let frame = Frame::new(s, 7, Bytes::from_static(b"outbound"));
        router.outbound_tx.send(frame.clone()).await.unwrap();

        assert_eq!(recv_frame(&mut sink_rx).await, frame);
        router.cancel.cancel();
    }

    #[tokio::test]
    async fn test_unknown_session_frame_is_dropped() {
        let router = start_router();
        let (sink_tx, mut sink_rx) = mpsc::channel(4);

        let known = session(3);
        router.sessions.register(known, sink_tx).await;

        // An unroutable frame must not wedge the router
        let stray = Frame::new(session(4), 7, Bytes::from_static(b"stray"));
        router.outbound_tx.send(stray).await.unwrap();

        let frame = Frame::new(known, 7, Bytes::from_static(b"routable"));
        router.outbound_tx.send(frame.clone()).await.unwrap();

        assert_eq!(recv_frame(&mut sink_rx).await, frame);
        router.cancel.cancel();
    }

    #[tokio::test]
    async fn test_handler_replies_are_routed_back() {
        let router = start_router();
        let (sink_tx, mut sink_rx) = mpsc::channel(4);

        let s = session(5);
        router.sessions.register(s, sink_tx).await;

        router
            .handlers
            .register(
                3,
                Arc::new(FnHandler(|frame: Frame, replies: ReplyHandle| async move {
                    let reply = Frame::new(frame.session, frame.action, Bytes::from_static(b"pong"));
                    replies.send(reply).await;
                })),
            )
            .await;

        router
            .inbound_tx
            .send(Frame::new(s, 3, Bytes::from_static(b"ping")))
            .await
            .unwrap();

        let reply = recv_frame(&mut sink_rx).await;
        assert_eq!(reply.session, s);
        assert_eq!(reply.payload, Bytes::from_static(b"pong"));
        router.cancel.cancel();
    }
}
