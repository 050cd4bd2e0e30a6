//! Per-connection lifecycle: reader, writer and teardown
//!
//! Each admitted socket runs a reader task and a writer task. The reader
//! drives the handshake state machine and feeds validated frames to the
//! dispatch router; the writer drains the connection's private sink back
//! onto the socket. Either side trips a shared cancellation token on any
//! terminal condition, and a coordinator unregisters the session and
//! releases the admission permit exactly once.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use mw_protocol::{Frame, FrameCodec, SessionId, ACTION_INIT};

use crate::state::ServerState;

/// Capacity of each connection's private outbound queue
pub const CONNECTION_QUEUE_CAPACITY: usize = 256;

/// Spawn the lifecycle tasks for an admitted connection.
///
/// The permit is the connection's slot under the configured maximum; it
/// is released when the connection has fully torn down.
pub(crate) fn spawn(
    socket: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
    inbound_tx: mpsc::Sender<Frame>,
    permit: OwnedSemaphorePermit,
    tracker: &TaskTracker,
    shutdown: CancellationToken,
) {
    let (read_half, write_half) = socket.into_split();
    let (sink_tx, sink_rx) = mpsc::channel(CONNECTION_QUEUE_CAPACITY);
    let cancel = shutdown.child_token();

    let reader = tracker.spawn(run_reader(
        FramedRead::new(read_half, FrameCodec::new()),
        peer_addr,
        Arc::clone(&state),
        inbound_tx,
        sink_tx,
        cancel.clone(),
    ));
    let writer = tracker.spawn(run_writer(
        FramedWrite::new(write_half, FrameCodec::new()),
        peer_addr,
        sink_rx,
        cancel.clone(),
    ));

    // Teardown coordinator: waits for both halves, then unregisters the
    // session and releases the admission slot. Both socket halves close
    // on drop, so a double-close cannot happen.
    tracker.spawn(async move {
        let session = reader.await.ok().flatten();
        cancel.cancel();
        let _ = writer.await;

        if let Some(session) = session {
            state.sessions.unregister(session).await;
            tracing::debug!(%session, "session unregistered");
        }
        drop(permit);

        tracing::info!("connection from {} closed", peer_addr);
    });
}

/// Read frames off the socket, drive the handshake state machine and
/// forward validated frames to the dispatch router.
///
/// Returns the session assigned during the handshake, if one was.
async fn run_reader(
    mut frames: FramedRead<OwnedReadHalf, FrameCodec>,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
    inbound_tx: mpsc::Sender<Frame>,
    sink_tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
) -> Option<SessionId> {
    let mut session: Option<SessionId> = None;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                tracing::warn!("protocol error from {}: {}", peer_addr, e);
                break;
            }
            None => {
                tracing::debug!("stream from {} closed", peer_addr);
                break;
            }
        };

        match session {
            // Awaiting handshake: only an Init frame moves things
            // forward, everything else is dropped.
            None => {
                if frame.action != ACTION_INIT {
                    tracing::trace!("dropping pre-handshake frame from {}", peer_addr);
                    continue;
                }

                let assigned = match state.sessions.generate_and_register(sink_tx.clone()).await {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::error!("handshake failed for {}: {}", peer_addr, e);
                        break;
                    }
                };
                session = Some(assigned);

                let mut stamped = frame;
                stamped.session = assigned;

                // Echo the stamped frame straight back, then hand it to
                // dispatch so Init handlers see it too.
                if sink_tx.send(stamped.clone()).await.is_err() {
                    break;
                }
                if inbound_tx.send(stamped).await.is_err() {
                    break;
                }

                tracing::info!(session = %assigned, "handshake completed for {}", peer_addr);
            }

            Some(assigned) => {
                // Duplicate Init frames are dropped once active
                if frame.action == ACTION_INIT {
                    tracing::trace!("dropping duplicate init frame from {}", peer_addr);
                    continue;
                }

                // A frame claiming another session is a spoofing attempt
                if frame.session != assigned {
                    tracing::warn!(
                        session = %assigned,
                        claimed = %frame.session,
                        "session mismatch from {}, closing connection",
                        peer_addr
                    );
                    break;
                }

                if inbound_tx.send(frame).await.is_err() {
                    break;
                }
            }
        }
    }

    cancel.cancel();
    session
}

/// Drain the connection's private sink onto the socket
async fn run_writer(
    mut frames: FramedWrite<OwnedWriteHalf, FrameCodec>,
    peer_addr: SocketAddr,
    mut sink_rx: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = sink_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if let Err(e) = frames.send(frame).await {
            tracing::warn!("write to {} failed: {}", peer_addr, e);
            break;
        }
    }

    cancel.cancel();
}
