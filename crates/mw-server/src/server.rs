//! TCP listener and public server API
//!
//! Accepts connections, enforces the connection limit and wires each
//! admitted socket into the dispatch router.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use mw_protocol::{Action, Frame};

use crate::config::ServerConfig;
use crate::connection;
use crate::error::ServerError;
use crate::registry::{FnHandler, Handler, ReplyHandle};
use crate::router::{DispatchRouter, ROUTER_QUEUE_CAPACITY};
use crate::state::ServerState;

/// A session-multiplexing frame server.
///
/// Register handlers against action codes, then call [`Server::serve`].
/// Each accepted connection performs a one-time handshake that assigns it
/// a session; thereafter its frames are dispatched to handlers and
/// handler replies are routed back by session.
pub struct Server {
    state: Arc<ServerState>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    inbound_tx: mpsc::Sender<Frame>,
    inbound_rx: mpsc::Receiver<Frame>,
    outbound_tx: mpsc::Sender<Frame>,
    outbound_rx: mpsc::Receiver<Frame>,
}

impl Server {
    /// Create a server from its configuration. No I/O happens until
    /// [`Server::serve`].
    pub fn new(config: ServerConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(ROUTER_QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(ROUTER_QUEUE_CAPACITY);

        Self {
            state: Arc::new(ServerState::new(config)),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
        }
    }

    /// Register a handler for an action code.
    ///
    /// Handlers for the same action accumulate in registration order and
    /// are each invoked once per matching frame.
    pub async fn register(&self, action: Action, handler: Arc<dyn Handler>) {
        self.state.handlers.register(action, handler).await;
    }

    /// Register a plain async closure as a handler
    pub async fn register_fn<F, Fut>(&self, action: Action, handler: F)
    where
        F: Fn(Frame, ReplyHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(action, Arc::new(FnHandler(handler))).await;
    }

    /// Shared server state (configuration and registries)
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Token cancelled when the server shuts down.
    ///
    /// Clone it to observe shutdown, or cancel it to trigger one from
    /// outside; the accept loop then drains and waits for the router and
    /// every connection to finish.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind the configured address and run the accept loop until
    /// shutdown.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.state.config.bind_address).await?;
        self.serve_on(listener).await
    }

    /// Run the accept loop on an already-bound listener.
    ///
    /// Useful for binding to port 0 and reading the address back before
    /// starting the server.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        let Server {
            state,
            tracker,
            shutdown,
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
        } = self;

        let local_addr = listener.local_addr()?;
        tracing::info!("listening on {}", local_addr);

        // Atomic admission check: holding a permit is being counted
        // against the connection limit, released on teardown.
        let admission = Arc::new(Semaphore::new(state.config.max_connections));

        let router = DispatchRouter::new(
            Arc::clone(&state.sessions),
            Arc::clone(&state.handlers),
            inbound_rx,
            outbound_rx,
            outbound_tx,
            tracker.clone(),
            shutdown.clone(),
        );
        tracker.spawn(router.run());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            match Arc::clone(&admission).try_acquire_owned() {
                                Ok(permit) => {
                                    tracing::info!("new connection from {}", peer_addr);
                                    connection::spawn(
                                        socket,
                                        peer_addr,
                                        Arc::clone(&state),
                                        inbound_tx.clone(),
                                        permit,
                                        &tracker,
                                        shutdown.clone(),
                                    );
                                }
                                Err(_) => {
                                    tracing::warn!(
                                        "connection limit reached, rejecting {}",
                                        peer_addr
                                    );
                                    drop(socket);
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}
