//! mw-server: concurrent session-multiplexing frame server
//!
//! Accepts TCP connections speaking the mw-protocol wire format, assigns
//! each a 256-bit session during a one-time handshake, dispatches inbound
//! frames by action code to registered handlers, and routes handler
//! replies back to the owning connection by session.
//!
//! ```ignore
//! let server = Server::new(ServerConfig::default());
//! server
//!     .register_fn(3, |frame, replies| async move {
//!         let reply = Frame::new(frame.session, frame.action, Bytes::from("Hello World!"));
//!         replies.send(reply).await;
//!     })
//!     .await;
//! server.serve().await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::ServerError;
pub use registry::{FnHandler, Handler, HandlerRegistry, ReplyHandle, SessionRegistry};
pub use server::Server;
pub use state::ServerState;
