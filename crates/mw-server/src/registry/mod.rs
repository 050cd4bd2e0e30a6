//! Session and handler registries
//!
//! The only cross-task mutable state in the server. Both registries are
//! explicit owned values guarded by a reader/writer lock and are passed
//! into the dispatch router and connection lifecycle by reference; there
//! is no ambient global state.

pub mod handlers;
pub mod sessions;

pub use handlers::{FnHandler, Handler, HandlerRegistry, ReplyHandle};
pub use sessions::SessionRegistry;
