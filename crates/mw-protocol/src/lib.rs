//! mw-protocol: Wire protocol for muxwire session multiplexing
//!
//! This crate defines the length-prefixed binary frame exchanged between
//! clients and the muxwire server, and the codec used to read frames off
//! a byte stream regardless of how the transport splits them.

pub mod codec;
pub mod error;
pub mod frame;
pub mod session;

pub use codec::FrameCodec;
pub use error::ProtocolError;
pub use frame::{Action, Frame, FrameHeader, ACTION_INIT, HEADER_SIZE, MAX_FRAME_SIZE};
pub use session::{SessionId, SESSION_ID_LEN};
