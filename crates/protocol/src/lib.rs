//! The command/response channel to the remote execution context: session
//! creation, streamed command execution, and teardown.

pub mod camel;
pub mod client;
pub mod frames;

pub use client::{LogSink, SessionClient, SessionState};
pub use frames::{Frame, FrameCollector, LineBuffer};
