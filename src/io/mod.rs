//! Pipe endpoints and the stream abstraction built on them
//!
//! This module provides:
//! - `pipe_pair` for creating the two connected endpoints of a duplex pipe
//! - `Endpoint` with independent read/write/half-close/close per side
//! - `PipeStream`, the abstraction owning the local endpoint and the relay
//!   task's lifecycle

mod pipe;
mod stream;

pub use pipe::{Direction, Endpoint, PipeIo, pipe_pair};
pub use stream::PipeStream;
