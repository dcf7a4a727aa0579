//! PipeBridge Library
//!
//! A stream abstraction backed by a duplex byte pipe. Callers interact with
//! the local endpoint through [`PipeStream`]; a background relay task pumps
//! whatever arrives on the remote endpoint into the embedding stream's
//! (possibly layered) write path, expressed as the [`RelaySink`] trait.

pub mod common;
pub mod config;
pub mod io;
pub mod relay;
pub mod sink;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types for convenience
pub use config::PipeParams;
pub use io::{Direction, Endpoint, PipeStream, pipe_pair};
pub use relay::{MonitorHandle, RelayState};
pub use sink::{Labeled, RelaySink};
