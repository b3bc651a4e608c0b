//! Inter-process communication for Sigrun
//!
//! This crate provides the protocol spoken between the worker pool and its
//! worker processes, and the newline-delimited JSON transports carrying it.

pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use error::IpcError;
pub use protocol::{
    MessageEnvelope, OperationKind, WorkerReply, WorkerRequest, WorkerResponse, WorkerTask,
    IPC_PROTOCOL_VERSION,
};
pub use transport::{IpcTransport, LineReader, LineWriter, StdioTransport, StreamTransport};
