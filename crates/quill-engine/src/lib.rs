//! Engine-connection layer for Quill.
//!
//! An engine connection is a channel to one instance of the analysis engine.
//! This crate implements:
//! - the opaque [`AnalysisEngine`] capability the rest of the system talks to
//! - per-connection request serialization: one consumer task drains a bounded
//!   queue in submission order, and "idle" is an observable signal rather
//!   than re-checked object identity
//! - `run_when_idle`, which defers analysis queries until the queue drains
//! - an explicit inbound [`SignalDispatcher`] with registered handlers,
//!   instead of wrapping a third party's worker factory at runtime

mod connection;
mod serializer;

pub use connection::{
    AnalysisEngine, BoxFuture, EngineConnection, EnginePool, SignalDispatcher, SignalHandler,
};
pub use serializer::{EngineError, RequestSerializer, DEFAULT_QUEUE_CAPACITY};
