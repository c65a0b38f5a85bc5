//! Host-side boundary for Quill.
//!
//! [`Host`] exposes the message-shaped operations of the host ⇄ engine
//! boundary (register/dispose/switch projects, file mutations, extra compile
//! files, analysis queries) and wires a [`LazyLoadBridge`] onto every engine
//! connection so files the engine has never seen are pulled from the backing
//! store on demand.

mod bridge;
mod host;

pub use bridge::{LazyLoadBridge, LoadState};
pub use host::{Host, HostConfig, HostError};
