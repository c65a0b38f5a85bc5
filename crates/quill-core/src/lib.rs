//! Core shared types for Quill.
//!
//! This crate is intentionally small and dependency-free.

mod text;

pub use text::{offset_to_position, position_to_offset, LineMap, Position};
