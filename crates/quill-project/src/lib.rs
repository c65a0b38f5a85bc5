//! Project model for Quill.
//!
//! A project is a host-defined collection of files treated as one compilation
//! unit by the engine. This crate owns:
//! - [`Project`]: one virtual file tree plus project-level state (current
//!   file, extra lib, extra compile set, content cache, disposal flag), with
//!   mutations that fan out to every live engine connection in order.
//! - [`ProjectRegistry`]: the process-wide set of live projects and the
//!   "active project" pointer. The registry exists for discovery only —
//!   every boundary call carries its project id explicitly.

mod project;
mod registry;

pub use project::{Project, ProjectError, ProjectEvent};
pub use registry::{ProjectRegistry, RegistryError};
