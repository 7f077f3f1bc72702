//! Tool implementations.
//!
//! File and runtime tools do their own work against a [`FsScope`](crate::sandbox::FsScope);
//! session, memory, message, and browser tools hand their work to the
//! gateway through [`ToolHost`](crate::context::ToolHost).

pub mod apply_patch;
pub mod browser;
pub mod edit;
pub mod exec;
pub mod memory;
pub mod message;
pub mod process;
pub mod read;
pub mod sessions;
pub mod write;
