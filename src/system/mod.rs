//! # System Interaction Layer
//!
//! The boundary between the flow engine and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns external programs with inherited stdio behind the
//!   `ProcessRunner` trait, and looks executables up in `PATH`.

/// Process spawning and `PATH` lookup.
pub mod executor;
