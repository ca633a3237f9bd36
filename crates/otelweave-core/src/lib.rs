//! Shared ambient stack for the compile-time OpenTelemetry weaver: errors, logging,
//! environment configuration and the filesystem-write discipline every other crate in the
//! workspace builds on.

pub mod config;
pub mod error;
pub mod fs;
pub mod logging;

pub use error::{Result, WeaveError};
