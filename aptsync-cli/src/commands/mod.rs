//! CLI command implementations.

mod common;

pub mod config;
pub mod init;
pub mod sync;
