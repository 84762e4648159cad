//! dockhand - Docking Station CLI
//!
//! Command implementations and the interactive service selector. The
//! binary in `main.rs` is a thin clap dispatcher over this crate so
//! that integration tests can run commands against a scripted backend.

pub mod commands;
pub mod selector;
