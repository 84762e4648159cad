//! Configuration for dockhand
//!
//! Handles the global configuration file (`~/.config/dockhand/config.toml`):
//! backend connection, update-task defaults, auto-updater schedule and
//! notification behavior.

mod error;
mod global;

pub use error::*;
pub use global::*;
