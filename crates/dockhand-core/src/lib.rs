//! Core orchestration for the Docking Station client
//!
//! This crate provides:
//! - An update-task registry enforcing one active task per service
//! - Task creation with duplicate suppression and per-stack batching
//! - Offset-based polling of task progress with local message history
//! - A synchronous signal bus connecting components to their views
//! - Cache reconciliation and notifications when tasks finish
//! - Client-side filtering, ordering and unattended update sweeps

mod auto;
mod cache;
mod create;
mod error;
mod filters;
mod history;
mod manager;
mod notifications;
mod poll;
mod reconcile;
mod registry;
mod signals;

pub use auto::*;
pub use cache::*;
pub use create::*;
pub use error::*;
pub use filters::*;
pub use history::*;
pub use manager::*;
pub use notifications::*;
pub use poll::*;
pub use reconcile::*;
pub use registry::*;
pub use signals::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
