//! Error types for dockhand-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] dockhand_config::ConfigError),

    #[error("Backend error: {0}")]
    Api(#[from] dockhand_api::ApiError),

    #[error("No services given for stack '{0}'")]
    EmptyServiceList(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Invalid service identifier: {0}")]
    InvalidServiceKey(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
