pub mod config;
pub mod core;

// Re-export commonly used items for convenience
pub use config::{AppConfig, ConfigError};
pub use crate::core::*;
