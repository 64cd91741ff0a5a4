pub mod config;
pub mod error;
pub mod pacing;
pub mod types;
pub mod window;

pub use config::{Config, FileConfig};
pub use error::ConfigError;
pub use pacing::PacingPolicy;
pub use types::*;
pub use window::BatchWindow;
