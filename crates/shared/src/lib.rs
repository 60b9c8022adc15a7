pub mod error;
pub mod config;
pub mod logging;

pub use error::{Error, Result};
pub use config::{Config, ConnectionSettings, LogFormat, LoggingConfig};
