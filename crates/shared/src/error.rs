use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error("Invalid script: {0}")]
    InvalidScript(String),
}

pub type Result<T> = std::result::Result<T, Error>;
