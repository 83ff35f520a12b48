//! Error handling for the peripheral CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Peripheral error: {0}")]
    Peripheral(#[from] ble_peripheral_core::PeripheralError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Advertising did not start within {secs}s")]
    StartTimeout { secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Hex decoding error: {0}")]
    HexDecoding(#[from] hex::FromHexError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
