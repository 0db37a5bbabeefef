use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to parse transaction: {0}")]
    ParseError(String),

    #[error("RPC error: {0}")]
    RpcError(#[from] solana_client::client_error::ClientError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Transaction {0} not found after {1} attempts")]
    NotFound(String, u32),
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
