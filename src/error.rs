use thiserror::Error as ThisError;

/// Failure of a single transaction on the device bus.
#[derive(ThisError, Debug)]
pub enum BusError {
    #[error("bus handle could not be opened: {0}")]
    Open(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("no acknowledgement from endpoint")]
    Nack,

    #[error("bus handle already released")]
    Closed,
}

#[derive(ThisError, Debug)]
pub enum GatewayError {
    #[error("bus transaction with 0x{address:02X} failed: {source}")]
    Bus {
        address: u8,
        #[source]
        source: BusError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
