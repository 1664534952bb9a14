use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum DeltaError {
    /// Network or authentication failure while talking to the bridge.
    #[error("Hue bridge unavailable: {0}")]
    GatewayUnavailable(String),

    /// The bridge answered, but not with something we understand.
    #[error("Unexpected response from Hue bridge: {0}")]
    GatewayProtocol(String),

    #[error("Sensor not found: {0}")]
    SensorNotFound(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DeltaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DeltaError::GatewayProtocol(err.to_string())
        } else {
            DeltaError::GatewayUnavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DeltaError>;
