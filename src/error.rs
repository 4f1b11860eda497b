use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An HMI string did not split into exactly 36 tokens.
    #[error("malformed HMI vector: expected 36 fields, found {found}")]
    MalformedVector { found: usize },

    #[error("invalid HMI token: {0:?}")]
    InvalidToken(String),

    #[error("HMI field index {0} out of range (0..=35)")]
    IndexOutOfRange(usize),

    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: i32 },

    /// Network failure, timeout or non-2xx status during an exchange.
    #[error("sync failed: {0}")]
    Sync(#[from] reqwest::Error),

    /// The HTTP client for a device could not be constructed.
    #[error("could not build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("exchange already in flight")]
    ExchangeInFlight,

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
