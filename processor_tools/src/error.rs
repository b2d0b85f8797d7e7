use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The payment processor could not be reached: {0}")]
    Unreachable(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Charge request failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}

impl ProcessorApiError {
    /// Errors in this class did not reach the processor (or did not complete there) and the caller
    /// may retry the request as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::QueryError { status: 500..=599, .. })
    }
}
