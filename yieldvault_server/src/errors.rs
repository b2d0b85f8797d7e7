use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use yieldvault_engine::{adapters::PaymentAdapterError, db_types::ValidationError, AccountApiError, LedgerError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    StateConflict(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("An upstream service is unavailable. {0}")]
    UpstreamUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::StateConflict(_) => StatusCode::CONFLICT,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token has expired.")]
    TokenExpired,
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(v) => Self::InvalidInput(v.to_string()),
            LedgerError::StateViolation(s) => Self::StateConflict(s),
            LedgerError::PositionNotFound(id) => Self::NoRecordFound(format!("Position #{id}")),
            LedgerError::ProofAlreadyUsed(r) => Self::StateConflict(format!("Payment proof {r} is already in use")),
            LedgerError::ConcurrentModification(id) => {
                Self::StateConflict(format!("Position #{id} was modified concurrently. Please retry."))
            },
            // Duplicate events are a success no-op at the engine level; if one leaks here it is a bug.
            LedgerError::DuplicateEvent(r) => Self::StateConflict(format!("Payment {r} was already processed")),
            LedgerError::AdapterError(e) => Self::UpstreamUnavailable(e.to_string()),
            LedgerError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            other => Self::BackendError(other.to_string()),
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::PositionNotFound(id) => Self::NoRecordFound(format!("Position #{id}")),
            AccountApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<PaymentAdapterError> for ServerError {
    fn from(e: PaymentAdapterError) -> Self {
        match e {
            PaymentAdapterError::Validation(m) => Self::InvalidInput(m),
            // Retryable from the caller's perspective: no position was created.
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}
