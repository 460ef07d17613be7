use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for the dispatch engine
#[derive(Debug)]
pub enum DispatchError {
    // Lookup and ownership errors
    NotFound(String),
    Forbidden(String),

    // State machine and race errors
    Conflict(String),
    InvalidTransition { from: String, action: String },
    AlreadyRated(String),

    // Input errors
    ValidationFailed(Vec<ValidationError>),
    TooManyStops { given: usize, max: usize },

    // Routing and external provider errors
    ProviderFailed { provider: String, reason: String },
    ServiceUnavailable(String),
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),

    // Serialization errors
    JsonParsing(String),
    JsonSerialization(String),

    // Realtime channel errors
    Unauthorized(String),
    ChannelClosed,

    // Configuration and internal errors
    ConfigurationError(String),
    InternalServer(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DispatchError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),

            DispatchError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DispatchError::InvalidTransition { from, action } => {
                write!(f, "Invalid transition: cannot {} a ride in state {}", action, from)
            }
            DispatchError::AlreadyRated(side) => {
                write!(f, "Ride already rated by {}", side)
            }

            DispatchError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            DispatchError::TooManyStops { given, max } => {
                write!(f, "Too many stops: {} given, max {}", given, max)
            }

            DispatchError::ProviderFailed { provider, reason } => {
                write!(f, "Routing provider {} failed: {}", provider, reason)
            }
            DispatchError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            DispatchError::NetworkTimeout => write!(f, "Network request timed out"),
            DispatchError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            DispatchError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),

            DispatchError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),
            DispatchError::JsonSerialization(msg) => write!(f, "JSON serialization error: {}", msg),

            DispatchError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            DispatchError::ChannelClosed => write!(f, "Communication channel closed"),

            DispatchError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            DispatchError::InternalServer(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            DispatchError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            DispatchError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),

            DispatchError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            DispatchError::InvalidTransition { from, action } => (
                StatusCode::CONFLICT,
                "invalid_transition",
                format!("cannot {} a ride in state {}", action, from),
                None,
            ),
            DispatchError::AlreadyRated(side) => (
                StatusCode::CONFLICT,
                "already_rated",
                format!("ride already rated by {}", side),
                None,
            ),

            DispatchError::ValidationFailed(errors) => {
                let details = serde_json::to_value(&errors).ok();
                (
                    StatusCode::BAD_REQUEST,
                    "validation_failed",
                    "Validation errors occurred".to_string(),
                    details,
                )
            }
            DispatchError::TooManyStops { given, max } => (
                StatusCode::BAD_REQUEST,
                "too_many_stops",
                format!("{} stops given, maximum is {}", given, max),
                None,
            ),

            DispatchError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),

            DispatchError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }

            // All other errors are treated as internal server errors
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", self.to_string(), None),
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::NetworkTimeout
        } else if err.is_connect() {
            DispatchError::NetworkConnection(err.to_string())
        } else {
            DispatchError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() {
            DispatchError::JsonParsing(err.to_string())
        } else {
            DispatchError::JsonSerialization(err.to_string())
        }
    }
}

// Helper functions for creating common errors
impl DispatchError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        DispatchError::NotFound(resource.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        DispatchError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DispatchError::Conflict(msg.into())
    }

    /// The one conflict a driver UI special-cases: the offer is gone.
    pub fn ride_taken() -> Self {
        DispatchError::Conflict("ride no longer available".to_string())
    }

    pub fn invalid_transition(from: impl Into<String>, action: impl Into<String>) -> Self {
        DispatchError::InvalidTransition {
            from: from.into(),
            action: action.into(),
        }
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        DispatchError::InternalServer(msg.into())
    }
}
