//! Error types for the Nexus advisor core.
//!
//! Every failure the generation client can produce is a variant of [`Error`].
//! Callers that only care about the broad class of a failure (retry it, ask
//! for a new credential, or show it to the user) use [`Error::kind`].

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No usable credential: absent, declined, or rejected by the backend.
    Authorization,
    /// Transport or connectivity failure before or during a request.
    Network,
    /// The backend answered but produced no usable content.
    Generation,
    /// The request itself was malformed and will fail again unchanged.
    InvalidRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Authorization => write!(f, "authorization"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Generation => write!(f, "generation"),
            ErrorKind::InvalidRequest => write!(f, "invalid request"),
        }
    }
}

/// The main error type for the Nexus advisor core.
#[derive(Clone, Debug)]
pub enum Error {
    /// A credential was missing, declined, or rejected.
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// The backend returned a status without a more specific mapping.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Status string from the Google error envelope, e.g. `FAILED_PRECONDITION`.
        status: Option<String>,
        /// Human-readable error message.
        message: String,
    },

    /// Resource (usually the model) not found.
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Rate limit exceeded.
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// Bad request due to invalid parameters.
    BadRequest {
        /// Human-readable error message.
        message: String,
    },

    /// Request timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// Connection error.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Server returned a 500 internal error.
    InternalServer {
        /// Human-readable error message.
        message: String,
    },

    /// Server is overloaded or unavailable.
    ServiceUnavailable {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during validation of request parameters.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// A URL parsing error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// The response stream broke mid-flight.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The backend responded but produced nothing usable.
    Generation {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Creates a new authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Error::Authorization {
            message: message.into(),
        }
    }

    /// Creates a new API error.
    pub fn api(status_code: u16, status: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            status,
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new internal server error.
    pub fn internal_server(message: impl Into<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
        }
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Error::Generation {
            message: message.into(),
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authorization { .. } => ErrorKind::Authorization,
            Error::Timeout { .. }
            | Error::Connection { .. }
            | Error::HttpClient { .. }
            | Error::Streaming { .. }
            | Error::RateLimit { .. }
            | Error::InternalServer { .. }
            | Error::ServiceUnavailable { .. }
            | Error::Io { .. } => ErrorKind::Network,
            Error::Api { status_code, .. } if *status_code >= 500 => ErrorKind::Network,
            Error::Api { .. }
            | Error::Generation { .. }
            | Error::Serialization { .. }
            | Error::Encoding { .. } => ErrorKind::Generation,
            Error::Validation { .. }
            | Error::BadRequest { .. }
            | Error::NotFound { .. }
            | Error::Url { .. } => ErrorKind::InvalidRequest,
        }
    }

    /// Returns true if this error is related to the credential.
    pub fn is_authorization(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }

    /// Returns true if this error is a transport failure.
    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    /// Returns true if the backend produced no usable content.
    pub fn is_generation(&self) -> bool {
        self.kind() == ErrorKind::Generation
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => {
                matches!(status_code, 408 | 409 | 429 | 500..=599)
            }
            Error::Timeout { .. }
            | Error::Connection { .. }
            | Error::Streaming { .. }
            | Error::RateLimit { .. }
            | Error::ServiceUnavailable { .. }
            | Error::InternalServer { .. } => true,
            _ => false,
        }
    }

    /// Returns the server-suggested delay before a retry, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimit { retry_after, .. } => *retry_after,
            Error::ServiceUnavailable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authorization { message } => {
                write!(f, "Authorization error: {message}")
            }
            Error::Api {
                status_code,
                status,
                message,
            } => {
                if let Some(status) = status {
                    write!(f, "API error {status_code} ({status}): {message}")
                } else {
                    write!(f, "API error {status_code}: {message}")
                }
            }
            Error::NotFound { message } => write!(f, "Resource not found: {message}"),
            Error::RateLimit {
                message,
                retry_after,
            } => {
                if let Some(retry_after) = retry_after {
                    write!(
                        f,
                        "Rate limit exceeded: {message} (retry after {retry_after} seconds)"
                    )
                } else {
                    write!(f, "Rate limit exceeded: {message}")
                }
            }
            Error::BadRequest { message } => write!(f, "Bad request: {message}"),
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::InternalServer { message } => write!(f, "Internal server error: {message}"),
            Error::ServiceUnavailable {
                message,
                retry_after,
            } => {
                if let Some(retry_after) = retry_after {
                    write!(
                        f,
                        "Service unavailable: {message} (retry after {retry_after} seconds)"
                    )
                } else {
                    write!(f, "Service unavailable: {message}")
                }
            }
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}"),
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
            Error::Encoding { message, .. } => write!(f, "Encoding error: {message}"),
            Error::Generation { message } => write!(f, "Generation error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::encoding(format!("base64 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for Nexus operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_three_failure_classes() {
        assert_eq!(
            Error::authorization("declined").kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            Error::connection("reset", None).kind(),
            ErrorKind::Network
        );
        assert_eq!(
            Error::generation("no image produced").kind(),
            ErrorKind::Generation
        );
        assert_eq!(
            Error::validation("blank prompt", Some("prompt".to_string())).kind(),
            ErrorKind::InvalidRequest
        );
    }

    #[test]
    fn api_errors_split_on_server_side_status() {
        assert!(Error::api(503, None, "busy").is_network());
        assert!(Error::api(418, None, "teapot").is_generation());
    }

    #[test]
    fn retryable() {
        assert!(Error::timeout("slow", Some(60.0)).is_retryable());
        assert!(Error::rate_limit("slow down", Some(3)).is_retryable());
        assert!(!Error::authorization("nope").is_retryable());
        assert!(!Error::generation("empty").is_retryable());
        assert_eq!(Error::rate_limit("slow down", Some(3)).retry_after(), Some(3));
    }

    #[test]
    fn display() {
        assert_eq!(
            Error::generation("no image produced").to_string(),
            "Generation error: no image produced"
        );
        assert_eq!(
            Error::api(409, Some("ABORTED".to_string()), "conflict").to_string(),
            "API error 409 (ABORTED): conflict"
        );
    }
}
