//! Error types for squall-core

use squall_router::{InsertError, PatternError};
use thiserror::Error;

use crate::response::StatusCode;

/// Result type alias for squall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for registration, dispatch and the serve loop
#[derive(Debug, Error)]
pub enum Error {
    /// Registration with an empty method string
    #[error("method must not be empty")]
    EmptyMethod,

    /// Registration with an empty handler chain
    #[error("at least one handler must be provided for path '{0}'")]
    NoHandlers(String),

    /// Invalid HTTP method
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The route pattern failed to compile
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The compiled pattern conflicts with an existing route
    #[error(transparent)]
    Insert(#[from] InsertError),

    /// A typed HTTP error carrying a status and message; rendered directly
    /// by the dispatcher
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Invalid listen address
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// An HTTP error with a status code and message.
///
/// Handlers return it to short-circuit a request with a specific status; the
/// dispatcher writes the status and message straight to the response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("HTTP {}: {}", .status.as_u16(), .message)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    /// Create a new HttpError
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

macro_rules! http_errors {
    ($($(#[$doc:meta])* $name:ident => ($status:ident, $message:literal);)*) => {
        impl HttpError {
            $(
                $(#[$doc])*
                pub fn $name() -> Self {
                    Self::new(StatusCode::$status, $message)
                }
            )*
        }
    };
}

http_errors! {
    bad_request => (BAD_REQUEST, "Bad Request");
    unauthorized => (UNAUTHORIZED, "Unauthorized");
    payment_required => (PAYMENT_REQUIRED, "Payment Required");
    forbidden => (FORBIDDEN, "Forbidden");
    not_found => (NOT_FOUND, "Not Found");
    method_not_allowed => (METHOD_NOT_ALLOWED, "Method Not Allowed");
    not_acceptable => (NOT_ACCEPTABLE, "Not Acceptable");
    proxy_auth_required => (PROXY_AUTH_REQUIRED, "Proxy Authentication Required");
    request_timeout => (REQUEST_TIMEOUT, "Request Timeout");
    conflict => (CONFLICT, "Conflict");
    gone => (GONE, "Gone");
    length_required => (LENGTH_REQUIRED, "Length Required");
    precondition_failed => (PRECONDITION_FAILED, "Precondition Failed");
    payload_too_large => (PAYLOAD_TOO_LARGE, "Payload Too Large");
    uri_too_long => (URI_TOO_LONG, "URI Too Long");
    unsupported_media_type => (UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
    range_not_satisfiable => (RANGE_NOT_SATISFIABLE, "Range Not Satisfiable");
    expectation_failed => (EXPECTATION_FAILED, "Expectation Failed");
    teapot => (IM_A_TEAPOT, "I'm a teapot");
    misdirected_request => (MISDIRECTED_REQUEST, "Misdirected Request");
    unprocessable_entity => (UNPROCESSABLE_ENTITY, "Unprocessable Entity");
    locked => (LOCKED, "Locked");
    failed_dependency => (FAILED_DEPENDENCY, "Failed Dependency");
    too_early => (TOO_EARLY, "Too Early");
    upgrade_required => (UPGRADE_REQUIRED, "Upgrade Required");
    precondition_required => (PRECONDITION_REQUIRED, "Precondition Required");
    too_many_requests => (TOO_MANY_REQUESTS, "Too Many Requests");
    request_header_fields_too_large => (REQUEST_HEADER_FIELDS_TOO_LARGE, "Request Header Fields Too Large");
    unavailable_for_legal_reasons => (UNAVAILABLE_FOR_LEGAL_REASONS, "Unavailable For Legal Reasons");
    internal_server_error => (INTERNAL_SERVER_ERROR, "Internal Server Error");
    not_implemented => (NOT_IMPLEMENTED, "Not Implemented");
    bad_gateway => (BAD_GATEWAY, "Bad Gateway");
    service_unavailable => (SERVICE_UNAVAILABLE, "Service Unavailable");
    gateway_timeout => (GATEWAY_TIMEOUT, "Gateway Timeout");
    http_version_not_supported => (HTTP_VERSION_NOT_SUPPORTED, "HTTP Version Not Supported");
    variant_also_negotiates => (VARIANT_ALSO_NEGOTIATES, "Variant Also Negotiates");
    insufficient_storage => (INSUFFICIENT_STORAGE, "Insufficient Storage");
    loop_detected => (LOOP_DETECTED, "Loop Detected");
    not_extended => (NOT_EXTENDED, "Not Extended");
    network_authentication_required => (NETWORK_AUTHENTICATION_REQUIRED, "Network Authentication Required");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = HttpError::not_found();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn test_http_error_into_error() {
        let err: Error = HttpError::teapot().into();
        assert!(matches!(err, Error::Http(ref e) if e.status.as_u16() == 418));
    }
}
