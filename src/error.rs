//! Error types for the blind-control ingress path
//!
//! Decode failures ([`DecodeError`]) are absorbed at the event-handler
//! boundary: they are logged and counted, never propagated to the transport.
//! Session-level failures ([`IngressError`]) surface to whoever started the
//! session.

use crate::config::ConfigError;
use crate::transport::mqtt::ConnectionState;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Reasons a control payload did not yield a blind position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Payload is empty or null")]
    EmptyInput,

    #[error("Field not found: {segment}")]
    FieldNotFound { segment: String },

    #[error("Type mismatch: expected an integer, found {found}")]
    TypeMismatch { found: &'static str },

    #[error("Position {value} outside the range 0..=100")]
    OutOfRange { value: i128 },

    /// Non-integer or beyond-i128 number outside the range, as written in the payload
    #[error("Position {rendered} outside the range 0..=100")]
    OutOfRangeFloat { rendered: String },

    #[error("Payload is not valid JSON: {message}")]
    ParseError { message: String },
}

impl DecodeError {
    /// Stable snake_case name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::EmptyInput => "empty_input",
            DecodeError::FieldNotFound { .. } => "field_not_found",
            DecodeError::TypeMismatch { .. } => "type_mismatch",
            DecodeError::OutOfRange { .. } | DecodeError::OutOfRangeFloat { .. } => {
                "out_of_range"
            }
            DecodeError::ParseError { .. } => "parse_error",
        }
    }

    /// Create field-not-found error
    pub fn field_not_found<S: Into<String>>(segment: S) -> Self {
        Self::FieldNotFound {
            segment: segment.into(),
        }
    }

    /// Create parse error
    pub fn parse_error<S: Into<String>>(message: S) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }
}

/// Session-level errors
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("Transport start failed: {message}")]
    TransportStartFailure { message: String },

    #[error("Subscribe request for {filter} failed: {message}")]
    SubscribeFailed { filter: String, message: String },

    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },

    #[error("Shutdown error: {message}")]
    Shutdown { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl IngressError {
    /// Create transport start failure; the message is sanitized
    pub fn transport_start_failure<S: AsRef<str>>(message: S) -> Self {
        Self::TransportStartFailure {
            message: sanitize_error_message(message.as_ref()),
        }
    }

    /// Create subscribe failure
    pub fn subscribe_failed<F: Into<String>, S: AsRef<str>>(filter: F, message: S) -> Self {
        Self::SubscribeFailed {
            filter: filter.into(),
            message: sanitize_error_message(message.as_ref()),
        }
    }

    /// Create shutdown error
    pub fn shutdown<S: Into<String>>(message: S) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }
}

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|passwd|token|key|secret)[=:]\s*\S+").ok());

static SECRET_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|private)/[a-zA-Z0-9._/-]+").ok()
});

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Redact credentials and key paths from error text before it reaches the logs
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(pattern) = SECRET_PATTERN.as_ref() {
        sanitized = pattern.replace_all(&sanitized, "${1}=***").to_string();
    }

    if let Some(pattern) = SECRET_PATH_PATTERN.as_ref() {
        sanitized = pattern.replace_all(&sanitized, "/***REDACTED***/").to_string();
    }

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for session operations
pub type IngressResult<T> = Result<T, IngressError>;
