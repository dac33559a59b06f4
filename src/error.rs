//! Error types for the WWC hub
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI
//!
//! Routing misses are not errors: a peer that disconnected before its
//! message could be routed is normal churn and is dropped silently by the
//! router. The variants here cover configuration, transport, malformed
//! payloads and registry precondition violations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,
    BindFailed = 204,

    // Connection errors (3xx)
    ConnectionFailed = 300,
    ConnectionLost = 303,
    HandshakeRejected = 305,
    ConnectionLimit = 306,

    // Protocol errors (4xx)
    ProtocolVersion = 400,
    ProtocolMalformed = 401,

    // Registry errors (5xx)
    DuplicateConnection = 500,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Connection errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Registry errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the hub
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listener could not bind
    #[error("Failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    // ─────────────────────────────────────────────────────────────
    // Connection Errors
    // ─────────────────────────────────────────────────────────────

    /// The handshake metadata could not be classified
    #[error("Handshake rejected: {reason}")]
    HandshakeRejected { reason: String },

    /// The hub is at its configured connection limit
    #[error("Connection limit of {limit} reached")]
    ConnectionLimit { limit: usize },

    /// Connection lost
    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersion { expected: String, actual: String },

    /// Malformed message or payload
    #[error("Malformed protocol message: {message}")]
    ProtocolMalformed { message: String },

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Registry Errors
    // ─────────────────────────────────────────────────────────────

    /// A connection id is already registered
    #[error("Connection {id} is already registered")]
    DuplicateConnection { id: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Bind { .. } => ErrorCode::BindFailed,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::WebSocket(_) => ErrorCode::ConnectionFailed,

            Error::HandshakeRejected { .. } => ErrorCode::HandshakeRejected,
            Error::ConnectionLimit { .. } => ErrorCode::ConnectionLimit,
            Error::ConnectionLost { .. } => ErrorCode::ConnectionLost,

            Error::ProtocolVersion { .. } => ErrorCode::ProtocolVersion,
            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,
            Error::Json(_) => ErrorCode::ProtocolMalformed,

            Error::DuplicateConnection { .. } => ErrorCode::DuplicateConnection,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the error only affects a single inbound message
    ///
    /// Such errors abort processing of that message; the connection and
    /// every other in-flight operation carry on.
    pub fn is_message_local(&self) -> bool {
        matches!(
            self,
            Error::ProtocolMalformed { .. } | Error::ProtocolVersion { .. } | Error::Json(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'wwc-hub config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'wwc-hub config validate' to see details."
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::Bind { .. } => Some(
                "Another process may already be listening on that address. Set WWC_PORT or PORT to choose another port."
            ),
            Error::ConnectionLimit { .. } => Some(
                "Raise 'max_connections' in the [server] section."
            ),
            Error::ProtocolVersion { .. } => Some(
                "The peer speaks an incompatible protocol version. Upgrade the peer or the hub."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a malformed message error
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::ProtocolMalformed {
            message: message.into(),
        }
    }

    /// Create a connection lost error from a transport failure
    pub fn connection_lost(cause: impl fmt::Display) -> Self {
        Error::ConnectionLost {
            message: cause.to_string(),
        }
    }

    /// Create a handshake rejection
    pub fn handshake(reason: impl Into<String>) -> Self {
        Error::HandshakeRejected {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::ProtocolMalformed.as_str(), "E401");
        assert_eq!(ErrorCode::DuplicateConnection.as_str(), "E500");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigValidation.exit_code(), 10);
        assert_eq!(ErrorCode::BindFailed.exit_code(), 20);
        assert_eq!(ErrorCode::HandshakeRejected.exit_code(), 30);
        assert_eq!(ErrorCode::ProtocolVersion.exit_code(), 40);
        assert_eq!(ErrorCode::DuplicateConnection.exit_code(), 50);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_message_local_errors() {
        assert!(Error::malformed("missing requester_id").is_message_local());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(Error::from(json_err).is_message_local());
        assert!(!Error::handshake("no role").is_message_local());
    }

    #[test]
    fn test_connection_lost() {
        let err = Error::connection_lost("Connection reset without closing handshake");
        assert_eq!(err.code(), ErrorCode::ConnectionLost);
        assert_eq!(err.exit_code(), 30);
        assert!(err.to_string().contains("reset without closing handshake"));
        assert!(!err.is_message_local());
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::config_not_found("/test");
        assert!(err.suggestion().unwrap().contains("config init"));

        let err = Error::ConnectionLimit { limit: 4 };
        assert!(err.suggestion().unwrap().contains("max_connections"));
    }

    #[test]
    fn test_format_for_terminal() {
        let formatted = Error::config_not_found("/test/hub.toml").format_for_terminal();
        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let formatted = Error::DuplicateConnection { id: "abc".into() }.format_for_log();
        assert!(formatted.contains("[E500]"));
        assert!(formatted.contains("abc"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
