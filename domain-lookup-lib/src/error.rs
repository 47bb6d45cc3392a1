//! Error handling for domain lookup operations.
//!
//! This module defines the error type returned by every fallible operation in
//! the library, from input validation to transport failures.

use std::fmt;
use std::time::Duration;

/// Main error type for domain lookup operations.
///
/// Parsing and normalisation never produce errors: missing or unexpected
/// registry data becomes an absent value. Only input validation, table
/// lookups and transport problems surface here.
#[derive(Debug, Clone)]
pub enum DomainLookupError {
    /// Malformed input, or no public-suffix rule matches it
    InvalidDomain { domain: String, reason: String },

    /// The extension has no entry in the WHOIS directory
    NoWhoisServer { extension: String },

    /// The extension has no entry in the RDAP bootstrap table
    NoRdapServer { extension: String },

    /// Transport failure (DNS, connect, TLS, exhausted referral/redirect budget)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// An operation exceeded its fixed time budget
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Payload could not be read as the expected wire format
    MalformedResponse {
        message: String,
        content: Option<String>,
    },

    /// Configuration errors (invalid settings, unreadable data files)
    ConfigError { message: String },

    /// File I/O errors when reading configuration or data tables
    FileError { path: String, message: String },

    /// The lookup was cancelled before it completed
    Cancelled,

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

/// Coarse error category, used for precedence decisions and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDomain,
    NoWhoisServer,
    NoRdapServer,
    NetworkError,
    Timeout,
    MalformedResponse,
    Config,
    Cancelled,
    Internal,
}

impl DomainLookupError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new "no WHOIS server" error.
    pub fn no_whois_server<E: Into<String>>(extension: E) -> Self {
        Self::NoWhoisServer {
            extension: extension.into(),
        }
    }

    /// Create a new "no RDAP server" error.
    pub fn no_rdap_server<E: Into<String>>(extension: E) -> Self {
        Self::NoRdapServer {
            extension: extension.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new malformed response error.
    pub fn malformed<M: Into<String>>(message: M) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            content: None,
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDomain { .. } => ErrorKind::InvalidDomain,
            Self::NoWhoisServer { .. } => ErrorKind::NoWhoisServer,
            Self::NoRdapServer { .. } => ErrorKind::NoRdapServer,
            Self::NetworkError { .. } => ErrorKind::NetworkError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::ConfigError { .. } | Self::FileError { .. } => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// How specific this error is when two sources both failed.
    ///
    /// Higher wins. Input and table errors say something definite about the
    /// domain; transport errors only describe the attempt.
    pub(crate) fn specificity(&self) -> u8 {
        match self.kind() {
            ErrorKind::InvalidDomain => 3,
            ErrorKind::NoWhoisServer | ErrorKind::NoRdapServer => 2,
            ErrorKind::MalformedResponse => 1,
            _ => 0,
        }
    }

    /// True when the error only says that no server is mapped for the extension.
    pub fn is_unmapped_extension(&self) -> bool {
        matches!(self, Self::NoWhoisServer { .. } | Self::NoRdapServer { .. })
    }

    /// Check if this error suggests the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::Timeout { .. })
    }
}

impl fmt::Display for DomainLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "'{}' is not a valid domain: {}", domain, reason)
            }
            Self::NoWhoisServer { extension } => {
                write!(f, "No WHOIS server is known for '.{}'", extension)
            }
            Self::NoRdapServer { extension } => {
                write!(f, "No RDAP server is known for '.{}'", extension)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::MalformedResponse { message, content: _ } => {
                write!(f, "Malformed response: {}", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Cancelled => write!(f, "Lookup cancelled"),
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for DomainLookupError {}

impl From<reqwest::Error> for DomainLookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::from_secs(10))
        } else if err.is_redirect() {
            Self::network_with_source("Redirect limit exceeded", err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else if err.is_decode() {
            Self::malformed(format!("Response body could not be decoded: {}", err))
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for DomainLookupError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<std::io::Error> for DomainLookupError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => Self::timeout("socket I/O", Duration::ZERO),
            _ => Self::network_with_source("I/O error", err.to_string()),
        }
    }
}
