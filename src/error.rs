//! Error types for the DHT proxy
//!
//! This module defines the error type shared by the store engine, the value
//! codec and the HTTP gateway.

use std::fmt;

/// Error type for proxy and store-engine operations
#[derive(Debug, Clone)]
pub enum ProxyError {
    /// Malformed request bodies or value documents
    ParseError {
        message: String,
        source: Option<String>,
    },

    /// Store-engine errors (rejected puts, stopped node)
    DHTError {
        message: String,
        key: Option<String>,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },

    /// Network errors (binding, resolving, serving)
    NetworkError {
        message: String,
        address: Option<String>,
        source: Option<String>,
    },

    /// Validation errors
    ValidationError {
        message: String,
        field: Option<String>,
    },
}

impl ProxyError {
    /// Create a new ParseError
    pub fn parse_error(message: impl Into<String>) -> Self {
        ProxyError::ParseError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new ParseError with source
    pub fn parse_error_with_source(message: impl Into<String>, source: impl Into<String>) -> Self {
        ProxyError::ParseError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new DHTError
    pub fn dht_error(message: impl Into<String>) -> Self {
        ProxyError::DHTError {
            message: message.into(),
            key: None,
            source: None,
        }
    }

    /// Create a new DHTError for a key
    pub fn dht_error_with_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        ProxyError::DHTError {
            message: message.into(),
            key: Some(key.into()),
            source: None,
        }
    }

    /// Create a new DHTError with key and source
    pub fn dht_error_full(message: impl Into<String>, key: impl Into<String>, source: impl Into<String>) -> Self {
        ProxyError::DHTError {
            message: message.into(),
            key: Some(key.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        ProxyError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new NetworkError with address and source
    pub fn network_error_full(message: impl Into<String>, address: impl Into<String>, source: impl Into<String>) -> Self {
        ProxyError::NetworkError {
            message: message.into(),
            address: Some(address.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ValidationError with field
    pub fn validation_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        ProxyError::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = context.into();
        match &mut self {
            ProxyError::ParseError { source, .. }
            | ProxyError::DHTError { source, .. }
            | ProxyError::NetworkError { source, .. } => {
                *source = Some(source.as_ref().map_or_else(|| ctx.clone(), |s| format!("{}: {}", s, ctx)));
            }
            _ => {}
        }
        self
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::ParseError { message, source } => {
                if let Some(src) = source {
                    write!(f, "Parse error: {} (source: {})", message, src)
                } else {
                    write!(f, "Parse error: {}", message)
                }
            }
            ProxyError::DHTError { message, key, source } => {
                match (key, source) {
                    (Some(k), Some(s)) => write!(f, "DHT error: {} (key: {}, source: {})", message, k, s),
                    (Some(k), None) => write!(f, "DHT error: {} (key: {})", message, k),
                    (None, Some(s)) => write!(f, "DHT error: {} (source: {})", message, s),
                    (None, None) => write!(f, "DHT error: {}", message),
                }
            }
            ProxyError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
            ProxyError::NetworkError { message, address, source } => {
                match (address, source) {
                    (Some(a), Some(s)) => write!(f, "Network error: {} (address: {}, source: {})", message, a, s),
                    (Some(a), None) => write!(f, "Network error: {} (address: {})", message, a),
                    (None, Some(s)) => write!(f, "Network error: {} (source: {})", message, s),
                    (None, None) => write!(f, "Network error: {}", message),
                }
            }
            ProxyError::ValidationError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Validation error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Validation error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::network_error_full(err.to_string(), "unknown".to_string(), err.kind().to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::parse_error_with_source("Failed to parse JSON data", err.to_string())
    }
}

impl From<base64::DecodeError> for ProxyError {
    fn from(err: base64::DecodeError) -> Self {
        ProxyError::parse_error_with_source("Failed to decode base64 value data", err.to_string())
    }
}

impl From<std::net::AddrParseError> for ProxyError {
    fn from(err: std::net::AddrParseError) -> Self {
        ProxyError::network_error_full("Failed to parse address", "unknown".to_string(), err.to_string())
    }
}
