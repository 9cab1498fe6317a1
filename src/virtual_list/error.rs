//! Load error types
//!
//! Failures inside the loader are turned into status flags; these values are
//! what the flags carry.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Request never produced a response (offline, DNS, CORS, aborted)
    Network(String),
    /// Server answered with a non-success status
    Http { status: u16, message: String },
    /// Response body did not match the page schema
    Decode(String),
    /// Automatic retries are exhausted
    Terminal { attempts: u32, last: Box<LoadError> },
}

impl LoadError {
    /// Check if the failure is worth retrying automatically
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            // Client errors will fail the same way again
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Decode(_) => false,
            Self::Terminal { .. } => false,
        }
    }

    /// Short message suitable for the inline error banner
    pub fn user_message(&self) -> String {
        match self {
            Self::Terminal { .. } => {
                "Couldn't load more transactions. Scrolling won't load more until you retry.".to_string()
            }
            Self::Network(_) => "Network error while loading transactions".to_string(),
            Self::Http { status, .. } => format!("Server error ({}) while loading transactions", status),
            Self::Decode(_) => "Received an unexpected response from the server".to_string(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Http { status, message } => write!(f, "HTTP {}: {}", status, message),
            Self::Decode(msg) => write!(f, "Failed to parse response: {}", msg),
            Self::Terminal { attempts, last } => {
                write!(f, "Giving up after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for LoadError {}
