//! Result and error types for Spot.

use thiserror::Error;

/// Result type for Spot operations
pub type SpotResult<T> = Result<T, SpotError>;

/// Errors that can occur in Spot
#[derive(Debug, Error)]
pub enum SpotError {
    /// No element matched the locator
    #[error("No element found for {locator}")]
    ElementNotFound {
        /// Locator description
        locator: String,
    },

    /// Element handle no longer attached to the page
    #[error("Stale element reference: {id}")]
    StaleElement {
        /// Element handle
        id: String,
    },

    /// Operation timed out
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was waited for (including the last error seen, if any)
        waited_for: String,
    },

    /// Error reported by the underlying driver
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Frame could not be selected
    #[error("Cannot switch to frame {frame}: {message}")]
    FrameNotFound {
        /// Frame description
        frame: String,
        /// Error message
        message: String,
    },

    /// Tree path could not be parsed or walked
    #[error("Invalid tree path '{path}': {message}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// Error message
        message: String,
    },

    /// No tree node for the path
    #[error("No tree node found for path '{path}'")]
    NodeNotFound {
        /// Path searched
        path: String,
    },

    /// No table column with that header
    #[error("No column '{name}' in table (headers: {headers:?})")]
    ColumnNotFound {
        /// Column name
        name: String,
        /// Headers found
        headers: Vec<String>,
    },

    /// No select option matched
    #[error("No option '{option}' in select box")]
    OptionNotFound {
        /// Option text, value or index
        option: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpotError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error comes from a detached element handle
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }

    /// Whether polling loops should keep trying after this error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StaleElement { .. }
                | Self::ElementNotFound { .. }
                | Self::NodeNotFound { .. }
                | Self::FrameNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SpotError::StaleElement { id: "e1".into() }.is_retryable());
        assert!(SpotError::ElementNotFound {
            locator: "By.id: x".into()
        }
        .is_retryable());
        assert!(SpotError::FrameNotFound {
            frame: "embedded By.id: frm".into(),
            message: "frame was detached".into()
        }
        .is_retryable());
        assert!(!SpotError::driver("boom").is_retryable());
        assert!(!SpotError::invalid_state("nope").is_stale());
    }

    #[test]
    fn test_display_messages() {
        let err = SpotError::Timeout {
            ms: 250,
            waited_for: "element By.id: login".into(),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 250ms waiting for element By.id: login"
        );

        let err = SpotError::ColumnNotFound {
            name: "Owner".into(),
            headers: vec!["Name".into()],
        };
        assert!(err.to_string().contains("Owner"));
    }
}
