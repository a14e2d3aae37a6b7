//! Result and error types for Quoteflow.

use thiserror::Error;

/// Result type for Quoteflow operations
pub type QuoteflowResult<T> = Result<T, QuoteflowError>;

/// Errors that can occur while driving the configurator
#[derive(Debug, Error)]
pub enum QuoteflowError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// The UI session is gone (browser closed, CDP connection dropped)
    #[error("UI session closed: {message}")]
    SessionClosed {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// No element matched a selector
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Selector that matched nothing
        selector: String,
    },

    /// Element exists but cannot take the requested interaction
    #[error("Element {selector} is not interactable: {message}")]
    NotInteractable {
        /// Selector of the element
        selector: String,
        /// Error message
        message: String,
    },

    /// Bounded wait expired
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Description of the condition
        waited_for: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Input simulation error
    #[error("Input simulation failed: {message}")]
    Input {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Invalid state error (workflow transition not allowed)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Credential file is missing a field
    #[error("Credentials error: {message}")]
    Credentials {
        /// Error message
        message: String,
    },

    /// Settings file could not be used
    #[error("Settings error: {message}")]
    Settings {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl QuoteflowError {
    /// Create an element-not-found error
    #[must_use]
    pub fn not_found(selector: impl std::fmt::Display) -> Self {
        Self::ElementNotFound {
            selector: selector.to_string(),
        }
    }

    /// Create a not-interactable error
    #[must_use]
    pub fn not_interactable(selector: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::NotInteractable {
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create an input error
    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Errors after which the session cannot be used any more.
    ///
    /// Retry loops propagate these immediately instead of spending attempts on them.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionClosed { .. } | Self::BrowserLaunch { .. })
    }

    /// Whether this is a bounded wait that expired
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
