//! Error types for CQL library resolution

use thiserror::Error;

/// Result type for library resolution operations
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Errors that can occur while resolving models, libraries and terminology
#[derive(Debug, Error)]
pub enum LibraryError {
    /// No content could be resolved for the identifier through any path
    #[error("Library not found: {identifier}")]
    NotFound {
        /// Display form of the requested identifier
        identifier: String,
    },

    /// The model builder has no metadata for the requested model
    #[error("Could not load model information for model {name}, version {version}.")]
    ModelNotFound { name: String, version: String },

    /// A model already bound in the session was requested under another version
    #[error(
        "Could not load model information for model {name}, version {requested} because version {loaded} is already loaded."
    )]
    VersionConflict {
        name: String,
        requested: String,
        loaded: String,
    },

    /// The compiler reported error diagnostics or failed outright
    #[error("Translation of library {library} failed with the following message: {message}")]
    Translation { library: String, message: String },

    /// Compiler output could not be mapped into a compiled library
    #[error("Mapping of library {library} failed: {message}")]
    Conversion { library: String, message: String },

    /// A precompiled ELM payload could not be read
    #[error("Invalid ELM content: {0}")]
    InvalidElm(String),

    /// A single content or resource provider failed
    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// A version string is not a dot separated list of integers
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Unknown translator option name
    #[error("Invalid translator option: {0}")]
    InvalidOption(String),

    /// Terminology provider error
    #[error("Terminology provider error: {0}")]
    Terminology(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LibraryError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(identifier: impl ToString) -> Self {
        Self::NotFound {
            identifier: identifier.to_string(),
        }
    }

    /// Creates a new `ModelNotFound` error.
    #[must_use]
    pub fn model_not_found(name: impl Into<String>, version: Option<&str>) -> Self {
        Self::ModelNotFound {
            name: name.into(),
            version: version.unwrap_or("null").to_string(),
        }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(
        name: impl Into<String>,
        requested: impl Into<String>,
        loaded: Option<&str>,
    ) -> Self {
        Self::VersionConflict {
            name: name.into(),
            requested: requested.into(),
            loaded: loaded.unwrap_or("null").to_string(),
        }
    }

    /// Creates a new `Translation` error.
    #[must_use]
    pub fn translation(library: impl ToString, message: impl Into<String>) -> Self {
        Self::Translation {
            library: library.to_string(),
            message: message.into(),
        }
    }

    /// Creates a new `Conversion` error.
    #[must_use]
    pub fn conversion(library: impl ToString, message: impl Into<String>) -> Self {
        Self::Conversion {
            library: library.to_string(),
            message: message.into(),
        }
    }

    /// Creates a new `Provider` error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_elm(message: impl Into<String>) -> Self {
        Self::InvalidElm(message.into())
    }

    #[must_use]
    pub fn terminology(message: impl Into<String>) -> Self {
        Self::Terminology(message.into())
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a model version conflict.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if the compiler rejected the library.
    #[must_use]
    pub fn is_translation(&self) -> bool {
        matches!(self, Self::Translation { .. })
    }
}
