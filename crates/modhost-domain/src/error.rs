//! Error handling types
//!
//! Every error is `Clone`: a failed singleton construction is cached once and
//! replayed to each observer, so sources are shared through `Arc` instead of
//! being boxed.

use std::sync::Arc;
use thiserror::Error;

use crate::value_objects::SecretScheme;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Shared, type-erased error source
pub type SharedSource = Arc<dyn std::error::Error + Send + Sync>;

/// Main error type for the module runtime
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Missing file, exported type, registered service or configuration key
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// More than one concrete candidate satisfies a capability
    #[error("Ambiguous export for {capability}: candidates {candidates:?}")]
    Ambiguous {
        /// Capability type that was requested
        capability: String,
        /// Names of every matching concrete type
        candidates: Vec<String>,
    },

    /// No constructor shape of the selected type could be used
    #[error("No usable constructor for {type_name}: {reason}")]
    MissingConstructor {
        /// Concrete type being constructed
        type_name: String,
        /// Why no shape matched
        reason: String,
    },

    /// A validation hook or typed getter rejected configuration input
    #[error("Invalid configuration for '{section}': {message}")]
    ConfigurationInvalid {
        /// Configuration section being validated
        section: String,
        /// Description of the rejection
        message: String,
    },

    /// Operation attempted after the module's unload signal
    #[error("Module '{module}' is unloading: {operation} rejected")]
    AlreadyUnloaded {
        /// Module being unloaded
        module: String,
        /// Operation that was rejected
        operation: String,
    },

    /// Secret retrieval from its backing store failed
    #[error("Secret '{name}' could not be read from {scheme} store: {message}")]
    BackingStoreFailure {
        /// Secret name
        name: String,
        /// Scheme that was attempted
        scheme: SecretScheme,
        /// Description of the failure
        message: String,
        /// Original transport error
        #[source]
        source: Option<SharedSource>,
    },

    /// A unit's dependency could not be located
    #[error("Failed to resolve dependency '{dependency}' of unit '{unit}': {diagnostic}")]
    DependencyResolution {
        /// Unit being loaded
        unit: String,
        /// Dependency that was requested
        dependency: String,
        /// Loader diagnostic (probed locations, parse errors)
        diagnostic: String,
    },

    /// A constructor failed with an error that is not part of this taxonomy
    #[error("Construction of {type_name} failed: {message}")]
    Construction {
        /// Concrete type being constructed
        type_name: String,
        /// Root cause message
        message: String,
    },

    /// Lifecycle operation invoked in the wrong state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the violated precondition
        message: String,
    },

    /// Host configuration could not be loaded
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<SharedSource>,
    },

    /// I/O operation error
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<SharedSource>,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

/// Flat classification of [`Error`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Ambiguous,
    MissingConstructor,
    ConfigurationInvalid,
    AlreadyUnloaded,
    BackingStoreFailure,
    DependencyResolution,
    Construction,
    InvalidState,
    Configuration,
    Io,
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::Ambiguous,
            Self::MissingConstructor { .. } => ErrorKind::MissingConstructor,
            Self::ConfigurationInvalid { .. } => ErrorKind::ConfigurationInvalid,
            Self::AlreadyUnloaded { .. } => ErrorKind::AlreadyUnloaded,
            Self::BackingStoreFailure { .. } => ErrorKind::BackingStoreFailure,
            Self::DependencyResolution { .. } => ErrorKind::DependencyResolution,
            Self::Construction { .. } => ErrorKind::Construction,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

// Basic error creation methods
impl Error {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an ambiguity error
    pub fn ambiguous<S: Into<String>>(capability: S, candidates: Vec<String>) -> Self {
        Self::Ambiguous {
            capability: capability.into(),
            candidates,
        }
    }

    /// Create a missing constructor error
    pub fn missing_constructor<S: Into<String>, R: Into<String>>(type_name: S, reason: R) -> Self {
        Self::MissingConstructor {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration validation error
    pub fn configuration_invalid<S: Into<String>, M: Into<String>>(section: S, message: M) -> Self {
        Self::ConfigurationInvalid {
            section: section.into(),
            message: message.into(),
        }
    }

    /// Create an already-unloaded error
    pub fn already_unloaded<S: Into<String>, O: Into<String>>(module: S, operation: O) -> Self {
        Self::AlreadyUnloaded {
            module: module.into(),
            operation: operation.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Backing store error creation methods
impl Error {
    /// Create a backing store failure without a transport cause
    pub fn backing_store<S: Into<String>, M: Into<String>>(
        name: S,
        scheme: SecretScheme,
        message: M,
    ) -> Self {
        Self::BackingStoreFailure {
            name: name.into(),
            scheme,
            message: message.into(),
            source: None,
        }
    }

    /// Create a backing store failure preserving the transport error
    pub fn backing_store_with_source<S, E>(name: S, scheme: SecretScheme, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::BackingStoreFailure {
            name: name.into(),
            scheme,
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }
}

// I/O and configuration error creation methods
impl Error {
    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }
}

// Unit loading and construction error creation methods
impl Error {
    /// Create a dependency resolution error
    pub fn dependency_resolution<U: Into<String>, D: Into<String>, M: Into<String>>(
        unit: U,
        dependency: D,
        diagnostic: M,
    ) -> Self {
        Self::DependencyResolution {
            unit: unit.into(),
            dependency: dependency.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a construction error for a failure outside the taxonomy
    pub fn construction<S: Into<String>, M: Into<String>>(type_name: S, message: M) -> Self {
        Self::Construction {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}
