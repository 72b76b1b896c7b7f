//! Start-up error types for RestDeck.

/// Error raised while building resources, the registry, or the server. These
/// are fatal at start-up and never produced per request.
#[derive(Debug, thiserror::Error)]
pub enum RestDeckError {
    /// Invalid server or resource option.
    #[error("configuration error: {0}")]
    Config(String),

    /// A URI pattern could not be parsed.
    #[error("invalid URI pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// Two distinct resources declared the same pattern.
    #[error("duplicate URI pattern `{pattern}`: declared by `{existing}` and `{duplicate}`")]
    DuplicatePattern {
        /// The pattern declared twice.
        pattern: String,
        /// Name of the resource that registered the pattern first.
        existing: String,
        /// Name of the resource that tried to register it again.
        duplicate: String,
    },

    /// A lifecycle hook failed during setup.
    #[error("hook `{hook}` failed to set up: {reason}")]
    HookSetup {
        /// Hook name.
        hook: String,
        /// Failure description.
        reason: String,
    },

    /// The listener could not be bound or inspected.
    #[error("listener error on {addr}: {source}")]
    Listener {
        /// The address involved.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for start-up operations.
pub type RestDeckResult<T> = Result<T, RestDeckError>;
