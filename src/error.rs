// src/error.rs
//! Error handling for the whole crate.
//!
//! One enum covers every failure the demo can surface: an environment that cannot host the
//! tracker or the GPU, collaborator failures from physics and rendering, and configuration
//! problems. `Result<T>` is the alias used everywhere; `.context()` chains a message onto any
//! error without losing the source.

use thiserror::Error;

/// Fixed text shown when the host cannot run the demo at all.
pub const UNSUPPORTED_ENVIRONMENT_MESSAGE: &str =
    "This device or browser cannot provide camera access. Open the demo on a supported device to continue.";

/// Main error type. Send + Sync + 'static.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The host cannot provide camera tracking (or a GPU to draw on). Initialization stops here.
    #[error("unsupported environment: {reason}")]
    UnsupportedEnvironment { reason: String },

    /// The physics collaborator rejected an operation.
    #[error("physics error: {0}")]
    Physics(String),

    /// The render collaborator failed to produce a frame.
    #[error("render error: {0}")]
    Render(String),

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O errors (config files, crash logs).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of the config file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[inline]
    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self::UnsupportedEnvironment { reason: reason.into() }
    }

    #[inline]
    pub fn physics<S: Into<String>>(msg: S) -> Self {
        Self::Physics(msg.into())
    }

    #[inline]
    pub fn render<S: Into<String>>(msg: S) -> Self {
        Self::Render(msg.into())
    }

    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    /// Add context to any error (chainable).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// True when this error (or the error it wraps) means the host cannot run the demo.
    pub fn is_unsupported_environment(&self) -> bool {
        match self {
            Error::UnsupportedEnvironment { .. } => true,
            Error::WithContext { source, .. } => source.is_unsupported_environment(),
            _ => false,
        }
    }

    #[inline]
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Json(_))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
