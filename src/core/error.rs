//! Error handling for tplcache
//!
//! This module provides the error type shared by the library and the CLI, plus the
//! user-friendly rendering used when a command fails. The error system follows two rules:
//! 1. **Only hard failures are errors**: template compilation/render failures and
//!    programmer errors (bad registration options, unreadable configuration).
//! 2. **Everything else degrades**: cache, discovery and persistence problems are logged
//!    and turned into misses or zero counts, so they never reach this type.
//!
//! # Error Categories
//!
//! - **Templates**: [`TplError::TemplateNotFound`], [`TplError::Compile`], [`TplError::Render`]
//! - **Usage**: [`TplError::InvalidRegistrationOptions`], [`TplError::Config`]
//! - **Conversions**: [`TplError::Io`], [`TplError::Toml`], [`TplError::Json`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use tplcache::core::{TplError, ErrorContext, user_friendly_error};
//!
//! let err = TplError::TemplateNotFound {
//!     name: "home.html".to_string(),
//!     searched: vec![],
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display(); // colored error + suggestion on stderr
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tplcache operations.
///
/// Variants carry the template or option name involved so the CLI can print a
/// targeted suggestion without re-deriving context.
#[derive(Error, Debug)]
pub enum TplError {
    /// No search root contains the requested template.
    #[error("Template '{name}' not found in any configured search root")]
    TemplateNotFound {
        /// Template name including extension (may carry an `@namespace/` prefix)
        name: String,
        /// Directories that were probed
        searched: Vec<PathBuf>,
    },

    /// The engine rejected the template source (syntax error, missing parent).
    #[error("Failed to compile template '{template}': {message}")]
    Compile {
        template: String,
        message: String,
    },

    /// Rendering a compiled template failed (undefined variable, filter error).
    #[error("Failed to render template '{template}': {message}")]
    Render {
        template: String,
        message: String,
    },

    /// Options passed to a dynamic registration call have the wrong shape.
    #[error("Invalid options for {kind} '{name}': {reason}")]
    InvalidRegistrationOptions {
        /// `"function"` or `"filter"`
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// Configuration could not be resolved.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error wrapper that adds user-facing details and a suggestion.
///
/// The CLI converts every failure into an `ErrorContext` before printing it, so
/// users see what happened and what to try next.
#[derive(Debug)]
pub struct ErrorContext {
    /// Primary error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from any displayable error.
    #[must_use]
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            message: error.to_string(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    ///
    /// Suggestions are displayed in green in the terminal.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    ///
    /// Details are displayed in yellow in the terminal.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`TplError`] variants and common standard library errors; anything
/// else is shown with its full `anyhow` context chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(tpl_error) = error.downcast_ref::<TplError>() {
        return create_error_context(tpl_error);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorContext::new(format!("{error:#}"))
                .with_suggestion("Check ownership and permissions of the cache directory")
                .with_details("tplcache could not read or write a file it needs"),
            std::io::ErrorKind::NotFound => ErrorContext::new(format!("{error:#}"))
                .with_suggestion("Check that the file or directory exists and the path is correct"),
            _ => ErrorContext::new(format!("{error:#}")),
        };
    }

    if error.downcast_ref::<toml::de::Error>().is_some() {
        return ErrorContext::new(format!("{error:#}"))
            .with_suggestion("Check the TOML syntax of your tplcache.toml file");
    }

    ErrorContext::new(format!("{error:#}"))
}

fn create_error_context(error: &TplError) -> ErrorContext {
    match error {
        TplError::TemplateNotFound {
            searched,
            ..
        } => {
            let ctx = ErrorContext::new(error)
                .with_suggestion("Check the template name and the configured `paths`/`namespaces`");
            if searched.is_empty() {
                ctx.with_details("No search root is configured for this namespace")
            } else {
                let dirs: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
                ctx.with_details(format!("Searched: {}", dirs.join(", ")))
            }
        }
        TplError::Compile {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Fix the template syntax; referenced parents and macro files must exist"),
        TplError::Render {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that every variable used by the template is present in the data"),
        TplError::InvalidRegistrationOptions {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Pass a boolean or an object such as {\"is_safe\": [\"html\"]}"),
        TplError::Config {
            ..
        }
        | TplError::Toml(_) => ErrorContext::new(error)
            .with_suggestion("Check your tplcache.toml (or the file named by TPLCACHE_CONFIG)"),
        TplError::Io(_) | TplError::Json(_) => ErrorContext::new(error),
    }
}
