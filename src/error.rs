//! Error types for TelePanel
//!
//! This module defines all error types used throughout the TelePanel host.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for TelePanel operations.
#[derive(Error, Debug)]
pub enum PanelError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing module manifests
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Missing module code artifact or entry symbol
    #[error("Entry point error: {0}")]
    EntryPoint(String),

    /// A module's own service-configuration hook failed
    #[error("Module configure error: {0}")]
    ModuleConfigure(String),

    /// Invalid version string or version range expression
    #[error("Version error: {0}")]
    Version(String),

    /// Module state ledger errors (unreadable root, serialization failures, etc.)
    #[error("State error: {0}")]
    State(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dynamic library loading errors
    #[error("Library error: {0}")]
    Library(#[from] libloading::Error),
}

/// A specialized `Result` type for TelePanel operations.
pub type Result<T> = std::result::Result<T, PanelError>;
