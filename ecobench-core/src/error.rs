//! Custom error types for ecobench.
//!
//! Explicit enum error types, one family per concern. Library code never
//! returns `Box<dyn Error>` or `anyhow::Result`.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SubjectId;

/// Top-level error type for the core crate.
#[derive(Debug, Error)]
pub enum EcoError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    #[error("Subject not found in registry: {0}")]
    SubjectNotFound(SubjectId),

    #[error("Endpoint not found in registry: {0}")]
    EndpointNotFound(String),

    // =========================================================================
    // Result Store Errors
    // =========================================================================
    #[error("Result store error: {0}")]
    Store(#[from] StoreError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors reject a configuration before any benchmark starts.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid port: {port} - {reason}")]
    InvalidPort { port: u16, reason: String },

    #[error("Duplicate subject ID: {id}")]
    DuplicateSubjectId { id: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },
}

/// Errors raised while persisting or scanning run records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create result directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read result directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using EcoError.
pub type EcoResult<T> = Result<T, EcoError>;
