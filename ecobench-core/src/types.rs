// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Subject identifiers, ports and load sizes validate their invariants at
//! construction time so the rest of the pipeline never re-checks them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Largest load size accepted for a single configuration.
const MAX_LOAD_SIZE: u32 = 1_000_000;

/// Validated subject identifier (the service under test).
/// Must be non-empty, alphanumeric with hyphens/underscores, max 64 chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a new SubjectId with validation.
    pub fn new(id: impl Into<String>) -> Result<Self, HardValidationError> {
        let id = id.into();

        if id.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "subject_id",
                value: id,
                reason: "Subject ID cannot be empty".to_string(),
            });
        }

        if id.len() > 64 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "subject_id",
                value: id.clone(),
                reason: format!("Subject ID too long: {} chars (max 64)", id.len()),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "subject_id",
                value: id,
                reason: "Subject ID must contain only alphanumeric characters, hyphens, and underscores".to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

/// Validated network port.
/// Must be in range 1-65535 (0 is reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a new Port with validation.
    pub fn new(port: u16) -> Result<Self, HardValidationError> {
        if port == 0 {
            return Err(HardValidationError::InvalidPort {
                port,
                reason: "Port 0 is reserved and cannot be used".to_string(),
            });
        }
        Ok(Self(port))
    }

    /// Get the inner port value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = HardValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Validated number of requests issued for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct LoadSize(u32);

impl LoadSize {
    /// Create a new LoadSize. Zero and absurdly large loads are rejected.
    pub fn new(requests: u32) -> Result<Self, HardValidationError> {
        if requests == 0 || requests > MAX_LOAD_SIZE {
            return Err(HardValidationError::InvalidFieldValue {
                field: "load_size",
                value: requests.to_string(),
                reason: format!("Load size must be between 1 and {}", MAX_LOAD_SIZE),
            });
        }
        Ok(Self(requests))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LoadSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for LoadSize {
    type Error = HardValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LoadSize> for u32 {
    fn from(load: LoadSize) -> Self {
        load.0
    }
}
