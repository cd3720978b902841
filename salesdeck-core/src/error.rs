//! Error taxonomy shared by every layer that touches records.
//!
//! - `Validation`: a required field is missing or malformed. Surfaced next
//!   to the offending form field and never fatal.
//! - `NotFound`: the operation referenced an id that does not exist.
//! - `Store`: the backing store failed (I/O, SQL, transport).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EntityKind, Id};

pub type Result<T> = std::result::Result<T, CrmError>;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: Id },

    #[error("store error: {0}")]
    Store(String),
}

impl CrmError {
    pub fn not_found(entity: EntityKind, id: Id) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ValidationError> for CrmError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<rusqlite::Error> for CrmError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("malformed record: {}", err))
    }
}

/// A single field-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field-level problem found while checking one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(field, message);
        err
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Message for one field, if that field failed.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> std::result::Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}
