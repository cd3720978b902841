//! Core library for Salesdeck.
//!
//! Domain models, validation, SQLite persistence and the pure derivations
//! (list views, pipeline board, dashboard) that sit on top of loaded
//! records, independent of any transport layer.
//!
//! # Usage
//!
//! ```no_run
//! use salesdeck_core::db::Database;
//! use salesdeck_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let deals = db.list::<Deal>()?;
//! let board = salesdeck_core::pipeline::partition(&deals);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod dashboard;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod view;

// Re-export commonly used types at crate root
pub use db::Database;
pub use error::{CrmError, FieldError, Result, ValidationError};
