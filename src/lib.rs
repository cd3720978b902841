//! Salesdeck: CRM record stores, workflows, HTTP API and CLI.
//!
//! Domain types and pure derivations live in `salesdeck-core`; this crate
//! adds the async [`store::RecordStore`] backends, the audited
//! [`service::CrmService`] workflows and the `axum` API.

pub mod api;
pub mod cli;
pub mod config;
pub mod service;
pub mod store;
