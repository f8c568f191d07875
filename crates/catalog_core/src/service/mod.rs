//! Batch orchestration and its outer collaborators.
//!
//! # Responsibility
//! - Wrap the import pipeline with audit storage and notifications.
//! - Keep CLI and embedding callers decoupled from transaction handling.

pub mod audit;
pub mod import_service;
pub mod notify;
