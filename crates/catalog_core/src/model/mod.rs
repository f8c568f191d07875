//! Domain model for the policy-document catalog import path.
//!
//! # Responsibility
//! - Define typed ids, metadata, taxonomy and per-kind entity shapes.
//! - Keep raw JSON from leaking past the decode boundary.
//!
//! # Invariants
//! - Every entity is identified by a stable, grammar-checked `ImportId`.
//! - Entities are never deleted by core; only created or updated.

pub mod entity;
pub mod import_id;
pub mod metadata;
pub mod record;
pub mod taxonomy;
