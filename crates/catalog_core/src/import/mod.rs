//! Bulk-import engine: validators, synchronizers, diffing and slugs.
//!
//! # Responsibility
//! - Turn one decoded batch into creates and updates against a catalog
//!   repository, in dependency order.
//!
//! # Invariants
//! - Nothing here opens or commits a transaction except `ImportUnitOfWork`.
//! - Entities are never deleted.

pub mod diff;
pub mod error;
pub mod pipeline;
pub mod slug;
pub mod sync;
pub mod validate;
