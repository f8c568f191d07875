//! Core engine for bulk imports into the policy-document catalog.
//! Owns validation, change detection, slugging and persistence invariants.

pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ImportConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use import::error::{ImportError, ValidationError};
pub use import::pipeline::{
    DocumentUpdatePolicy, ImportPipeline, ImportResult, ImportUnitOfWork, PipelineOptions,
};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::entity::{EntityKind, ImportBatch};
pub use model::import_id::ImportId;
pub use repo::store::{RepoError, RepoResult, SqliteCatalogRepository};
pub use repo::CatalogRepository;
pub use service::audit::{AuditBlob, AuditStore, FsAuditStore, MemoryAuditStore};
pub use service::import_service::{ImportReport, ImportService, ImportTicket};
pub use service::notify::{BatchStatus, LogNotifier, MemoryNotifier, Notification, Notifier};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
