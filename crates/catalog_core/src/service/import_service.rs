//! Bulk-import orchestrator.
//!
//! # Responsibility
//! - Audit the raw request, run the batch in one transaction, audit the
//!   result map, then commit and notify.
//! - Run batches in the background for callers that only need a ticket.
//!
//! # Invariants
//! - The request blob is written before the catalog store is touched.
//! - Any failure rolls back the whole batch; nothing of earlier kinds survives.
//! - Every batch sends one `started` and one terminal notification.
//! - Failures are reported through the returned report, audit and
//!   notifications; `import` itself never returns an error.

use crate::config::ImportConfig;
use crate::db::open_db;
use crate::import::error::{ImportError, ValidationError};
use crate::import::pipeline::{ImportResult, ImportUnitOfWork};
use crate::model::entity::ImportBatch;
use crate::repo::store::RepoError;
use crate::service::audit::{AuditBlob, AuditError, AuditStore};
use crate::service::notify::{BatchStatus, Notification, Notifier};
use log::{error, info, warn};
use rusqlite::Connection;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use uuid::Uuid;

/// Outcome of one batch, keyed by its correlation id.
#[derive(Debug)]
pub struct ImportReport {
    pub correlation_id: String,
    pub outcome: Result<ImportResult, ImportError>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Handle to a batch running on a worker thread.
#[derive(Debug)]
pub struct ImportTicket {
    pub correlation_id: String,
    handle: JoinHandle<ImportReport>,
}

impl ImportTicket {
    /// Waits for the batch; `None` if the worker panicked.
    pub fn wait(self) -> Option<ImportReport> {
        self.handle.join().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Orchestrates audit, transaction and notification around the pipeline.
#[derive(Clone)]
pub struct ImportService {
    config: ImportConfig,
    audit: Arc<dyn AuditStore>,
    notifier: Arc<dyn Notifier>,
}

impl ImportService {
    pub fn new(
        config: ImportConfig,
        audit: Arc<dyn AuditStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            audit,
            notifier,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Runs one batch to completion on `conn`.
    pub fn import(
        &self,
        conn: &mut Connection,
        request: &Value,
        corpus_import_id: &str,
        document_limit: Option<usize>,
    ) -> ImportReport {
        let correlation_id = new_correlation_id();
        self.import_with_id(conn, correlation_id, request, corpus_import_id, document_limit)
    }

    /// Starts one batch on a worker thread with its own connection to `db_path`.
    ///
    /// Returns as soon as the worker is spawned.
    pub fn submit(
        &self,
        db_path: impl Into<PathBuf>,
        request: Value,
        corpus_import_id: impl Into<String>,
        document_limit: Option<usize>,
    ) -> ImportTicket {
        let correlation_id = new_correlation_id();
        let service = self.clone();
        let db_path = db_path.into();
        let corpus_import_id = corpus_import_id.into();
        let worker_id = correlation_id.clone();

        info!(
            "event=import_submit module=service status=ok correlation_id={correlation_id} corpus={corpus_import_id}"
        );
        let handle = std::thread::spawn(move || match open_db(&db_path) {
            Ok(mut conn) => service.import_with_id(
                &mut conn,
                worker_id,
                &request,
                &corpus_import_id,
                document_limit,
            ),
            Err(err) => {
                let err = ImportError::Repo(RepoError::from(err));
                service.send(
                    &worker_id,
                    BatchStatus::Started,
                    format!("Bulk import for corpus {corpus_import_id} started."),
                );
                service.send(
                    &worker_id,
                    BatchStatus::Failed,
                    format!("Bulk import for corpus {corpus_import_id} failed: {err}"),
                );
                ImportReport {
                    correlation_id: worker_id,
                    outcome: Err(err),
                }
            }
        });

        ImportTicket {
            correlation_id,
            handle,
        }
    }

    fn import_with_id(
        &self,
        conn: &mut Connection,
        correlation_id: String,
        request: &Value,
        corpus_import_id: &str,
        document_limit: Option<usize>,
    ) -> ImportReport {
        let started_at = Instant::now();
        info!(
            "event=bulk_import module=service status=start correlation_id={correlation_id} corpus={corpus_import_id}"
        );
        self.send(
            &correlation_id,
            BatchStatus::Started,
            format!("Bulk import for corpus {corpus_import_id} started."),
        );

        let outcome = self.run_batch(
            conn,
            &correlation_id,
            request,
            corpus_import_id,
            document_limit,
        );

        match &outcome {
            Ok(result) => {
                info!(
                    "event=bulk_import module=service status=ok correlation_id={correlation_id} collections={} families={} documents={} events={} duration_ms={}",
                    result.collections.len(),
                    result.families.len(),
                    result.documents.len(),
                    result.events.len(),
                    started_at.elapsed().as_millis()
                );
                self.send(
                    &correlation_id,
                    BatchStatus::Succeeded,
                    format!(
                        "Bulk import for corpus {corpus_import_id} succeeded: {} collections, {} families, {} documents, {} events created or updated.",
                        result.collections.len(),
                        result.families.len(),
                        result.documents.len(),
                        result.events.len()
                    ),
                );
            }
            Err(err) => {
                error!(
                    "event=bulk_import module=service status=error correlation_id={correlation_id} error_code={} duration_ms={}",
                    err.code(),
                    started_at.elapsed().as_millis()
                );
                self.send(
                    &correlation_id,
                    BatchStatus::Failed,
                    format!("Bulk import for corpus {corpus_import_id} failed: {err}"),
                );
            }
        }

        ImportReport {
            correlation_id,
            outcome,
        }
    }

    fn run_batch(
        &self,
        conn: &mut Connection,
        correlation_id: &str,
        request: &Value,
        corpus_import_id: &str,
        document_limit: Option<usize>,
    ) -> Result<ImportResult, ImportError> {
        self.audit.put(correlation_id, AuditBlob::Request, request)?;

        let batch = ImportBatch::from_value(request)
            .map_err(|err| ValidationError::InvalidBatch(err.to_string()))?;
        let options = self.config.pipeline_options(document_limit);

        let unit = ImportUnitOfWork::begin(conn).map_err(RepoError::from)?;
        let staged = unit
            .execute(&batch, corpus_import_id, options)
            .and_then(|result| {
                let body = serde_json::to_value(&result)
                    .map_err(AuditError::from)?;
                self.audit.put(correlation_id, AuditBlob::Result, &body)?;
                Ok(result)
            });

        match staged {
            Ok(result) => {
                unit.commit().map_err(RepoError::from)?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = unit.rollback() {
                    error!(
                        "event=bulk_import_rollback module=service status=error correlation_id={correlation_id} error={rollback_err}"
                    );
                }
                Err(err)
            }
        }
    }

    fn send(&self, correlation_id: &str, status: BatchStatus, text: String) {
        let notification = Notification {
            correlation_id: correlation_id.to_string(),
            status,
            text,
        };
        if let Err(err) = self.notifier.notify(&notification) {
            warn!(
                "event=import_notification module=service status=error correlation_id={correlation_id} error={err}"
            );
        }
    }
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
