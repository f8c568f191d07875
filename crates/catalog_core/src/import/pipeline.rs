//! Unit of work for one import batch.
//!
//! # Responsibility
//! - Own the batch transaction boundary.
//! - Run validate+sync stages in dependency order against one repository.
//!
//! # Invariants
//! - Collections, families, documents and events are processed in that order.
//! - A kind is validated immediately before it is synchronized.
//! - Any stage failure leaves the transaction for the caller to roll back.
//! - Events of documents held back by `document_limit` are skipped, not failed.

use crate::db::DbError;
use crate::import::error::{ImportError, ValidationError};
use crate::import::slug::{SlugGenerator, SlugReservations};
use crate::import::sync::{self, StageContext};
use crate::import::validate::BatchValidator;
use crate::model::entity::{EntityKind, ImportBatch};
use crate::model::import_id::ImportId;
use crate::model::record::CorpusRecord;
use crate::repo::store::SqliteCatalogRepository;
use crate::repo::CatalogRepository;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

/// Whether unchanged existing documents are rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentUpdatePolicy {
    /// Update only when the diff engine reports a change.
    #[default]
    SkipUnchanged,
    /// Update every existing document in the batch.
    Always,
}

/// Tunables for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Cap on newly created documents; updates are never capped. Events
    /// pointing at a document over the cap are skipped with it.
    pub document_limit: Option<usize>,
    pub document_update_policy: DocumentUpdatePolicy,
    pub slugs: SlugGenerator,
}

/// Ids created or updated by one batch, per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub collections: Vec<ImportId>,
    pub families: Vec<ImportId>,
    pub documents: Vec<ImportId>,
    pub events: Vec<ImportId>,
}

impl ImportResult {
    pub fn ids(&self, kind: EntityKind) -> &[ImportId] {
        match kind {
            EntityKind::Collection => &self.collections,
            EntityKind::Family => &self.families,
            EntityKind::Document => &self.documents,
            EntityKind::Event => &self.events,
        }
    }

    /// True when the batch changed nothing.
    pub fn is_empty(&self) -> bool {
        EntityKind::ORDERED
            .iter()
            .all(|kind| self.ids(*kind).is_empty())
    }

    fn set_ids(&mut self, kind: EntityKind, ids: Vec<ImportId>) {
        match kind {
            EntityKind::Collection => self.collections = ids,
            EntityKind::Family => self.families = ids,
            EntityKind::Document => self.documents = ids,
            EntityKind::Event => self.events = ids,
        }
    }
}

/// Ordered validate+sync stages over any catalog repository.
pub struct ImportPipeline<'r, R: CatalogRepository + ?Sized> {
    repo: &'r R,
    corpus: CorpusRecord,
    options: PipelineOptions,
}

impl<'r, R: CatalogRepository + ?Sized> ImportPipeline<'r, R> {
    /// Loads the target corpus; a missing corpus fails before any write.
    pub fn new(
        repo: &'r R,
        corpus_import_id: &str,
        options: PipelineOptions,
    ) -> Result<Self, ImportError> {
        let corpus = repo
            .get_corpus(corpus_import_id)?
            .ok_or_else(|| ValidationError::CorpusNotFound(corpus_import_id.to_string()))?;
        Ok(Self {
            repo,
            corpus,
            options,
        })
    }

    pub fn corpus(&self) -> &CorpusRecord {
        &self.corpus
    }

    /// Runs every stage in dependency order.
    pub fn run(&self, batch: &ImportBatch) -> Result<ImportResult, ImportError> {
        let mut reservations = SlugReservations::new();
        let mut held_back = HashSet::new();
        let mut result = ImportResult::default();
        for kind in EntityKind::ORDERED {
            let started_at = Instant::now();
            let mut ctx = StageContext {
                repo: self.repo,
                corpus: &self.corpus,
                options: &self.options,
                slugs: &mut reservations,
                held_back: &mut held_back,
            };
            match self.run_stage(kind, batch, &mut ctx) {
                Ok(ids) => {
                    info!(
                        "event=import_stage module=import status=ok kind={kind} received={} touched={} duration_ms={}",
                        batch.len(kind),
                        ids.len(),
                        started_at.elapsed().as_millis()
                    );
                    result.set_ids(kind, ids);
                }
                Err(err) => {
                    error!(
                        "event=import_stage module=import status=error kind={kind} duration_ms={} error_code={}",
                        started_at.elapsed().as_millis(),
                        err.code()
                    );
                    return Err(err);
                }
            }
        }
        Ok(result)
    }

    fn run_stage(
        &self,
        kind: EntityKind,
        batch: &ImportBatch,
        ctx: &mut StageContext<'_, R>,
    ) -> Result<Vec<ImportId>, ImportError> {
        let validator = BatchValidator::new(self.repo, &self.corpus);
        match kind {
            EntityKind::Collection => {
                validator.collections(&batch.collections)?;
                sync::save_collections(ctx, &batch.collections)
            }
            EntityKind::Family => {
                validator.families(&batch.families)?;
                sync::save_families(ctx, &batch.families)
            }
            EntityKind::Document => {
                validator.documents(&batch.documents)?;
                sync::save_documents(ctx, &batch.documents)
            }
            EntityKind::Event => {
                let events = sync::without_held_back(&batch.events, ctx.held_back);
                validator.events(&events)?;
                sync::save_events(ctx, &events)
            }
        }
    }
}

/// One batch transaction over SQLite.
pub struct ImportUnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> ImportUnitOfWork<'conn> {
    /// Opens the batch transaction with an immediate write lock.
    pub fn begin(conn: &'conn mut Connection) -> Result<Self, DbError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self { tx })
    }

    /// Runs the pipeline inside the open transaction.
    pub fn execute(
        &self,
        batch: &ImportBatch,
        corpus_import_id: &str,
        options: PipelineOptions,
    ) -> Result<ImportResult, ImportError> {
        let repo = SqliteCatalogRepository::try_new(&self.tx)?;
        ImportPipeline::new(&repo, corpus_import_id, options)?.run(batch)
    }

    pub fn commit(self) -> Result<(), DbError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback()?;
        Ok(())
    }
}
