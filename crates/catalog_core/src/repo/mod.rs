//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-kind data access contracts used by the import pipeline.
//! - Isolate SQLite query details from validation and synchronization.
//!
//! # Invariants
//! - Repositories never open, commit or roll back transactions.
//! - Repository APIs return semantic errors (`NotFound`, `SlugConflict`) in
//!   addition to DB transport errors.

pub mod collection_repo;
pub mod corpus_repo;
pub mod document_repo;
pub mod event_repo;
pub mod family_repo;
pub mod slug_repo;
pub mod store;

use collection_repo::CollectionRepository;
use corpus_repo::CorpusRepository;
use document_repo::DocumentRepository;
use event_repo::EventRepository;
use family_repo::FamilyRepository;
use slug_repo::SlugRepository;

/// Everything one import batch needs from storage.
pub trait CatalogRepository:
    CorpusRepository
    + CollectionRepository
    + FamilyRepository
    + DocumentRepository
    + EventRepository
    + SlugRepository
{
}

impl<T> CatalogRepository for T where
    T: CorpusRepository
        + CollectionRepository
        + FamilyRepository
        + DocumentRepository
        + EventRepository
        + SlugRepository
{
}
