//! Shared SQLite catalog store handle and repository error type.
//!
//! # Responsibility
//! - Own the connection borrow every catalog repository trait runs against.
//! - Verify the connection is migrated before any catalog read/write.
//! - Map SQLite failures to semantic repository errors.
//!
//! # Invariants
//! - A `SqliteCatalogRepository` only exists for a connection at the latest
//!   schema version.
//! - The handle never opens or commits transactions itself; callers own the
//!   transaction boundary (a `Transaction` derefs to `Connection`). Multi-row
//!   writes only nest a savepoint inside it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::entity::EntityKind;
use crate::model::import_id::ImportId;
use crate::model::metadata::Metadata;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

const REQUIRED_TABLES: &[&str] = &[
    "organisations",
    "corpora",
    "geographies",
    "languages",
    "collections",
    "families",
    "family_geographies",
    "collection_families",
    "documents",
    "events",
    "slugs",
];

/// Repository error for catalog persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Update target does not exist.
    NotFound { kind: EntityKind, import_id: ImportId },
    /// Slug already taken at the storage level.
    SlugConflict(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, import_id } => write!(f, "{kind} not found: {import_id}"),
            Self::SlugConflict(slug) => write!(f, "slug already exists: {slug}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "catalog repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "catalog repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// SQLite-backed implementation of every catalog repository trait.
#[derive(Debug)]
pub struct SqliteCatalogRepository<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Creates a repository from a migrated connection or open transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

fn ensure_catalog_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn parse_import_id(value: String, column: &'static str) -> RepoResult<ImportId> {
    ImportId::parse(value)
        .map_err(|err| RepoError::InvalidData(format!("{err} in {column}")))
}

pub(crate) fn parse_metadata(value: &str, column: &'static str) -> RepoResult<Metadata> {
    Metadata::from_json(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid metadata in {column}: {err}")))
}

/// True for primary-key / unique violations.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

/// Runs `write` inside a named savepoint, undoing its rows on error.
///
/// Deferred foreign keys are checked when the outermost savepoint is released.
pub(crate) fn within_savepoint<T>(
    conn: &Connection,
    name: &'static str,
    write: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {name};"))?;
    match write() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name};"))?;
            Ok(value)
        }
        Err(err) => {
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};"))?;
            Err(err)
        }
    }
}
