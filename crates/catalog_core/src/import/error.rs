//! Import pipeline error taxonomy.
//!
//! # Invariants
//! - `ValidationError` is raised before any write of the offending kind.
//! - Every `ImportError` aborts the whole batch; callers roll back.

use crate::import::diff::DiffError;
use crate::model::entity::EntityKind;
use crate::model::import_id::ImportId;
use crate::model::record::OrganisationId;
use crate::model::taxonomy::MetadataViolations;
use crate::repo::store::RepoError;
use crate::service::audit::AuditError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural, referential or taxonomy violation in batch content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Batch JSON does not decode into the typed batch shape.
    InvalidBatch(String),
    CorpusNotFound(String),
    DuplicateImportId {
        kind: EntityKind,
        import_id: ImportId,
    },
    /// A referenced entity exists neither in the store nor earlier in the batch.
    MissingReference {
        kind: EntityKind,
        import_id: ImportId,
        field: &'static str,
        reference: String,
    },
    /// Enum-like field outside its closed set.
    InvalidValue {
        kind: EntityKind,
        import_id: ImportId,
        field: &'static str,
        value: String,
        allowed: Vec<String>,
    },
    InvalidMetadata {
        kind: EntityKind,
        import_id: ImportId,
        violations: MetadataViolations,
    },
    /// Entity (or the family it hangs off) belongs to another corpus.
    CorpusMismatch {
        kind: EntityKind,
        import_id: ImportId,
        expected: String,
        actual: String,
    },
    /// Existing collection is owned by another organisation.
    OrganisationMismatch {
        import_id: ImportId,
        expected: OrganisationId,
        actual: OrganisationId,
    },
    /// Event document belongs to a different family than the event.
    DocumentFamilyMismatch {
        import_id: ImportId,
        document: ImportId,
        family: ImportId,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBatch(message) => write!(f, "invalid batch: {message}"),
            Self::CorpusNotFound(corpus) => write!(f, "corpus not found: {corpus}"),
            Self::DuplicateImportId { kind, import_id } => {
                write!(f, "duplicate {kind} import id in batch: {import_id}")
            }
            Self::MissingReference {
                kind,
                import_id,
                field,
                reference,
            } => write!(
                f,
                "{kind} {import_id}: `{field}` references unknown `{reference}`"
            ),
            Self::InvalidValue {
                kind,
                import_id,
                field,
                value,
                allowed,
            } => write!(
                f,
                "{kind} {import_id}: `{field}` value `{value}` is not one of [{}]",
                allowed.join(", ")
            ),
            Self::InvalidMetadata {
                kind,
                import_id,
                violations,
            } => write!(f, "{kind} {import_id}: metadata {violations}"),
            Self::CorpusMismatch {
                kind,
                import_id,
                expected,
                actual,
            } => write!(
                f,
                "{kind} {import_id} belongs to corpus `{actual}`, not `{expected}`"
            ),
            Self::OrganisationMismatch {
                import_id,
                expected,
                actual,
            } => write!(
                f,
                "collection {import_id} belongs to organisation {actual}, not {expected}"
            ),
            Self::DocumentFamilyMismatch {
                import_id,
                document,
                family,
            } => write!(
                f,
                "event {import_id}: document {document} does not belong to family {family}"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Failure of one import pipeline run.
#[derive(Debug)]
pub enum ImportError {
    Validation(ValidationError),
    Repo(RepoError),
    /// No unique slug found within the attempt budget.
    SlugExhausted { title: String, attempts: u32 },
    /// Incoming or persisted state could not be compared.
    Comparison(DiffError),
    Audit(AuditError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Repo(err) => write!(f, "repository failed: {err}"),
            Self::SlugExhausted { title, attempts } => write!(
                f,
                "no unique slug for title `{title}` after {attempts} attempts"
            ),
            Self::Comparison(err) => write!(f, "change detection failed: {err}"),
            Self::Audit(err) => write!(f, "audit failed: {err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::SlugExhausted { .. } => None,
            Self::Comparison(err) => Some(err),
            Self::Audit(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ImportError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DiffError> for ImportError {
    fn from(value: DiffError) -> Self {
        Self::Comparison(value)
    }
}

impl From<AuditError> for ImportError {
    fn from(value: AuditError) -> Self {
        Self::Audit(value)
    }
}

impl ImportError {
    /// Short stable code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Repo(_) => "repository_failed",
            Self::SlugExhausted { .. } => "slug_exhausted",
            Self::Comparison(_) => "comparison_failed",
            Self::Audit(_) => "audit_failed",
        }
    }
}
