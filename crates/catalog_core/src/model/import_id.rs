//! External import identifier.
//!
//! # Responsibility
//! - Enforce the dotted `ORG.kind.sequence.version` grammar at decode time.
//! - Give every layer a typed id instead of a raw string.
//!
//! # Invariants
//! - An `ImportId` value always matches `IMPORT_ID_PATTERN`.
//! - Ids are immutable once minted; nothing in core rewrites them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Four dot-separated segments; only the second may contain hyphens.
pub const IMPORT_ID_PATTERN: &str = r"^\w+\.[\w\-]+\.\w+\.\w+$";

static IMPORT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(IMPORT_ID_PATTERN).expect("valid import id regex"));

/// Stable external identifier of a collection, family, document or event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImportId(String);

/// Raised when a candidate id does not match the import id grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidImportId(pub String);

impl Display for InvalidImportId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "import id `{}` does not match `{IMPORT_ID_PATTERN}`",
            self.0
        )
    }
}

impl Error for InvalidImportId {}

impl ImportId {
    /// Parses and validates one id.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidImportId> {
        let value = value.into();
        if IMPORT_ID_RE.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidImportId(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading organisation segment, e.g. `CCLW` in `CCLW.family.1.0`.
    pub fn organisation(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }
}

impl TryFrom<String> for ImportId {
    type Error = InvalidImportId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ImportId> for String {
    fn from(value: ImportId) -> Self {
        value.0
    }
}

impl Display for ImportId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImportId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::ImportId;

    #[test]
    fn accepts_four_segment_ids() {
        for value in [
            "CCLW.family.1234.0",
            "UNFCCC.document.i00000001.n0000",
            "CPR.collection-group.7.1",
        ] {
            assert!(ImportId::parse(value).is_ok(), "{value} should parse");
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        for value in [
            "",
            "CCLW.family.1",
            "CCLW.family.1.0.9",
            "CCLW family.1.0",
            "CCLW.fam ily.1.0",
            "CCLW.family.1-2.0",
        ] {
            assert!(ImportId::parse(value).is_err(), "{value} should fail");
        }
    }

    #[test]
    fn organisation_is_first_segment() {
        let id = ImportId::parse("CCLW.event.1.0").unwrap();
        assert_eq!(id.organisation(), "CCLW");
    }

    #[test]
    fn deserialize_enforces_grammar() {
        let ok: ImportId = serde_json::from_str("\"A.b.c.d\"").unwrap();
        assert_eq!(ok.as_str(), "A.b.c.d");
        assert!(serde_json::from_str::<ImportId>("\"nope\"").is_err());
    }
}
