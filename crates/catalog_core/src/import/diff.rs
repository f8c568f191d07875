//! Change detection between incoming and persisted entity state.
//!
//! # Responsibility
//! - Hold one comparison shape per entity, built field by field.
//! - Canonicalize order-insensitive fields by a per-field policy.
//! - Report before/after values for every changed field.
//!
//! # Invariants
//! - Both sides of a comparison are built from the same field set.
//! - An incoming `null` never counts as a change.
//! - A field that fails to serialize fails the comparison; it never reads as
//!   `null`.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How a field is canonicalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Compared exactly as serialized.
    Scalar,
    /// Array compared as a set of scalars.
    Set,
    /// Array of objects compared as a set, ordered by the named properties.
    SetBy(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    policy: FieldPolicy,
    value: Value,
}

/// A comparison field could not be turned into JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffError {
    pub field: &'static str,
    pub message: String,
}

impl Display for DiffError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot compare field `{}`: {}", self.field, self.message)
    }
}

impl Error for DiffError {}

/// Comparable projection of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonRecord {
    fields: BTreeMap<&'static str, Field>,
    /// First field that failed to serialize.
    failure: Option<DiffError>,
}

impl ComparisonRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar<T: Serialize + ?Sized>(self, name: &'static str, value: &T) -> Self {
        self.with(name, FieldPolicy::Scalar, value)
    }

    /// Absent values serialize to `null` and are skipped on the incoming side.
    pub fn optional<T: Serialize>(self, name: &'static str, value: Option<&T>) -> Self {
        self.with(name, FieldPolicy::Scalar, &value)
    }

    pub fn set<T: Serialize>(self, name: &'static str, values: &[T]) -> Self {
        self.with(name, FieldPolicy::Set, values)
    }

    /// Set field that may be absent; absent incoming sets are skipped.
    pub fn optional_set<T: Serialize>(self, name: &'static str, values: Option<&[T]>) -> Self {
        self.with(name, FieldPolicy::Set, &values)
    }

    pub fn set_by<T: Serialize>(
        self,
        name: &'static str,
        values: Option<&[T]>,
        key: &'static [&'static str],
    ) -> Self {
        self.with(name, FieldPolicy::SetBy(key), &values)
    }

    fn with<T: Serialize + ?Sized>(
        mut self,
        name: &'static str,
        policy: FieldPolicy,
        value: &T,
    ) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.fields.insert(
                    name,
                    Field {
                        policy,
                        value: canonicalize(value, policy),
                    },
                );
            }
            Err(err) => {
                self.failure.get_or_insert(DiffError {
                    field: name,
                    message: err.to_string(),
                });
            }
        }
        self
    }
}

/// One changed field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: &'static str,
    pub before: Value,
    pub after: Value,
}

/// Human-diffable list of changed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    pub changes: Vec<FieldChange>,
}

impl DiffReport {
    pub fn fields(&self) -> Vec<&'static str> {
        self.changes.iter().map(|change| change.field).collect()
    }
}

impl Display for DiffReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self
            .changes
            .iter()
            .map(|change| format!("{}: {} -> {}", change.field, change.before, change.after))
            .collect();
        f.write_str(&lines.join("; "))
    }
}

/// Compares `incoming` against `persisted`; `Ok(None)` means unchanged.
pub fn diff(
    incoming: &ComparisonRecord,
    persisted: &ComparisonRecord,
) -> Result<Option<DiffReport>, DiffError> {
    if let Some(failure) = incoming.failure.as_ref().or(persisted.failure.as_ref()) {
        return Err(failure.clone());
    }

    let mut report = DiffReport::default();
    for (name, field) in &incoming.fields {
        if field.value.is_null() {
            continue;
        }
        let before = persisted
            .fields
            .get(name)
            .map(|persisted| persisted.value.clone())
            .unwrap_or(Value::Null);
        if before != field.value {
            report.changes.push(FieldChange {
                field: name,
                before,
                after: field.value.clone(),
            });
        }
    }

    if report.changes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(report))
    }
}

fn canonicalize(value: Value, policy: FieldPolicy) -> Value {
    let Value::Array(mut items) = value else {
        return value;
    };
    match policy {
        FieldPolicy::Scalar => return Value::Array(items),
        FieldPolicy::Set => items.sort_by_key(|item| item.to_string()),
        FieldPolicy::SetBy(key) => items.sort_by_key(|item| {
            let mut parts: Vec<String> = key
                .iter()
                .map(|property| item.get(property).map(Value::to_string).unwrap_or_default())
                .collect();
            parts.push(item.to_string());
            parts
        }),
    }
    items.dedup();
    Value::Array(items)
}

#[cfg(test)]
mod tests {
    use super::{diff, ComparisonRecord};
    use serde::ser::Error as _;
    use serde::{Serialize, Serializer};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn identical_records_are_unchanged() {
        let left = ComparisonRecord::new()
            .scalar("title", "Act")
            .set("geographies", &[3, 1, 2]);
        let right = ComparisonRecord::new()
            .scalar("title", "Act")
            .set("geographies", &[1, 2, 3]);
        assert!(diff(&left, &right).unwrap().is_none());
    }

    #[test]
    fn changed_scalar_is_reported_with_before_and_after() {
        let incoming = ComparisonRecord::new()
            .scalar("title", "New")
            .scalar("summary", "same");
        let persisted = ComparisonRecord::new()
            .scalar("title", "Old")
            .scalar("summary", "same");
        let report = diff(&incoming, &persisted).unwrap().expect("title changed");
        assert_eq!(report.fields(), vec!["title"]);
        assert_eq!(report.changes[0].before, json!("Old"));
        assert_eq!(report.changes[0].after, json!("New"));
        assert_eq!(report.to_string(), "title: \"Old\" -> \"New\"");
    }

    #[test]
    fn null_incoming_optional_is_ignored() {
        let incoming = ComparisonRecord::new().optional::<String>("source_url", None);
        let persisted =
            ComparisonRecord::new().optional("source_url", Some(&"https://x".to_string()));
        assert!(diff(&incoming, &persisted).unwrap().is_none());
    }

    #[test]
    fn set_by_orders_objects_by_composite_key() {
        let first = [
            json!({"id": "b", "relation": "sector"}),
            json!({"id": "a", "relation": "sector"}),
            json!({"id": "z", "relation": "author"}),
        ];
        let second = [
            json!({"id": "z", "relation": "author"}),
            json!({"id": "a", "relation": "sector"}),
            json!({"id": "b", "relation": "sector"}),
        ];
        let left = ComparisonRecord::new().set_by("concepts", Some(&first[..]), &["relation", "id"]);
        let right =
            ComparisonRecord::new().set_by("concepts", Some(&second[..]), &["relation", "id"]);
        assert!(diff(&left, &right).unwrap().is_none());
    }

    #[test]
    fn scalar_lists_keep_their_order() {
        let left = ComparisonRecord::new().scalar("ordered", &["a", "b"]);
        let right = ComparisonRecord::new().scalar("ordered", &["b", "a"]);
        assert!(diff(&left, &right).unwrap().is_some());
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not representable"))
        }
    }

    #[test]
    fn serialization_failure_is_an_error_not_unchanged() {
        let incoming = ComparisonRecord::new()
            .scalar("title", "Act")
            .scalar("payload", &Unserializable);
        let persisted = ComparisonRecord::new().scalar("title", "Act");

        let err = diff(&incoming, &persisted).unwrap_err();
        assert_eq!(err.field, "payload");
        assert!(err.message.contains("not representable"));
    }

    #[test]
    fn composite_map_keys_fail_the_comparison() {
        let mut by_year = BTreeMap::new();
        by_year.insert((2008, 11), "Act");
        let incoming = ComparisonRecord::new().scalar("title", "Act");
        let persisted = ComparisonRecord::new().scalar("by_year", &by_year);

        assert_eq!(diff(&incoming, &persisted).unwrap_err().field, "by_year");
    }
}
