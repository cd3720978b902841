mod activity;
mod contact;
mod custom_field;
mod deal;
mod task;

pub use activity::*;
pub use contact::*;
pub use custom_field::*;
pub use deal::*;
pub use task::*;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Integer primary key. Unique within one collection and never changed
/// after creation.
pub type Id = i64;

/// Values for user-defined fields, keyed by the definition's id.
pub type CustomValues = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Contact,
    Deal,
    Task,
    Activity,
    CustomField,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Contact,
        Self::Deal,
        Self::Task,
        Self::Activity,
        Self::CustomField,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Deal => "deal",
            Self::Task => "task",
            Self::Activity => "activity",
            Self::CustomField => "custom_field",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "contact" => Some(Self::Contact),
            "deal" => Some(Self::Deal),
            "task" => Some(Self::Task),
            "activity" => Some(Self::Activity),
            "custom_field" => Some(Self::CustomField),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input checks run before anything reaches a store.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// One persisted entity type and the inputs that create and patch it.
pub trait Record:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Create: Validate + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Update: Validate + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    const KIND: EntityKind;

    fn id(&self) -> Id;

    /// Timestamp the backend orders by, newest first.
    fn recency(&self) -> DateTime<Utc>;

    /// Materialize a freshly created record. `now` is the server-controlled
    /// creation time.
    fn build(id: Id, input: Self::Create, now: DateTime<Utc>) -> Self;

    /// Merge only the fields present in `update`.
    fn apply(&mut self, update: Self::Update);

    /// Rules on the whole record that a patch alone cannot decide. Stores
    /// run this on the merged record before writing it back.
    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Newest first, ties broken by the higher id.
pub fn backend_order<R: Record>(records: &mut [R]) {
    records.sort_by(|a, b| {
        b.recency()
            .cmp(&a.recency())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

/// Deserialize a field that distinguishes "absent" (`None`) from an
/// explicit `null` (`Some(None)`). Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Blank strings count as "not provided".
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Trim, drop empties, drop duplicates keeping the first occurrence.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// `something@something.something` with no whitespace.
pub fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// List fields are stored comma-joined by the record backend, so no item
/// may contain a comma.
pub(crate) fn check_list_items(errors: &mut ValidationError, field: &str, items: &[String]) {
    if items.iter().any(|item| item.contains(',')) {
        errors.push(field, format!("{} cannot contain commas", capitalize(field)));
    }
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn require_text(errors: &mut ValidationError, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(field, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_deduplicated_in_first_seen_order() {
        let tags = normalize_tags(["vip", " lead ", "", "vip", "partner"]);
        assert_eq!(tags, vec!["vip", "lead", "partner"]);
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("ada@example.com"));
        assert!(!looks_like_email("ada@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada lovelace@example.com"));
        assert!(!looks_like_email("ada.example.com"));
    }

    #[test]
    fn entity_kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_str("lead"), None);
    }
}
