//! Backend field names.
//!
//! The record-store backend names some attributes generically (`Id`,
//! `Name`, `CreatedOn`, `Tags`) and encodes others differently from the
//! domain model (comma-joined tag lists, date-only timestamps, string
//! booleans). Each entity gets one declarative [`FieldMap`]; everything
//! outside this module sees only domain names.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use salesdeck_core::models::EntityKind;
use salesdeck_core::{CrmError, Result, ValidationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Plain,
    /// `["a", "b"]` <-> `"a,b"`.
    CommaList,
    /// RFC 3339 out; RFC 3339, `YYYY-MM-DD HH:MM:SS` or bare dates in
    /// (bare dates mean midnight UTC).
    Timestamp,
    /// `YYYY-MM-DD` out; full timestamps in are cut to their date.
    Date,
    /// Booleans, also accepting `"true"`/`"1"`/`"yes"` and numbers.
    Bool,
    /// Lower-case identifier derived from a label. Write-only.
    Slug,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub domain: &'static str,
    pub wire: &'static str,
    pub codec: Codec,
}

const fn rule(domain: &'static str, wire: &'static str, codec: Codec) -> FieldRule {
    FieldRule {
        domain,
        wire,
        codec,
    }
}

/// Translation table for one entity. A domain key may appear in several
/// rules: every rule is written, and on read the first wire key present
/// wins.
#[derive(Debug)]
pub struct FieldMap {
    pub kind: EntityKind,
    pub rules: &'static [FieldRule],
}

use Codec::*;

static CONTACT: FieldMap = FieldMap {
    kind: EntityKind::Contact,
    rules: &[
        rule("id", "Id", Plain),
        rule("name", "Name", Plain),
        rule("email", "email", Plain),
        rule("phone", "phone", Plain),
        rule("company", "company", Plain),
        rule("position", "position", Plain),
        rule("tags", "Tags", CommaList),
        rule("lastContactedAt", "lastContactedAt", Timestamp),
        rule("createdAt", "CreatedOn", Timestamp),
        rule("customFields", "customFields", Plain),
    ],
};

static DEAL: FieldMap = FieldMap {
    kind: EntityKind::Deal,
    rules: &[
        rule("id", "Id", Plain),
        rule("title", "title", Plain),
        rule("title", "Name", Plain),
        rule("value", "value", Plain),
        rule("stage", "stage", Plain),
        rule("probability", "probability", Plain),
        rule("contactId", "contactId", Plain),
        rule("expectedCloseDate", "expectedCloseDate", Date),
        rule("createdAt", "CreatedOn", Timestamp),
        rule("customFields", "customFields", Plain),
    ],
};

static TASK: FieldMap = FieldMap {
    kind: EntityKind::Task,
    rules: &[
        rule("id", "Id", Plain),
        rule("title", "title", Plain),
        rule("title", "Name", Plain),
        rule("description", "description", Plain),
        rule("dueDate", "dueDate", Timestamp),
        rule("status", "status", Plain),
        rule("priority", "priority", Plain),
        rule("contactId", "contactId", Plain),
        rule("dealId", "dealId", Plain),
        rule("createdAt", "CreatedOn", Timestamp),
    ],
};

static ACTIVITY: FieldMap = FieldMap {
    kind: EntityKind::Activity,
    rules: &[
        rule("id", "Id", Plain),
        rule("type", "type", Plain),
        rule("description", "description", Plain),
        rule("description", "Name", Plain),
        rule("timestamp", "timestamp", Timestamp),
        rule("contactId", "contactId", Plain),
        rule("dealId", "dealId", Plain),
    ],
};

static CUSTOM_FIELD: FieldMap = FieldMap {
    kind: EntityKind::CustomField,
    rules: &[
        rule("id", "Id", Plain),
        rule("label", "label", Plain),
        rule("label", "Name", Slug),
        rule("type", "type", Plain),
        rule("entity", "entity", Plain),
        rule("required", "required", Bool),
        rule("placeholder", "placeholder", Plain),
        rule("options", "options", CommaList),
        rule("createdAt", "CreatedOn", Timestamp),
    ],
};

pub fn field_map(kind: EntityKind) -> &'static FieldMap {
    match kind {
        EntityKind::Contact => &CONTACT,
        EntityKind::Deal => &DEAL,
        EntityKind::Task => &TASK,
        EntityKind::Activity => &ACTIVITY,
        EntityKind::CustomField => &CUSTOM_FIELD,
    }
}

impl FieldMap {
    /// Domain object to backend object. Keys absent from the input stay
    /// absent, so a partial update stays partial; explicit nulls survive.
    pub fn to_wire(&self, domain: &Value) -> Result<Value> {
        let object = as_object(self.kind, domain)?;
        let mut out = Map::new();
        for rule in self.rules {
            if let Some(value) = object.get(rule.domain) {
                out.insert(rule.wire.to_string(), encode(rule.codec, value));
            }
        }
        Ok(Value::Object(out))
    }

    /// Backend object to domain object. Unmapped backend keys are dropped.
    pub fn from_wire(&self, wire: &Value) -> Result<Value> {
        let object = as_object(self.kind, wire)?;
        let mut out = Map::new();
        for rule in self.rules {
            if out.contains_key(rule.domain) {
                continue;
            }
            if let Some(value) = object.get(rule.wire) {
                out.insert(rule.domain.to_string(), decode(rule.codec, value));
            }
        }
        Ok(Value::Object(out))
    }
}

fn as_object(kind: EntityKind, value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| CrmError::store(format!("{} payload is not a JSON object", kind)))
}

/// Serialize a record or input and translate it for the backend.
pub fn encode_for<T: Serialize>(kind: EntityKind, value: &T) -> Result<Value> {
    field_map(kind).to_wire(&serde_json::to_value(value)?)
}

/// Translate a stored backend record into its domain type. A record that
/// does not fit is a store fault.
pub fn decode_record<T: DeserializeOwned>(kind: EntityKind, wire: &Value) -> Result<T> {
    let domain = field_map(kind).from_wire(wire)?;
    Ok(serde_json::from_value(domain)?)
}

/// Translate a client-supplied create or update body. A body that does not
/// fit is the caller's fault.
pub fn decode_input<T: DeserializeOwned>(kind: EntityKind, wire: &Value) -> Result<T> {
    let domain = field_map(kind)
        .from_wire(wire)
        .map_err(|e| ValidationError::single("body", e.to_string()))?;
    serde_json::from_value(domain)
        .map_err(|e| ValidationError::single("body", e.to_string()).into())
}

fn encode(codec: Codec, value: &Value) -> Value {
    match (codec, value) {
        (CommaList, Value::Array(items)) => Value::String(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        (Slug, Value::String(label)) => Value::String(slug(label)),
        _ => value.clone(),
    }
}

fn decode(codec: Codec, value: &Value) -> Value {
    match (codec, value) {
        (CommaList, Value::String(joined)) => Value::Array(
            joined
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        (CommaList, Value::Null) => Value::Array(Vec::new()),
        (Timestamp, Value::String(raw)) => lenient_timestamp(raw)
            .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true)))
            .unwrap_or_else(|| value.clone()),
        (Date, Value::String(raw)) => lenient_timestamp(raw)
            .map(|ts| Value::String(ts.date_naive().to_string()))
            .unwrap_or_else(|| value.clone()),
        (Bool, Value::String(raw)) => Value::Bool(matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )),
        (Bool, Value::Number(n)) => Value::Bool(n.as_f64().is_some_and(|n| n != 0.0)),
        (Bool, Value::Null) => Value::Bool(false),
        _ => value.clone(),
    }
}

fn lenient_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn slug(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
