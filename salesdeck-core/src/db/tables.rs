use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;

use crate::error::Result;
use crate::models::*;

/// Row mapping for one record type. Column `id` is implicit and always
/// selected first; `COLUMNS` lists the remaining columns in write order.
pub trait Table: Record {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const ORDER_BY: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Values for `COLUMNS`, in the same order.
    fn values(&self) -> Result<Vec<Value>>;
}

fn timestamp(dt: &DateTime<Utc>) -> Value {
    Value::Text(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn opt_timestamp(dt: &Option<DateTime<Utc>>) -> Value {
    dt.as_ref().map(timestamp).unwrap_or(Value::Null)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: &Option<String>) -> Value {
    s.as_deref().map(text).unwrap_or(Value::Null)
}

fn opt_id(id: Option<Id>) -> Value {
    id.map(Value::Integer).unwrap_or(Value::Null)
}

fn json<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

fn conversion_error(
    column: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    tracing::warn!("Unreadable value in column {}: {}", column, err);
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err))
}

fn invalid_enum(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        format!("invalid {} value: {}", column, value).into(),
    )
}

fn get_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn get_opt_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| conversion_error(column, e))
    })
    .transpose()
}

fn get_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(column, e))
}

impl Table for Contact {
    const TABLE: &'static str = "contacts";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "email",
        "phone",
        "company",
        "position",
        "tags",
        "last_contacted_at",
        "custom_fields",
        "created_at",
    ];
    const ORDER_BY: &'static str = "created_at DESC, id DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            company: row.get("company")?,
            position: row.get("position")?,
            tags: get_json(row, "tags")?,
            last_contacted_at: get_opt_timestamp(row, "last_contacted_at")?,
            custom_fields: get_json(row, "custom_fields")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }

    fn values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.name),
            text(&self.email),
            opt_text(&self.phone),
            opt_text(&self.company),
            opt_text(&self.position),
            json(&self.tags)?,
            opt_timestamp(&self.last_contacted_at),
            json(&self.custom_fields)?,
            timestamp(&self.created_at),
        ])
    }
}

impl Table for Deal {
    const TABLE: &'static str = "deals";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "value",
        "stage",
        "probability",
        "contact_id",
        "expected_close_date",
        "custom_fields",
        "created_at",
    ];
    const ORDER_BY: &'static str = "created_at DESC, id DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let stage: String = row.get("stage")?;
        let close: Option<String> = row.get("expected_close_date")?;
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            value: row.get("value")?,
            stage: Stage::from_str(&stage).ok_or_else(|| invalid_enum("stage", &stage))?,
            probability: row.get("probability")?,
            contact_id: row.get("contact_id")?,
            expected_close_date: close
                .map(|d| {
                    NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                        .map_err(|e| conversion_error("expected_close_date", e))
                })
                .transpose()?,
            custom_fields: get_json(row, "custom_fields")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }

    fn values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.title),
            Value::Real(self.value),
            text(self.stage.as_str()),
            Value::Integer(i64::from(self.probability)),
            Value::Integer(self.contact_id),
            self.expected_close_date
                .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
            json(&self.custom_fields)?,
            timestamp(&self.created_at),
        ])
    }
}

impl Table for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "due_date",
        "status",
        "priority",
        "contact_id",
        "deal_id",
        "created_at",
    ];
    const ORDER_BY: &'static str = "created_at DESC, id DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get("status")?;
        let priority: String = row.get("priority")?;
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            due_date: get_opt_timestamp(row, "due_date")?,
            status: TaskStatus::from_str(&status).ok_or_else(|| invalid_enum("status", &status))?,
            priority: Priority::from_str(&priority)
                .ok_or_else(|| invalid_enum("priority", &priority))?,
            contact_id: row.get("contact_id")?,
            deal_id: row.get("deal_id")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }

    fn values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.title),
            opt_text(&self.description),
            opt_timestamp(&self.due_date),
            text(self.status.as_str()),
            text(self.priority.as_str()),
            opt_id(self.contact_id),
            opt_id(self.deal_id),
            timestamp(&self.created_at),
        ])
    }
}

impl Table for Activity {
    const TABLE: &'static str = "activities";
    const COLUMNS: &'static [&'static str] =
        &["type", "description", "timestamp", "contact_id", "deal_id"];
    const ORDER_BY: &'static str = "timestamp DESC, id DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get("type")?;
        Ok(Self {
            id: row.get("id")?,
            kind: ActivityType::from_str(&kind).ok_or_else(|| invalid_enum("type", &kind))?,
            description: row.get("description")?,
            timestamp: get_timestamp(row, "timestamp")?,
            contact_id: row.get("contact_id")?,
            deal_id: row.get("deal_id")?,
        })
    }

    fn values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(self.kind.as_str()),
            text(&self.description),
            timestamp(&self.timestamp),
            opt_id(self.contact_id),
            opt_id(self.deal_id),
        ])
    }
}

impl Table for CustomFieldDefinition {
    const TABLE: &'static str = "custom_fields";
    const COLUMNS: &'static [&'static str] = &[
        "label",
        "type",
        "entity",
        "required",
        "placeholder",
        "options",
        "created_at",
    ];
    const ORDER_BY: &'static str = "created_at DESC, id DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let field_type: String = row.get("type")?;
        let entity: String = row.get("entity")?;
        Ok(Self {
            id: row.get("id")?,
            label: row.get("label")?,
            field_type: FieldType::from_str(&field_type)
                .ok_or_else(|| invalid_enum("type", &field_type))?,
            entity: FieldEntity::from_str(&entity).ok_or_else(|| invalid_enum("entity", &entity))?,
            required: row.get("required")?,
            placeholder: row.get("placeholder")?,
            options: get_json(row, "options")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }

    fn values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.label),
            text(self.field_type.as_str()),
            text(self.entity.as_str()),
            Value::Integer(i64::from(self.required)),
            opt_text(&self.placeholder),
            json(&self.options)?,
            timestamp(&self.created_at),
        ])
    }
}
