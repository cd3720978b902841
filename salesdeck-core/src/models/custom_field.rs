use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    check_list_items, non_blank, require_text, CustomValues, EntityKind, Id, Record, Validate,
};
use crate::error::ValidationError;

/// User-defined schema extension for contact and deal forms. Values live
/// in the target record's `customFields` map under [`CustomFieldDefinition::key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDefinition {
    pub id: Id,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub entity: FieldEntity,
    pub required: bool,
    pub placeholder: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Select,
    Checkbox,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "select" => Some(Self::Select),
            "checkbox" => Some(Self::Checkbox),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// Which record type a definition augments.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldEntity {
    #[default]
    Contact,
    Deal,
}

impl FieldEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Deal => "deal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "contact" => Some(Self::Contact),
            "deal" => Some(Self::Deal),
            _ => None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Contact => EntityKind::Contact,
            Self::Deal => EntityKind::Deal,
        }
    }
}

impl CustomFieldDefinition {
    /// Key under which values for this definition are stored.
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    /// Check one value. `None` and `null` both mean "not filled in".
    pub fn check_value(&self, value: Option<&Value>) -> Result<(), String> {
        let value = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        };
        let Some(value) = value else {
            // An unchecked checkbox is a valid answer.
            if self.required && self.field_type != FieldType::Checkbox {
                return Err(format!("{} is required", self.label));
            }
            return Ok(());
        };

        match self.field_type {
            FieldType::Text => match value {
                Value::String(_) => Ok(()),
                _ => Err(format!("{} must be text", self.label)),
            },
            FieldType::Number => {
                let numeric = match value {
                    Value::Number(_) => true,
                    Value::String(s) => s.trim().parse::<f64>().is_ok(),
                    _ => false,
                };
                if numeric {
                    Ok(())
                } else {
                    Err(format!("{} must be a number", self.label))
                }
            }
            FieldType::Checkbox => match value {
                Value::Bool(_) => Ok(()),
                _ => Err(format!("{} must be true or false", self.label)),
            },
            FieldType::Date => match value {
                Value::String(s) if parse_field_date(s).is_some() => Ok(()),
                _ => Err(format!("{} must be a date", self.label)),
            },
            FieldType::Select => match value {
                Value::String(s) if self.options.iter().any(|o| o == s) => Ok(()),
                _ => Err(format!(
                    "{} must be one of: {}",
                    self.label,
                    self.options.join(", ")
                )),
            },
        }
    }
}

fn parse_field_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
}

/// Check a record's custom values against the definitions for its entity.
/// Unknown keys are rejected so stale values don't accumulate silently.
pub fn validate_custom_values(
    definitions: &[CustomFieldDefinition],
    values: &CustomValues,
) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    for def in definitions {
        let key = def.key();
        if let Err(message) = def.check_value(values.get(&key)) {
            errors.push(format!("customFields.{}", key), message);
        }
    }
    for key in values.keys() {
        if !definitions.iter().any(|d| &d.key() == key) {
            errors.push(format!("customFields.{}", key), "Unknown custom field");
        }
    }
    errors.into_result()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomFieldInput {
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub entity: FieldEntity,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomFieldInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<FieldEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub placeholder: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

fn check_options(errors: &mut ValidationError, field_type: FieldType, options: &[String]) {
    check_list_items(errors, "options", options);
    let filled = options.iter().filter(|o| !o.trim().is_empty()).count();
    match field_type {
        FieldType::Select if filled == 0 => {
            errors.push("options", "Select fields need at least one option")
        }
        FieldType::Select => {}
        _ if !options.is_empty() => errors.push("options", "Only select fields take options"),
        _ => {}
    }
}

fn clean_options(options: Vec<String>) -> Vec<String> {
    options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

impl Validate for CreateCustomFieldInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require_text(&mut errors, "label", &self.label, "Field label is required");
        check_options(&mut errors, self.field_type, &self.options);
        errors.into_result()
    }
}

impl Validate for UpdateCustomFieldInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if let Some(label) = &self.label {
            require_text(&mut errors, "label", label, "Field label is required");
        }
        match (self.field_type, &self.options) {
            (Some(field_type), Some(options)) => check_options(&mut errors, field_type, options),
            (None, Some(options)) => check_list_items(&mut errors, "options", options),
            _ => {}
        }
        errors.into_result()
    }
}

impl Record for CustomFieldDefinition {
    type Create = CreateCustomFieldInput;
    type Update = UpdateCustomFieldInput;

    const KIND: EntityKind = EntityKind::CustomField;

    fn id(&self) -> Id {
        self.id
    }

    fn recency(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn build(id: Id, input: CreateCustomFieldInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            label: input.label.trim().to_string(),
            field_type: input.field_type,
            entity: input.entity,
            required: input.required,
            placeholder: non_blank(input.placeholder),
            options: clean_options(input.options),
            created_at: now,
        }
    }

    fn apply(&mut self, update: UpdateCustomFieldInput) {
        if let Some(label) = update.label {
            self.label = label.trim().to_string();
        }
        if let Some(field_type) = update.field_type {
            self.field_type = field_type;
        }
        if let Some(entity) = update.entity {
            self.entity = entity;
        }
        if let Some(required) = update.required {
            self.required = required;
        }
        if let Some(placeholder) = update.placeholder {
            self.placeholder = non_blank(placeholder);
        }
        if let Some(options) = update.options {
            self.options = clean_options(options);
        }
        if self.field_type != FieldType::Select {
            self.options.clear();
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        check_options(&mut errors, self.field_type, &self.options);
        errors.into_result()
    }
}
