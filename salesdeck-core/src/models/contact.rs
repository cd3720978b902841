use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    check_list_items, looks_like_email, non_blank, normalize_tags, require_text, CustomValues, EntityKind, Id,
    Record, Validate,
};
use crate::error::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub custom_fields: CustomValues,
}

impl Contact {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub last_contacted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_fields: CustomValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub company: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_contacted_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<CustomValues>,
}

fn check_email(errors: &mut ValidationError, email: &str) {
    if email.trim().is_empty() {
        errors.push("email", "Email is required");
    } else if !looks_like_email(email.trim()) {
        errors.push("email", "Email is invalid");
    }
}

impl Validate for CreateContactInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require_text(&mut errors, "name", &self.name, "Name is required");
        check_email(&mut errors, &self.email);
        check_list_items(&mut errors, "tags", &self.tags);
        errors.into_result()
    }
}

impl Validate for UpdateContactInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if let Some(name) = &self.name {
            require_text(&mut errors, "name", name, "Name is required");
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, email);
        }
        if let Some(tags) = &self.tags {
            check_list_items(&mut errors, "tags", tags);
        }
        errors.into_result()
    }
}

impl Record for Contact {
    type Create = CreateContactInput;
    type Update = UpdateContactInput;

    const KIND: EntityKind = EntityKind::Contact;

    fn id(&self) -> Id {
        self.id
    }

    fn recency(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn build(id: Id, input: CreateContactInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            phone: non_blank(input.phone),
            company: non_blank(input.company),
            position: non_blank(input.position),
            tags: normalize_tags(&input.tags),
            last_contacted_at: input.last_contacted_at,
            created_at: now,
            custom_fields: input.custom_fields,
        }
    }

    fn apply(&mut self, update: UpdateContactInput) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            self.email = email.trim().to_string();
        }
        if let Some(phone) = update.phone {
            self.phone = non_blank(phone);
        }
        if let Some(company) = update.company {
            self.company = non_blank(company);
        }
        if let Some(position) = update.position {
            self.position = non_blank(position);
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(&tags);
        }
        if let Some(last) = update.last_contacted_at {
            self.last_contacted_at = last;
        }
        if let Some(fields) = update.custom_fields {
            self.custom_fields = fields;
        }
    }
}
