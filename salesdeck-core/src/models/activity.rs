use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{require_text, EntityKind, Id, Record, Validate};
use crate::error::ValidationError;

/// Audit entry describing a change to another record. References are
/// plain lookup keys and may dangle after the referenced record is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Id,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub contact_id: Option<Id>,
    pub deal_id: Option<Id>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Email,
    Call,
    Meeting,
    Note,
    Task,
    Deal,
    Contact,
}

impl ActivityType {
    pub const ALL: [ActivityType; 7] = [
        Self::Email,
        Self::Call,
        Self::Meeting,
        Self::Note,
        Self::Task,
        Self::Deal,
        Self::Contact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Call => "call",
            Self::Meeting => "meeting",
            Self::Note => "note",
            Self::Task => "task",
            Self::Deal => "deal",
            Self::Contact => "contact",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "call" => Some(Self::Call),
            "meeting" => Some(Self::Meeting),
            "note" => Some(Self::Note),
            "task" => Some(Self::Task),
            "deal" => Some(Self::Deal),
            "contact" => Some(Self::Contact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityInput {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub description: String,
    /// Defaults to the creation time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contact_id: Option<Id>,
    #[serde(default)]
    pub deal_id: Option<Id>,
}

impl CreateActivityInput {
    pub fn new(kind: ActivityType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            timestamp: None,
            contact_id: None,
            deal_id: None,
        }
    }

    pub fn contact(mut self, contact_id: Option<Id>) -> Self {
        self.contact_id = contact_id;
        self
    }

    pub fn deal(mut self, deal_id: Option<Id>) -> Self {
        self.deal_id = deal_id;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityInput {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActivityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub contact_id: Option<Option<Id>>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub deal_id: Option<Option<Id>>,
}

impl Validate for CreateActivityInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require_text(
            &mut errors,
            "description",
            &self.description,
            "Description is required",
        );
        errors.into_result()
    }
}

impl Validate for UpdateActivityInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if let Some(description) = &self.description {
            require_text(&mut errors, "description", description, "Description is required");
        }
        errors.into_result()
    }
}

impl Record for Activity {
    type Create = CreateActivityInput;
    type Update = UpdateActivityInput;

    const KIND: EntityKind = EntityKind::Activity;

    fn id(&self) -> Id {
        self.id
    }

    fn recency(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn build(id: Id, input: CreateActivityInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: input.kind,
            description: input.description.trim().to_string(),
            timestamp: input.timestamp.unwrap_or(now),
            contact_id: input.contact_id,
            deal_id: input.deal_id,
        }
    }

    fn apply(&mut self, update: UpdateActivityInput) {
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(timestamp) = update.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(contact_id) = update.contact_id {
            self.contact_id = contact_id;
        }
        if let Some(deal_id) = update.deal_id {
            self.deal_id = deal_id;
        }
    }
}
