use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{require_text, CustomValues, EntityKind, Id, Record, Validate};
use crate::error::ValidationError;

pub const DEFAULT_PROBABILITY: u8 = 25;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Id,
    pub title: String,
    pub value: f64,
    pub stage: Stage,
    pub probability: u8,
    pub contact_id: Id,
    pub expected_close_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub custom_fields: CustomValues,
}

/// The six pipeline stages, in board order.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Self::Lead,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
        Self::ClosedWon,
        Self::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::ClosedWon => "closed-won",
            Self::ClosedLost => "closed-lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "lead" => Some(Self::Lead),
            "qualified" => Some(Self::Qualified),
            "proposal" => Some(Self::Proposal),
            "negotiation" => Some(Self::Negotiation),
            "closed-won" => Some(Self::ClosedWon),
            "closed-lost" => Some(Self::ClosedLost),
            _ => None,
        }
    }

    /// Column heading on the board.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Qualified => "Qualified",
            Self::Proposal => "Proposal",
            Self::Negotiation => "Negotiation",
            Self::ClosedWon => "Closed Won",
            Self::ClosedLost => "Closed Lost",
        }
    }

    /// Position on the board, 0-based.
    pub fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealInput {
    pub title: String,
    pub value: f64,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default = "default_probability")]
    pub probability: u8,
    pub contact_id: Option<Id>,
    #[serde(default)]
    pub expected_close_date: Option<NaiveDate>,
    #[serde(default)]
    pub custom_fields: CustomValues,
}

fn default_probability() -> u8 {
    DEFAULT_PROBABILITY
}

impl CreateDealInput {
    pub fn new(title: impl Into<String>, value: f64, contact_id: Id) -> Self {
        Self {
            title: title.into(),
            value,
            stage: Stage::default(),
            probability: DEFAULT_PROBABILITY,
            contact_id: Some(contact_id),
            expected_close_date: None,
            custom_fields: CustomValues::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<Id>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_close_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<CustomValues>,
}

impl UpdateDealInput {
    /// A patch that touches nothing but the stage.
    pub fn stage_only(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Default::default()
        }
    }
}

fn check_value(errors: &mut ValidationError, value: f64) {
    if !value.is_finite() || value < 0.0 {
        errors.push("value", "Deal value must be zero or greater");
    }
}

fn check_probability(errors: &mut ValidationError, probability: u8) {
    if probability > 100 {
        errors.push("probability", "Probability must be between 0 and 100");
    }
}

impl Validate for CreateDealInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require_text(&mut errors, "title", &self.title, "Deal title is required");
        check_value(&mut errors, self.value);
        check_probability(&mut errors, self.probability);
        if self.contact_id.is_none() {
            errors.push("contactId", "Contact is required");
        }
        errors.into_result()
    }
}

impl Validate for UpdateDealInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if let Some(title) = &self.title {
            require_text(&mut errors, "title", title, "Deal title is required");
        }
        if let Some(value) = self.value {
            check_value(&mut errors, value);
        }
        if let Some(probability) = self.probability {
            check_probability(&mut errors, probability);
        }
        errors.into_result()
    }
}

impl Record for Deal {
    type Create = CreateDealInput;
    type Update = UpdateDealInput;

    const KIND: EntityKind = EntityKind::Deal;

    fn id(&self) -> Id {
        self.id
    }

    fn recency(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Callers validate first; a missing contact id falls back to 0.
    fn build(id: Id, input: CreateDealInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title.trim().to_string(),
            value: input.value,
            stage: input.stage,
            probability: input.probability,
            contact_id: input.contact_id.unwrap_or_default(),
            expected_close_date: input.expected_close_date,
            created_at: now,
            custom_fields: input.custom_fields,
        }
    }

    fn apply(&mut self, update: UpdateDealInput) {
        if let Some(title) = update.title {
            self.title = title.trim().to_string();
        }
        if let Some(value) = update.value {
            self.value = value;
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        if let Some(probability) = update.probability {
            self.probability = probability;
        }
        if let Some(contact_id) = update.contact_id {
            self.contact_id = contact_id;
        }
        if let Some(date) = update.expected_close_date {
            self.expected_close_date = date;
        }
        if let Some(fields) = update.custom_fields {
            self.custom_fields = fields;
        }
    }
}
