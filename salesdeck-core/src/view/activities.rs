use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{day_of, RecordFilter, Searchable, SortKey};
use crate::models::{Activity, ActivityType};

impl Searchable for Activity {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.description.as_str(), self.kind.as_str()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityFilter {
    #[default]
    All,
    Today,
    Yesterday,
    /// Within the last seven days, counted back from now.
    Last7Days,
    Type(ActivityType),
}

impl ActivityFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7Days => "last7days",
            Self::Type(kind) => kind.as_str(),
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "today" => Some(Self::Today),
            "yesterday" => Some(Self::Yesterday),
            "last7days" => Some(Self::Last7Days),
            other => ActivityType::from_str(other).map(Self::Type),
        }
    }
}

impl RecordFilter<Activity> for ActivityFilter {
    fn matches(&self, activity: &Activity, now: DateTime<Utc>) -> bool {
        let day = day_of(activity.timestamp);
        let today = day_of(now);
        match self {
            Self::All => true,
            Self::Today => day == today,
            Self::Yesterday => today.pred_opt() == Some(day),
            Self::Last7Days => activity.timestamp >= now - Duration::days(7),
            Self::Type(kind) => activity.kind == *kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivitySort {
    #[default]
    Newest,
    Oldest,
    Type,
}

impl ActivitySort {
    pub const ALL: [ActivitySort; 3] = [Self::Newest, Self::Oldest, Self::Type];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Type => "type",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl SortKey<Activity> for ActivitySort {
    fn compare(&self, a: &Activity, b: &Activity) -> Ordering {
        match self {
            Self::Newest => b.timestamp.cmp(&a.timestamp),
            Self::Oldest => a.timestamp.cmp(&b.timestamp),
            Self::Type => a.kind.as_str().cmp(b.kind.as_str()),
        }
    }
}
