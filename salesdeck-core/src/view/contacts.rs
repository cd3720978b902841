use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{compare_present_first, compare_text, RecordFilter, Searchable, SortKey};
use crate::models::Contact;

impl Searchable for Contact {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.email.as_str()];
        if let Some(company) = &self.company {
            fields.push(company);
        }
        fields
    }
}

/// Tag membership, or everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactFilter {
    #[default]
    All,
    Tag(String),
}

impl ContactFilter {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Tag(tag) => tag,
        }
    }

    /// `"all"` is the identity filter; any other name is a tag.
    pub fn from_str(s: &str) -> Self {
        match s.trim() {
            "" | "all" => Self::All,
            tag => Self::Tag(tag.to_string()),
        }
    }
}

impl RecordFilter<Contact> for ContactFilter {
    fn matches(&self, contact: &Contact, _now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Tag(tag) => contact.has_tag(tag),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactSort {
    #[default]
    Name,
    Company,
    /// Newest first.
    Recent,
    /// Most recently contacted first, never-contacted last.
    LastContacted,
}

impl ContactSort {
    pub const ALL: [ContactSort; 4] = [
        Self::Name,
        Self::Company,
        Self::Recent,
        Self::LastContacted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Company => "company",
            Self::Recent => "recent",
            Self::LastContacted => "lastContacted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl SortKey<Contact> for ContactSort {
    fn compare(&self, a: &Contact, b: &Contact) -> Ordering {
        match self {
            Self::Name => compare_text(&a.name, &b.name),
            Self::Company => {
                compare_present_first(a.company.as_deref(), b.company.as_deref(), compare_text)
            }
            Self::Recent => b.created_at.cmp(&a.created_at),
            Self::LastContacted => {
                compare_present_first(a.last_contacted_at, b.last_contacted_at, |a, b| b.cmp(&a))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{derive, ViewState};
    use chrono::TimeZone;

    fn contact(id: i64, name: &str, company: Option<&str>, tags: &[&str]) -> Contact {
        Contact {
            id,
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            company: company.map(Into::into),
            position: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            last_contacted_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, id as u32, 0, 0, 0).unwrap(),
            custom_fields: Default::default(),
        }
    }

    #[test]
    fn search_matches_name_email_and_company() {
        let contacts = vec![
            contact(1, "Alice", Some("Acme"), &[]),
            contact(2, "Bob", Some("Zeta"), &[]),
        ];
        let state = ViewState::new("ZET", ContactFilter::All, ContactSort::Name);
        let ids: Vec<i64> = derive(&contacts, &state, Utc::now())
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![2]);

        let state = ViewState::new("alice@", ContactFilter::All, ContactSort::Name);
        assert_eq!(derive(&contacts, &state, Utc::now()).len(), 1);
    }

    #[test]
    fn tag_filter_keeps_members_only() {
        let contacts = vec![
            contact(1, "Alice", None, &["vip"]),
            contact(2, "Bob", None, &["lead"]),
        ];
        let state = ViewState::new("", ContactFilter::from_str("vip"), ContactSort::Name);
        let out = derive(&contacts, &state, Utc::now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Alice");
    }

    #[test]
    fn company_sort_puts_companyless_contacts_last() {
        let contacts = vec![
            contact(1, "Cara", None, &[]),
            contact(2, "Bob", Some("Zeta"), &[]),
            contact(3, "Alice", Some("Acme"), &[]),
        ];
        let state = ViewState::new("", ContactFilter::All, ContactSort::Company);
        let names: Vec<String> = derive(&contacts, &state, Utc::now())
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Cara"]);
    }

    #[test]
    fn sort_names_round_trip() {
        for key in ContactSort::ALL {
            assert_eq!(ContactSort::from_str(key.as_str()), Some(key));
        }
        assert_eq!(ContactFilter::from_str("all"), ContactFilter::All);
    }
}
