//! Collection views: search, filter and sort over an in-memory snapshot.
//!
//! Every derivation is a pure function of the source slice, a [`ViewState`]
//! and the current time. Nothing is cached between calls. Sorting is stable,
//! so records with equal keys keep their source order, and records missing
//! the sort field always land after the ones that have it.

mod activities;
mod contacts;
mod tasks;

pub use activities::{ActivityFilter, ActivitySort};
pub use contacts::{ContactFilter, ContactSort};
pub use tasks::{TaskFilter, TaskSort};
pub(crate) use tasks::{is_due_today, is_overdue};

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Text fields a free-text query is matched against.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;
}

/// A named, closed-set filter predicate.
pub trait RecordFilter<R> {
    fn matches(&self, record: &R, now: DateTime<Utc>) -> bool;
}

/// A named, closed-set ordering.
pub trait SortKey<R> {
    fn compare(&self, a: &R, b: &R) -> Ordering;
}

/// What the user has chosen for one list: query, filter and sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState<F, S> {
    #[serde(default)]
    pub query: String,
    pub filter: F,
    pub sort: S,
}

impl<F, S> ViewState<F, S> {
    pub fn new(query: impl Into<String>, filter: F, sort: S) -> Self {
        Self {
            query: query.into(),
            filter,
            sort,
        }
    }
}

/// Search, then filter, then sort.
pub fn derive<R, F, S>(records: &[R], state: &ViewState<F, S>, now: DateTime<Utc>) -> Vec<R>
where
    R: Searchable + Clone,
    F: RecordFilter<R>,
    S: SortKey<R>,
{
    let mut out: Vec<R> = search(records, &state.query)
        .into_iter()
        .filter(|r| state.filter.matches(r, now))
        .collect();
    sort(&mut out, &state.sort);
    out
}

/// Case-insensitive substring match on any search field. An empty (or
/// all-whitespace) query keeps everything in source order.
pub fn search<R: Searchable + Clone>(records: &[R], query: &str) -> Vec<R> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| {
            r.search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Stable in-place sort.
pub fn sort<R, S: SortKey<R>>(records: &mut [R], key: &S) {
    records.sort_by(|a, b| key.compare(a, b));
}

/// Alphabetical, ignoring case first so "alice" and "Bob" interleave
/// the way a reader expects.
pub(crate) fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Present values first (in the requested direction), absent values last.
pub(crate) fn compare_present_first<T, F>(a: Option<T>, b: Option<T>, cmp: F) -> Ordering
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub(crate) fn day_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_sort_last_in_both_directions() {
        assert_eq!(
            compare_present_first(Some(1), None, |a: i32, b| a.cmp(&b)),
            Ordering::Less
        );
        assert_eq!(
            compare_present_first(None, Some(1), |a: i32, b| b.cmp(&a)),
            Ordering::Greater
        );
        assert_eq!(
            compare_present_first::<i32, _>(None, None, |a, b| a.cmp(&b)),
            Ordering::Equal
        );
    }

    #[test]
    fn text_comparison_ignores_case_first() {
        assert_eq!(compare_text("alice", "Bob"), Ordering::Less);
        assert_eq!(compare_text("Bob", "bob"), Ordering::Less);
    }
}
