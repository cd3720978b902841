//! Dashboard aggregation.
//!
//! Everything here is recomputed from full snapshots on every load; nothing
//! is maintained incrementally. Calendar comparisons use UTC days of `now`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{backend_order, Activity, ActivityType, Contact, Deal, Stage, Task};
use crate::view::{is_due_today, is_overdue};

/// Size of every top-N slice on the dashboard.
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_contacts: usize,
    pub total_deals: usize,
    /// Sum over every deal regardless of stage.
    pub total_value: f64,
    pub won_deals: usize,
    /// Tasks that are not completed.
    pub active_tasks: usize,
    pub win_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_deals: Vec<Deal>,
    pub todays_tasks: Vec<Task>,
    pub recent_activities: Vec<Activity>,
}

/// Percentage of deals in `closed-won`, rounded to the nearest integer.
/// Zero when there are no deals.
pub fn win_rate(deals: &[Deal]) -> u32 {
    if deals.is_empty() {
        return 0;
    }
    let won = deals.iter().filter(|d| d.stage == Stage::ClosedWon).count();
    (won as f64 / deals.len() as f64 * 100.0).round() as u32
}

pub fn stats(contacts: &[Contact], deals: &[Deal], tasks: &[Task]) -> DashboardStats {
    DashboardStats {
        total_contacts: contacts.len(),
        total_deals: deals.len(),
        total_value: deals.iter().map(|d| d.value).sum(),
        won_deals: deals.iter().filter(|d| d.stage == Stage::ClosedWon).count(),
        active_tasks: tasks.iter().filter(|t| !t.is_completed()).count(),
        win_rate: win_rate(deals),
    }
}

pub fn summarize(
    contacts: &[Contact],
    deals: &[Deal],
    tasks: &[Task],
    activities: &[Activity],
    now: DateTime<Utc>,
) -> Dashboard {
    Dashboard {
        stats: stats(contacts, deals, tasks),
        recent_deals: recent_deals(deals, TOP_N),
        todays_tasks: todays_tasks(tasks, now, TOP_N),
        recent_activities: recent_activities(activities, TOP_N),
    }
}

/// Newest `limit` deals by creation time.
pub fn recent_deals(deals: &[Deal], limit: usize) -> Vec<Deal> {
    let mut out = deals.to_vec();
    backend_order(&mut out);
    out.truncate(limit);
    out
}

/// Tasks due on today's calendar day, earliest due time first.
pub fn todays_tasks(tasks: &[Task], now: DateTime<Utc>, limit: usize) -> Vec<Task> {
    let mut out: Vec<Task> = tasks.iter().filter(|t| is_due_today(t, now)).cloned().collect();
    out.sort_by_key(|t| t.due_date);
    out.truncate(limit);
    out
}

/// Newest `limit` activities by timestamp.
pub fn recent_activities(activities: &[Activity], limit: usize) -> Vec<Activity> {
    let mut out = activities.to_vec();
    backend_order(&mut out);
    out.truncate(limit);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityGroup {
    pub label: String,
    pub activities: Vec<Activity>,
}

/// "Today", "Yesterday", or e.g. "March 5, 2024".
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%B %-d, %Y").to_string()
    }
}

/// Bucket activities by calendar day. Groups appear in the order their
/// first member appears, and members keep their input order, so an
/// already-sorted input yields sorted groups.
pub fn group_by_day(activities: &[Activity], now: DateTime<Utc>) -> Vec<ActivityGroup> {
    let today = now.date_naive();
    let mut groups: Vec<(NaiveDate, ActivityGroup)> = Vec::new();
    for activity in activities {
        let day = activity.timestamp.date_naive();
        match groups.iter_mut().find(|(d, _)| *d == day) {
            Some((_, group)) => group.activities.push(activity.clone()),
            None => groups.push((
                day,
                ActivityGroup {
                    label: day_label(day, today),
                    activities: vec![activity.clone()],
                },
            )),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
    /// Due today and still open.
    pub due_today: usize,
}

pub fn task_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    TaskStats {
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.is_completed()).count(),
        overdue: tasks.iter().filter(|t| is_overdue(t, now)).count(),
        due_today: tasks
            .iter()
            .filter(|t| !t.is_completed() && is_due_today(t, now))
            .count(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total: usize,
    pub today: usize,
    pub last_7_days: usize,
    pub by_type: BTreeMap<ActivityType, usize>,
}

pub fn activity_stats(activities: &[Activity], now: DateTime<Utc>) -> ActivityStats {
    let today = now.date_naive();
    let week_ago = now - Duration::days(7);
    let mut by_type = BTreeMap::new();
    for activity in activities {
        *by_type.entry(activity.kind).or_insert(0) += 1;
    }
    ActivityStats {
        total: activities.len(),
        today: activities
            .iter()
            .filter(|a| a.timestamp.date_naive() == today)
            .count(),
        last_7_days: activities.iter().filter(|a| a.timestamp >= week_ago).count(),
        by_type,
    }
}

/// Distinct contact tags in first-seen order.
pub fn tag_catalogue(contacts: &[Contact]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in contacts.iter().flat_map(|c| c.tags.iter()) {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}
