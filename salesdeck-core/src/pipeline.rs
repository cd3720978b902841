//! Sales pipeline board.
//!
//! Deals are partitioned into the six fixed stages. Any stage may move to
//! any other, including out of `closed-won`/`closed-lost`; reopening a
//! closed deal is allowed.

use serde::{Deserialize, Serialize};

use crate::models::{Deal, Id, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageColumn {
    pub stage: Stage,
    pub label: String,
    pub deals: Vec<Deal>,
    pub total_value: f64,
}

impl StageColumn {
    pub fn count(&self) -> usize {
        self.deals.len()
    }

    pub fn deal_ids(&self) -> Vec<Id> {
        self.deals.iter().map(|d| d.id).collect()
    }
}

/// All six columns in board order when built by [`partition`]. A
/// deserialized pipeline may lack some.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub columns: Vec<StageColumn>,
}

impl Pipeline {
    pub fn column(&self, stage: Stage) -> Option<&StageColumn> {
        self.columns.iter().find(|c| c.stage == stage)
    }

    pub fn total_value(&self) -> f64 {
        self.columns.iter().map(|c| c.total_value).sum()
    }

    pub fn deal_count(&self) -> usize {
        self.columns.iter().map(StageColumn::count).sum()
    }
}

/// Group deals by stage, keeping input order inside each column.
pub fn partition(deals: &[Deal]) -> Pipeline {
    let columns = Stage::ALL
        .iter()
        .map(|&stage| {
            let deals: Vec<Deal> = deals.iter().filter(|d| d.stage == stage).cloned().collect();
            let total_value = deals.iter().map(|d| d.value).sum();
            StageColumn {
                stage,
                label: stage.label().to_string(),
                deals,
                total_value,
            }
        })
        .collect();
    Pipeline { columns }
}

/// What a drop onto a column should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Dropped on its own column: no store call, no activity.
    Unchanged,
    Move { deal_id: Id, from: Stage, to: Stage },
}

pub fn plan_transition(deal: &Deal, target: Stage) -> TransitionPlan {
    if deal.stage == target {
        TransitionPlan::Unchanged
    } else {
        TransitionPlan::Move {
            deal_id: deal.id,
            from: deal.stage,
            to: target,
        }
    }
}

/// Audit text for a confirmed move.
pub fn transition_description(deal: &Deal) -> String {
    format!("Moved deal to {}: {}", deal.stage, deal.title)
}

/// The deals a board is showing. Changes are applied only once the store
/// has confirmed them, so a failed move never shows up here.
#[derive(Debug, Clone, Default)]
pub struct PipelineBoard {
    deals: Vec<Deal>,
}

impl PipelineBoard {
    pub fn new(deals: Vec<Deal>) -> Self {
        Self { deals }
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn find(&self, id: Id) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    pub fn pipeline(&self) -> Pipeline {
        partition(&self.deals)
    }

    /// Replace a deal with its confirmed version. Unknown deals are appended.
    pub fn confirm(&mut self, updated: Deal) {
        match self.deals.iter_mut().find(|d| d.id == updated.id) {
            Some(slot) => *slot = updated,
            None => self.deals.push(updated),
        }
    }

    pub fn remove(&mut self, id: Id) {
        self.deals.retain(|d| d.id != id);
    }
}
