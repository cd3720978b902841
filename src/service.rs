//! CRM workflows on top of the record stores.
//!
//! Primary writes go through here so every create, update and stage move
//! leaves an audit [`Activity`]. The audit write happens strictly after
//! the primary write succeeds, and its failure never unwinds or fails the
//! primary write: it is logged as an [`ActivityLogError`] and dropped.

use chrono::{DateTime, Utc};
use salesdeck_core::dashboard::{self, ActivityGroup, ActivityStats, Dashboard, TaskStats};
use salesdeck_core::models::*;
use salesdeck_core::pipeline::{plan_transition, transition_description, PipelineBoard, TransitionPlan};
use salesdeck_core::view::{
    self, ActivityFilter, ActivitySort, ContactFilter, ContactSort, TaskFilter, TaskSort, ViewState,
};
use salesdeck_core::{CrmError, Result, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::store::Stores;

/// An audit entry could not be written after its primary write succeeded.
#[derive(Debug, Error)]
#[error("could not log activity \"{description}\": {source}")]
pub struct ActivityLogError {
    pub description: String,
    #[source]
    pub source: CrmError,
}

/// A primary write and the audit entry it produced, if logging worked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Audited<T> {
    pub record: T,
    pub activity: Option<Activity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Transition {
    /// Target was the current stage; nothing was written.
    Unchanged,
    Moved {
        deal: Deal,
        activity: Option<Activity>,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub board: PipelineBoard,
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactOverview {
    pub contact: Contact,
    pub deals: Vec<Deal>,
    pub tasks: Vec<Task>,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    pub records: Vec<Contact>,
    /// Every tag in use, for the tag filter.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub records: Vec<Task>,
    pub stats: TaskStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityList {
    pub records: Vec<Activity>,
    pub groups: Vec<ActivityGroup>,
    pub stats: ActivityStats,
}

#[derive(Clone)]
pub struct CrmService {
    stores: Stores,
}

impl CrmService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Best-effort audit write.
    async fn log_activity(&self, input: CreateActivityInput) -> Option<Activity> {
        let description = input.description.clone();
        match self.stores.activities.create(input).await {
            Ok(activity) => Some(activity),
            Err(source) => {
                let err = ActivityLogError {
                    description,
                    source,
                };
                tracing::warn!("{}", err);
                None
            }
        }
    }

    /// Check user-defined values against the definitions for `entity`,
    /// reporting them together with the input's own field errors.
    pub(crate) async fn check_custom_values(
        &self,
        entity: FieldEntity,
        base: std::result::Result<(), ValidationError>,
        values: Option<&CustomValues>,
    ) -> Result<()> {
        let mut errors = base.err().unwrap_or_default();
        if let Some(values) = values {
            let defs = self.stores.custom_fields.get_by_entity(entity).await?;
            if let Err(custom) = validate_custom_values(&defs, values) {
                errors.errors.extend(custom.errors);
            }
        }
        Ok(errors.into_result()?)
    }

    // Contacts

    pub async fn create_contact(&self, input: CreateContactInput) -> Result<Audited<Contact>> {
        self.check_custom_values(FieldEntity::Contact, input.validate(), Some(&input.custom_fields))
            .await?;
        let contact = self.stores.contacts.create(input).await?;
        tracing::info!("Created contact {} ({})", contact.id, contact.name);
        let activity = self
            .log_activity(
                CreateActivityInput::new(
                    ActivityType::Contact,
                    format!("Created new contact: {}", contact.name),
                )
                .contact(Some(contact.id)),
            )
            .await;
        Ok(Audited {
            record: contact,
            activity,
        })
    }

    pub async fn update_contact(
        &self,
        id: Id,
        input: UpdateContactInput,
    ) -> Result<Audited<Contact>> {
        self.check_custom_values(FieldEntity::Contact, input.validate(), input.custom_fields.as_ref())
            .await?;
        let contact = self.stores.contacts.update(id, input).await?;
        tracing::info!("Updated contact {}", contact.id);
        let activity = self
            .log_activity(
                CreateActivityInput::new(
                    ActivityType::Contact,
                    format!("Updated contact: {}", contact.name),
                )
                .contact(Some(contact.id)),
            )
            .await;
        Ok(Audited {
            record: contact,
            activity,
        })
    }

    pub async fn delete_contact(&self, id: Id) -> Result<()> {
        self.stores.contacts.delete(id).await?;
        tracing::info!("Deleted contact {}", id);
        Ok(())
    }

    // Deals

    fn deal_activity(deal: &Deal, description: String) -> CreateActivityInput {
        CreateActivityInput::new(ActivityType::Deal, description)
            .contact(Some(deal.contact_id))
            .deal(Some(deal.id))
    }

    pub async fn create_deal(&self, input: CreateDealInput) -> Result<Audited<Deal>> {
        self.check_custom_values(FieldEntity::Deal, input.validate(), Some(&input.custom_fields))
            .await?;
        let deal = self.stores.deals.create(input).await?;
        tracing::info!("Created deal {} ({})", deal.id, deal.title);
        let activity = self
            .log_activity(Self::deal_activity(
                &deal,
                format!("Created new deal: {}", deal.title),
            ))
            .await;
        Ok(Audited {
            record: deal,
            activity,
        })
    }

    pub async fn update_deal(&self, id: Id, input: UpdateDealInput) -> Result<Audited<Deal>> {
        self.check_custom_values(FieldEntity::Deal, input.validate(), input.custom_fields.as_ref())
            .await?;
        let deal = self.stores.deals.update(id, input).await?;
        tracing::info!("Updated deal {}", deal.id);
        let activity = self
            .log_activity(Self::deal_activity(&deal, format!("Updated deal: {}", deal.title)))
            .await;
        Ok(Audited {
            record: deal,
            activity,
        })
    }

    pub async fn delete_deal(&self, id: Id) -> Result<()> {
        self.stores.deals.delete(id).await?;
        tracing::info!("Deleted deal {}", id);
        Ok(())
    }

    /// Move `deal` to `target`. Same-stage requests touch no store at all.
    /// Otherwise only `stage` is written, and the audit entry follows the
    /// confirmed update.
    pub async fn request_transition(&self, deal: &Deal, target: Stage) -> Result<Transition> {
        let deal_id = match plan_transition(deal, target) {
            TransitionPlan::Unchanged => {
                tracing::debug!("Deal {} already in {}", deal.id, target);
                return Ok(Transition::Unchanged);
            }
            TransitionPlan::Move { deal_id, .. } => deal_id,
        };

        let moved = self
            .stores
            .deals
            .update(deal_id, UpdateDealInput::stage_only(target))
            .await?;
        tracing::info!("Moved deal {} from {} to {}", moved.id, deal.stage, moved.stage);
        let activity = self
            .log_activity(Self::deal_activity(&moved, transition_description(&moved)))
            .await;
        Ok(Transition::Moved {
            deal: moved,
            activity,
        })
    }

    /// Move a deal shown on `board`. The board changes only after the
    /// store has confirmed the move.
    pub async fn move_on_board(
        &self,
        board: &mut PipelineBoard,
        deal_id: Id,
        target: Stage,
    ) -> Result<Transition> {
        let deal = board
            .find(deal_id)
            .cloned()
            .ok_or_else(|| CrmError::not_found(EntityKind::Deal, deal_id))?;
        let transition = self.request_transition(&deal, target).await?;
        if let Transition::Moved { deal, .. } = &transition {
            board.confirm(deal.clone());
        }
        Ok(transition)
    }

    /// Move a deal by id, reading its current stage from the store first.
    pub async fn move_deal(&self, deal_id: Id, target: Stage) -> Result<Transition> {
        let deal = self
            .stores
            .deals
            .get_by_id(deal_id)
            .await?
            .ok_or_else(|| CrmError::not_found(EntityKind::Deal, deal_id))?;
        self.request_transition(&deal, target).await
    }

    // Tasks

    fn task_activity(task: &Task, description: String) -> CreateActivityInput {
        CreateActivityInput::new(ActivityType::Task, description)
            .contact(task.contact_id)
            .deal(task.deal_id)
    }

    pub async fn create_task(&self, input: CreateTaskInput) -> Result<Audited<Task>> {
        let task = self.stores.tasks.create(input).await?;
        tracing::info!("Created task {} ({})", task.id, task.title);
        let activity = self
            .log_activity(Self::task_activity(
                &task,
                format!("Created new task: {}", task.title),
            ))
            .await;
        Ok(Audited {
            record: task,
            activity,
        })
    }

    pub async fn update_task(&self, id: Id, input: UpdateTaskInput) -> Result<Audited<Task>> {
        let task = self.stores.tasks.update(id, input).await?;
        tracing::info!("Updated task {}", task.id);
        let activity = self
            .log_activity(Self::task_activity(&task, format!("Updated task: {}", task.title)))
            .await;
        Ok(Audited {
            record: task,
            activity,
        })
    }

    /// Completed tasks reopen as pending; anything else becomes completed.
    pub async fn toggle_task(&self, id: Id) -> Result<Audited<Task>> {
        let current = self
            .stores
            .tasks
            .get_by_id(id)
            .await?
            .ok_or_else(|| CrmError::not_found(EntityKind::Task, id))?;
        let task = self
            .stores
            .tasks
            .update(id, UpdateTaskInput::status_only(current.status.toggled()))
            .await?;
        tracing::info!("Task {} is now {}", task.id, task.status.as_str());
        let activity = self
            .log_activity(Self::task_activity(
                &task,
                format!("Marked task as {}: {}", task.status.as_str(), task.title),
            ))
            .await;
        Ok(Audited {
            record: task,
            activity,
        })
    }

    pub async fn delete_task(&self, id: Id) -> Result<()> {
        self.stores.tasks.delete(id).await?;
        tracing::info!("Deleted task {}", id);
        Ok(())
    }

    // Custom fields

    pub async fn custom_fields(&self, entity: FieldEntity) -> Result<Vec<CustomFieldDefinition>> {
        self.stores.custom_fields.get_by_entity(entity).await
    }

    pub async fn create_custom_field(
        &self,
        input: CreateCustomFieldInput,
    ) -> Result<CustomFieldDefinition> {
        let def = self.stores.custom_fields.create(input).await?;
        tracing::info!("Created {} field {} ({})", def.entity.as_str(), def.id, def.label);
        Ok(def)
    }

    /// The merged definition is rechecked by the store, so a patch cannot
    /// leave a select field without options.
    pub async fn update_custom_field(
        &self,
        id: Id,
        input: UpdateCustomFieldInput,
    ) -> Result<CustomFieldDefinition> {
        let def = self.stores.custom_fields.update(id, input).await?;
        tracing::info!("Updated {} field {} ({})", def.entity.as_str(), def.id, def.label);
        Ok(def)
    }

    pub async fn delete_custom_field(&self, id: Id) -> Result<()> {
        self.stores.custom_fields.delete(id).await
    }

    // Joined loads. Every collection is requested concurrently; the first
    // failure aborts the whole load.

    pub async fn load_dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard> {
        let (contacts, deals, tasks, activities) = tokio::try_join!(
            self.stores.contacts.get_all(),
            self.stores.deals.get_all(),
            self.stores.tasks.get_all(),
            self.stores.activities.get_all(),
        )?;
        tracing::debug!(
            "Dashboard loaded: {} contacts, {} deals, {} tasks, {} activities",
            contacts.len(),
            deals.len(),
            tasks.len(),
            activities.len()
        );
        Ok(dashboard::summarize(&contacts, &deals, &tasks, &activities, now))
    }

    pub async fn load_pipeline(&self) -> Result<PipelineSnapshot> {
        let (deals, contacts) =
            tokio::try_join!(self.stores.deals.get_all(), self.stores.contacts.get_all())?;
        Ok(PipelineSnapshot {
            board: PipelineBoard::new(deals),
            contacts,
        })
    }

    pub async fn contact_overview(&self, id: Id) -> Result<ContactOverview> {
        let (contact, deals, tasks, activities) = tokio::try_join!(
            self.stores.contacts.get_by_id(id),
            self.stores.deals.get_all(),
            self.stores.tasks.get_all(),
            self.stores.activities.get_all(),
        )?;
        let contact = contact.ok_or_else(|| CrmError::not_found(EntityKind::Contact, id))?;
        Ok(ContactOverview {
            deals: deals.into_iter().filter(|d| d.contact_id == id).collect(),
            tasks: tasks.into_iter().filter(|t| t.contact_id == Some(id)).collect(),
            activities: activities
                .into_iter()
                .filter(|a| a.contact_id == Some(id))
                .collect(),
            contact,
        })
    }

    // List views

    pub async fn contact_list(
        &self,
        state: &ViewState<ContactFilter, ContactSort>,
        now: DateTime<Utc>,
    ) -> Result<ContactList> {
        let contacts = self.stores.contacts.get_all().await?;
        Ok(ContactList {
            records: view::derive(&contacts, state, now),
            tags: dashboard::tag_catalogue(&contacts),
        })
    }

    pub async fn task_list(
        &self,
        state: &ViewState<TaskFilter, TaskSort>,
        now: DateTime<Utc>,
    ) -> Result<TaskList> {
        let tasks = self.stores.tasks.get_all().await?;
        Ok(TaskList {
            records: view::derive(&tasks, state, now),
            stats: dashboard::task_stats(&tasks, now),
        })
    }

    pub async fn activity_list(
        &self,
        state: &ViewState<ActivityFilter, ActivitySort>,
        now: DateTime<Utc>,
    ) -> Result<ActivityList> {
        let activities = self.stores.activities.get_all().await?;
        let records = view::derive(&activities, state, now);
        Ok(ActivityList {
            groups: dashboard::group_by_day(&records, now),
            stats: dashboard::activity_stats(&activities, now),
            records,
        })
    }
}
