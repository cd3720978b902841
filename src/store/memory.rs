use async_trait::async_trait;
use chrono::Utc;
use salesdeck_core::models::{backend_order, CustomFieldDefinition, Id, Record, Validate};
use salesdeck_core::{CrmError, Result};
use tokio::sync::Mutex;

use super::{CustomFieldSchema, RecordStore};

/// In-process collection, used for demos and tests. Ids come from a
/// counter that only moves forward, so deleted ids are never handed out
/// again.
pub struct MemoryStore<R> {
    state: Mutex<MemoryState<R>>,
}

struct MemoryState<R> {
    records: Vec<R>,
    next_id: Id,
}

impl<R: Record> MemoryStore<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Seed with existing records; new ids continue after the highest one.
    pub fn with_records(records: Vec<R>) -> Self {
        let next_id = records.iter().map(Record::id).max().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(MemoryState { records, next_id }),
        }
    }
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for MemoryStore<R> {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get_all(&self) -> Result<Vec<R>> {
        let mut records = self.state.lock().await.records.clone();
        backend_order(&mut records);
        Ok(records)
    }

    async fn get_by_id(&self, id: Id) -> Result<Option<R>> {
        let state = self.state.lock().await;
        Ok(state.records.iter().find(|r| r.id() == id).cloned())
    }

    async fn create(&self, input: R::Create) -> Result<R> {
        input.validate()?;
        let mut state = self.state.lock().await;
        let record = R::build(state.next_id, input, Utc::now());
        state.next_id += 1;
        state.records.push(record.clone());
        tracing::debug!("memory: created {} {}", R::KIND, record.id());
        Ok(record)
    }

    async fn update(&self, id: Id, input: R::Update) -> Result<R> {
        input.validate()?;
        let mut state = self.state.lock().await;
        let slot = state
            .records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| CrmError::not_found(R::KIND, id))?;
        let mut record = slot.clone();
        record.apply(input);
        record.check()?;
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: Id) -> Result<()> {
        let mut state = self.state.lock().await;
        let index = state
            .records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| CrmError::not_found(R::KIND, id))?;
        state.records.remove(index);
        Ok(())
    }
}

impl CustomFieldSchema for MemoryStore<CustomFieldDefinition> {}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdeck_core::models::{
        Contact, CreateContactInput, CreateCustomFieldInput, FieldEntity, FieldType,
        UpdateContactInput, UpdateCustomFieldInput,
    };

    fn contact_input(name: &str) -> CreateContactInput {
        CreateContactInput {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids_and_lists_newest_first() {
        let store = MemoryStore::<Contact>::new();
        let a = store.create(contact_input("Alice")).await.unwrap();
        let b = store.create(contact_input("Bob")).await.unwrap();
        assert!(b.id > a.id);

        let ids: Vec<Id> = store.get_all().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn create_rejects_missing_required_fields() {
        let store = MemoryStore::<Contact>::new();
        let err = store.create(contact_input("")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_is_partial_and_delete_is_not_idempotent() {
        let store = MemoryStore::<Contact>::new();
        let alice = store.create(contact_input("Alice")).await.unwrap();

        let updated = store
            .update(
                alice.id,
                UpdateContactInput {
                    company: Some(Some("Acme".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.company.as_deref(), Some("Acme"));
        assert_eq!(updated.email, alice.email);

        store.delete(alice.id).await.unwrap();
        assert!(store.delete(alice.id).await.unwrap_err().is_not_found());
        assert!(store.get_by_id(alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let store = MemoryStore::<Contact>::new();
        let first = store.create(contact_input("Alice")).await.unwrap();
        store.delete(first.id).await.unwrap();
        let second = store.create(contact_input("Bob")).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn schema_filters_by_entity_oldest_first() {
        let store = MemoryStore::<CustomFieldDefinition>::new();
        for (label, entity) in [
            ("Industry", FieldEntity::Contact),
            ("Region", FieldEntity::Deal),
            ("Source", FieldEntity::Contact),
        ] {
            store
                .create(CreateCustomFieldInput {
                    label: label.into(),
                    field_type: FieldType::Text,
                    entity,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let labels: Vec<String> = store
            .get_by_entity(FieldEntity::Contact)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, vec!["Industry", "Source"]);
    }

    #[tokio::test]
    async fn select_keeps_at_least_one_option_after_update() {
        let store = MemoryStore::<CustomFieldDefinition>::new();
        let text = store
            .create(CreateCustomFieldInput {
                label: "Source".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let err = store
            .update(
                text.id,
                UpdateCustomFieldInput {
                    field_type: Some(FieldType::Select),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        let CrmError::Validation(errors) = err else { panic!("expected validation error") };
        assert_eq!(errors.message_for("options"), Some("Select fields need at least one option"));
        let stored = store.get_by_id(text.id).await.unwrap().unwrap();
        assert_eq!(stored.field_type, FieldType::Text);

        let select = store
            .create(CreateCustomFieldInput {
                label: "Tier".into(),
                field_type: FieldType::Select,
                options: vec!["gold".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        let err = store
            .update(
                select.id,
                UpdateCustomFieldInput {
                    options: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let stored = store.get_by_id(select.id).await.unwrap().unwrap();
        assert_eq!(stored.options, vec!["gold"]);
    }
}
