//! Record Store Client.
//!
//! Five uniform verbs per entity collection, hiding whether records live
//! in a local SQLite file, in process memory, or behind a remote HTTP
//! record store. Nothing here cascades: deleting a contact leaves the
//! deals, tasks and activities that point at it untouched.

pub mod mapping;
mod memory;
mod remote;
mod sqlite;

pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use salesdeck_core::models::{
    Activity, Contact, CustomFieldDefinition, Deal, FieldEntity, Id, Record, Task,
};
use salesdeck_core::{Database, Result};

#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Short backend name for logs.
    fn backend_tag(&self) -> &'static str;

    /// Every record, newest first.
    async fn get_all(&self) -> Result<Vec<R>>;

    /// `Ok(None)` when the id does not exist; errors are transport only.
    async fn get_by_id(&self, id: Id) -> Result<Option<R>>;

    /// Validate, assign an id and creation time, and return the stored record.
    async fn create(&self, input: R::Create) -> Result<R>;

    /// Merge only the provided fields. `NotFound` for an unknown id.
    async fn update(&self, id: Id, input: R::Update) -> Result<R>;

    /// Not idempotent: a second delete of the same id is `NotFound`.
    async fn delete(&self, id: Id) -> Result<()>;
}

/// Custom field definitions, queryable by the entity they extend.
#[async_trait]
pub trait CustomFieldSchema: RecordStore<CustomFieldDefinition> {
    /// Definitions for one entity, oldest first (form order).
    async fn get_by_entity(&self, entity: FieldEntity) -> Result<Vec<CustomFieldDefinition>> {
        let mut defs: Vec<CustomFieldDefinition> = self
            .get_all()
            .await?
            .into_iter()
            .filter(|d| d.entity == entity)
            .collect();
        defs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(defs)
    }
}

/// One store per collection, all on the same backend.
#[derive(Clone)]
pub struct Stores {
    pub contacts: Arc<dyn RecordStore<Contact>>,
    pub deals: Arc<dyn RecordStore<Deal>>,
    pub tasks: Arc<dyn RecordStore<Task>>,
    pub activities: Arc<dyn RecordStore<Activity>>,
    pub custom_fields: Arc<dyn CustomFieldSchema>,
}

impl Stores {
    pub fn sqlite(db: Database) -> Self {
        Self {
            contacts: Arc::new(SqliteStore::<Contact>::new(db.clone())),
            deals: Arc::new(SqliteStore::<Deal>::new(db.clone())),
            tasks: Arc::new(SqliteStore::<Task>::new(db.clone())),
            activities: Arc::new(SqliteStore::<Activity>::new(db.clone())),
            custom_fields: Arc::new(SqliteStore::<CustomFieldDefinition>::new(db)),
        }
    }

    pub fn memory() -> Self {
        Self {
            contacts: Arc::new(MemoryStore::<Contact>::new()),
            deals: Arc::new(MemoryStore::<Deal>::new()),
            tasks: Arc::new(MemoryStore::<Task>::new()),
            activities: Arc::new(MemoryStore::<Activity>::new()),
            custom_fields: Arc::new(MemoryStore::<CustomFieldDefinition>::new()),
        }
    }

    /// Stores backed by a remote record-store server at `base_url`.
    pub fn remote(base_url: &str) -> Result<Self> {
        let client = remote::build_client()?;
        Ok(Self {
            contacts: Arc::new(RemoteStore::<Contact>::with_client(client.clone(), base_url)),
            deals: Arc::new(RemoteStore::<Deal>::with_client(client.clone(), base_url)),
            tasks: Arc::new(RemoteStore::<Task>::with_client(client.clone(), base_url)),
            activities: Arc::new(RemoteStore::<Activity>::with_client(client.clone(), base_url)),
            custom_fields: Arc::new(RemoteStore::<CustomFieldDefinition>::with_client(
                client, base_url,
            )),
        })
    }

    pub fn backend_tag(&self) -> &'static str {
        self.contacts.backend_tag()
    }
}
