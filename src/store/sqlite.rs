use std::marker::PhantomData;

use async_trait::async_trait;
use salesdeck_core::db::Table;
use salesdeck_core::models::{CustomFieldDefinition, FieldEntity, Id};
use salesdeck_core::{CrmError, Database, Result};

use super::{CustomFieldSchema, RecordStore};

/// Local SQLite collection. Calls run on the blocking pool so a slow disk
/// never stalls the runtime.
pub struct SqliteStore<R> {
    db: Database,
    _record: PhantomData<fn() -> R>,
}

impl<R: Table> SqliteStore<R> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(CrmError::store)?
    }
}

#[async_trait]
impl<R: Table> RecordStore<R> for SqliteStore<R> {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn get_all(&self) -> Result<Vec<R>> {
        self.run(|db| db.list::<R>()).await
    }

    async fn get_by_id(&self, id: Id) -> Result<Option<R>> {
        self.run(move |db| db.get::<R>(id)).await
    }

    async fn create(&self, input: R::Create) -> Result<R> {
        self.run(move |db| db.create::<R>(input)).await
    }

    async fn update(&self, id: Id, input: R::Update) -> Result<R> {
        self.run(move |db| db.update::<R>(id, input)).await
    }

    async fn delete(&self, id: Id) -> Result<()> {
        self.run(move |db| db.delete::<R>(id)).await
    }
}

#[async_trait]
impl CustomFieldSchema for SqliteStore<CustomFieldDefinition> {
    async fn get_by_entity(&self, entity: FieldEntity) -> Result<Vec<CustomFieldDefinition>> {
        self.run(move |db| db.custom_fields_for(entity)).await
    }
}
