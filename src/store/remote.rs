use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::StatusCode;
use salesdeck_core::models::{CustomFieldDefinition, FieldEntity, Id, Record};
use salesdeck_core::{CrmError, Result, ValidationError};
use serde_json::Value;

use super::mapping::{decode_record, encode_for};
use super::{CustomFieldSchema, RecordStore};
use crate::api::ApiResponse;

pub(super) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| CrmError::store(format!("building HTTP client: {}", e)))
}

/// Collection served by a remote record-store backend speaking the
/// `/api/records/{entity}` protocol in backend field names.
pub struct RemoteStore<R> {
    client: reqwest::Client,
    collection_url: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RemoteStore<R> {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self::with_client(build_client()?, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            collection_url: format!("{}/api/records/{}", base_url.trim_end_matches('/'), R::KIND),
            _record: PhantomData,
        }
    }

    fn record_url(&self, id: Id) -> String {
        format!("{}/{}", self.collection_url, id)
    }

    /// Send a request and unwrap the response envelope into its `data`.
    async fn call(&self, request: reqwest::RequestBuilder, id: Option<Id>) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| CrmError::store(format!("{} request failed: {}", R::KIND, e)))?;
        let status = response.status();
        let body: ApiResponse<Value> = response.json().await.map_err(|e| {
            CrmError::store(format!("{} backend returned {}: {}", R::KIND, status, e))
        })?;

        if status.is_success() && body.success {
            return Ok(body.data.unwrap_or(Value::Null));
        }
        Err(self.error_from(status, body, id))
    }

    fn error_from(&self, status: StatusCode, body: ApiResponse<Value>, id: Option<Id>) -> CrmError {
        let message = body
            .message
            .unwrap_or_else(|| format!("{} backend returned {}", R::KIND, status));
        match (status, id) {
            (StatusCode::NOT_FOUND, Some(id)) => CrmError::not_found(R::KIND, id),
            (StatusCode::UNPROCESSABLE_ENTITY, _) => {
                let mut errors = ValidationError { errors: body.errors };
                if errors.is_empty() {
                    errors.push("body", message);
                }
                CrmError::Validation(errors)
            }
            _ => CrmError::Store(message),
        }
    }

    fn decode_list(data: Value) -> Result<Vec<R>> {
        match data {
            Value::Array(items) => items.iter().map(|item| decode_record(R::KIND, item)).collect(),
            other => Err(CrmError::store(format!(
                "expected a list of {} records, got {}",
                R::KIND,
                other
            ))),
        }
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for RemoteStore<R> {
    fn backend_tag(&self) -> &'static str {
        "remote"
    }

    async fn get_all(&self) -> Result<Vec<R>> {
        tracing::debug!("GET {}", self.collection_url);
        let data = self.call(self.client.get(&self.collection_url), None).await?;
        Self::decode_list(data)
    }

    async fn get_by_id(&self, id: Id) -> Result<Option<R>> {
        let url = self.record_url(id);
        tracing::debug!("GET {}", url);
        match self.call(self.client.get(&url), Some(id)).await {
            Ok(data) => Ok(Some(decode_record(R::KIND, &data)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, input: R::Create) -> Result<R> {
        let body = encode_for(R::KIND, &input)?;
        tracing::debug!("POST {}", self.collection_url);
        let data = self
            .call(self.client.post(&self.collection_url).json(&body), None)
            .await?;
        decode_record(R::KIND, &data)
    }

    async fn update(&self, id: Id, input: R::Update) -> Result<R> {
        let body = encode_for(R::KIND, &input)?;
        let url = self.record_url(id);
        tracing::debug!("PATCH {}", url);
        let data = self.call(self.client.patch(&url).json(&body), Some(id)).await?;
        decode_record(R::KIND, &data)
    }

    async fn delete(&self, id: Id) -> Result<()> {
        let url = self.record_url(id);
        tracing::debug!("DELETE {}", url);
        self.call(self.client.delete(&url), Some(id)).await?;
        Ok(())
    }
}

#[async_trait]
impl CustomFieldSchema for RemoteStore<CustomFieldDefinition> {
    async fn get_by_entity(&self, entity: FieldEntity) -> Result<Vec<CustomFieldDefinition>> {
        let request = self
            .client
            .get(&self.collection_url)
            .query(&[("entity", entity.as_str())]);
        let data = self.call(request, None).await?;
        Self::decode_list(data)
    }
}
