use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use salesdeck_core::models::{
    Activity, Contact, CustomFieldDefinition, CustomValues, Deal, EntityKind, FieldEntity, Id,
    Record, Task,
};
use salesdeck_core::{CrmError, Result, ValidationError};
use serde::Deserialize;
use serde_json::Value;

use super::{ApiError, ApiResponse, ApiResult};
use crate::service::CrmService;
use crate::store::mapping::{decode_input, encode_for};
use crate::store::RecordStore;

pub(super) fn routes() -> Router<CrmService> {
    Router::new()
        .route("/api/records/{entity}", get(list).post(create))
        .route(
            "/api/records/{entity}/{id}",
            get(show).patch(update).delete(remove),
        )
}

/// Run a generic helper against the store for `kind`.
macro_rules! on_collection {
    ($kind:expr, $stores:expr, $helper:ident ( $($arg:expr),* )) => {
        match $kind {
            EntityKind::Contact => $helper::<Contact, _>(&*$stores.contacts $(, $arg)*).await,
            EntityKind::Deal => $helper::<Deal, _>(&*$stores.deals $(, $arg)*).await,
            EntityKind::Task => $helper::<Task, _>(&*$stores.tasks $(, $arg)*).await,
            EntityKind::Activity => $helper::<Activity, _>(&*$stores.activities $(, $arg)*).await,
            EntityKind::CustomField => {
                $helper::<CustomFieldDefinition, _>(&*$stores.custom_fields $(, $arg)*).await
            }
        }
    };
}

fn parse_kind(entity: &str) -> std::result::Result<EntityKind, ApiError> {
    EntityKind::from_str(entity)
        .ok_or_else(|| ApiError::not_found(format!("unknown collection: {}", entity)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// Only for `custom_field`: definitions for one entity.
    entity: Option<String>,
}

async fn list(
    State(service): State<CrmService>,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Value> {
    let kind = parse_kind(&entity)?;
    let stores = service.stores();
    let data = match (kind, query.entity) {
        (EntityKind::CustomField, Some(target)) => {
            let target = FieldEntity::from_str(&target).ok_or_else(|| {
                ValidationError::single("entity", format!("Unknown entity: {}", target))
            })?;
            let defs = stores.custom_fields.get_by_entity(target).await?;
            encode_all(kind, &defs)?
        }
        _ => on_collection!(kind, stores, list_wire())?,
    };
    Ok(Json(ApiResponse::ok(data)))
}

async fn show(
    State(service): State<CrmService>,
    Path((entity, id)): Path<(String, Id)>,
) -> ApiResult<Value> {
    let kind = parse_kind(&entity)?;
    let data = on_collection!(kind, service.stores(), show_wire(id))?;
    Ok(Json(ApiResponse::ok(data)))
}

async fn create(
    State(service): State<CrmService>,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let kind = parse_kind(&entity)?;
    check_custom_body(&service, kind, &body, true).await?;
    let data = on_collection!(kind, service.stores(), create_wire(body))?;
    Ok(Json(ApiResponse::ok(data)))
}

async fn update(
    State(service): State<CrmService>,
    Path((entity, id)): Path<(String, Id)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let kind = parse_kind(&entity)?;
    check_custom_body(&service, kind, &body, false).await?;
    let data = on_collection!(kind, service.stores(), update_wire(id, body))?;
    Ok(Json(ApiResponse::ok(data)))
}

async fn remove(
    State(service): State<CrmService>,
    Path((entity, id)): Path<(String, Id)>,
) -> ApiResult<Value> {
    let kind = parse_kind(&entity)?;
    let data = on_collection!(kind, service.stores(), delete_wire(id))?;
    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomBody {
    #[serde(default)]
    custom_fields: Option<CustomValues>,
}

/// Contact and deal bodies carry user-defined values, checked against the
/// current definitions before the store sees them. A create without a map
/// still has to satisfy required fields; an update without one keeps the
/// stored values.
async fn check_custom_body(
    service: &CrmService,
    kind: EntityKind,
    body: &Value,
    creating: bool,
) -> Result<()> {
    let entity = match kind {
        EntityKind::Contact => FieldEntity::Contact,
        EntityKind::Deal => FieldEntity::Deal,
        _ => return Ok(()),
    };
    let CustomBody { custom_fields } = decode_input(kind, body)?;
    let values = match custom_fields {
        None if creating => Some(CustomValues::new()),
        values => values,
    };
    service.check_custom_values(entity, Ok(()), values.as_ref()).await
}

fn encode_all<R: Record>(kind: EntityKind, records: &[R]) -> Result<Value> {
    records
        .iter()
        .map(|r| encode_for(kind, r))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

async fn list_wire<R: Record, S: RecordStore<R> + ?Sized>(store: &S) -> Result<Value> {
    encode_all(R::KIND, &store.get_all().await?)
}

async fn show_wire<R: Record, S: RecordStore<R> + ?Sized>(store: &S, id: Id) -> Result<Value> {
    let record = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| CrmError::not_found(R::KIND, id))?;
    encode_for(R::KIND, &record)
}

async fn create_wire<R: Record, S: RecordStore<R> + ?Sized>(store: &S, body: Value) -> Result<Value> {
    let input: R::Create = decode_input(R::KIND, &body)?;
    let record = store.create(input).await?;
    encode_for(R::KIND, &record)
}

async fn update_wire<R: Record, S: RecordStore<R> + ?Sized>(
    store: &S,
    id: Id,
    body: Value,
) -> Result<Value> {
    let input: R::Update = decode_input(R::KIND, &body)?;
    let record = store.update(id, input).await?;
    encode_for(R::KIND, &record)
}

async fn delete_wire<R: Record, S: RecordStore<R> + ?Sized>(store: &S, id: Id) -> Result<Value> {
    store.delete(id).await?;
    Ok(Value::Bool(true))
}
