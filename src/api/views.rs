use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use salesdeck_core::dashboard::{self, Dashboard};
use salesdeck_core::models::{Contact, Id, Stage};
use salesdeck_core::pipeline::Pipeline;
use salesdeck_core::view::{
    ActivityFilter, ActivitySort, ContactFilter, ContactSort, TaskFilter, TaskSort, ViewState,
};
use salesdeck_core::ValidationError;
use serde::{Deserialize, Serialize};

use super::{ApiResponse, ApiResult};
use crate::service::{ActivityList, ContactList, ContactOverview, CrmService, TaskList, Transition};

pub(super) fn routes() -> Router<CrmService> {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/pipeline", get(pipeline))
        .route("/api/pipeline/deals/{id}/stage", post(move_deal))
        .route("/api/views/contacts", get(contacts))
        .route("/api/views/tasks", get(tasks))
        .route("/api/views/activities", get(activities))
        .route("/api/contacts/{id}/overview", get(overview))
}

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    #[serde(default)]
    q: String,
    filter: Option<String>,
    sort: Option<String>,
}

fn unknown(field: &str, value: &str) -> ValidationError {
    ValidationError::single(field, format!("Unknown {}: {}", field, value))
}

/// Parse an optional name with `parse`, falling back to the default.
fn named<T: Default>(
    field: &str,
    value: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ValidationError> {
    match value {
        None => Ok(T::default()),
        Some(name) => parse(name).ok_or_else(|| unknown(field, name)),
    }
}

async fn dashboard(State(service): State<CrmService>) -> ApiResult<Dashboard> {
    let data = service.load_dashboard(Utc::now()).await?;
    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PipelineResponse {
    pipeline: Pipeline,
    total_value: f64,
    win_rate: u32,
    contacts: Vec<Contact>,
}

async fn pipeline(State(service): State<CrmService>) -> ApiResult<PipelineResponse> {
    let snapshot = service.load_pipeline().await?;
    let pipeline = snapshot.board.pipeline();
    Ok(Json(ApiResponse::ok(PipelineResponse {
        total_value: pipeline.total_value(),
        win_rate: dashboard::win_rate(snapshot.board.deals()),
        pipeline,
        contacts: snapshot.contacts,
    })))
}

#[derive(Debug, Deserialize)]
struct MoveStageRequest {
    stage: String,
}

async fn move_deal(
    State(service): State<CrmService>,
    Path(id): Path<Id>,
    Json(req): Json<MoveStageRequest>,
) -> ApiResult<Transition> {
    let stage = Stage::from_str(&req.stage).ok_or_else(|| unknown("stage", &req.stage))?;
    let transition = service.move_deal(id, stage).await?;
    Ok(Json(ApiResponse::ok(transition)))
}

async fn contacts(
    State(service): State<CrmService>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<ContactList> {
    let filter = query
        .filter
        .as_deref()
        .map(ContactFilter::from_str)
        .unwrap_or_default();
    let sort = named("sort", query.sort.as_deref(), ContactSort::from_str)?;
    let state = ViewState::new(query.q, filter, sort);
    let data = service.contact_list(&state, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(data)))
}

async fn tasks(
    State(service): State<CrmService>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<TaskList> {
    let filter = named("filter", query.filter.as_deref(), TaskFilter::from_str)?;
    let sort = named("sort", query.sort.as_deref(), TaskSort::from_str)?;
    let state = ViewState::new(query.q, filter, sort);
    let data = service.task_list(&state, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(data)))
}

async fn activities(
    State(service): State<CrmService>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<ActivityList> {
    let filter = named("filter", query.filter.as_deref(), ActivityFilter::from_str)?;
    let sort = named("sort", query.sort.as_deref(), ActivitySort::from_str)?;
    let state = ViewState::new(query.q, filter, sort);
    let data = service.activity_list(&state, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(data)))
}

async fn overview(
    State(service): State<CrmService>,
    Path(id): Path<Id>,
) -> ApiResult<ContactOverview> {
    let data = service.contact_overview(id).await?;
    Ok(Json(ApiResponse::ok(data)))
}
