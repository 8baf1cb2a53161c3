use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{required, ApiJson, ApiPath, SharedState};
use crate::auth::{Caller, Role};
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{Suggestion, SuggestionStatus};

#[derive(Debug, Deserialize)]
pub struct CreateSuggestion {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSuggestion {
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> ApiResult<SuggestionStatus> {
    raw.trim()
        .to_uppercase()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid status '{}'", raw)))
}

fn visible(db: &Database, caller: &Caller, status: Option<SuggestionStatus>) -> anyhow::Result<Vec<Suggestion>> {
    match &caller.role {
        Role::Manager { .. } => db.list_manager_suggestions(caller.account.id, status),
        Role::Employee(employee) => db.list_employee_suggestions(employee.id, status),
        Role::Unknown => Ok(Vec::new()),
    }
}

/// The suggestion if the caller may see it: the addressed manager or its author.
fn visible_suggestion(db: &Database, caller: &Caller, id: i64) -> ApiResult<Suggestion> {
    let suggestion = db.get_suggestion(id)?.ok_or_else(ApiError::not_found)?;
    let allowed = match &caller.role {
        Role::Manager { .. } => suggestion.manager_id == caller.account.id,
        Role::Employee(employee) => suggestion.employee_id == Some(employee.id),
        Role::Unknown => false,
    };
    if allowed {
        Ok(suggestion)
    } else {
        Err(ApiError::not_found())
    }
}

/// GET /api/suggestions
pub async fn list(
    State(state): State<SharedState>,
    caller: Caller,
) -> ApiResult<Json<Vec<Suggestion>>> {
    let db = state.db.lock().await;
    Ok(Json(visible(&db, &caller, None)?))
}

/// GET /api/suggestions/status/:status
pub async fn by_status(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(status): ApiPath<String>,
) -> ApiResult<Json<Vec<Suggestion>>> {
    let status = parse_status(&status)?;
    let db = state.db.lock().await;
    Ok(Json(visible(&db, &caller, Some(status))?))
}

/// POST /api/suggestions
pub async fn create(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(body): ApiJson<CreateSuggestion>,
) -> ApiResult<(StatusCode, Json<Suggestion>)> {
    let employee = caller.require_employee("Only employees can create suggestions")?;
    let message = required(body.message, "Message is required")?;

    let db = state.db.lock().await;
    let id = db.create_suggestion(employee.id, employee.manager_id, &message)?;
    let suggestion = db.get_suggestion(id)?.ok_or_else(ApiError::not_found)?;

    tracing::info!(suggestion_id = id, employee_id = employee.id, "Suggestion submitted");
    Ok((StatusCode::CREATED, Json(suggestion)))
}

/// GET /api/suggestions/:id
pub async fn retrieve(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Suggestion>> {
    let db = state.db.lock().await;
    Ok(Json(visible_suggestion(&db, &caller, id)?))
}

/// PUT/PATCH /api/suggestions/:id
pub async fn update(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateSuggestion>,
) -> ApiResult<Json<Suggestion>> {
    caller.require_manager("Only managers can update suggestions")?;
    let raw = body
        .status
        .ok_or_else(|| ApiError::bad_request("Only status can be updated"))?;
    let status = parse_status(&raw)?;

    let db = state.db.lock().await;
    let suggestion = visible_suggestion(&db, &caller, id)?;
    db.set_suggestion_status(suggestion.id, status)?;
    let suggestion = db.get_suggestion(id)?.ok_or_else(ApiError::not_found)?;
    Ok(Json(suggestion))
}

/// DELETE /api/suggestions/:id
pub async fn destroy(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let db = state.db.lock().await;
    let suggestion = visible_suggestion(&db, &caller, id)?;
    db.delete_suggestion(suggestion.id)?;
    Ok(StatusCode::NO_CONTENT)
}
