use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, ApiJson, ApiPath, ApiQuery, Page, PageQuery, Pagination, SharedState};
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::models::{Announcement, Employee};

#[derive(Debug, Deserialize)]
pub struct AnnouncementBody {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// GET /api/announcements
pub async fn list(
    State(state): State<SharedState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Announcement>>> {
    let manager_id = caller.require_company()?;
    let pagination = Pagination::new(&query, &state.config.pagination);
    let db = state.db.lock().await;
    let count = db.count_announcements(manager_id)?;
    let results = db.list_announcements(manager_id, pagination.window())?;
    Ok(Json(pagination.page(count, results)?))
}

/// POST /api/announcements
pub async fn create(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(body): ApiJson<AnnouncementBody>,
) -> ApiResult<(StatusCode, Json<Announcement>)> {
    let manager_id = caller.require_manager("Only managers can create announcements")?;
    let title = required(body.title, "Title is required")?;
    let content = required(body.content, "Content is required")?;

    let db = state.db.lock().await;
    let id = db.create_announcement(manager_id, &title, &content)?;
    let announcement = db.get_announcement(id)?.ok_or_else(ApiError::not_found)?;

    tracing::info!(announcement_id = id, manager_id, "Announcement published");
    Ok((StatusCode::CREATED, Json(announcement)))
}

/// GET /api/announcements/:id
pub async fn retrieve(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Announcement>> {
    let manager_id = caller.require_company()?;
    let db = state.db.lock().await;
    let announcement = db
        .get_company_announcement(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(announcement))
}

/// PUT/PATCH /api/announcements/:id
pub async fn update(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<AnnouncementBody>,
) -> ApiResult<Json<Announcement>> {
    let manager_id = caller.require_manager("Only managers can edit announcements")?;
    let title = body.title.map(|t| t.trim().to_string());
    let content = body.content.map(|c| c.trim().to_string());
    if title.as_deref() == Some("") || content.as_deref() == Some("") {
        return Err(ApiError::bad_request("Title and content cannot be blank"));
    }

    let db = state.db.lock().await;
    db.get_company_announcement(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    db.update_announcement(id, title.as_deref(), content.as_deref())?;
    let announcement = db.get_announcement(id)?.ok_or_else(ApiError::not_found)?;
    Ok(Json(announcement))
}

/// DELETE /api/announcements/:id
pub async fn destroy(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let manager_id = caller.require_manager("Only managers can delete announcements")?;
    let db = state.db.lock().await;
    db.get_company_announcement(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    db.delete_announcement(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/announcements/:id/mark_noted
pub async fn mark_noted(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let employee = caller.require_employee("Only employees can mark announcements as noted")?;
    let db = state.db.lock().await;
    let announcement = db
        .get_company_announcement(employee.manager_id, id)?
        .ok_or_else(ApiError::not_found)?;

    if !db.mark_announcement_noted(announcement.id, employee.id)? {
        return Err(ApiError::bad_request("Already noted"));
    }
    Ok(Json(json!({ "detail": "Marked as noted" })))
}

/// GET /api/announcements/:id/noted_employees
pub async fn noted_employees(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Employee>>> {
    let manager_id = caller.require_company()?;
    let db = state.db.lock().await;
    let announcement = db
        .get_company_announcement(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(db.noted_employees(announcement.id)?))
}
