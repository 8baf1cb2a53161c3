use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiJson, ApiPath, SharedState};
use crate::auth::{Caller, Role};
use crate::db::ManagerNotificationKind;
use crate::error::{ApiError, ApiResult};
use crate::models::EmployeeNotification;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeNotificationUpdate {
    pub is_read: Option<bool>,
}

/// GET /api/notifications/count
pub async fn count(State(state): State<SharedState>, caller: Caller) -> ApiResult<Json<Value>> {
    let db = state.db.lock().await;
    let account_id = caller.account.id;

    let counts = match &caller.role {
        Role::Manager { .. } => {
            let reports = db.count_unseen_reports(account_id, account_id)?;
            let suggestions = db.count_unread_suggestion_notifications(account_id)?;
            let tasks = db.count_unread_task_notifications_for_manager(account_id)?;
            json!({
                "reports": reports,
                "suggestions": suggestions,
                "tasks": tasks,
                "total": reports + suggestions + tasks,
            })
        }
        Role::Employee(employee) => {
            let reports = db.count_unseen_reports(account_id, employee.manager_id)?;
            let tasks = db.count_unread_task_notifications_for_employee(employee.id)?;
            let announcements = db.count_unnoted_announcements(employee.id, employee.manager_id)?;
            let notifications = db.count_unread_employee_notifications(employee.id)?;
            // Task notifications are a subset of `notifications`
            let pending = db.count_unread_notifications_beyond_reports(employee.id, account_id)?;
            json!({
                "reports": reports,
                "tasks": tasks,
                "announcements": announcements,
                "notifications": notifications,
                "total": reports + announcements + pending,
            })
        }
        Role::Unknown => json!({
            "reports": 0,
            "tasks": 0,
            "announcements": 0,
            "suggestions": 0,
            "notifications": 0,
            "total": 0,
        }),
    };
    Ok(Json(counts))
}

/// POST /api/notifications/reset
pub async fn reset(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(req): ApiJson<ResetRequest>,
) -> ApiResult<Json<Value>> {
    let kind = req
        .kind
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("Type is required"))?;
    let unknown = || ApiError::bad_request(format!("Unknown notification type '{}'", kind));

    let db = state.db.lock().await;
    let account_id = caller.account.id;

    let cleared = match (&caller.role, kind.as_str()) {
        (Role::Manager { .. }, "reports") => {
            let seen = db.mark_all_reports_seen(account_id, account_id)?;
            db.mark_manager_notifications_read(account_id, ManagerNotificationKind::Report)?;
            db.touch_last_seen_reports(account_id, Utc::now())?;
            seen
        }
        (Role::Manager { .. }, "suggestions") => {
            db.mark_manager_notifications_read(account_id, ManagerNotificationKind::Suggestion)?
        }
        (Role::Manager { .. }, "tasks") => {
            db.mark_manager_notifications_read(account_id, ManagerNotificationKind::Task)?
        }
        (Role::Employee(employee), "reports") => {
            let seen = db.mark_all_reports_seen(account_id, employee.manager_id)?;
            db.touch_last_seen_reports(account_id, Utc::now())?;
            seen
        }
        (Role::Employee(employee), "tasks") => db.mark_employee_notifications_read(employee.id, true)?,
        (Role::Employee(employee), "announcements") => {
            db.note_all_announcements(employee.id, employee.manager_id)?
        }
        (Role::Employee(employee), "notifications") => {
            db.mark_employee_notifications_read(employee.id, false)?
        }
        _ => return Err(unknown()),
    };

    tracing::debug!(account_id, kind = %kind, cleared, "Notification count reset");
    Ok(Json(json!({ "detail": "Notification count reset", "cleared": cleared })))
}

/// POST /api/notifications/read/:id
pub async fn mark_read(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let manager_id = caller.require_manager("Only managers can mark these notifications")?;
    let db = state.db.lock().await;
    if !db.mark_manager_notification_read(manager_id, id)? {
        return Err(ApiError::not_found());
    }
    Ok(Json(json!({ "detail": "Marked as read." })))
}

/// GET /api/employee-notifications
pub async fn employee_list(
    State(state): State<SharedState>,
    caller: Caller,
) -> ApiResult<Json<Vec<EmployeeNotification>>> {
    let Some(employee) = caller.employee() else {
        return Ok(Json(Vec::new()));
    };
    let db = state.db.lock().await;
    Ok(Json(db.list_employee_notifications(employee.id)?))
}

fn own_notification(
    db: &crate::db::Database,
    caller: &Caller,
    id: i64,
) -> ApiResult<EmployeeNotification> {
    let employee = caller.employee().ok_or_else(ApiError::not_found)?;
    db.get_employee_notification(employee.id, id)?
        .ok_or_else(ApiError::not_found)
}

/// GET /api/employee-notifications/:id
pub async fn employee_retrieve(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<EmployeeNotification>> {
    let db = state.db.lock().await;
    Ok(Json(own_notification(&db, &caller, id)?))
}

/// PUT/PATCH /api/employee-notifications/:id
pub async fn employee_update(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<EmployeeNotificationUpdate>,
) -> ApiResult<Json<EmployeeNotification>> {
    let is_read = body
        .is_read
        .ok_or_else(|| ApiError::bad_request("is_read is required"))?;
    let db = state.db.lock().await;
    let notification = own_notification(&db, &caller, id)?;
    db.set_employee_notification_read(notification.id, is_read)?;
    Ok(Json(own_notification(&db, &caller, id)?))
}

/// DELETE /api/employee-notifications/:id
pub async fn employee_destroy(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let db = state.db.lock().await;
    let notification = own_notification(&db, &caller, id)?;
    db.delete_employee_notification(notification.id)?;
    Ok(StatusCode::NO_CONTENT)
}
