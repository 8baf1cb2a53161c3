use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, ApiJson, ApiPath, ApiQuery, Page, PageQuery, Pagination, SharedState};
use crate::auth::{Caller, Role};
use crate::db::{Database, NewTask, TaskChanges, TaskFilter};
use crate::error::{ApiError, ApiResult};
use crate::models::{Task, TaskPriority, TaskStatus};

const MANAGERS_ONLY: &str = "You do not have permission to perform this action.";
const NO_ASSIGNEES: &str = "assigned_to must list at least one employee";

#[derive(Debug, Default, Deserialize)]
pub struct TaskBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<Vec<i64>>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

fn parse_priority(raw: &str) -> ApiResult<TaskPriority> {
    raw.trim()
        .to_uppercase()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid priority '{}'", raw)))
}

fn parse_status(raw: &str) -> ApiResult<TaskStatus> {
    raw.trim()
        .to_uppercase()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid status '{}'", raw)))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Rejects assignees that don't work for `manager_id`.
fn check_assignees(db: &Database, manager_id: i64, assigned_to: &[i64]) -> ApiResult<()> {
    let staff = db.employee_ids_for_manager(manager_id)?;
    match assigned_to.iter().find(|id| !staff.contains(id)) {
        Some(id) => Err(ApiError::bad_request(format!(
            "Employee {} does not belong to your company",
            id
        ))),
        None => Ok(()),
    }
}

/// The task if the caller may see it: its manager or one of its assignees.
fn visible_task(db: &Database, caller: &Caller, id: i64) -> ApiResult<Task> {
    let task = match &caller.role {
        Role::Manager { .. } => db.get_manager_task(caller.account.id, id)?,
        Role::Employee(employee) => db.get_assigned_task(employee.id, id)?,
        Role::Unknown => None,
    };
    task.ok_or_else(ApiError::not_found)
}

async fn manager_page(
    state: &SharedState,
    caller: &Caller,
    filter: TaskFilter,
    query: &PageQuery,
) -> ApiResult<Json<Page<Task>>> {
    let manager_id = caller.require_manager(MANAGERS_ONLY)?;
    let pagination = Pagination::new(query, &state.config.pagination);
    let db = state.db.lock().await;
    let count = db.count_manager_tasks(manager_id, filter)?;
    let results = db.list_manager_tasks(manager_id, filter, pagination.window())?;
    Ok(Json(pagination.page(count, results)?))
}

async fn employee_page(
    state: &SharedState,
    caller: &Caller,
    filter: TaskFilter,
    query: &PageQuery,
) -> ApiResult<Json<Page<Task>>> {
    let employee_id = caller.require_employee("Only employees can view tasks")?.id;
    let pagination = Pagination::new(query, &state.config.pagination);
    let db = state.db.lock().await;
    let count = db.count_assigned_tasks(employee_id, filter)?;
    let results = db.list_assigned_tasks(employee_id, filter, pagination.window())?;
    Ok(Json(pagination.page(count, results)?))
}

/// GET /api/tasks
pub async fn list(
    State(state): State<SharedState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Task>>> {
    match &caller.role {
        Role::Manager { .. } => manager_page(&state, &caller, TaskFilter::All, &query).await,
        Role::Employee(_) => employee_page(&state, &caller, TaskFilter::All, &query).await,
        Role::Unknown => {
            let pagination = Pagination::new(&query, &state.config.pagination);
            Ok(Json(pagination.page(0, Vec::new())?))
        }
    }
}

/// POST /api/tasks
pub async fn create(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(body): ApiJson<TaskBody>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let manager_id = caller.require_manager("Only managers can create tasks")?;
    let title = required(body.title, "Title is required")?;
    let due_date = body
        .due_date
        .ok_or_else(|| ApiError::bad_request("Due date is required"))?;
    let assigned_to = body
        .assigned_to
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::bad_request(NO_ASSIGNEES))?;
    let priority = match body.priority.as_deref() {
        Some(raw) => parse_priority(raw)?,
        None => TaskPriority::default(),
    };
    let status = match body.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => TaskStatus::Pending,
    };

    let db = state.db.lock().await;
    check_assignees(&db, manager_id, &assigned_to)?;
    let id = db.create_task(&NewTask {
        manager_id,
        title: &title,
        description: body.description.as_deref().unwrap_or(""),
        due_date,
        priority,
        status,
        assigned_to: &assigned_to,
    })?;
    let task = db.get_task(id)?.ok_or_else(ApiError::not_found)?;

    tracing::info!(task_id = id, manager_id, assignees = assigned_to.len(), "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks/:id
pub async fn retrieve(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Task>> {
    let db = state.db.lock().await;
    Ok(Json(visible_task(&db, &caller, id)?))
}

/// PUT/PATCH /api/tasks/:id
///
/// Managers edit any field. Assignees may only move the status along the
/// transition table.
pub async fn update(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<TaskBody>,
) -> ApiResult<Json<Task>> {
    let db = state.db.lock().await;
    let task = visible_task(&db, &caller, id)?;

    match &caller.role {
        Role::Employee(employee) => {
            let raw = body
                .status
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| ApiError::bad_request("Status is required"))?;
            let next = raw
                .trim()
                .parse::<TaskStatus>()
                .ok()
                .filter(|next| task.status.can_transition_to(*next))
                .ok_or_else(|| {
                    ApiError::bad_request(format!(
                        "Invalid status transition from {} to {}",
                        task.status,
                        raw.trim()
                    ))
                })?;

            db.set_task_status(&task, next)?;
            tracing::info!(task_id = id, employee_id = employee.id, status = %next, "Task status changed");
        }
        _ => {
            if let Some(assigned_to) = &body.assigned_to {
                if assigned_to.is_empty() {
                    return Err(ApiError::bad_request(NO_ASSIGNEES));
                }
                check_assignees(&db, task.manager_id, assigned_to)?;
            }
            let changes = TaskChanges {
                title: body
                    .title
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
                description: body.description,
                due_date: body.due_date,
                priority: body.priority.as_deref().map(parse_priority).transpose()?,
                status: body.status.as_deref().map(parse_status).transpose()?,
                assigned_to: body.assigned_to,
            };
            db.update_task(id, &changes)?;
        }
    }

    let task = db.get_task(id)?.ok_or_else(ApiError::not_found)?;
    Ok(Json(task))
}

/// DELETE /api/tasks/:id
pub async fn destroy(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let manager_id = caller.require_manager("Only managers can delete tasks")?;
    let db = state.db.lock().await;
    db.get_manager_task(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    db.delete_task(id)?;
    tracing::info!(task_id = id, manager_id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/tasks/completed
pub async fn completed(
    State(state): State<SharedState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Task>>> {
    manager_page(&state, &caller, TaskFilter::Completed, &query).await
}

/// GET /api/tasks/pending
pub async fn pending(
    State(state): State<SharedState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Task>>> {
    manager_page(&state, &caller, TaskFilter::Active, &query).await
}

/// GET /api/tasks/overdue
pub async fn overdue(
    State(state): State<SharedState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Task>>> {
    manager_page(&state, &caller, TaskFilter::Overdue(today()), &query).await
}

/// GET /api/tasks/due/:period
pub async fn due(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(period): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Task>>> {
    let filter = TaskFilter::due_in_period(&period, today()).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Invalid period '{}'. Use day, week or month.",
            period
        ))
    })?;
    manager_page(&state, &caller, filter, &query).await
}

/// POST /api/tasks/:id/remind
pub async fn remind(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let manager_id = caller.require_manager(MANAGERS_ONLY)?;
    let db = state.db.lock().await;
    let task = db
        .get_manager_task(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    let sent = db.remind_assignees(&task)?;

    tracing::info!(task_id = id, sent, "Task reminders sent");
    Ok(Json(json!({ "detail": "Reminders sent successfully.", "sent": sent })))
}

/// GET /api/employee-tasks
pub async fn employee_tasks(
    State(state): State<SharedState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Task>>> {
    employee_page(&state, &caller, TaskFilter::All, &query).await
}

/// GET /api/employee-tasks/:status
pub async fn employee_tasks_by_status(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(status): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<Task>>> {
    let filter = TaskFilter::from_employee_view(&status).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Invalid filter '{}'. Use all, pending or completed.",
            status
        ))
    })?;
    employee_page(&state, &caller, filter, &query).await
}
