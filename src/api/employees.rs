use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{required, ApiJson, ApiPath, ApiQuery, Page, PageQuery, Pagination, SharedState};
use crate::auth::{self, Caller};
use crate::db::{Database, EmployeeChanges, NewEmployee, TaskFilter, Window};
use crate::error::{ApiError, ApiResult};
use crate::models::{Employee, Task};

const MANAGERS_ONLY: &str = "Only managers can manage employees";

#[derive(Debug, Deserialize)]
pub struct CreateEmployee {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
}

/// An employee with the tasks assigned to them.
#[derive(Debug, Serialize)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

/// Employee logins use the email as username, so both columns must be free.
fn login_taken(db: &Database, email: &str) -> anyhow::Result<bool> {
    Ok(db.email_taken(email)? || db.username_taken(email)?)
}

fn view(db: &Database, employee: Employee) -> anyhow::Result<EmployeeView> {
    let tasks = db.list_assigned_tasks(employee.id, TaskFilter::All, Window::all())?;
    Ok(EmployeeView {
        employee,
        tasks,
        temporary_password: None,
    })
}

/// GET /api/employees
pub async fn list(
    State(state): State<SharedState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<EmployeeView>>> {
    let manager_id = caller.require_manager(MANAGERS_ONLY)?;
    let pagination = Pagination::new(&query, &state.config.pagination);

    let db = state.db.lock().await;
    let count = db.count_employees(manager_id)?;
    let results = db
        .list_employees(manager_id, pagination.window())?
        .into_iter()
        .map(|e| view(&db, e))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(pagination.page(count, results)?))
}

/// POST /api/employees
pub async fn create(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(req): ApiJson<CreateEmployee>,
) -> ApiResult<(StatusCode, Json<EmployeeView>)> {
    let manager_id = caller.require_manager(MANAGERS_ONLY)?;
    let first_name = required(req.first_name, "first_name is required")?;
    let last_name = required(req.last_name, "last_name is required")?;
    let email = required(req.email, "email is required")?;
    if !auth::is_valid_email(&email) {
        return Err(ApiError::bad_request("Enter a valid email address."));
    }

    let password = match req.password.filter(|p| !p.is_empty()) {
        Some(p) => p,
        None => auth::temporary_password(state.config.auth.temporary_password_length),
    };
    let password_hash = auth::hash_password(&password)?;

    let db = state.db.lock().await;
    if login_taken(&db, &email)? {
        return Err(ApiError::bad_request("A user with that email already exists."));
    }
    let id = db.create_employee(&NewEmployee {
        manager_id,
        first_name: &first_name,
        last_name: &last_name,
        email: &email,
        role: req.role.as_deref().unwrap_or("").trim(),
        phone_number: req.phone_number.as_deref().unwrap_or("").trim(),
        password_hash: &password_hash,
    })?;
    let employee = db.get_employee(id)?.ok_or_else(ApiError::not_found)?;

    tracing::info!(manager_id, employee_id = id, "Employee created");
    let mut created = view(&db, employee)?;
    created.temporary_password = Some(password);
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/employees/:id
pub async fn retrieve(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<EmployeeView>> {
    let manager_id = caller.require_manager(MANAGERS_ONLY)?;
    let db = state.db.lock().await;
    let employee = db
        .get_employee_for_manager(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(view(&db, employee)?))
}

/// PUT/PATCH /api/employees/:id
pub async fn update(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
    ApiJson(changes): ApiJson<EmployeeChanges>,
) -> ApiResult<Json<EmployeeView>> {
    let manager_id = caller.require_manager(MANAGERS_ONLY)?;
    let db = state.db.lock().await;
    let current = db
        .get_employee_for_manager(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;

    if let Some(email) = &changes.email {
        if !auth::is_valid_email(email) {
            return Err(ApiError::bad_request("Enter a valid email address."));
        }
        if !email.eq_ignore_ascii_case(&current.email) && login_taken(&db, email)? {
            return Err(ApiError::bad_request("A user with that email already exists."));
        }
    }

    db.update_employee(id, &changes)?;
    let employee = db.get_employee(id)?.ok_or_else(ApiError::not_found)?;
    Ok(Json(view(&db, employee)?))
}

/// DELETE /api/employees/:id
pub async fn destroy(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let manager_id = caller.require_manager(MANAGERS_ONLY)?;
    let db = state.db.lock().await;
    let employee = db
        .get_employee_for_manager(manager_id, id)?
        .ok_or_else(ApiError::not_found)?;
    db.delete_employee(employee.id)?;

    tracing::info!(
        manager_id,
        employee_id = id,
        account_id = ?employee.account_id,
        "Employee deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
