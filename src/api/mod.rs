//! HTTP API
//!
//! Every route lives under `/api` and speaks JSON. Handlers authenticate
//! through the [`Caller`](crate::auth::Caller) extractor, lock the database
//! for the duration of their store work, and return `ApiResult<Json<_>>`.

pub mod announcements;
pub mod auth;
pub mod employees;
pub mod notifications;
pub mod reports;
pub mod suggestions;
pub mod tasks;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::{Config, PaginationConfig};
use crate::db::{Database, Window};
use crate::error::ApiError;
use crate::mail::Mailer;

/// State shared across handlers
pub struct AppState {
    pub db: Mutex<Database>,
    pub mailer: Box<dyn Mailer>,
    pub config: Config,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: Database, mailer: Box<dyn Mailer>, config: Config) -> SharedState {
        Arc::new(Self {
            db: Mutex::new(db),
            mailer,
            config,
        })
    }
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Accounts
        .route("/api/signup", post(auth::signup))
        .route("/api/confirm-email", post(auth::confirm_email))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/change-password", post(auth::change_password))
        .route("/api/auth/user", get(auth::current_user))
        .route("/api/manager/set-summary-time", post(auth::set_summary_time))
        // Employees
        .route(
            "/api/employees",
            get(employees::list).post(employees::create),
        )
        .route(
            "/api/employees/:id",
            get(employees::retrieve)
                .put(employees::update)
                .patch(employees::update)
                .delete(employees::destroy),
        )
        // Reports
        .route("/api/reports", get(reports::list).post(reports::create))
        .route("/api/reports/unread", get(reports::unread))
        .route("/api/reports/seen-all", post(reports::mark_all_seen))
        .route(
            "/api/reports/:id",
            get(reports::retrieve)
                .patch(reports::update)
                .put(reports::update)
                .delete(reports::destroy),
        )
        .route("/api/reports/:id/attend", post(reports::attend))
        .route("/api/reports/:id/resolve", post(reports::resolve))
        .route("/api/reports/:id/seen", post(reports::mark_seen))
        // Suggestions
        .route(
            "/api/suggestions",
            get(suggestions::list).post(suggestions::create),
        )
        .route("/api/suggestions/status/:status", get(suggestions::by_status))
        .route(
            "/api/suggestions/:id",
            get(suggestions::retrieve)
                .patch(suggestions::update)
                .put(suggestions::update)
                .delete(suggestions::destroy),
        )
        // Tasks
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/completed", get(tasks::completed))
        .route("/api/tasks/pending", get(tasks::pending))
        .route("/api/tasks/overdue", get(tasks::overdue))
        .route("/api/tasks/due/:period", get(tasks::due))
        .route(
            "/api/tasks/:id",
            get(tasks::retrieve)
                .put(tasks::update)
                .patch(tasks::update)
                .delete(tasks::destroy),
        )
        .route("/api/tasks/:id/remind", post(tasks::remind))
        .route("/api/employee-tasks", get(tasks::employee_tasks))
        .route("/api/employee-tasks/:status", get(tasks::employee_tasks_by_status))
        // Announcements
        .route(
            "/api/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route(
            "/api/announcements/:id",
            get(announcements::retrieve)
                .put(announcements::update)
                .patch(announcements::update)
                .delete(announcements::destroy),
        )
        .route("/api/announcements/:id/mark_noted", post(announcements::mark_noted))
        .route(
            "/api/announcements/:id/noted_employees",
            get(announcements::noted_employees),
        )
        // Notifications
        .route("/api/notifications/count", get(notifications::count))
        .route("/api/notifications/reset", post(notifications::reset))
        .route("/api/notifications/read/:id", post(notifications::mark_read))
        .route(
            "/api/employee-notifications",
            get(notifications::employee_list),
        )
        .route(
            "/api/employee-notifications/:id",
            get(notifications::employee_retrieve)
                .patch(notifications::employee_update)
                .put(notifications::employee_update)
                .delete(notifications::employee_destroy),
        )
        // Health check
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

// --- Request bodies ---

/// `Json` whose rejections render as `{"error": ...}` with status 400.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// `Path` whose rejections render as `{"error": ...}` with status 400.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

/// `Query` whose rejections render as `{"error": ...}` with status 400.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

/// Trims a required text field, rejecting missing or blank values.
pub fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

// --- Pagination ---

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// A page of results: `next` and `previous` are page numbers.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    page: u32,
    size: u32,
}

impl Pagination {
    pub fn new(query: &PageQuery, config: &PaginationConfig) -> Self {
        let size = query
            .page_size
            .unwrap_or(config.page_size)
            .clamp(1, config.max_page_size.max(1));
        Self {
            page: query.page.unwrap_or(1).max(1),
            size,
        }
    }

    pub fn window(&self) -> Window {
        Window {
            limit: self.size as i64,
            offset: (self.page as i64 - 1) * self.size as i64,
        }
    }

    /// Page numbers past the last one are 404, except page 1 of an empty list.
    pub fn page<T>(&self, count: i64, results: Vec<T>) -> Result<Page<T>, ApiError> {
        if self.page > 1 && self.window().offset >= count {
            return Err(ApiError::NotFound("Invalid page.".to_string()));
        }
        Ok(Page {
            count,
            next: (self.window().offset + (self.size as i64) < count).then_some(self.page + 1),
            previous: (self.page > 1).then_some(self.page - 1),
            results,
        })
    }
}

#[cfg(test)]
mod tests;
