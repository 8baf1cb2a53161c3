use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{required, ApiJson, ApiPath, SharedState};
use crate::auth::Caller;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{ManagerNotification, Report, ReportStatus};

#[derive(Debug, Deserialize)]
pub struct ReportBody {
    pub message: Option<String>,
}

/// An unread report notification with its report attached.
#[derive(Debug, Serialize)]
pub struct UnreadReport {
    #[serde(flatten)]
    pub notification: ManagerNotification,
    pub report: Option<Report>,
}

fn company_report(db: &Database, caller: &Caller, id: i64) -> ApiResult<Report> {
    let manager_id = caller.require_company()?;
    db.get_company_report(manager_id, id)?
        .ok_or_else(ApiError::not_found)
}

/// GET /api/reports
///
/// Listing marks every company report seen for the caller.
pub async fn list(State(state): State<SharedState>, caller: Caller) -> ApiResult<Json<Vec<Report>>> {
    let manager_id = caller.require_company()?;
    let db = state.db.lock().await;
    let reports = db.list_company_reports(manager_id)?;
    db.mark_all_reports_seen(caller.account.id, manager_id)?;
    db.touch_last_seen_reports(caller.account.id, Utc::now())?;
    Ok(Json(reports))
}

/// POST /api/reports
pub async fn create(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(body): ApiJson<ReportBody>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let employee = caller.require_employee("Only employees can create reports")?;
    let message = required(body.message, "Message is required")?;

    let db = state.db.lock().await;
    let id = db.create_report(employee.id, employee.manager_id, &message)?;
    let report = db.get_report(id)?.ok_or_else(ApiError::not_found)?;

    tracing::info!(report_id = id, employee_id = employee.id, "Report filed");
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/reports/:id
pub async fn retrieve(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Report>> {
    let db = state.db.lock().await;
    let report = company_report(&db, &caller, id)?;
    db.mark_report_seen(caller.account.id, report.id)?;
    Ok(Json(report))
}

/// PUT/PATCH /api/reports/:id
pub async fn update(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ReportBody>,
) -> ApiResult<Json<Report>> {
    let db = state.db.lock().await;
    let report = company_report(&db, &caller, id)?;
    if caller.employee().map(|e| e.id) != Some(report.employee_id) {
        return Err(ApiError::forbidden("You can only edit your own reports"));
    }
    let message = required(body.message, "Message is required")?;

    db.update_report_message(report.id, &message)?;
    let report = db.get_report(id)?.ok_or_else(ApiError::not_found)?;
    Ok(Json(report))
}

/// DELETE /api/reports/:id
pub async fn destroy(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let db = state.db.lock().await;
    let report = company_report(&db, &caller, id)?;
    let is_author = caller.employee().map(|e| e.id) == Some(report.employee_id);
    if !is_author && !caller.is_manager() {
        return Err(ApiError::forbidden(
            "Only the author or the manager can delete this report",
        ));
    }
    db.delete_report(report.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/reports/:id/attend
pub async fn attend(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Report>> {
    let db = state.db.lock().await;
    let report = company_report(&db, &caller, id)?;
    if !report.status.can_advance_to(ReportStatus::Attended) {
        return Err(ApiError::bad_request(format!(
            "Cannot attend a report that is {}",
            report.status
        )));
    }

    db.attend_report(&report, caller.account.id, &caller.account.full_name(), Utc::now())?;
    tracing::info!(report_id = id, account_id = caller.account.id, "Report attended");
    let report = db.get_report(id)?.ok_or_else(ApiError::not_found)?;
    Ok(Json(report))
}

/// POST /api/reports/:id/resolve
pub async fn resolve(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Report>> {
    let db = state.db.lock().await;
    let report = company_report(&db, &caller, id)?;
    if !report.status.can_advance_to(ReportStatus::Resolved) {
        return Err(ApiError::bad_request(format!(
            "Cannot resolve a report that is {}",
            report.status
        )));
    }

    db.resolve_report(&report, Utc::now())?;
    tracing::info!(report_id = id, account_id = caller.account.id, "Report resolved");
    let report = db.get_report(id)?.ok_or_else(ApiError::not_found)?;
    Ok(Json(report))
}

/// POST /api/reports/:id/seen
pub async fn mark_seen(
    State(state): State<SharedState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let db = state.db.lock().await;
    let report = company_report(&db, &caller, id)?;
    db.mark_report_seen(caller.account.id, report.id)?;
    Ok(Json(json!({ "status": "marked seen" })))
}

/// POST /api/reports/seen-all
pub async fn mark_all_seen(
    State(state): State<SharedState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    let manager_id = caller
        .company_manager_id()
        .ok_or_else(|| ApiError::bad_request("User type not recognized"))?;
    let db = state.db.lock().await;
    let marked = db.mark_all_reports_seen(caller.account.id, manager_id)?;
    db.touch_last_seen_reports(caller.account.id, Utc::now())?;
    Ok(Json(json!({ "status": "all reports marked seen", "marked": marked })))
}

/// GET /api/reports/unread
pub async fn unread(
    State(state): State<SharedState>,
    caller: Caller,
) -> ApiResult<Json<Vec<UnreadReport>>> {
    let manager_id = caller.require_manager("Only managers can view unread reports")?;
    let db = state.db.lock().await;
    let unread = db
        .list_unread_report_notifications(manager_id)?
        .into_iter()
        .map(|notification| {
            let report = match notification.report_id {
                Some(report_id) => db.get_report(report_id)?,
                None => None,
            };
            Ok(UnreadReport {
                notification,
                report,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(unread))
}
