use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{required, ApiJson, SharedState};
use crate::auth::{self, resolve_role, Caller, Role};
use crate::db::{Database, NewManager};
use crate::error::{ApiError, ApiResult};
use crate::mail::confirmation_mail;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub user_id: Option<i64>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_type: &'static str,
    pub company_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryTimeRequest {
    pub time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_manager: bool,
    pub is_employee: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_profile_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

fn company_name(db: &Database, role: &Role) -> anyhow::Result<Option<String>> {
    match role {
        Role::Manager { company_name } => Ok(Some(company_name.clone())),
        Role::Employee(employee) => Ok(db
            .get_manager_profile(employee.manager_id)?
            .map(|p| p.company_name)),
        Role::Unknown => Ok(None),
    }
}

/// POST /api/signup
pub async fn signup(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    const MISSING: &str = "All fields are required";
    let username = required(req.username, MISSING)?;
    let email = required(req.email, MISSING)?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request(MISSING))?;
    let company = required(req.company_name, MISSING)?;
    let phone = required(req.phone_number, MISSING)?;

    if !auth::is_valid_email(&email) {
        return Err(ApiError::bad_request("Enter a valid email address."));
    }

    let password_hash = auth::hash_password(&password)?;
    let code = auth::confirmation_code();
    let ttl_hours = state.config.auth.confirmation_ttl_hours;

    let account_id = {
        let db = state.db.lock().await;
        if db.username_taken(&username)? {
            return Err(ApiError::bad_request("A user with that username already exists."));
        }
        if db.email_taken(&email)? {
            return Err(ApiError::bad_request("A user with that email already exists."));
        }
        db.create_manager(&NewManager {
            username: &username,
            email: &email,
            password_hash: &password_hash,
            company_name: &company,
            phone_number: &phone,
            confirmation_code: &code,
            confirmation_expires_at: Utc::now() + Duration::hours(ttl_hours),
        })?
    };

    let mail = confirmation_mail(&state.config.mail.from, &email, &code, ttl_hours);
    if let Err(e) = state.mailer.send(&mail).await {
        tracing::warn!(account_id, error = %e, "Confirmation email failed, removing account");
        state.db.lock().await.delete_account(account_id)?;
        return Err(ApiError::Mail(format!("{:#}", e)));
    }

    tracing::info!(account_id, username = %username, "Manager signed up");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Confirmation code sent to your email",
            "user_id": account_id,
        })),
    ))
}

/// POST /api/confirm-email
pub async fn confirm_email(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ConfirmRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(user_id), Some(code)) = (req.user_id, req.code.filter(|c| !c.trim().is_empty()))
    else {
        return Err(ApiError::bad_request("Both user_id and code are required"));
    };

    let db = state.db.lock().await;
    if !db.confirm_email(user_id, code.trim(), Utc::now())? {
        return Err(ApiError::bad_request("Invalid or expired code"));
    }

    tracing::info!(account_id = user_id, "Email confirmed");
    Ok(Json(json!({ "message": "Email confirmed successfully" })))
}

/// POST /api/login
pub async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    let db = state.db.lock().await;
    let account = db.get_account_by_email(email.trim())?.ok_or_else(invalid)?;

    if !account.is_active {
        return Err(ApiError::Unauthorized(
            "Account not activated. Please confirm your email.".to_string(),
        ));
    }
    if !auth::verify_password(&password, &account.password_hash)? {
        return Err(invalid());
    }

    let token = db.issue_token(account.id, &auth::generate_token())?;
    let role = resolve_role(&db, &account)?;
    let company_name = company_name(&db, &role)?.unwrap_or_default();

    tracing::debug!(account_id = account.id, user_type = role.user_type(), "Logged in");
    Ok(Json(LoginResponse {
        token,
        user_type: role.user_type(),
        company_name,
    }))
}

/// POST /api/logout
pub async fn logout(State(state): State<SharedState>, caller: Caller) -> ApiResult<Json<Value>> {
    let db = state.db.lock().await;
    db.delete_token(&caller.token)?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// GET /api/auth/user
pub async fn current_user(
    State(state): State<SharedState>,
    caller: Caller,
) -> ApiResult<Json<CurrentUser>> {
    let db = state.db.lock().await;
    Ok(Json(CurrentUser {
        id: caller.account.id,
        username: caller.account.username.clone(),
        is_manager: caller.is_manager(),
        is_employee: caller.employee().is_some(),
        employee_profile_id: caller.employee().map(|e| e.id),
        company_name: company_name(&db, &caller.role)?,
    }))
}

/// POST /api/change-password
pub async fn change_password(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(old), Some(new), Some(confirm)) = (
        req.old_password.filter(|p| !p.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
        req.confirm_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    if new != confirm {
        return Err(ApiError::bad_request("New passwords do not match"));
    }
    if !auth::verify_password(&old, &caller.account.password_hash)? {
        return Err(ApiError::bad_request("Incorrect old password"));
    }

    let hash = auth::hash_password(&new)?;
    let db = state.db.lock().await;
    db.set_password(caller.account.id, &hash)?;

    tracing::info!(account_id = caller.account.id, "Password changed");
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

/// POST /api/manager/set-summary-time
pub async fn set_summary_time(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(req): ApiJson<SummaryTimeRequest>,
) -> ApiResult<Json<Value>> {
    let manager_id = caller.require_manager("Only managers can set the summary time")?;
    let raw = required(req.time, "Missing \"time\" field.")?;
    let time = NaiveTime::parse_from_str(&raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
        .map_err(|_| ApiError::bad_request("Invalid time. Use HH:MM or HH:MM:SS."))?;

    let db = state.db.lock().await;
    db.set_daily_summary_time(manager_id, time)?;
    Ok(Json(json!({
        "detail": "Daily summary time updated successfully.",
        "daily_summary_time": time.format("%H:%M:%S").to_string(),
    })))
}
