//! Credentials and request authentication.
//!
//! Passwords are stored as argon2id PHC strings. Each account holds at most
//! one opaque token; requests present it as `Authorization: Token <key>`
//! and the [`Caller`] extractor resolves it to the account and its role.

use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use rand::Rng;
use regex::Regex;

use crate::api::SharedState;
use crate::db::Database;
use crate::error::ApiError;
use crate::models::{Account, Employee};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// --- Passwords ---

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// --- Generated secrets ---

/// 40 hex characters.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Six decimal digits, never starting with zero.
pub fn confirmation_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

pub fn temporary_password(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

// --- Caller ---

#[derive(Debug, Clone)]
pub enum Role {
    Manager { company_name: String },
    Employee(Employee),
    Unknown,
}

/// The authenticated account behind a request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub token: String,
    pub account: Account,
    pub role: Role,
}

pub fn resolve_role(db: &Database, account: &Account) -> Result<Role> {
    if let Some(profile) = db.get_manager_profile(account.id)? {
        return Ok(Role::Manager {
            company_name: profile.company_name,
        });
    }
    if let Some(employee) = db.employee_for_account(account.id)? {
        return Ok(Role::Employee(employee));
    }
    Ok(Role::Unknown)
}

impl Role {
    pub fn user_type(&self) -> &'static str {
        match self {
            Role::Manager { .. } => "manager",
            Role::Employee(_) => "employee",
            Role::Unknown => "unknown",
        }
    }
}

impl Caller {
    pub fn is_manager(&self) -> bool {
        matches!(self.role, Role::Manager { .. })
    }

    pub fn employee(&self) -> Option<&Employee> {
        match &self.role {
            Role::Employee(employee) => Some(employee),
            _ => None,
        }
    }

    /// The caller's manager account id when the caller is a manager.
    pub fn require_manager(&self, message: &str) -> Result<i64, ApiError> {
        if self.is_manager() {
            Ok(self.account.id)
        } else {
            Err(ApiError::forbidden(message))
        }
    }

    pub fn require_employee(&self, message: &str) -> Result<&Employee, ApiError> {
        self.employee().ok_or_else(|| ApiError::forbidden(message))
    }

    /// The manager account that owns the caller's company.
    pub fn company_manager_id(&self) -> Option<i64> {
        match &self.role {
            Role::Manager { .. } => Some(self.account.id),
            Role::Employee(employee) => Some(employee.manager_id),
            Role::Unknown => None,
        }
    }

    pub fn require_company(&self) -> Result<i64, ApiError> {
        self.company_manager_id()
            .ok_or_else(|| ApiError::forbidden("You are not part of a company"))
    }
}

fn token_from_headers(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

    let (scheme, key) = value
        .split_once(' ')
        .ok_or_else(|| ApiError::Unauthorized("Invalid token header.".to_string()))?;
    let key = key.trim();
    if !(scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer"))
        || key.is_empty()
    {
        return Err(ApiError::Unauthorized("Invalid token header.".to_string()));
    }
    Ok(key)
}

#[async_trait]
impl FromRequestParts<SharedState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let key = token_from_headers(&parts.headers)?.to_string();

        let db = state.db.lock().await;
        let account = db
            .account_for_token(&key)?
            .filter(|a| a.is_active)
            .ok_or_else(|| ApiError::Unauthorized("Invalid token.".to_string()))?;
        let role = resolve_role(&db, &account)?;

        Ok(Caller {
            token: key,
            account,
            role,
        })
    }
}
