use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Status-like enums stored as TEXT columns and rendered as their upper-case
/// code. Variants given a label also get `display()` for the `*_display` fields.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => ($code:literal, $label:literal)),+ $(,)? }) => {
        text_enum!($name { $($variant => $code),+ });

        impl $name {
            pub fn display(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }
    };
    ($name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $code)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(ReportStatus {
    Pending => "PENDING",
    Attended => "ATTENDED",
    Resolved => "RESOLVED",
});

text_enum!(SuggestionStatus {
    Unread => "UNREAD",
    Read => "READ",
    Archived => "ARCHIVED",
});

text_enum!(TaskStatus {
    Pending => ("PENDING", "Pending"),
    InProgress => ("IN_PROGRESS", "In Progress"),
    Completed => ("COMPLETED", "Completed"),
});

text_enum!(TaskPriority {
    Low => ("LOW", "Low"),
    Medium => ("MEDIUM", "Medium"),
    High => ("HIGH", "High"),
});

impl ReportStatus {
    /// Reports only move forward: PENDING -> ATTENDED -> RESOLVED.
    pub fn can_advance_to(self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::Pending, ReportStatus::Attended)
                | (ReportStatus::Attended, ReportStatus::Resolved)
        )
    }
}

impl TaskStatus {
    /// Transitions an employee may submit. Managers are not bound by this.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::Completed, TaskStatus::InProgress)
        )
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    pub fn full_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerProfile {
    pub account_id: i64,
    pub company_name: String,
    pub phone_number: String,
    pub daily_summary_time: Option<NaiveTime>,
    pub last_seen_reports: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    #[serde(skip)]
    pub account_id: Option<i64>,
    #[serde(skip)]
    pub manager_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    #[serde(rename = "employee")]
    pub employee_id: i64,
    pub employee_name: String, // denormalized from employees
    pub employee_phone: String,
    #[serde(skip)]
    pub manager_id: i64,
    pub message: String,
    pub status: ReportStatus,
    pub attended_by: Option<i64>,
    pub attended_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attended_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub status: SuggestionStatus,
    #[serde(rename = "employee")]
    pub employee_id: Option<i64>,
    pub employee_name: Option<String>,
    #[serde(skip)]
    pub manager_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub assigned_to: Vec<i64>,
    pub assigned_to_names: Vec<String>,
    #[serde(rename = "manager")]
    pub manager_id: i64,
    pub manager_name: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub status_display: String,
    pub priority: TaskPriority,
    pub priority_display: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "manager")]
    pub manager_username: String,
    #[serde(skip)]
    pub manager_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub noted_by: Vec<i64>,
    pub noted_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerNotification {
    pub id: i64,
    #[serde(rename = "manager")]
    pub manager_id: i64,
    pub report_id: Option<i64>,
    pub suggestion_id: Option<i64>,
    pub task_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeNotification {
    pub id: i64,
    #[serde(rename = "employee")]
    pub employee_id: i64,
    #[serde(rename = "task")]
    pub task_id: Option<i64>,
    #[serde(rename = "report")]
    pub report_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// "First Last", or the fallback when both parts are blank.
pub fn display_name(first: &str, last: &str, fallback: &str) -> String {
    let full = format!("{} {}", first, last);
    let full = full.trim();
    if full.is_empty() {
        fallback.to_string()
    } else {
        full.to_string()
    }
}
