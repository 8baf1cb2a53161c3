use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use super::{now, Database, Window};
use crate::models::{display_name, Task, TaskPriority, TaskStatus};

const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.manager_id,
            a.first_name, a.last_name, a.username,
            t.due_date, t.status, t.priority, t.created_at, t.completed_at
     FROM tasks t
     JOIN accounts a ON a.id = t.manager_id";

pub struct NewTask<'a> {
    pub manager_id: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub due_date: NaiveDate,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_to: &'a [i64],
}

/// Partial update; `None` leaves the field alone.
#[derive(Debug, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    /// PENDING or IN_PROGRESS
    Active,
    Completed,
    /// Due before the given day and not completed
    Overdue(NaiveDate),
    DueBetween(NaiveDate, NaiveDate),
}

impl TaskFilter {
    /// `day`, `week` (Monday to Sunday) or `month`, relative to `today`.
    pub fn due_in_period(period: &str, today: NaiveDate) -> Option<TaskFilter> {
        match period {
            "day" => Some(TaskFilter::DueBetween(today, today)),
            "week" => {
                let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
                Some(TaskFilter::DueBetween(start, start + Duration::days(6)))
            }
            "month" => {
                let start = today.with_day(1)?;
                let next_month = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)?
                };
                Some(TaskFilter::DueBetween(start, next_month.pred_opt()?))
            }
            _ => None,
        }
    }

    /// Employee-facing filter names: `all`, `pending`, `completed`.
    pub fn from_employee_view(view: &str) -> Option<TaskFilter> {
        match view {
            "all" => Some(TaskFilter::All),
            "pending" => Some(TaskFilter::Active),
            "completed" => Some(TaskFilter::Completed),
            _ => None,
        }
    }

    fn clause(&self, params: &mut Vec<Value>) -> Option<String> {
        match self {
            TaskFilter::All => None,
            TaskFilter::Active => Some("t.status IN ('PENDING', 'IN_PROGRESS')".to_string()),
            TaskFilter::Completed => Some("t.status = 'COMPLETED'".to_string()),
            TaskFilter::Overdue(today) => {
                params.push(date_value(*today));
                Some(format!(
                    "t.due_date < ?{} AND t.status != 'COMPLETED'",
                    params.len()
                ))
            }
            TaskFilter::DueBetween(start, end) => {
                params.push(date_value(*start));
                params.push(date_value(*end));
                Some(format!(
                    "t.due_date BETWEEN ?{} AND ?{}",
                    params.len() - 1,
                    params.len()
                ))
            }
        }
    }
}

fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Whose tasks a listing covers.
#[derive(Debug, Clone, Copy)]
enum TaskOwner {
    Manager(i64),
    Assignee(i64),
}

impl Database {
    // --- Task operations ---

    /// Creates the task, its assignments, and a notification for each assignee.
    pub fn create_task(&self, task: &NewTask) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let created_at = now();
        let completed_at = (task.status == TaskStatus::Completed).then_some(created_at);
        tx.execute(
            "INSERT INTO tasks (manager_id, title, description, due_date, status, priority, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                task.manager_id,
                task.title,
                task.description,
                task.due_date,
                task.status,
                task.priority,
                created_at,
                completed_at
            ],
        )?;
        let task_id = tx.last_insert_rowid();

        Self::assign(&tx, task_id, task.title, &unique_ids(task.assigned_to), &[])?;
        tx.commit()?;
        Ok(task_id)
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("{} WHERE t.id = ?1", TASK_SELECT),
                [id],
                Self::row_to_task,
            )
            .optional()?;
        task.map(|t| self.with_assignees(t)).transpose()
    }

    pub fn get_manager_task(&self, manager_id: i64, id: i64) -> Result<Option<Task>> {
        Ok(self.get_task(id)?.filter(|t| t.manager_id == manager_id))
    }

    pub fn get_assigned_task(&self, employee_id: i64, id: i64) -> Result<Option<Task>> {
        Ok(self
            .get_task(id)?
            .filter(|t| t.assigned_to.contains(&employee_id)))
    }

    pub fn list_manager_tasks(
        &self,
        manager_id: i64,
        filter: TaskFilter,
        window: Window,
    ) -> Result<Vec<Task>> {
        self.query_tasks(TaskOwner::Manager(manager_id), filter, window)
    }

    pub fn count_manager_tasks(&self, manager_id: i64, filter: TaskFilter) -> Result<i64> {
        self.count_tasks(TaskOwner::Manager(manager_id), filter)
    }

    pub fn list_assigned_tasks(
        &self,
        employee_id: i64,
        filter: TaskFilter,
        window: Window,
    ) -> Result<Vec<Task>> {
        self.query_tasks(TaskOwner::Assignee(employee_id), filter, window)
    }

    pub fn count_assigned_tasks(&self, employee_id: i64, filter: TaskFilter) -> Result<i64> {
        self.count_tasks(TaskOwner::Assignee(employee_id), filter)
    }

    fn task_where(owner: TaskOwner, filter: TaskFilter) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut clauses = Vec::new();
        match owner {
            TaskOwner::Manager(id) => {
                params.push(Value::Integer(id));
                clauses.push("t.manager_id = ?1".to_string());
            }
            TaskOwner::Assignee(id) => {
                params.push(Value::Integer(id));
                clauses.push(
                    "t.id IN (SELECT task_id FROM task_assignees WHERE employee_id = ?1)"
                        .to_string(),
                );
            }
        }
        if let Some(clause) = filter.clause(&mut params) {
            clauses.push(clause);
        }
        (clauses.join(" AND "), params)
    }

    fn query_tasks(&self, owner: TaskOwner, filter: TaskFilter, window: Window) -> Result<Vec<Task>> {
        let (clause, mut params) = Self::task_where(owner, filter);
        params.push(Value::Integer(window.limit));
        params.push(Value::Integer(window.offset));
        let sql = format!(
            "{} WHERE {} ORDER BY t.created_at DESC, t.id DESC LIMIT ?{} OFFSET ?{}",
            TASK_SELECT,
            clause,
            params.len() - 1,
            params.len()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), Self::row_to_task)?;
        let tasks = rows.collect::<Result<Vec<_>, _>>()?;
        tasks.into_iter().map(|t| self.with_assignees(t)).collect()
    }

    fn count_tasks(&self, owner: TaskOwner, filter: TaskFilter) -> Result<i64> {
        let (clause, params) = Self::task_where(owner, filter);
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM tasks t WHERE {}", clause),
            params_from_iter(params),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Applies a manager's edit. `completed_at` follows the status.
    pub fn update_task(&self, id: i64, changes: &TaskChanges) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE tasks SET
                title = COALESCE(?1, title),
                description = COALESCE(?2, description),
                due_date = COALESCE(?3, due_date),
                priority = COALESCE(?4, priority)
             WHERE id = ?5",
            params![
                changes.title,
                changes.description,
                changes.due_date,
                changes.priority,
                id
            ],
        )?;
        if let Some(status) = changes.status {
            Self::write_status(&tx, id, status)?;
        }
        if let Some(assigned_to) = &changes.assigned_to {
            let previous = {
                let mut stmt = tx.prepare("SELECT employee_id FROM task_assignees WHERE task_id = ?1")?;
                let ids = stmt.query_map([id], |row| row.get(0))?;
                ids.collect::<Result<Vec<i64>, _>>()?
            };
            let title: String =
                tx.query_row("SELECT title FROM tasks WHERE id = ?1", [id], |row| row.get(0))?;
            tx.execute("DELETE FROM task_assignees WHERE task_id = ?1", [id])?;
            Self::assign(&tx, id, &title, &unique_ids(assigned_to), &previous)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Links each employee to the task. Those not in `already_notified` get
    /// a new-task notification.
    fn assign(
        conn: &rusqlite::Connection,
        task_id: i64,
        title: &str,
        employee_ids: &[i64],
        already_notified: &[i64],
    ) -> Result<()> {
        let message = format!("New task assigned: {}", title);
        let created_at = now();
        for employee_id in employee_ids {
            conn.execute(
                "INSERT OR IGNORE INTO task_assignees (task_id, employee_id) VALUES (?1, ?2)",
                params![task_id, employee_id],
            )?;
            if !already_notified.contains(employee_id) {
                conn.execute(
                    "INSERT INTO employee_notifications (employee_id, task_id, message, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![employee_id, task_id, message, created_at],
                )?;
            }
        }
        Ok(())
    }

    /// Status change submitted by an assignee. Completing the task notifies its manager.
    pub fn set_task_status(&self, task: &Task, status: TaskStatus) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_status(&tx, task.id, status)?;
        if status == TaskStatus::Completed {
            tx.execute(
                "INSERT INTO manager_notifications (manager_id, task_id, created_at) VALUES (?1, ?2, ?3)",
                params![task.manager_id, task.id, now()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn write_status(conn: &rusqlite::Connection, id: i64, status: TaskStatus) -> Result<()> {
        conn.execute(
            "UPDATE tasks SET
                status = ?1,
                completed_at = CASE WHEN ?1 = 'COMPLETED' THEN COALESCE(completed_at, ?2) ELSE NULL END
             WHERE id = ?3",
            params![status, now(), id],
        )?;
        Ok(())
    }

    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Sends every assignee a reminder notification. Returns how many were sent.
    pub fn remind_assignees(&self, task: &Task) -> Result<usize> {
        let sent = self.conn.execute(
            "INSERT INTO employee_notifications (employee_id, task_id, message, created_at)
             SELECT employee_id, task_id, ?1, ?2 FROM task_assignees WHERE task_id = ?3",
            params![
                format!("Reminder: Task '{}' is due on {}", task.title, task.due_date),
                now(),
                task.id
            ],
        )?;
        Ok(sent)
    }

    fn with_assignees(&self, mut task: Task) -> Result<Task> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT e.id, e.first_name || ' ' || e.last_name
             FROM task_assignees ta
             JOIN employees e ON e.id = ta.employee_id
             WHERE ta.task_id = ?1
             ORDER BY e.id",
        )?;
        let rows = stmt.query_map([task.id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (id, name) = row?;
            task.assigned_to.push(id);
            task.assigned_to_names.push(name);
        }
        Ok(task)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let first: String = row.get(4)?;
        let last: String = row.get(5)?;
        let username: String = row.get(6)?;
        let status: TaskStatus = row.get(8)?;
        let priority: TaskPriority = row.get(9)?;
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            assigned_to: Vec::new(),
            assigned_to_names: Vec::new(),
            manager_id: row.get(3)?,
            manager_name: display_name(&first, &last, &username),
            due_date: row.get(7)?,
            status,
            status_display: status.display().to_string(),
            priority,
            priority_display: priority.display().to_string(),
            created_at: row.get(10)?,
            completed_at: row.get(11)?,
        })
    }
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}
