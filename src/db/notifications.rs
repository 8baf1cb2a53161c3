use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::models::{EmployeeNotification, ManagerNotification};

/// Which event a manager notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerNotificationKind {
    Report,
    Suggestion,
    Task,
}

impl ManagerNotificationKind {
    fn column(self) -> &'static str {
        match self {
            ManagerNotificationKind::Report => "report_id",
            ManagerNotificationKind::Suggestion => "suggestion_id",
            ManagerNotificationKind::Task => "task_id",
        }
    }
}

impl Database {
    // --- Manager notifications ---

    fn count_unread_manager(&self, manager_id: i64, kind: ManagerNotificationKind) -> Result<i64> {
        let count = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM manager_notifications
                 WHERE manager_id = ?1 AND is_read = 0 AND {} IS NOT NULL",
                kind.column()
            ),
            [manager_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_unread_suggestion_notifications(&self, manager_id: i64) -> Result<i64> {
        self.count_unread_manager(manager_id, ManagerNotificationKind::Suggestion)
    }

    pub fn count_unread_task_notifications_for_manager(&self, manager_id: i64) -> Result<i64> {
        self.count_unread_manager(manager_id, ManagerNotificationKind::Task)
    }

    pub fn list_unread_report_notifications(&self, manager_id: i64) -> Result<Vec<ManagerNotification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, manager_id, report_id, suggestion_id, task_id, is_read, created_at
             FROM manager_notifications
             WHERE manager_id = ?1 AND is_read = 0 AND report_id IS NOT NULL
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([manager_id], |row| {
            Ok(ManagerNotification {
                id: row.get(0)?,
                manager_id: row.get(1)?,
                report_id: row.get(2)?,
                suggestion_id: row.get(3)?,
                task_id: row.get(4)?,
                is_read: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Marks one of the manager's own notifications read. Returns false if it isn't theirs.
    pub fn mark_manager_notification_read(&self, manager_id: i64, id: i64) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE manager_notifications SET is_read = 1 WHERE id = ?1 AND manager_id = ?2",
            [id, manager_id],
        )?;
        Ok(updated > 0)
    }

    pub fn mark_manager_notifications_read(
        &self,
        manager_id: i64,
        kind: ManagerNotificationKind,
    ) -> Result<usize> {
        let updated = self.conn.execute(
            &format!(
                "UPDATE manager_notifications SET is_read = 1
                 WHERE manager_id = ?1 AND is_read = 0 AND {} IS NOT NULL",
                kind.column()
            ),
            [manager_id],
        )?;
        Ok(updated)
    }

    // --- Employee notifications ---

    pub fn count_unread_employee_notifications(&self, employee_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM employee_notifications WHERE employee_id = ?1 AND is_read = 0",
            [employee_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_unread_task_notifications_for_employee(&self, employee_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM employee_notifications
             WHERE employee_id = ?1 AND is_read = 0 AND task_id IS NOT NULL",
            [employee_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Unread notifications other than those pointing at a report the
    /// account has not seen yet. Those reports are already counted as unseen.
    pub fn count_unread_notifications_beyond_reports(
        &self,
        employee_id: i64,
        account_id: i64,
    ) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM employee_notifications n
             WHERE n.employee_id = ?1 AND n.is_read = 0
               AND (n.report_id IS NULL OR EXISTS (
                   SELECT 1 FROM report_seen s
                   WHERE s.report_id = n.report_id AND s.account_id = ?2))",
            [employee_id, account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn list_employee_notifications(&self, employee_id: i64) -> Result<Vec<EmployeeNotification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, employee_id, task_id, report_id, message, is_read, created_at
             FROM employee_notifications WHERE employee_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([employee_id], Self::row_to_employee_notification)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_employee_notification(
        &self,
        employee_id: i64,
        id: i64,
    ) -> Result<Option<EmployeeNotification>> {
        let notification = self
            .conn
            .query_row(
                "SELECT id, employee_id, task_id, report_id, message, is_read, created_at
                 FROM employee_notifications WHERE id = ?1 AND employee_id = ?2",
                [id, employee_id],
                Self::row_to_employee_notification,
            )
            .optional()?;
        Ok(notification)
    }

    pub fn set_employee_notification_read(&self, id: i64, is_read: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE employee_notifications SET is_read = ?1 WHERE id = ?2",
            params![is_read, id],
        )?;
        Ok(())
    }

    /// Marks the employee's notifications read; only task ones when `tasks_only`.
    pub fn mark_employee_notifications_read(&self, employee_id: i64, tasks_only: bool) -> Result<usize> {
        let mut sql = String::from(
            "UPDATE employee_notifications SET is_read = 1 WHERE employee_id = ?1 AND is_read = 0",
        );
        if tasks_only {
            sql.push_str(" AND task_id IS NOT NULL");
        }
        Ok(self.conn.execute(&sql, [employee_id])?)
    }

    pub fn delete_employee_notification(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM employee_notifications WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn row_to_employee_notification(row: &rusqlite::Row) -> rusqlite::Result<EmployeeNotification> {
        Ok(EmployeeNotification {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            task_id: row.get(2)?,
            report_id: row.get(3)?,
            message: row.get(4)?,
            is_read: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
