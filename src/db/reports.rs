use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{now, Database};
use crate::models::{display_name, Report, ReportStatus};

const REPORT_SELECT: &str = "SELECT r.id, r.employee_id, e.first_name || ' ' || e.last_name,
            e.phone_number, e.manager_id, r.message, r.status, r.attended_by,
            a.first_name, a.last_name, a.username, r.created_at, r.attended_at, r.resolved_at
     FROM reports r
     JOIN employees e ON e.id = r.employee_id
     LEFT JOIN accounts a ON a.id = r.attended_by";

impl Database {
    // --- Report operations ---

    /// Files a report and fans out notifications: the manager gets a report
    /// notification, every other employee of the company an employee one.
    pub fn create_report(&self, employee_id: i64, manager_id: i64, message: &str) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let created_at = now();
        tx.execute(
            "INSERT INTO reports (employee_id, message, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![employee_id, message, ReportStatus::Pending, created_at],
        )?;
        let report_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO manager_notifications (manager_id, report_id, created_at) VALUES (?1, ?2, ?3)",
            params![manager_id, report_id, created_at],
        )?;
        tx.execute(
            "INSERT INTO employee_notifications (employee_id, report_id, message, created_at)
             SELECT id, ?1, ?2, ?3 FROM employees WHERE manager_id = ?4 AND id != ?5",
            params![
                report_id,
                format!("New report: {}", excerpt(message)),
                created_at,
                manager_id,
                employee_id
            ],
        )?;
        tx.commit()?;
        Ok(report_id)
    }

    pub fn get_report(&self, id: i64) -> Result<Option<Report>> {
        let report = self
            .conn
            .query_row(
                &format!("{} WHERE r.id = ?1", REPORT_SELECT),
                [id],
                Self::row_to_report,
            )
            .optional()?;
        Ok(report)
    }

    /// Looks up a report only if its author works for `manager_id`.
    pub fn get_company_report(&self, manager_id: i64, id: i64) -> Result<Option<Report>> {
        let report = self
            .conn
            .query_row(
                &format!("{} WHERE r.id = ?1 AND e.manager_id = ?2", REPORT_SELECT),
                [id, manager_id],
                Self::row_to_report,
            )
            .optional()?;
        Ok(report)
    }

    /// Every report filed by the company's employees, newest first.
    pub fn list_company_reports(&self, manager_id: i64) -> Result<Vec<Report>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE e.manager_id = ?1 ORDER BY r.created_at DESC, r.id DESC",
            REPORT_SELECT
        ))?;
        let rows = stmt.query_map([manager_id], Self::row_to_report)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_report_message(&self, id: i64, message: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE reports SET message = ?1 WHERE id = ?2",
            params![message, id],
        )?;
        Ok(())
    }

    pub fn delete_report(&self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM reports WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Marks the report ATTENDED by `actor_account_id` and notifies the company.
    pub fn attend_report(
        &self,
        report: &Report,
        actor_account_id: i64,
        actor_name: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE reports SET status = ?1, attended_by = ?2, attended_at = ?3 WHERE id = ?4",
            params![ReportStatus::Attended, actor_account_id, at, report.id],
        )?;
        tx.execute(
            "INSERT INTO employee_notifications (employee_id, report_id, message, created_at)
             SELECT id, ?1, ?2, ?3 FROM employees WHERE manager_id = ?4",
            params![
                report.id,
                format!("Report attended by {}", actor_name),
                at,
                report.manager_id
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Marks the report RESOLVED and notifies the company.
    pub fn resolve_report(&self, report: &Report, at: DateTime<Utc>) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE reports SET status = ?1, resolved_at = ?2 WHERE id = ?3",
            params![ReportStatus::Resolved, at, report.id],
        )?;
        tx.execute(
            "INSERT INTO employee_notifications (employee_id, report_id, message, created_at)
             SELECT id, ?1, ?2, ?3 FROM employees WHERE manager_id = ?4",
            params![
                report.id,
                format!("Report resolved: {}", excerpt(&report.message)),
                at,
                report.manager_id
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    // --- Seen markers ---

    /// Idempotent: at most one marker exists per (account, report).
    pub fn mark_report_seen(&self, account_id: i64, report_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO report_seen (account_id, report_id, seen_at) VALUES (?1, ?2, ?3)",
            params![account_id, report_id, now()],
        )?;
        Ok(())
    }

    /// Marks every company report seen for the account. Returns how many were new.
    pub fn mark_all_reports_seen(&self, account_id: i64, manager_id: i64) -> Result<usize> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO report_seen (account_id, report_id, seen_at)
             SELECT ?1, r.id, ?2 FROM reports r
             JOIN employees e ON e.id = r.employee_id
             WHERE e.manager_id = ?3",
            params![account_id, now(), manager_id],
        )?;
        Ok(inserted)
    }

    pub fn count_unseen_reports(&self, account_id: i64, manager_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM reports r
             JOIN employees e ON e.id = r.employee_id
             WHERE e.manager_id = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM report_seen s WHERE s.report_id = r.id AND s.account_id = ?2
               )",
            [manager_id, account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn seen_marker_count(&self, account_id: i64, report_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM report_seen WHERE account_id = ?1 AND report_id = ?2",
            [account_id, report_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<Report> {
        let attended_by: Option<i64> = row.get(7)?;
        let attended_by_name = match attended_by {
            Some(_) => {
                let first: String = row.get(8)?;
                let last: String = row.get(9)?;
                let username: String = row.get(10)?;
                Some(display_name(&first, &last, &username))
            }
            None => None,
        };
        Ok(Report {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            employee_name: row.get(2)?,
            employee_phone: row.get(3)?,
            manager_id: row.get(4)?,
            message: row.get(5)?,
            status: row.get(6)?,
            attended_by,
            attended_by_name,
            created_at: row.get(11)?,
            attended_at: row.get(12)?,
            resolved_at: row.get(13)?,
        })
    }
}

/// First 50 characters of a message, for notification text.
fn excerpt(message: &str) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(50).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
