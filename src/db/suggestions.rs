use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::{now, Database};
use crate::models::{Suggestion, SuggestionStatus};

const SUGGESTION_SELECT: &str = "SELECT s.id, s.message, s.created_at, s.status, s.employee_id,
            e.first_name || ' ' || e.last_name, s.manager_id
     FROM suggestions s
     LEFT JOIN employees e ON e.id = s.employee_id";

impl Database {
    // --- Suggestion operations ---

    /// Stores the suggestion for the employee's manager and queues a manager notification.
    pub fn create_suggestion(&self, employee_id: i64, manager_id: i64, message: &str) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let created_at = now();
        tx.execute(
            "INSERT INTO suggestions (manager_id, employee_id, message, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![manager_id, employee_id, message, SuggestionStatus::Unread, created_at],
        )?;
        let suggestion_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO manager_notifications (manager_id, suggestion_id, created_at) VALUES (?1, ?2, ?3)",
            params![manager_id, suggestion_id, created_at],
        )?;
        tx.commit()?;
        Ok(suggestion_id)
    }

    pub fn get_suggestion(&self, id: i64) -> Result<Option<Suggestion>> {
        let suggestion = self
            .conn
            .query_row(
                &format!("{} WHERE s.id = ?1", SUGGESTION_SELECT),
                [id],
                Self::row_to_suggestion,
            )
            .optional()?;
        Ok(suggestion)
    }

    pub fn list_manager_suggestions(
        &self,
        manager_id: i64,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>> {
        self.query_suggestions("s.manager_id = ?1", manager_id, status)
    }

    pub fn list_employee_suggestions(
        &self,
        employee_id: i64,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>> {
        self.query_suggestions("s.employee_id = ?1", employee_id, status)
    }

    fn query_suggestions(
        &self,
        owner_clause: &str,
        owner_id: i64,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>> {
        let mut sql = format!("{} WHERE {}", SUGGESTION_SELECT, owner_clause);
        if status.is_some() {
            sql.push_str(" AND s.status = ?2");
        }
        sql.push_str(" ORDER BY s.created_at DESC, s.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match status {
            Some(s) => stmt.query_map(params![owner_id, s], Self::row_to_suggestion)?,
            None => stmt.query_map([owner_id], Self::row_to_suggestion)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_suggestion_status(&self, id: i64, status: SuggestionStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE suggestions SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        Ok(())
    }

    pub fn delete_suggestion(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM suggestions WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn row_to_suggestion(row: &rusqlite::Row) -> rusqlite::Result<Suggestion> {
        Ok(Suggestion {
            id: row.get(0)?,
            message: row.get(1)?,
            created_at: row.get(2)?,
            status: row.get(3)?,
            employee_id: row.get(4)?,
            employee_name: row.get(5)?,
            manager_id: row.get(6)?,
        })
    }
}
