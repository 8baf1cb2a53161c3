use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::{now, Database, Window};
use crate::models::{Announcement, Employee};

const ANNOUNCEMENT_SELECT: &str = "SELECT n.id, n.title, n.content, a.username, n.manager_id,
            n.created_at, n.updated_at
     FROM announcements n
     JOIN accounts a ON a.id = n.manager_id";

impl Database {
    // --- Announcement operations ---

    pub fn create_announcement(&self, manager_id: i64, title: &str, content: &str) -> Result<i64> {
        let created_at = now();
        self.conn.execute(
            "INSERT INTO announcements (manager_id, title, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![manager_id, title, content, created_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_announcement(&self, id: i64) -> Result<Option<Announcement>> {
        let announcement = self
            .conn
            .query_row(
                &format!("{} WHERE n.id = ?1", ANNOUNCEMENT_SELECT),
                [id],
                Self::row_to_announcement,
            )
            .optional()?;
        announcement.map(|a| self.with_noted_by(a)).transpose()
    }

    /// Looks up an announcement only if `manager_id` published it.
    pub fn get_company_announcement(&self, manager_id: i64, id: i64) -> Result<Option<Announcement>> {
        Ok(self.get_announcement(id)?.filter(|a| a.manager_id == manager_id))
    }

    pub fn list_announcements(&self, manager_id: i64, window: Window) -> Result<Vec<Announcement>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE n.manager_id = ?1 ORDER BY n.created_at DESC, n.id DESC LIMIT ?2 OFFSET ?3",
            ANNOUNCEMENT_SELECT
        ))?;
        let rows = stmt.query_map(
            params![manager_id, window.limit, window.offset],
            Self::row_to_announcement,
        )?;
        let announcements = rows.collect::<Result<Vec<_>, _>>()?;
        announcements
            .into_iter()
            .map(|a| self.with_noted_by(a))
            .collect()
    }

    pub fn count_announcements(&self, manager_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM announcements WHERE manager_id = ?1",
            [manager_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn update_announcement(
        &self,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE announcements SET
                title = COALESCE(?1, title),
                content = COALESCE(?2, content),
                updated_at = ?3
             WHERE id = ?4",
            params![title, content, now(), id],
        )?;
        Ok(())
    }

    pub fn delete_announcement(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM announcements WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    // --- Noted set ---

    /// Adds the employee to the noted set. Returns false if they had already noted it.
    pub fn mark_announcement_noted(&self, announcement_id: i64, employee_id: i64) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO announcement_noted (announcement_id, employee_id, noted_at)
             VALUES (?1, ?2, ?3)",
            params![announcement_id, employee_id, now()],
        )?;
        Ok(inserted > 0)
    }

    pub fn note_all_announcements(&self, employee_id: i64, manager_id: i64) -> Result<usize> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO announcement_noted (announcement_id, employee_id, noted_at)
             SELECT id, ?1, ?2 FROM announcements WHERE manager_id = ?3",
            params![employee_id, now(), manager_id],
        )?;
        Ok(inserted)
    }

    pub fn count_unnoted_announcements(&self, employee_id: i64, manager_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM announcements n
             WHERE n.manager_id = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM announcement_noted x
                   WHERE x.announcement_id = n.id AND x.employee_id = ?2
               )",
            [manager_id, employee_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn noted_employees(&self, announcement_id: i64) -> Result<Vec<Employee>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.account_id, e.manager_id, e.first_name, e.last_name, e.email, e.role,
                    e.phone_number
             FROM announcement_noted x
             JOIN employees e ON e.id = x.employee_id
             WHERE x.announcement_id = ?1
             ORDER BY e.last_name, e.first_name, e.id",
        )?;
        let rows = stmt.query_map([announcement_id], Self::row_to_employee)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn with_noted_by(&self, mut announcement: Announcement) -> Result<Announcement> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT employee_id FROM announcement_noted WHERE announcement_id = ?1 ORDER BY employee_id",
        )?;
        let rows = stmt.query_map([announcement.id], |row| row.get(0))?;
        announcement.noted_by = rows.collect::<Result<Vec<i64>, _>>()?;
        announcement.noted_count = announcement.noted_by.len();
        Ok(announcement)
    }

    fn row_to_announcement(row: &rusqlite::Row) -> rusqlite::Result<Announcement> {
        Ok(Announcement {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            manager_username: row.get(3)?,
            manager_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            noted_by: Vec::new(),
            noted_count: 0,
        })
    }
}
