use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{now, Database};
use crate::models::{Account, ManagerProfile};

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, is_active, date_joined";

pub struct NewManager<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub company_name: &'a str,
    pub phone_number: &'a str,
    /// Confirmation code and its expiry, stored with the account
    pub confirmation_code: &'a str,
    pub confirmation_expires_at: DateTime<Utc>,
}

impl Database {
    // --- Account operations ---

    /// Creates an inactive account, its manager profile and the pending email
    /// confirmation in one transaction. Returns the account id.
    pub fn create_manager(&self, manager: &NewManager) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let created_at = now();
        tx.execute(
            "INSERT INTO accounts (username, email, password_hash, is_active, date_joined)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![manager.username, manager.email, manager.password_hash, created_at],
        )?;
        let account_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO manager_profiles (account_id, company_name, phone_number)
             VALUES (?1, ?2, ?3)",
            params![account_id, manager.company_name, manager.phone_number],
        )?;
        tx.execute(
            "INSERT INTO email_confirmations (account_id, code, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account_id,
                manager.confirmation_code,
                created_at,
                manager.confirmation_expires_at
            ],
        )?;
        tx.commit()?;
        Ok(account_id)
    }

    #[cfg(test)]
    pub(crate) fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS),
                [id],
                Self::row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE LOWER(email) = LOWER(?1)",
                    ACCOUNT_COLUMNS
                ),
                [email],
                Self::row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn username_taken(&self, username: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE LOWER(username) = LOWER(?1)",
            [username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE LOWER(email) = LOWER(?1)",
            [email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn set_password(&self, id: i64, password_hash: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(())
    }

    /// Removes an account and, through cascades, everything it owns.
    pub fn delete_account(&self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            is_active: row.get(6)?,
            date_joined: row.get(7)?,
        })
    }

    // --- Email confirmation ---

    /// Activates the account when `code` matches an unused confirmation that
    /// has not expired at `at`. Returns whether it matched.
    pub fn confirm_email(&self, account_id: i64, code: &str, at: DateTime<Utc>) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let confirmation: Option<i64> = tx
            .query_row(
                "SELECT id FROM email_confirmations
                 WHERE account_id = ?1 AND code = ?2 AND is_used = 0 AND expires_at > ?3
                 ORDER BY id DESC LIMIT 1",
                params![account_id, code, at],
                |row| row.get(0),
            )
            .optional()?;

        let Some(confirmation_id) = confirmation else {
            return Ok(false);
        };

        tx.execute("UPDATE accounts SET is_active = 1 WHERE id = ?1", [account_id])?;
        tx.execute(
            "UPDATE email_confirmations SET is_used = 1 WHERE id = ?1",
            [confirmation_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    // --- Tokens ---

    /// Returns the account's existing token, or stores `candidate` as a new one.
    pub fn issue_token(&self, account_id: i64, candidate: &str) -> Result<String> {
        self.conn.execute(
            "INSERT OR IGNORE INTO auth_tokens (key, account_id, created_at) VALUES (?1, ?2, ?3)",
            params![candidate, account_id, now()],
        )?;
        let key = self.conn.query_row(
            "SELECT key FROM auth_tokens WHERE account_id = ?1",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(key)
    }

    pub fn account_for_token(&self, key: &str) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                "SELECT a.id, a.username, a.email, a.password_hash, a.first_name, a.last_name,
                        a.is_active, a.date_joined
                 FROM auth_tokens t
                 JOIN accounts a ON a.id = t.account_id
                 WHERE t.key = ?1",
                [key],
                Self::row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn delete_token(&self, key: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM auth_tokens WHERE key = ?1", [key])?;
        Ok(deleted > 0)
    }

    // --- Manager profile ---

    pub fn get_manager_profile(&self, account_id: i64) -> Result<Option<ManagerProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT account_id, company_name, phone_number, daily_summary_time, last_seen_reports
                 FROM manager_profiles WHERE account_id = ?1",
                [account_id],
                |row| {
                    Ok(ManagerProfile {
                        account_id: row.get(0)?,
                        company_name: row.get(1)?,
                        phone_number: row.get(2)?,
                        daily_summary_time: row.get(3)?,
                        last_seen_reports: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn set_daily_summary_time(&self, account_id: i64, time: NaiveTime) -> Result<()> {
        self.conn.execute(
            "UPDATE manager_profiles SET daily_summary_time = ?1 WHERE account_id = ?2",
            params![time, account_id],
        )?;
        Ok(())
    }

    /// Stamps the "last seen reports" marker on whichever profile the account has.
    pub fn touch_last_seen_reports(&self, account_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE manager_profiles SET last_seen_reports = ?1 WHERE account_id = ?2",
            params![at, account_id],
        )?;
        self.conn.execute(
            "UPDATE employees SET last_seen_reports = ?1 WHERE account_id = ?2",
            params![at, account_id],
        )?;
        Ok(())
    }
}
