use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use super::{now, Database, Window};
use crate::models::Employee;

const EMPLOYEE_COLUMNS: &str =
    "id, account_id, manager_id, first_name, last_name, email, role, phone_number";

pub struct NewEmployee<'a> {
    pub manager_id: i64,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub role: &'a str,
    pub phone_number: &'a str,
    pub password_hash: &'a str,
}

/// Partial update; `None` leaves the column alone.
#[derive(Debug, Default, Deserialize)]
pub struct EmployeeChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub phone_number: Option<String>,
}

impl Database {
    // --- Employee operations ---

    /// Creates the employee's login account (already active, username = email)
    /// and the employee row under its manager. Returns the employee id.
    pub fn create_employee(&self, employee: &NewEmployee) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO accounts (username, email, password_hash, first_name, last_name, is_active, date_joined)
             VALUES (?1, ?1, ?2, ?3, ?4, 1, ?5)",
            params![
                employee.email,
                employee.password_hash,
                employee.first_name,
                employee.last_name,
                now()
            ],
        )?;
        let account_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO employees (account_id, manager_id, first_name, last_name, email, role, phone_number)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account_id,
                employee.manager_id,
                employee.first_name,
                employee.last_name,
                employee.email,
                employee.role,
                employee.phone_number
            ],
        )?;
        let employee_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(employee_id)
    }

    pub fn get_employee(&self, id: i64) -> Result<Option<Employee>> {
        let employee = self
            .conn
            .query_row(
                &format!("SELECT {} FROM employees WHERE id = ?1", EMPLOYEE_COLUMNS),
                [id],
                Self::row_to_employee,
            )
            .optional()?;
        Ok(employee)
    }

    /// Looks up an employee only if it belongs to `manager_id`.
    pub fn get_employee_for_manager(&self, manager_id: i64, id: i64) -> Result<Option<Employee>> {
        let employee = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM employees WHERE id = ?1 AND manager_id = ?2",
                    EMPLOYEE_COLUMNS
                ),
                [id, manager_id],
                Self::row_to_employee,
            )
            .optional()?;
        Ok(employee)
    }

    pub fn employee_for_account(&self, account_id: i64) -> Result<Option<Employee>> {
        let employee = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM employees WHERE account_id = ?1",
                    EMPLOYEE_COLUMNS
                ),
                [account_id],
                Self::row_to_employee,
            )
            .optional()?;
        Ok(employee)
    }

    pub fn list_employees(&self, manager_id: i64, window: Window) -> Result<Vec<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM employees WHERE manager_id = ?1
             ORDER BY last_name, first_name, id
             LIMIT ?2 OFFSET ?3",
            EMPLOYEE_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![manager_id, window.limit, window.offset],
            Self::row_to_employee,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_employees(&self, manager_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM employees WHERE manager_id = ?1",
            [manager_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Applies the changes to the employee row and mirrors names and email
    /// onto its login account.
    pub fn update_employee(&self, id: i64, changes: &EmployeeChanges) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE employees SET
                first_name = COALESCE(?1, first_name),
                last_name = COALESCE(?2, last_name),
                email = COALESCE(?3, email),
                role = COALESCE(?4, role),
                phone_number = COALESCE(?5, phone_number)
             WHERE id = ?6",
            params![
                changes.first_name,
                changes.last_name,
                changes.email,
                changes.role,
                changes.phone_number,
                id
            ],
        )?;
        tx.execute(
            "UPDATE accounts SET
                first_name = COALESCE(?1, first_name),
                last_name = COALESCE(?2, last_name),
                email = COALESCE(?3, email),
                username = COALESCE(?3, username)
             WHERE id = (SELECT account_id FROM employees WHERE id = ?4)",
            params![changes.first_name, changes.last_name, changes.email, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Deletes the employee together with its login account.
    pub fn delete_employee(&self, id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let account_id: Option<Option<i64>> = tx
            .query_row("SELECT account_id FROM employees WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;

        let deleted = match account_id {
            None => false,
            Some(Some(account_id)) => {
                tx.execute("DELETE FROM accounts WHERE id = ?1", [account_id])?;
                true
            }
            Some(None) => tx.execute("DELETE FROM employees WHERE id = ?1", [id])? > 0,
        };
        tx.commit()?;
        Ok(deleted)
    }

    pub fn employee_ids_for_manager(&self, manager_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM employees WHERE manager_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map([manager_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub(crate) fn row_to_employee(row: &rusqlite::Row) -> rusqlite::Result<Employee> {
        Ok(Employee {
            id: row.get(0)?,
            account_id: row.get(1)?,
            manager_id: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            email: row.get(5)?,
            role: row.get(6)?,
            phone_number: row.get(7)?,
        })
    }
}
