//! Subject (course) records referenced by timetable slots and stats.

use rusqlite::{Connection, params};

use crate::{Db, Result, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: i64,
    pub subject_code: String,
    pub subject_name: String,
}

impl Db {
    /// Create a subject. Fails if the code or the name is already taken.
    pub fn create_subject(&self, code: &str, name: &str) -> Result<Subject> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM subjects WHERE subject_code = ?1 OR subject_name = ?2",
            params![code, name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::conflict(
                "A subject with the same code or name already exists",
            ));
        }
        conn.execute(
            "INSERT INTO subjects (subject_code, subject_name) VALUES (?1, ?2)",
            params![code, name],
        )?;
        Ok(Subject {
            id: conn.last_insert_rowid(),
            subject_code: code.to_string(),
            subject_name: name.to_string(),
        })
    }

    /// Delete a subject. Slots and stats referencing it cascade away.
    pub fn delete_subject(&self, code: &str) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM subjects WHERE subject_code = ?1",
            params![code],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(format!("Subject '{code}' not found")));
        }
        Ok(())
    }
}

/// Reject references to subjects that were never created. Keeps slot and
/// attendance writes from dying on a foreign-key error deep in a
/// transaction.
pub(crate) fn ensure_subject(conn: &Connection, code: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM subjects WHERE subject_code = ?1",
        params![code],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StoreError::not_found(format!("Subject '{code}' not found")));
    }
    Ok(())
}
