//! User records keyed by chat contact id.

use rusqlite::{OptionalExtension, params};

use crate::{Db, Result, StoreError};

/// A registered student. Identified externally by their chat contact id.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    /// University / roll-number id.
    pub uid: String,
    pub name: String,
    pub division: String,
    pub year: i64,
    /// Lab batch, e.g. "B1".
    pub batch: String,
    pub branch: String,
    pub contact_id: String,
    pub is_admin: bool,
}

/// Fields for registering a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub uid: String,
    pub name: String,
    pub division: String,
    pub year: i64,
    pub batch: String,
    pub branch: String,
    pub contact_id: String,
    pub is_admin: bool,
}

impl Db {
    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE uid = ?1 OR contact_id = ?2",
            params![new.uid, new.contact_id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::conflict(
                "A user with this UID or contact is already registered",
            ));
        }
        conn.execute(
            "INSERT INTO users (uid, name, division, year, batch, branch, contact_id, is_admin) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.uid,
                new.name,
                new.division,
                new.year,
                new.batch,
                new.branch,
                new.contact_id,
                new.is_admin,
            ],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            uid: new.uid.clone(),
            name: new.name.clone(),
            division: new.division.clone(),
            year: new.year,
            batch: new.batch.clone(),
            branch: new.branch.clone(),
            contact_id: new.contact_id.clone(),
            is_admin: new.is_admin,
        })
    }

    /// Look up a user by their chat contact id.
    pub fn user_by_contact(&self, contact_id: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, uid, name, division, year, batch, branch, contact_id, is_admin \
                 FROM users WHERE contact_id = ?1",
                params![contact_id],
                row_to_user,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("User not found"))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, uid, name, division, year, batch, branch, contact_id, is_admin \
             FROM users ORDER BY id ASC",
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        uid: row.get(1)?,
        name: row.get(2)?,
        division: row.get(3)?,
        year: row.get(4)?,
        batch: row.get(5)?,
        branch: row.get(6)?,
        contact_id: row.get(7)?,
        is_admin: row.get(8)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_user(contact_id: &str) -> NewUser {
        NewUser {
            uid: format!("2023-{contact_id}"),
            name: "Asha".to_string(),
            division: "A".to_string(),
            year: 3,
            batch: "B1".to_string(),
            branch: "COMPS".to_string(),
            contact_id: contact_id.to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn create_and_lookup_by_contact() {
        let db = Db::open_in_memory().unwrap();
        let created = db.create_user(&sample_user("tg-1")).unwrap();
        let found = db.user_by_contact("tg-1").unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "Asha");
        assert!(!found.is_admin);
    }

    #[test]
    fn unknown_contact_is_not_found() {
        let db = Db::open_in_memory().unwrap();
        assert!(matches!(
            db.user_by_contact("nobody"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_uid_is_rejected() {
        let db = Db::open_in_memory().unwrap();
        db.create_user(&sample_user("tg-1")).unwrap();
        let mut dup = sample_user("tg-2");
        dup.uid = "2023-tg-1".to_string();
        assert!(matches!(
            db.create_user(&dup),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn list_returns_all_users() {
        let db = Db::open_in_memory().unwrap();
        db.create_user(&sample_user("tg-1")).unwrap();
        db.create_user(&sample_user("tg-2")).unwrap();
        assert_eq!(db.list_users().unwrap().len(), 2);
    }
}
