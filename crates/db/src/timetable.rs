//! Timetable slot definitions, regular and temporary.
//!
//! Slots are unique per (user, day, start, end) and never overlap on the
//! same user+day. Temporary slots are synthesized by the attendance engine
//! and kept forever as historical record.

use chrono::NaiveTime;
use rusqlite::{Connection, OptionalExtension, params};

use rollcall_core::types::{fmt_hhmm, parse_hhmm};
use rollcall_core::{ClassType, Day, SlotPatch};

use crate::subjects::ensure_subject;
use crate::{Db, Result, StoreError, conv_err};

/// A single timetable slot for a user on a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: i64,
    pub user_id: i64,
    pub day: Day,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub class_type: ClassType,
    pub subject_code: String,
    pub is_temporary: bool,
}

/// Fields describing a slot to insert.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub user_id: i64,
    pub day: Day,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub class_type: ClassType,
    pub subject_code: String,
}

const SLOT_COLUMNS: &str =
    "id, user_id, day, start_time, end_time, class_type, subject_code, is_temporary";

impl Db {
    /// Add a regular slot, rejecting any time overlap with an existing slot
    /// for the same user and day.
    pub fn add_slot(&self, new: &NewSlot) -> Result<Slot> {
        if new.start_time >= new.end_time {
            return Err(StoreError::invalid("Slot start must be before its end"));
        }
        let conn = self.conn();
        ensure_subject(&conn, &new.subject_code)?;
        check_no_overlap(&conn, new.user_id, new.day, new.start_time, new.end_time, None)?;
        insert_slot_in(&conn, new, false)
    }

    /// Non-temporary slots for the user on `day`, ordered by start time.
    ///
    /// An empty timetable is reported as NotFound; callers that treat empty
    /// as valid suppress it.
    pub fn daily_timetable(&self, user_id: i64, day: Day) -> Result<Vec<Slot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SLOT_COLUMNS} FROM timetable_slots \
             WHERE user_id = ?1 AND day = ?2 AND is_temporary = 0 \
             ORDER BY start_time ASC"
        ))?;
        let slots = stmt
            .query_map(params![user_id, day.as_str()], row_to_slot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if slots.is_empty() {
            return Err(StoreError::not_found(format!("No timetable found for {day}")));
        }
        Ok(slots)
    }

    /// Update the slot identified by its composite key, applying only the
    /// fields the patch sets. The updated slot must still not overlap any
    /// other slot.
    #[allow(clippy::too_many_arguments)]
    pub fn update_slot(
        &self,
        user_id: i64,
        subject_code: &str,
        day: Day,
        start_time: NaiveTime,
        end_time: NaiveTime,
        class_type: ClassType,
        patch: &SlotPatch,
    ) -> Result<Slot> {
        let conn = self.conn();
        let slot = find_slot_in(
            &conn,
            user_id,
            subject_code,
            day,
            start_time,
            end_time,
            class_type,
        )?
        .ok_or_else(|| StoreError::not_found("Slot not found"))?;

        let updated = Slot {
            id: slot.id,
            user_id: slot.user_id,
            day: patch.day.unwrap_or(slot.day),
            start_time: patch.start_time.unwrap_or(slot.start_time),
            end_time: patch.end_time.unwrap_or(slot.end_time),
            class_type: patch.class_type.unwrap_or(slot.class_type),
            subject_code: patch
                .subject_code
                .clone()
                .unwrap_or_else(|| slot.subject_code.clone()),
            is_temporary: slot.is_temporary,
        };
        if updated.start_time >= updated.end_time {
            return Err(StoreError::invalid("Slot start must be before its end"));
        }
        if updated.subject_code != slot.subject_code {
            ensure_subject(&conn, &updated.subject_code)?;
        }
        check_no_overlap(
            &conn,
            user_id,
            updated.day,
            updated.start_time,
            updated.end_time,
            Some(slot.id),
        )?;

        conn.execute(
            "UPDATE timetable_slots \
             SET day = ?1, start_time = ?2, end_time = ?3, class_type = ?4, subject_code = ?5 \
             WHERE id = ?6",
            params![
                updated.day.as_str(),
                fmt_hhmm(updated.start_time),
                fmt_hhmm(updated.end_time),
                updated.class_type.as_str(),
                updated.subject_code,
                slot.id,
            ],
        )?;
        Ok(updated)
    }

    /// Delete the slot identified by its composite key.
    pub fn delete_slot(
        &self,
        user_id: i64,
        subject_code: &str,
        day: Day,
        start_time: NaiveTime,
        end_time: NaiveTime,
        class_type: ClassType,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM timetable_slots \
             WHERE user_id = ?1 AND subject_code = ?2 AND day = ?3 \
               AND start_time = ?4 AND end_time = ?5 AND class_type = ?6",
            params![
                user_id,
                subject_code,
                day.as_str(),
                fmt_hhmm(start_time),
                fmt_hhmm(end_time),
                class_type.as_str(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found("Slot not found"));
        }
        Ok(())
    }
}

/// Exact-match slot lookup, usable inside a transaction.
pub(crate) fn find_slot_in(
    conn: &Connection,
    user_id: i64,
    subject_code: &str,
    day: Day,
    start_time: NaiveTime,
    end_time: NaiveTime,
    class_type: ClassType,
) -> Result<Option<Slot>> {
    let slot = conn
        .query_row(
            &format!(
                "SELECT {SLOT_COLUMNS} FROM timetable_slots \
                 WHERE user_id = ?1 AND subject_code = ?2 AND day = ?3 \
                   AND start_time = ?4 AND end_time = ?5 AND class_type = ?6"
            ),
            params![
                user_id,
                subject_code,
                day.as_str(),
                fmt_hhmm(start_time),
                fmt_hhmm(end_time),
                class_type.as_str(),
            ],
            row_to_slot,
        )
        .optional()?;
    Ok(slot)
}

/// Insert a slot, usable inside a transaction.
pub(crate) fn insert_slot_in(conn: &Connection, new: &NewSlot, is_temporary: bool) -> Result<Slot> {
    conn.execute(
        "INSERT INTO timetable_slots \
         (user_id, day, start_time, end_time, class_type, subject_code, is_temporary) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.user_id,
            new.day.as_str(),
            fmt_hhmm(new.start_time),
            fmt_hhmm(new.end_time),
            new.class_type.as_str(),
            new.subject_code,
            is_temporary,
        ],
    )?;
    Ok(Slot {
        id: conn.last_insert_rowid(),
        user_id: new.user_id,
        day: new.day,
        start_time: new.start_time,
        end_time: new.end_time,
        class_type: new.class_type,
        subject_code: new.subject_code.clone(),
        is_temporary,
    })
}

/// Reject a `[start, end)` interval that overlaps any other slot for the
/// same user and day.
pub(crate) fn check_no_overlap(
    conn: &Connection,
    user_id: i64,
    day: Day,
    start_time: NaiveTime,
    end_time: NaiveTime,
    exclude_slot: Option<i64>,
) -> Result<()> {
    let conflict = conn
        .query_row(
            "SELECT subject_code, start_time, end_time FROM timetable_slots \
             WHERE user_id = ?1 AND day = ?2 AND start_time < ?3 AND end_time > ?4 AND id != ?5 \
             LIMIT 1",
            params![
                user_id,
                day.as_str(),
                fmt_hhmm(end_time),
                fmt_hhmm(start_time),
                exclude_slot.unwrap_or(-1),
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;
    if let Some((code, start, end)) = conflict {
        return Err(StoreError::conflict(format!(
            "Conflicting slot found: {code} ({start}-{end})"
        )));
    }
    Ok(())
}

pub(crate) fn row_to_slot(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
    let day: String = row.get(2)?;
    let start: String = row.get(3)?;
    let end: String = row.get(4)?;
    let class_type: String = row.get(5)?;
    Ok(Slot {
        id: row.get(0)?,
        user_id: row.get(1)?,
        day: day.parse().map_err(|e| conv_err(2, e))?,
        start_time: parse_hhmm(&start).map_err(|e| conv_err(3, e))?,
        end_time: parse_hhmm(&end).map_err(|e| conv_err(4, e))?,
        class_type: class_type.parse().map_err(|e| conv_err(5, e))?,
        subject_code: row.get(6)?,
        is_temporary: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::sample_user;

    fn t(s: &str) -> NaiveTime {
        parse_hhmm(s).unwrap()
    }

    fn seeded_db() -> (Db, i64) {
        let db = Db::open_in_memory().unwrap();
        let user = db.create_user(&sample_user("tg-1")).unwrap();
        db.create_subject("DC", "Digital Communication").unwrap();
        db.create_subject("OS", "Operating Systems").unwrap();
        (db, user.id)
    }

    fn slot(user_id: i64, code: &str, day: Day, start: &str, end: &str) -> NewSlot {
        NewSlot {
            user_id,
            day,
            start_time: t(start),
            end_time: t(end),
            class_type: ClassType::Lecture,
            subject_code: code.to_string(),
        }
    }

    #[test]
    fn add_and_read_daily_timetable() {
        let (db, user_id) = seeded_db();
        db.add_slot(&slot(user_id, "DC", Day::Mon, "09:00", "10:00")).unwrap();
        db.add_slot(&slot(user_id, "OS", Day::Mon, "10:00", "11:00")).unwrap();

        let slots = db.daily_timetable(user_id, Day::Mon).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].subject_code, "DC");
        assert_eq!(slots[1].subject_code, "OS");
    }

    #[test]
    fn empty_day_is_not_found() {
        let (db, user_id) = seeded_db();
        assert!(matches!(
            db.daily_timetable(user_id, Day::Tue),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn overlapping_slot_is_rejected() {
        let (db, user_id) = seeded_db();
        db.add_slot(&slot(user_id, "DC", Day::Mon, "09:00", "10:00")).unwrap();

        let err = db
            .add_slot(&slot(user_id, "OS", Day::Mon, "09:30", "10:30"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(err.to_string().contains("DC (09:00-10:00)"));

        // Touching intervals do not overlap.
        db.add_slot(&slot(user_id, "OS", Day::Mon, "10:00", "11:00")).unwrap();
    }

    #[test]
    fn slot_for_unknown_subject_is_rejected() {
        let (db, user_id) = seeded_db();
        assert!(matches!(
            db.add_slot(&slot(user_id, "NOPE", Day::Mon, "09:00", "10:00")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn inverted_times_are_invalid() {
        let (db, user_id) = seeded_db();
        assert!(matches!(
            db.add_slot(&slot(user_id, "DC", Day::Mon, "10:00", "09:00")),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn update_applies_patch_fields_only() {
        let (db, user_id) = seeded_db();
        db.add_slot(&slot(user_id, "DC", Day::Mon, "09:00", "10:00")).unwrap();

        let patch = SlotPatch {
            start_time: Some(t("11:00")),
            end_time: Some(t("12:00")),
            ..SlotPatch::default()
        };
        let updated = db
            .update_slot(user_id, "DC", Day::Mon, t("09:00"), t("10:00"), ClassType::Lecture, &patch)
            .unwrap();
        assert_eq!(updated.start_time, t("11:00"));
        assert_eq!(updated.day, Day::Mon);
        assert_eq!(updated.subject_code, "DC");
    }

    #[test]
    fn update_rejects_new_overlap_but_allows_self() {
        let (db, user_id) = seeded_db();
        db.add_slot(&slot(user_id, "DC", Day::Mon, "09:00", "10:00")).unwrap();
        db.add_slot(&slot(user_id, "OS", Day::Mon, "10:00", "11:00")).unwrap();

        // Sliding DC into OS's window conflicts.
        let patch = SlotPatch {
            start_time: Some(t("10:30")),
            end_time: Some(t("11:30")),
            ..SlotPatch::default()
        };
        assert!(matches!(
            db.update_slot(user_id, "DC", Day::Mon, t("09:00"), t("10:00"), ClassType::Lecture, &patch),
            Err(StoreError::Conflict(_))
        ));

        // A no-op patch must not conflict with the slot itself.
        let updated = db
            .update_slot(
                user_id,
                "DC",
                Day::Mon,
                t("09:00"),
                t("10:00"),
                ClassType::Lecture,
                &SlotPatch::default(),
            )
            .unwrap();
        assert_eq!(updated.start_time, t("09:00"));
    }

    #[test]
    fn update_missing_slot_is_not_found() {
        let (db, user_id) = seeded_db();
        assert!(matches!(
            db.update_slot(
                user_id,
                "DC",
                Day::Fri,
                t("09:00"),
                t("10:00"),
                ClassType::Lecture,
                &SlotPatch::default(),
            ),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_by_composite_key() {
        let (db, user_id) = seeded_db();
        db.add_slot(&slot(user_id, "DC", Day::Mon, "09:00", "10:00")).unwrap();
        db.delete_slot(user_id, "DC", Day::Mon, t("09:00"), t("10:00"), ClassType::Lecture)
            .unwrap();
        assert!(matches!(
            db.delete_slot(user_id, "DC", Day::Mon, t("09:00"), t("10:00"), ClassType::Lecture),
            Err(StoreError::NotFound(_))
        ));
    }
}
