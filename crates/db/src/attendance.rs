//! Attendance marking engine and ledger reads.
//!
//! `mark_attendance` is the only writer of attendance_logs and
//! attendance_stats. Slot resolution, log replacement and counter updates
//! commit as one transaction; a failure anywhere rolls the whole unit back.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{Connection, OptionalExtension, params};

use rollcall_core::{AttendanceStatus, ClassType, Day};

use crate::timetable::{self, NewSlot, Slot};
use crate::{Db, Result, StoreError, conv_err, subjects};

/// One attendance record tying a slot to a date and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceLog {
    pub id: i64,
    pub slot_id: i64,
    pub status: AttendanceStatus,
    pub date: NaiveDate,
}

/// Running counters per user + subject + class type. Cancelled classes are
/// excluded from both counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceStats {
    pub user_id: i64,
    pub subject_code: String,
    pub class_type: ClassType,
    pub total_classes: i64,
    pub attended_classes: i64,
}

/// Everything needed to mark attendance for one class on one date.
///
/// The date is always explicit; callers wanting "today" compute it at call
/// time.
#[derive(Debug, Clone)]
pub struct MarkRequest {
    pub user_id: i64,
    pub subject_code: String,
    pub day: Day,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub class_type: ClassType,
    pub status: AttendanceStatus,
    pub date: NaiveDate,
}

/// Result of a mark: the persisted log, the slot it resolved to, and
/// whether that slot had to be synthesized.
#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub log: AttendanceLog,
    pub slot: Slot,
    pub created_slot: bool,
}

impl Db {
    /// Mark attendance for a class on a date.
    ///
    /// - No matching slot: a temporary slot is created on the fly.
    /// - Same status already logged for (slot, date): rejected, nothing
    ///   changes.
    /// - Different status logged: the old record is replaced and the
    ///   counters re-adjusted.
    pub fn mark_attendance(&self, req: &MarkRequest) -> Result<MarkOutcome> {
        if req.start_time >= req.end_time {
            return Err(StoreError::invalid("Slot start must be before its end"));
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let outcome = mark_in_tx(&tx, req)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Stats rows for a user, optionally narrowed by subject and class type.
    pub fn attendance_stats(
        &self,
        user_id: i64,
        subject_code: Option<&str>,
        class_type: Option<ClassType>,
    ) -> Result<Vec<AttendanceStats>> {
        let mut sql = String::from(
            "SELECT user_id, subject_code, class_type, total_classes, attended_classes \
             FROM attendance_stats WHERE user_id = ?1",
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(user_id)];
        if let Some(code) = subject_code {
            args.push(Box::new(code.to_string()));
            sql.push_str(&format!(" AND subject_code = ?{}", args.len()));
        }
        if let Some(class_type) = class_type {
            args.push(Box::new(class_type.as_str()));
            sql.push_str(&format!(" AND class_type = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY subject_code ASC, class_type ASC");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(arg_refs.as_slice(), row_to_stats)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if rows.is_empty() {
            return Err(match subject_code {
                Some(code) => StoreError::not_found(format!(
                    "No attendance record found for subject code '{code}'"
                )),
                None => StoreError::not_found("No attendance records found for this user"),
            });
        }
        Ok(rows)
    }

    /// (slot, log) pairs for everything logged on `date`, ordered by slot
    /// start time. An empty day is a valid, empty result.
    pub fn logs_for_date(&self, user_id: i64, date: NaiveDate) -> Result<Vec<(Slot, AttendanceLog)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.user_id, s.day, s.start_time, s.end_time, s.class_type, \
                    s.subject_code, s.is_temporary, \
                    l.id, l.slot_id, l.status, l.date_log \
             FROM attendance_logs l \
             JOIN timetable_slots s ON s.id = l.slot_id \
             WHERE s.user_id = ?1 AND l.date_log = ?2 \
             ORDER BY s.start_time ASC",
        )?;
        let rows = stmt
            .query_map(params![user_id, date.to_string()], |row| {
                let slot = timetable::row_to_slot(row)?;
                let status: String = row.get(10)?;
                let raw_date: String = row.get(11)?;
                let log = AttendanceLog {
                    id: row.get(8)?,
                    slot_id: row.get(9)?,
                    status: status.parse().map_err(|e| conv_err(10, e))?,
                    date: raw_date.parse().map_err(|e| conv_err(11, e))?,
                };
                Ok((slot, log))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn mark_in_tx(tx: &Connection, req: &MarkRequest) -> Result<MarkOutcome> {
    tracing::debug!(
        user_id = req.user_id,
        subject = %req.subject_code,
        day = %req.day,
        status = %req.status,
        date = %req.date,
        "marking attendance"
    );

    subjects::ensure_subject(tx, &req.subject_code)?;

    let (slot, created_slot) = match timetable::find_slot_in(
        tx,
        req.user_id,
        &req.subject_code,
        req.day,
        req.start_time,
        req.end_time,
        req.class_type,
    )? {
        Some(slot) => (slot, false),
        None => {
            // Not in the regular timetable: record against a fresh
            // temporary slot. The overlap invariant still holds.
            timetable::check_no_overlap(tx, req.user_id, req.day, req.start_time, req.end_time, None)?;
            let slot = timetable::insert_slot_in(
                tx,
                &NewSlot {
                    user_id: req.user_id,
                    day: req.day,
                    start_time: req.start_time,
                    end_time: req.end_time,
                    class_type: req.class_type,
                    subject_code: req.subject_code.clone(),
                },
                true,
            )?;
            (slot, true)
        }
    };

    let already_marked: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM attendance_logs \
         WHERE slot_id = ?1 AND date_log = ?2 AND status = ?3",
        params![slot.id, req.date.to_string(), req.status.as_str()],
        |row| row.get(0),
    )?;
    if already_marked {
        return Err(StoreError::conflict("Attendance already marked for this class"));
    }

    ensure_stats_row(tx, req)?;

    // A log with a different status is a correction: reverse its
    // contribution to the counters, then drop it.
    let prior = tx
        .query_row(
            "SELECT id, status FROM attendance_logs WHERE slot_id = ?1 AND date_log = ?2",
            params![slot.id, req.date.to_string()],
            |row| {
                let raw: String = row.get(1)?;
                let status = raw.parse::<AttendanceStatus>().map_err(|e| conv_err(1, e))?;
                Ok((row.get::<_, i64>(0)?, status))
            },
        )
        .optional()?;
    if let Some((log_id, prior_status)) = prior {
        let (total, attended) = stat_delta(prior_status);
        apply_stat_delta(tx, req, -total, -attended)?;
        tx.execute("DELETE FROM attendance_logs WHERE id = ?1", params![log_id])?;
        tracing::debug!(log_id, prior = %prior_status, "replaced prior attendance log");
    }

    tx.execute(
        "INSERT INTO attendance_logs (slot_id, status, date_log) VALUES (?1, ?2, ?3)",
        params![slot.id, req.status.as_str(), req.date.to_string()],
    )?;
    let log_id = tx.last_insert_rowid();

    let (total, attended) = stat_delta(req.status);
    apply_stat_delta(tx, req, total, attended)?;

    Ok(MarkOutcome {
        log: AttendanceLog {
            id: log_id,
            slot_id: slot.id,
            status: req.status,
            date: req.date,
        },
        slot,
        created_slot,
    })
}

/// (total, attended) contribution of a status to the counters.
fn stat_delta(status: AttendanceStatus) -> (i64, i64) {
    match status {
        AttendanceStatus::Present => (1, 1),
        AttendanceStatus::Absent => (1, 0),
        AttendanceStatus::Cancelled => (0, 0),
    }
}

fn ensure_stats_row(tx: &Connection, req: &MarkRequest) -> Result<()> {
    tx.execute(
        "INSERT INTO attendance_stats (user_id, subject_code, class_type) VALUES (?1, ?2, ?3) \
         ON CONFLICT(user_id, subject_code, class_type) DO NOTHING",
        params![req.user_id, req.subject_code, req.class_type.as_str()],
    )?;
    Ok(())
}

fn apply_stat_delta(tx: &Connection, req: &MarkRequest, total: i64, attended: i64) -> Result<()> {
    if (total, attended) == (0, 0) {
        return Ok(());
    }
    tx.execute(
        "UPDATE attendance_stats \
         SET total_classes = total_classes + ?1, attended_classes = attended_classes + ?2 \
         WHERE user_id = ?3 AND subject_code = ?4 AND class_type = ?5",
        params![total, attended, req.user_id, req.subject_code, req.class_type.as_str()],
    )?;
    Ok(())
}

fn row_to_stats(row: &rusqlite::Row) -> rusqlite::Result<AttendanceStats> {
    let class_type: String = row.get(2)?;
    Ok(AttendanceStats {
        user_id: row.get(0)?,
        subject_code: row.get(1)?,
        class_type: class_type.parse().map_err(|e| conv_err(2, e))?,
        total_classes: row.get(3)?,
        attended_classes: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::sample_user;
    use rollcall_core::types::parse_hhmm;

    fn t(s: &str) -> NaiveTime {
        parse_hhmm(s).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn seeded_db() -> (Db, i64) {
        let db = Db::open_in_memory().unwrap();
        let user = db.create_user(&sample_user("tg-1")).unwrap();
        db.create_subject("BDA", "Big Data Analytics").unwrap();
        db.create_subject("OS", "Operating Systems").unwrap();
        (db, user.id)
    }

    fn mark(user_id: i64, status: AttendanceStatus, date: &str) -> MarkRequest {
        MarkRequest {
            user_id,
            subject_code: "BDA".to_string(),
            day: Day::Mon,
            start_time: t("09:00"),
            end_time: t("10:00"),
            class_type: ClassType::Lab,
            status,
            date: d(date),
        }
    }

    fn stats_of(db: &Db, user_id: i64) -> AttendanceStats {
        db.attendance_stats(user_id, Some("BDA"), Some(ClassType::Lab))
            .unwrap()
            .remove(0)
    }

    fn count(db: &Db, sql: &str) -> i64 {
        db.conn().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn first_mark_synthesizes_a_temporary_slot() {
        let (db, user_id) = seeded_db();
        let outcome = db
            .mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();

        assert!(outcome.created_slot);
        assert!(outcome.slot.is_temporary);
        assert_eq!(outcome.log.status, AttendanceStatus::Present);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM timetable_slots"), 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM attendance_logs"), 1);

        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (1, 1));
    }

    #[test]
    fn second_mark_reuses_the_temporary_slot() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();
        let outcome = db
            .mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-23"))
            .unwrap();

        assert!(!outcome.created_slot);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM timetable_slots"), 1);
        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (2, 2));
    }

    #[test]
    fn mark_against_a_regular_slot_does_not_synthesize() {
        let (db, user_id) = seeded_db();
        db.add_slot(&NewSlot {
            user_id,
            day: Day::Mon,
            start_time: t("09:00"),
            end_time: t("10:00"),
            class_type: ClassType::Lab,
            subject_code: "BDA".to_string(),
        })
        .unwrap();

        let outcome = db
            .mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();
        assert!(!outcome.created_slot);
        assert!(!outcome.slot.is_temporary);
    }

    #[test]
    fn duplicate_same_status_is_rejected_without_mutation() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();

        let err = db
            .mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(count(&db, "SELECT COUNT(*) FROM attendance_logs"), 1);
        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (1, 1));
    }

    #[test]
    fn correction_replaces_log_and_readjusts_counters() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Absent, "2026-02-16"))
            .unwrap();

        assert_eq!(count(&db, "SELECT COUNT(*) FROM attendance_logs"), 1);
        let status: String = db
            .conn()
            .query_row("SELECT status FROM attendance_logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "absent");

        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (1, 0));

        // Slot count unchanged: the correction reuses the temporary slot.
        assert_eq!(count(&db, "SELECT COUNT(*) FROM timetable_slots"), 1);

        // Repeating the correction is now a duplicate.
        assert!(matches!(
            db.mark_attendance(&mark(user_id, AttendanceStatus::Absent, "2026-02-16")),
            Err(StoreError::Conflict(_))
        ));
        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (1, 0));
    }

    #[test]
    fn cancelled_marks_never_touch_counters() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Cancelled, "2026-02-16"))
            .unwrap();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Cancelled, "2026-02-23"))
            .unwrap();

        assert_eq!(count(&db, "SELECT COUNT(*) FROM attendance_logs"), 2);
        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (0, 0));
    }

    #[test]
    fn correcting_present_to_cancelled_reverses_everything() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Cancelled, "2026-02-16"))
            .unwrap();

        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (0, 0));
    }

    #[test]
    fn corrections_accept_dates_far_in_the_past() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Present, "2024-08-05"))
            .unwrap();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Absent, "2024-08-05"))
            .unwrap();
        let stats = stats_of(&db, user_id);
        assert_eq!((stats.total_classes, stats.attended_classes), (1, 0));
    }

    #[test]
    fn unknown_subject_is_rejected_before_any_write() {
        let (db, user_id) = seeded_db();
        let mut req = mark(user_id, AttendanceStatus::Present, "2026-02-16");
        req.subject_code = "NOPE".to_string();
        assert!(matches!(
            db.mark_attendance(&req),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM timetable_slots"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM attendance_logs"), 0);
    }

    #[test]
    fn temporary_slot_still_respects_the_overlap_invariant() {
        let (db, user_id) = seeded_db();
        db.add_slot(&NewSlot {
            user_id,
            day: Day::Mon,
            start_time: t("09:00"),
            end_time: t("10:00"),
            class_type: ClassType::Lecture,
            subject_code: "OS".to_string(),
        })
        .unwrap();

        // BDA lab 09:30-10:30 collides with the OS lecture.
        let mut req = mark(user_id, AttendanceStatus::Present, "2026-02-16");
        req.start_time = t("09:30");
        req.end_time = t("10:30");
        assert!(matches!(
            db.mark_attendance(&req),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM attendance_logs"), 0);
    }

    #[test]
    fn stats_are_separated_by_class_type() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();

        let mut lecture = mark(user_id, AttendanceStatus::Absent, "2026-02-16");
        lecture.class_type = ClassType::Lecture;
        lecture.start_time = t("11:00");
        lecture.end_time = t("12:00");
        db.mark_attendance(&lecture).unwrap();

        let all = db.attendance_stats(user_id, None, None).unwrap();
        assert_eq!(all.len(), 2);
        let lab = db
            .attendance_stats(user_id, Some("BDA"), Some(ClassType::Lab))
            .unwrap();
        assert_eq!(lab[0].attended_classes, 1);
        let lec = db
            .attendance_stats(user_id, Some("BDA"), Some(ClassType::Lecture))
            .unwrap();
        assert_eq!(lec[0].attended_classes, 0);
    }

    #[test]
    fn stats_lookup_reports_missing_rows() {
        let (db, user_id) = seeded_db();
        assert!(matches!(
            db.attendance_stats(user_id, None, None),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            db.attendance_stats(user_id, Some("BDA"), Some(ClassType::Lab)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn logs_for_date_joins_slots() {
        let (db, user_id) = seeded_db();
        db.mark_attendance(&mark(user_id, AttendanceStatus::Present, "2026-02-16"))
            .unwrap();
        let mut other = mark(user_id, AttendanceStatus::Absent, "2026-02-16");
        other.subject_code = "OS".to_string();
        other.class_type = ClassType::Lecture;
        other.start_time = t("11:00");
        other.end_time = t("12:00");
        db.mark_attendance(&other).unwrap();

        let rows = db.logs_for_date(user_id, d("2026-02-16")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0.subject_code, "BDA");
        assert_eq!(rows[0].1.status, AttendanceStatus::Present);
        assert_eq!(rows[1].0.subject_code, "OS");

        // Other dates stay empty, not an error.
        assert!(db.logs_for_date(user_id, d("2026-02-17")).unwrap().is_empty());
    }
}
