//! Rendering of timetables, stats, and logs into chat replies.

use rollcall_core::Day;
use rollcall_core::types::fmt_hhmm;
use rollcall_db::attendance::{AttendanceLog, AttendanceStats};
use rollcall_db::timetable::Slot;
use rollcall_db::{Db, StoreError};

/// Weekly timetable rendered one slot per line, used as model context.
/// Days with no regular slots are skipped.
pub(crate) fn weekly_summary(db: &Db, user_id: i64) -> String {
    let mut lines = Vec::new();
    for day in Day::ALL {
        let slots = match db.daily_timetable(user_id, day) {
            Ok(slots) => slots,
            Err(StoreError::NotFound(_)) => continue,
            Err(e) => {
                tracing::warn!(user_id, %day, "timetable read failed: {e}");
                continue;
            }
        };
        for slot in &slots {
            lines.push(format!(
                "{day}: {}-{} {} ({})",
                fmt_hhmm(slot.start_time),
                fmt_hhmm(slot.end_time),
                slot.subject_code,
                slot.class_type,
            ));
        }
    }
    lines.join("\n")
}

/// Numbered timetable listing for a reply.
pub(crate) fn timetable_lines(slots: &[Slot]) -> String {
    slots
        .iter()
        .enumerate()
        .map(|(idx, slot)| {
            format!(
                "{}. {}-{} {} - {}",
                idx + 1,
                fmt_hhmm(slot.start_time),
                fmt_hhmm(slot.end_time),
                slot.subject_code,
                slot.class_type,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn stats_line(stats: &AttendanceStats) -> String {
    format!(
        "Attendance stats for {} {}: {} total classes, {} attended.",
        stats.subject_code, stats.class_type, stats.total_classes, stats.attended_classes,
    )
}

/// Numbered per-date log listing for a reply.
pub(crate) fn log_lines(rows: &[(Slot, AttendanceLog)]) -> String {
    rows.iter()
        .enumerate()
        .map(|(idx, (slot, log))| {
            format!(
                "{}. {} ({}) {}-{}: {}",
                idx + 1,
                slot.subject_code,
                slot.class_type,
                fmt_hhmm(slot.start_time),
                fmt_hhmm(slot.end_time),
                log.status,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
