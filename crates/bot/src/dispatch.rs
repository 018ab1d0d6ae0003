//! Confirmed action-set execution.
//!
//! Each action dispatches through an exhaustive match on [`Intent`]; a
//! failed action becomes a failure line and the rest of the batch still
//! runs. Every action is its own transaction boundary; there is no rollback
//! across actions.

use chrono::{Datelike, Local};

use rollcall_core::types::fmt_hhmm;
use rollcall_core::{Action, ActionParams, ActionSet, Day, Intent};
use rollcall_db::attendance::MarkRequest;
use rollcall_db::timetable::NewSlot;
use rollcall_db::Db;
use rollcall_db::users::User;

use crate::format;

/// Execute every action in a confirmed set, producing one result line per
/// action.
pub fn dispatch(db: &Db, user: &User, set: &ActionSet) -> Vec<String> {
    set.actions
        .iter()
        .map(|action| run_action(db, user, action))
        .collect()
}

fn run_action(db: &Db, user: &User, action: &Action) -> String {
    if action.params.is_confused() {
        return format!(
            "Sorry, I couldn't understand the part of your request about '{}'. Could you rephrase it?",
            action.intent.as_str(),
        );
    }

    let mut params = action.params.clone();
    // A date fixes the weekday; backfill day when the model left it out.
    if let (Some(date), None) = (params.date_of_slot, params.day_of_slot) {
        params.day_of_slot = Some(Day::from(date.weekday()));
    }

    match action.intent {
        Intent::CreateSubject => create_subject(db, &params),
        Intent::AddSlot => add_slot(db, user, &params),
        Intent::MarkAttendance => mark_attendance(db, user, &params),
        Intent::GetDailyTimetable => daily_timetable(db, user, &params),
        Intent::GetAttendanceStats => attendance_stats(db, user, &params),
        Intent::UpdateSlot => update_slot(db, user, &params),
        Intent::DeleteSubject => delete_subject(db, user, &params),
        Intent::DeleteSlot => delete_slot(db, user, &params),
        Intent::GetAttendanceLogsForDate => logs_for_date(db, user, &params),
    }
}

fn create_subject(db: &Db, params: &ActionParams) -> String {
    let (Some(code), Some(name)) = (&params.subject_code, &params.subject_name) else {
        return "Failed to create subject: subject code and name are required.".to_string();
    };
    match db.create_subject(code, name) {
        Ok(subject) => format!(
            "Subject created: {} ({}).",
            subject.subject_code, subject.subject_name
        ),
        Err(e) => format!("Failed to create subject {code}. {e}"),
    }
}

fn add_slot(db: &Db, user: &User, params: &ActionParams) -> String {
    let (Some(code), Some(day), Some(start), Some(end), Some(class_type)) = (
        &params.subject_code,
        params.day_of_slot,
        params.start_time,
        params.end_time,
        params.class_type,
    ) else {
        return "Failed to add slot: day, times, subject and class type are required.".to_string();
    };
    let new = NewSlot {
        user_id: user.id,
        day,
        start_time: start,
        end_time: end,
        class_type,
        subject_code: code.clone(),
    };
    match db.add_slot(&new) {
        Ok(slot) => format!(
            "Slot added for {} on {} {}-{}.",
            slot.subject_code,
            slot.day,
            fmt_hhmm(slot.start_time),
            fmt_hhmm(slot.end_time),
        ),
        Err(e) => format!("Failed to add slot. {e}"),
    }
}

fn mark_attendance(db: &Db, user: &User, params: &ActionParams) -> String {
    let Some(code) = &params.subject_code else {
        return "Failed to mark attendance: missing subject code.".to_string();
    };
    let Some(status) = params.status else {
        return format!("Failed to mark attendance for {code}: missing status.");
    };
    let Some(class_type) = params.class_type else {
        return format!("Failed to mark attendance for {code}: missing class type.");
    };
    let Some(day) = params.day_of_slot else {
        return format!("Failed to mark attendance for {code}: missing day or date.");
    };
    let (Some(start), Some(end)) = (params.start_time, params.end_time) else {
        return format!("Failed to mark attendance for {code}: missing start/end time.");
    };
    // "today" is evaluated per call, never baked into a default.
    let date = params
        .date_of_slot
        .unwrap_or_else(|| Local::now().date_naive());

    let req = MarkRequest {
        user_id: user.id,
        subject_code: code.clone(),
        day,
        start_time: start,
        end_time: end,
        class_type,
        status,
        date,
    };
    match db.mark_attendance(&req) {
        Ok(outcome) => {
            let temp_note = if outcome.created_slot {
                format!(" (not in your {day} timetable, temporary slot created)")
            } else {
                String::new()
            };
            format!("Attendance marked as {status} for {code} ({class_type}) on {date}{temp_note}.")
        }
        Err(e) => format!("Failed to mark attendance for {code} ({class_type}). {e}"),
    }
}

fn daily_timetable(db: &Db, user: &User, params: &ActionParams) -> String {
    let Some(day) = params.day_of_slot else {
        return "Failed to retrieve timetable: missing day.".to_string();
    };
    match db.daily_timetable(user.id, day) {
        Ok(slots) => format!("Timetable for {day}:\n{}", format::timetable_lines(&slots)),
        Err(e) => format!("Failed to retrieve timetable. {e}"),
    }
}

fn attendance_stats(db: &Db, user: &User, params: &ActionParams) -> String {
    match db.attendance_stats(user.id, params.subject_code.as_deref(), params.class_type) {
        Ok(rows) => rows
            .iter()
            .map(format::stats_line)
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => format!("Failed to retrieve attendance stats. {e}"),
    }
}

fn update_slot(db: &Db, user: &User, params: &ActionParams) -> String {
    let (Some(code), Some(day), Some(start), Some(end), Some(class_type), Some(patch)) = (
        &params.subject_code,
        params.day_of_slot,
        params.start_time,
        params.end_time,
        params.class_type,
        params.updated_slot.as_ref(),
    ) else {
        return "Failed to update slot: the slot key and the updated fields are required."
            .to_string();
    };
    match db.update_slot(user.id, code, day, start, end, class_type, patch) {
        Ok(slot) => format!("Slot updated for {}.", slot.subject_code),
        Err(e) => format!("Failed to update slot. {e}"),
    }
}

fn delete_subject(db: &Db, user: &User, params: &ActionParams) -> String {
    let Some(code) = &params.subject_code else {
        return "Failed to delete subject: missing subject code.".to_string();
    };
    if !user.is_admin {
        return "Only admins can delete subjects.".to_string();
    }
    match db.delete_subject(code) {
        Ok(()) => format!("Subject deleted: {code}."),
        Err(e) => format!("Failed to delete subject. {e}"),
    }
}

fn delete_slot(db: &Db, user: &User, params: &ActionParams) -> String {
    let (Some(code), Some(day), Some(start), Some(end), Some(class_type)) = (
        &params.subject_code,
        params.day_of_slot,
        params.start_time,
        params.end_time,
        params.class_type,
    ) else {
        return "Failed to delete slot: day, times, subject and class type are required."
            .to_string();
    };
    match db.delete_slot(user.id, code, day, start, end, class_type) {
        Ok(()) => format!("Slot deleted for {code}."),
        Err(e) => format!("Failed to delete slot. {e}"),
    }
}

fn logs_for_date(db: &Db, user: &User, params: &ActionParams) -> String {
    let Some(date) = params.date_of_slot else {
        return "Failed to retrieve attendance logs: missing date.".to_string();
    };
    match db.logs_for_date(user.id, date) {
        Ok(rows) if rows.is_empty() => format!("No attendance records found for {date}."),
        Ok(rows) => format!("Attendance on {date}:\n{}", format::log_lines(&rows)),
        Err(e) => format!("Failed to retrieve attendance logs. {e}"),
    }
}
