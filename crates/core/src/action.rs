//! The action-set schema shared between the language-model collaborator,
//! the pending-action buffer, and the dispatcher.
//!
//! One user message becomes one [`ActionSet`]: an ordered list of classified
//! actions plus the human-readable confirmation prompt. The set is confirmed
//! or cancelled as a unit.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::{AttendanceStatus, ClassType, Day};

/// All intents the language model may emit for a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateSubject,
    AddSlot,
    MarkAttendance,
    GetDailyTimetable,
    GetAttendanceStats,
    UpdateSlot,
    DeleteSubject,
    DeleteSlot,
    GetAttendanceLogsForDate,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::CreateSubject,
        Intent::AddSlot,
        Intent::MarkAttendance,
        Intent::GetDailyTimetable,
        Intent::GetAttendanceStats,
        Intent::UpdateSlot,
        Intent::DeleteSubject,
        Intent::DeleteSlot,
        Intent::GetAttendanceLogsForDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateSubject => "create_subject",
            Intent::AddSlot => "add_slot",
            Intent::MarkAttendance => "mark_attendance",
            Intent::GetDailyTimetable => "get_daily_timetable",
            Intent::GetAttendanceStats => "get_attendance_stats",
            Intent::UpdateSlot => "update_slot",
            Intent::DeleteSubject => "delete_subject",
            Intent::DeleteSlot => "delete_slot",
            Intent::GetAttendanceLogsForDate => "get_attendance_logs_for_date",
        }
    }
}

/// HTTP verb the model attaches to each action. Advisory only; dispatch is
/// keyed on the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Fields that can change when updating an existing timetable slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotPatch {
    #[serde(default)]
    pub day: Option<Day>,
    #[serde(default, with = "crate::types::hhmm_opt")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "crate::types::hhmm_opt")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub subject_code: Option<String>,
    #[serde(default)]
    pub class_type: Option<ClassType>,
}

/// Parameter bag for any intent. Fields an intent does not use stay null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionParams {
    #[serde(default)]
    pub subject_code: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub date_of_slot: Option<NaiveDate>,
    #[serde(default)]
    pub day_of_slot: Option<Day>,
    #[serde(default, with = "crate::types::hhmm_opt")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "crate::types::hhmm_opt")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub class_type: Option<ClassType>,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
    #[serde(default)]
    pub updated_slot: Option<SlotPatch>,
    /// Set by the model when it could not understand the instruction.
    #[serde(default)]
    pub confusion_flag: Option<bool>,
}

impl ActionParams {
    pub fn is_confused(&self) -> bool {
        self.confusion_flag == Some(true)
    }
}

/// A single classified action parsed from the user's message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub intent: Intent,
    pub method: HttpMethod,
    #[serde(default)]
    pub params: ActionParams,
}

/// Top-level model output: ordered actions plus the confirmation prompt to
/// send back to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSet {
    pub actions: Vec<Action>,
    pub confirmation_message: String,
}
