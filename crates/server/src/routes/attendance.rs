//! REST CRUD for subjects, timetable slots, and attendance.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use rollcall_core::types::fmt_hhmm;
use rollcall_core::{AttendanceStatus, ClassType, Day, SlotPatch};
use rollcall_db::Db;
use rollcall_db::attendance::{AttendanceLog, AttendanceStats, MarkRequest};
use rollcall_db::timetable::{NewSlot, Slot};

use crate::error::ApiErr;
use crate::routes::ApiSecret;

#[derive(Serialize)]
pub struct SlotResponse {
    pub id: i64,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub class_type: ClassType,
    pub subject_code: String,
    pub is_temporary: bool,
}

impl From<Slot> for SlotResponse {
    fn from(slot: Slot) -> Self {
        Self {
            id: slot.id,
            day: slot.day,
            start_time: fmt_hhmm(slot.start_time),
            end_time: fmt_hhmm(slot.end_time),
            class_type: slot.class_type,
            subject_code: slot.subject_code,
            is_temporary: slot.is_temporary,
        }
    }
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateSubjectRequest {
    pub subject_code: String,
    pub subject_name: String,
}

#[derive(Serialize)]
pub struct SubjectResponse {
    pub id: i64,
    pub subject_code: String,
    pub subject_name: String,
}

/// POST /api/attendance/subjects
pub async fn create_subject(
    _auth: ApiSecret,
    State(db): State<Db>,
    Json(req): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<SubjectResponse>), ApiErr> {
    let subject = db.create_subject(&req.subject_code, &req.subject_name)?;
    Ok((
        StatusCode::CREATED,
        Json(SubjectResponse {
            id: subject.id,
            subject_code: subject.subject_code,
            subject_name: subject.subject_name,
        }),
    ))
}

#[derive(Deserialize)]
pub struct DeleteSubjectRequest {
    pub contact_id: String,
    pub subject_code: String,
}

/// DELETE /api/attendance/subjects — admin-only.
pub async fn delete_subject(
    _auth: ApiSecret,
    State(db): State<Db>,
    Json(req): Json<DeleteSubjectRequest>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let user = db.user_by_contact(&req.contact_id)?;
    if !user.is_admin {
        return Err(ApiErr::forbidden("Only admins can delete subjects"));
    }
    db.delete_subject(&req.subject_code)?;
    Ok(Json(serde_json::json!({
        "message": format!("Subject '{}' deleted", req.subject_code)
    })))
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SlotKeyRequest {
    pub contact_id: String,
    pub subject_code: String,
    pub day: Day,
    #[serde(with = "rollcall_core::types::hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "rollcall_core::types::hhmm")]
    pub end_time: NaiveTime,
    pub class_type: ClassType,
}

/// POST /api/attendance/slots
pub async fn add_slot(
    _auth: ApiSecret,
    State(db): State<Db>,
    Json(req): Json<SlotKeyRequest>,
) -> Result<(StatusCode, Json<SlotResponse>), ApiErr> {
    let user = db.user_by_contact(&req.contact_id)?;
    let slot = db.add_slot(&NewSlot {
        user_id: user.id,
        day: req.day,
        start_time: req.start_time,
        end_time: req.end_time,
        class_type: req.class_type,
        subject_code: req.subject_code,
    })?;
    Ok((StatusCode::CREATED, Json(slot.into())))
}

#[derive(Deserialize)]
pub struct UpdateSlotRequest {
    #[serde(flatten)]
    pub key: SlotKeyRequest,
    pub updated: SlotPatch,
}

/// PUT /api/attendance/slots
pub async fn update_slot(
    _auth: ApiSecret,
    State(db): State<Db>,
    Json(req): Json<UpdateSlotRequest>,
) -> Result<Json<SlotResponse>, ApiErr> {
    let user = db.user_by_contact(&req.key.contact_id)?;
    let slot = db.update_slot(
        user.id,
        &req.key.subject_code,
        req.key.day,
        req.key.start_time,
        req.key.end_time,
        req.key.class_type,
        &req.updated,
    )?;
    Ok(Json(slot.into()))
}

/// DELETE /api/attendance/slots
pub async fn delete_slot(
    _auth: ApiSecret,
    State(db): State<Db>,
    Json(req): Json<SlotKeyRequest>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let user = db.user_by_contact(&req.contact_id)?;
    db.delete_slot(
        user.id,
        &req.subject_code,
        req.day,
        req.start_time,
        req.end_time,
        req.class_type,
    )?;
    Ok(Json(serde_json::json!({"message": "Timetable slot deleted"})))
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct MarkAttendanceRequest {
    #[serde(flatten)]
    pub key: SlotKeyRequest,
    pub status: AttendanceStatus,
    /// Defaults to today, evaluated per request.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct MarkAttendanceResponse {
    pub message: &'static str,
    pub log_id: i64,
    pub slot_id: i64,
    pub status: AttendanceStatus,
    pub date: NaiveDate,
    pub created_slot: bool,
}

/// POST /api/attendance/mark
pub async fn mark(
    _auth: ApiSecret,
    State(db): State<Db>,
    Json(req): Json<MarkAttendanceRequest>,
) -> Result<Json<MarkAttendanceResponse>, ApiErr> {
    let user = db.user_by_contact(&req.key.contact_id)?;
    let date = req
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let outcome = db.mark_attendance(&MarkRequest {
        user_id: user.id,
        subject_code: req.key.subject_code,
        day: req.key.day,
        start_time: req.key.start_time,
        end_time: req.key.end_time,
        class_type: req.key.class_type,
        status: req.status,
        date,
    })?;
    Ok(Json(MarkAttendanceResponse {
        message: "Attendance marked successfully",
        log_id: outcome.log.id,
        slot_id: outcome.slot.id,
        status: outcome.log.status,
        date: outcome.log.date,
        created_slot: outcome.created_slot,
    }))
}

/// GET /api/attendance/timetable/{contact_id}/{day}
pub async fn daily_timetable(
    _auth: ApiSecret,
    State(db): State<Db>,
    Path((contact_id, day)): Path<(String, Day)>,
) -> Result<Json<Vec<SlotResponse>>, ApiErr> {
    let user = db.user_by_contact(&contact_id)?;
    Ok(Json(
        db.daily_timetable(user.id, day)?
            .into_iter()
            .map(Into::into)
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub subject_code: Option<String>,
    pub class_type: Option<ClassType>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub subject_code: String,
    pub class_type: ClassType,
    pub total_classes: i64,
    pub attended_classes: i64,
}

impl From<AttendanceStats> for StatsResponse {
    fn from(stats: AttendanceStats) -> Self {
        Self {
            subject_code: stats.subject_code,
            class_type: stats.class_type,
            total_classes: stats.total_classes,
            attended_classes: stats.attended_classes,
        }
    }
}

/// GET /api/attendance/stats/{contact_id}
pub async fn stats(
    _auth: ApiSecret,
    State(db): State<Db>,
    Path(contact_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Vec<StatsResponse>>, ApiErr> {
    let user = db.user_by_contact(&contact_id)?;
    Ok(Json(
        db.attendance_stats(user.id, query.subject_code.as_deref(), query.class_type)?
            .into_iter()
            .map(Into::into)
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub date: NaiveDate,
}

#[derive(Serialize)]
pub struct LogEntryResponse {
    pub slot: SlotResponse,
    pub status: AttendanceStatus,
    pub date: NaiveDate,
}

/// GET /api/attendance/logs/{contact_id}?date=YYYY-MM-DD
pub async fn logs_for_date(
    _auth: ApiSecret,
    State(db): State<Db>,
    Path(contact_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogEntryResponse>>, ApiErr> {
    let user = db.user_by_contact(&contact_id)?;
    let rows = db.logs_for_date(user.id, query.date)?;
    Ok(Json(
        rows.into_iter()
            .map(|(slot, log): (Slot, AttendanceLog)| LogEntryResponse {
                slot: slot.into(),
                status: log.status,
                date: log.date,
            })
            .collect(),
    ))
}
