//! Prompt assembly and the JSON schema enforced on model output.

use serde_json::{Value, json};

use crate::client::IntentRequest;

/// System rules for intent extraction. The model only classifies; it never
/// answers the question or leaks database contents into the confirmation.
const SYSTEM_PROMPT: &str = r#"You are an attendance management assistant.
Your ONLY job is to convert user messages into a structured JSON action set.

You are in INTENT CONFIRMATION MODE:
- Do NOT answer the user's question.
- Do NOT include timetable data, attendance stats, or logs in the confirmation.
- ONLY extract intent and ask for confirmation.

Each user message may contain one or more separate actions. Create exactly
one action object per distinct intent. Never merge intents.

=== INTENTS ===
create_subject, add_slot, mark_attendance, get_daily_timetable,
get_attendance_stats, update_slot, delete_subject, delete_slot,
get_attendance_logs_for_date

=== DAY RULE ===
day_of_slot, when present, MUST be one of: Mon Tue Wed Thu Fri Sat Sun.

=== DATE RULES ===
- If a date reference is misspelled, ambiguous, or invalid: do NOT guess,
  set confusion_flag = true and leave date_of_slot and day_of_slot null.
- If date_of_slot is known you MUST also set day_of_slot, using the weekday
  given in the parsed references.

=== SLOT TIME RESOLUTION ===
The user's timetable below is the authoritative source. For mark_attendance,
update_slot and other slot actions, resolve start_time and end_time from the
timetable using subject_code, day_of_slot and class_type. If a matching slot
exists, start_time and end_time MUST equal the timetable values and MUST NOT
be null.

If the subject + class_type combination is NOT in the timetable for that
day, still use mark_attendance with the times the user gave, and state in
the confirmation that the class is not in the timetable and a TEMPORARY slot
will be created.

=== HTTP METHOD MAPPING ===
POST = create or mark, GET = retrieve, PUT = update, DELETE = delete.

=== CONFUSION RULE ===
Set confusion_flag = true ONLY when an instruction is ambiguous or invalid.

=== CONFIRMATION MESSAGE ===
The confirmation must be precise: subject code, class type, full date and
day, time slot, and status where relevant, so the user can verify every
detail. For multiple actions list each as a numbered item. Always end by
asking for confirmation.
Example: 'Mark BDA lab on Tuesday, 17 February 2026 (09:00-11:00) as
attended. Confirm?'

Output VALID JSON only. No explanations."#;

/// Assemble the chat messages for one extraction call.
pub(crate) fn build_messages(req: &IntentRequest) -> Value {
    let date_lines = req
        .date_refs
        .iter()
        .map(|r| format!("- '{}' -> {} ({})", r.phrase, r.date, r.date.format("%a")))
        .collect::<Vec<_>>()
        .join("\n");

    json!([
        { "role": "system", "content": SYSTEM_PROMPT },
        {
            "role": "system",
            "content": format!("The user's timetable is as follows:\n{}", req.timetable_summary),
        },
        {
            "role": "system",
            "content": format!(
                "The user's message has been analyzed for date references.\n\n\
                 Extracted references:\n{date_lines}\n\n\
                 Use these parsed values to fill date_of_slot and day_of_slot. \
                 You MUST populate BOTH fields when a date exists."
            ),
        },
        { "role": "user", "content": req.message },
    ])
}

/// JSON schema for the structured response. Mirrors the serde shape of
/// [`rollcall_core::ActionSet`].
pub(crate) fn action_set_schema() -> Value {
    let nullable_string = || json!({ "type": ["string", "null"] });
    let nullable_time = || json!({ "type": ["string", "null"], "pattern": "^\\d{2}:\\d{2}$" });
    json!({
        "type": "object",
        "properties": {
            "actions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "intent": {
                            "type": "string",
                            "enum": [
                                "create_subject",
                                "add_slot",
                                "mark_attendance",
                                "get_daily_timetable",
                                "get_attendance_stats",
                                "update_slot",
                                "delete_subject",
                                "delete_slot",
                                "get_attendance_logs_for_date"
                            ]
                        },
                        "method": { "type": "string", "enum": ["GET", "POST", "PUT", "DELETE"] },
                        "params": {
                            "type": "object",
                            "properties": {
                                "subject_code": nullable_string(),
                                "subject_name": nullable_string(),
                                "date_of_slot": { "type": ["string", "null"], "format": "date" },
                                "day_of_slot": {
                                    "type": ["string", "null"],
                                    "enum": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun", null]
                                },
                                "start_time": nullable_time(),
                                "end_time": nullable_time(),
                                "class_type": {
                                    "type": ["string", "null"],
                                    "enum": ["lecture", "lab", "tutorial", null]
                                },
                                "status": {
                                    "type": ["string", "null"],
                                    "enum": ["present", "absent", "cancelled", null]
                                },
                                "updated_slot": {
                                    "type": ["object", "null"],
                                    "properties": {
                                        "day": nullable_string(),
                                        "start_time": nullable_time(),
                                        "end_time": nullable_time(),
                                        "subject_code": nullable_string(),
                                        "class_type": nullable_string()
                                    }
                                },
                                "confusion_flag": { "type": ["boolean", "null"] }
                            },
                            "required": []
                        }
                    },
                    "required": ["intent", "method", "params"]
                }
            },
            "confirmation_message": { "type": "string" }
        },
        "required": ["actions", "confirmation_message"]
    })
}
