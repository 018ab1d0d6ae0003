use thiserror::Error;

use crate::action::{Action, ActionSet, Intent};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("empty action set")]
    EmptyActionSet,
    #[error("empty confirmation message")]
    EmptyConfirmation,
    #[error("action {index} ({intent}): missing required param '{param}'")]
    MissingParam {
        index: usize,
        intent: &'static str,
        param: &'static str,
    },
}

/// Validate a parsed action set by composing independent validators.
///
/// This is the schema-level gate on model output; per-action execution
/// problems (unknown subject, duplicate mark, …) surface later as result
/// lines, not here.
pub fn validate_action_set(set: &ActionSet) -> Result<(), Vec<ValidationError>> {
    let validators: &[fn(&ActionSet) -> Vec<ValidationError>] =
        &[validate_not_empty, validate_confirmation, validate_params];

    let errors: Vec<ValidationError> = validators.iter().flat_map(|v| v(set)).collect();

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_not_empty(set: &ActionSet) -> Vec<ValidationError> {
    if set.actions.is_empty() {
        vec![ValidationError::EmptyActionSet]
    } else {
        vec![]
    }
}

fn validate_confirmation(set: &ActionSet) -> Vec<ValidationError> {
    if set.confirmation_message.trim().is_empty() {
        vec![ValidationError::EmptyConfirmation]
    } else {
        vec![]
    }
}

fn validate_params(set: &ActionSet) -> Vec<ValidationError> {
    set.actions
        .iter()
        .enumerate()
        .flat_map(|(index, action)| {
            missing_params(action)
                .into_iter()
                .map(move |param| ValidationError::MissingParam {
                    index,
                    intent: action.intent.as_str(),
                    param,
                })
        })
        .collect()
}

/// Params without which an action cannot be dispatched at all.
///
/// Confused actions are exempt: they only ever produce a clarification
/// reply. Timing fields for mark_attendance are checked at dispatch so a
/// single underspecified action fails as a line item instead of sinking
/// the whole set.
fn missing_params(action: &Action) -> Vec<&'static str> {
    if action.params.is_confused() {
        return vec![];
    }

    let p = &action.params;
    let requirements: Vec<(&'static str, bool)> = match action.intent {
        Intent::CreateSubject => vec![
            ("subject_code", p.subject_code.is_none()),
            ("subject_name", p.subject_name.is_none()),
        ],
        Intent::AddSlot => vec![
            ("subject_code", p.subject_code.is_none()),
            ("day_of_slot", p.day_of_slot.is_none()),
            ("start_time", p.start_time.is_none()),
            ("end_time", p.end_time.is_none()),
            ("class_type", p.class_type.is_none()),
        ],
        Intent::MarkAttendance => vec![
            ("subject_code", p.subject_code.is_none()),
            ("status", p.status.is_none()),
            ("class_type", p.class_type.is_none()),
        ],
        Intent::GetDailyTimetable => vec![(
            "day_of_slot",
            p.day_of_slot.is_none() && p.date_of_slot.is_none(),
        )],
        Intent::GetAttendanceStats => vec![],
        Intent::UpdateSlot => vec![
            ("subject_code", p.subject_code.is_none()),
            ("day_of_slot", p.day_of_slot.is_none()),
            ("start_time", p.start_time.is_none()),
            ("end_time", p.end_time.is_none()),
            ("class_type", p.class_type.is_none()),
            ("updated_slot", p.updated_slot.is_none()),
        ],
        Intent::DeleteSubject => vec![("subject_code", p.subject_code.is_none())],
        Intent::DeleteSlot => vec![
            ("subject_code", p.subject_code.is_none()),
            ("day_of_slot", p.day_of_slot.is_none()),
            ("start_time", p.start_time.is_none()),
            ("end_time", p.end_time.is_none()),
            ("class_type", p.class_type.is_none()),
        ],
        Intent::GetAttendanceLogsForDate => vec![("date_of_slot", p.date_of_slot.is_none())],
    };

    requirements
        .into_iter()
        .filter(|(_, missing)| *missing)
        .map(|(param, _)| param)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionParams, HttpMethod};

    fn action(intent: Intent, params: ActionParams) -> Action {
        Action {
            intent,
            method: HttpMethod::Post,
            params,
        }
    }

    fn set_of(actions: Vec<Action>) -> ActionSet {
        ActionSet {
            actions,
            confirmation_message: "Confirm?".to_string(),
        }
    }

    #[test]
    fn rejects_empty_set_and_blank_confirmation() {
        let set = ActionSet {
            actions: vec![],
            confirmation_message: "  ".to_string(),
        };
        let errors = validate_action_set(&set).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn reports_missing_params_per_action() {
        let set = set_of(vec![action(Intent::CreateSubject, ActionParams::default())]);
        let errors = validate_action_set(&set).unwrap_err();
        let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(rendered.iter().any(|e| e.contains("subject_code")));
        assert!(rendered.iter().any(|e| e.contains("subject_name")));
    }

    #[test]
    fn confused_actions_are_exempt() {
        let params = ActionParams {
            confusion_flag: Some(true),
            ..ActionParams::default()
        };
        let set = set_of(vec![action(Intent::MarkAttendance, params)]);
        assert!(validate_action_set(&set).is_ok());
    }

    #[test]
    fn stats_lookup_needs_no_params() {
        let set = set_of(vec![action(
            Intent::GetAttendanceStats,
            ActionParams::default(),
        )]);
        assert!(validate_action_set(&set).is_ok());
    }

    #[test]
    fn timetable_lookup_accepts_date_in_place_of_day() {
        let params = ActionParams {
            date_of_slot: Some(chrono::NaiveDate::from_ymd_opt(2026, 2, 16).unwrap()),
            ..ActionParams::default()
        };
        let set = set_of(vec![action(Intent::GetDailyTimetable, params)]);
        assert!(validate_action_set(&set).is_ok());
    }
}
