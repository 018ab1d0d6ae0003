//! Natural-language date reference extraction.
//!
//! Pulls date/day phrases out of a chat message ("tomorrow", "next monday",
//! "27th October 2025") and resolves each against a base date. The results
//! only enrich the language-model context; the attendance engine never reads
//! them directly.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

/// A matched phrase and the calendar date it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRef {
    pub phrase: String,
    pub date: NaiveDate,
}

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Weekday names (with optional next/last/this), relative words, and
    // explicit "27th October 2025" forms, each with an optional possessive.
    Regex::new(
        r"(?i)\b(?:on\s+)?((?:(?:next|last|this)\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)|today|tomorrow|yesterday|\d{1,2}(?:st|nd|rd|th)?\s+[A-Za-z]+(?:\s+\d{4})?)(?:'s)?\b",
    )
    .expect("date pattern compiles")
});

static EXPLICIT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]+)(?:\s+(\d{4}))?$")
        .expect("explicit date pattern compiles")
});

/// Extract every date/day phrase from `message`, resolved against `base`.
/// Unresolvable matches (e.g. "2 classes") are skipped; order follows the
/// message.
pub fn extract_date_refs(message: &str, base: NaiveDate) -> Vec<DateRef> {
    DATE_PATTERN
        .captures_iter(message)
        .filter_map(|cap| {
            let phrase = cap.get(1)?.as_str().trim();
            resolve(phrase, base).map(|date| DateRef {
                phrase: phrase.to_string(),
                date,
            })
        })
        .collect()
}

fn resolve(phrase: &str, base: NaiveDate) -> Option<NaiveDate> {
    let lower = phrase.to_lowercase();
    match lower.as_str() {
        "today" => return Some(base),
        "tomorrow" => return base.succ_opt(),
        "yesterday" => return base.pred_opt(),
        _ => {}
    }
    resolve_weekday(&lower, base).or_else(|| resolve_explicit(&lower, base))
}

fn resolve_weekday(lower: &str, base: NaiveDate) -> Option<NaiveDate> {
    let (modifier, name) = ["next ", "last ", "this "]
        .iter()
        .find_map(|m| lower.strip_prefix(m).map(|rest| (m.trim_end(), rest)))
        .unwrap_or(("", lower));
    let target = parse_weekday(name)?;

    let today = base.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let ahead = (wanted - today).rem_euclid(7);
    let behind = (today - wanted).rem_euclid(7);

    let offset = match modifier {
        // The most recent past occurrence, today excluded.
        "last" => -(if behind == 0 { 7 } else { behind }),
        // The coming occurrence, today excluded.
        "next" => {
            if ahead == 0 {
                7
            } else {
                ahead
            }
        }
        // Bare name or "this": the coming occurrence, today included.
        _ => ahead,
    };

    base.checked_add_signed(Duration::days(offset))
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn resolve_explicit(lower: &str, base: NaiveDate) -> Option<NaiveDate> {
    let cap = EXPLICIT_DATE.captures(lower)?;
    let day: u32 = cap[1].parse().ok()?;
    let month = parse_month(&cap[2])?;
    let year = cap
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_else(|| base.year());
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_month(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(name))
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-02-16 is a Monday.
    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn resolves_relative_words() {
        let refs = extract_date_refs("today's and tomorrow's classes", base());
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].phrase, "today");
        assert_eq!(refs[0].date, base());
        assert_eq!(refs[1].date, date(2026, 2, 17));
    }

    #[test]
    fn resolves_yesterday() {
        let refs = extract_date_refs("yesterday's attendance", base());
        assert_eq!(refs, vec![DateRef {
            phrase: "yesterday".to_string(),
            date: date(2026, 2, 15),
        }]);
    }

    #[test]
    fn bare_weekday_is_the_coming_occurrence() {
        let refs = extract_date_refs("show my timetable for Friday", base());
        assert_eq!(refs[0].date, date(2026, 2, 20));
        // Today's weekday resolves to today.
        let refs = extract_date_refs("Monday's schedule", base());
        assert_eq!(refs[0].date, base());
    }

    #[test]
    fn next_and_last_shift_by_a_week() {
        let refs = extract_date_refs("next monday", base());
        assert_eq!(refs[0].date, date(2026, 2, 23));
        let refs = extract_date_refs("last monday", base());
        assert_eq!(refs[0].date, date(2026, 2, 9));
        let refs = extract_date_refs("next friday", base());
        assert_eq!(refs[0].date, date(2026, 2, 20));
    }

    #[test]
    fn resolves_explicit_dates() {
        let refs = extract_date_refs("Meeting on 27th October 2025", base());
        assert_eq!(refs[0].phrase, "27th October 2025");
        assert_eq!(refs[0].date, date(2025, 10, 27));
        // Year defaults to the base year, month names may be abbreviated.
        let refs = extract_date_refs("exam on 15 Nov", base());
        assert_eq!(refs[0].date, date(2026, 11, 15));
    }

    #[test]
    fn skips_unresolvable_matches() {
        // "2 classes" matches the explicit-date shape but has no month.
        let refs = extract_date_refs("I bunked 2 classes and tomorrow too", base());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].phrase, "tomorrow");
    }

    #[test]
    fn preserves_message_order() {
        let refs = extract_date_refs("yesterday's notes and next Tuesday", base());
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].phrase, "yesterday");
        assert_eq!(refs[1].phrase, "next Tuesday");
        assert_eq!(refs[1].date, date(2026, 2, 17));
    }

    #[test]
    fn empty_message_yields_nothing() {
        assert!(extract_date_refs("", base()).is_empty());
        assert!(extract_date_refs("mark me present", base()).is_empty());
    }

    #[test]
    fn invalid_calendar_dates_are_skipped() {
        assert!(extract_date_refs("31st February 2026", base()).is_empty());
    }
}
