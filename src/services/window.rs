//! Attempt-window resolution.
//!
//! Exams store their schedule as raw text: a calendar date plus a local
//! wall-clock time for each boundary. Nothing is validated at write time,
//! so resolution here is total. A time that fails to parse falls back to
//! midnight; a date that fails to parse makes the boundary unresolvable,
//! which excludes the exam from the active list rather than erroring.

use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::db::models::Exam;

/// Both boundaries of an exam's window, resolved against the configured
/// interpretation offset. `None` means the stored text was unusable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExamWindow {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl ExamWindow {
    /// Active means the end boundary has not passed. The start boundary
    /// is only consulted when the start gate is switched on; the stock
    /// policy shows exams as attemptable from the moment of creation.
    pub(crate) fn is_active(&self, now: OffsetDateTime, enforce_start_gate: bool) -> bool {
        let Some(end) = self.end else {
            return false;
        };
        if now >= end {
            return false;
        }
        if enforce_start_gate {
            match self.start {
                Some(start) => now >= start,
                None => false,
            }
        } else {
            true
        }
    }
}

pub(crate) fn resolve(exam: &Exam, offset: UtcOffset) -> ExamWindow {
    ExamWindow {
        start: resolve_boundary(&exam.start_date, &exam.start_time, offset),
        end: resolve_boundary(&exam.end_date, &exam.end_time, offset),
    }
}

/// Combine a stored date and time string into an absolute instant at the
/// given offset. Returns `None` only when the date is unparseable.
pub(crate) fn resolve_boundary(
    date: &str,
    time_of_day: &str,
    offset: UtcOffset,
) -> Option<OffsetDateTime> {
    let date = parse_date(date)?;
    let (hour, minute) = parse_wall_clock(time_of_day);
    let time = Time::from_hms(hour, minute, 0).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

fn parse_date(raw: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &format).ok()
}

/// Parse `HH:mm` (24-hour) or `h:mm AM/PM`, falling back to midnight for
/// anything else.
pub(crate) fn parse_wall_clock(raw: &str) -> (u8, u8) {
    parse_wall_clock_strict(raw).unwrap_or((0, 0))
}

fn parse_wall_clock_strict(raw: &str) -> Option<(u8, u8)> {
    let raw = raw.trim();

    let (clock, meridiem) = match raw.get(raw.len().saturating_sub(2)..) {
        Some(tail) if tail.eq_ignore_ascii_case("am") => (&raw[..raw.len() - 2], Some(false)),
        Some(tail) if tail.eq_ignore_ascii_case("pm") => (&raw[..raw.len() - 2], Some(true)),
        _ => (raw, None),
    };

    let mut parts = clock.trim().splitn(2, ':');
    let hour: u8 = parts.next()?.trim().parse().ok()?;
    let minute: u8 = parts.next()?.trim().parse().ok()?;
    if minute > 59 {
        return None;
    }

    match meridiem {
        None => (hour <= 23).then_some((hour, minute)),
        Some(is_pm) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            let hour = match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            Some((hour, minute))
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::offset;

    use super::*;

    #[test]
    fn parses_24_hour_clock() {
        assert_eq!(parse_wall_clock("14:30"), (14, 30));
        assert_eq!(parse_wall_clock("00:00"), (0, 0));
        assert_eq!(parse_wall_clock(" 9:05 "), (9, 5));
    }

    #[test]
    fn parses_meridiem_clock() {
        assert_eq!(parse_wall_clock("2:30 PM"), (14, 30));
        assert_eq!(parse_wall_clock("2:30pm"), (14, 30));
        assert_eq!(parse_wall_clock("12:00 AM"), (0, 0));
        assert_eq!(parse_wall_clock("12:15 pm"), (12, 15));
        assert_eq!(parse_wall_clock("11:59 PM"), (23, 59));
    }

    #[test]
    fn malformed_time_falls_back_to_midnight() {
        assert_eq!(parse_wall_clock(""), (0, 0));
        assert_eq!(parse_wall_clock("soon"), (0, 0));
        assert_eq!(parse_wall_clock("25:00"), (0, 0));
        assert_eq!(parse_wall_clock("14:75"), (0, 0));
        assert_eq!(parse_wall_clock("13:00 PM"), (0, 0));
    }

    #[test]
    fn boundary_resolves_in_the_configured_offset() {
        let instant = resolve_boundary("2026-03-14", "14:30", offset!(+5:30)).unwrap();
        assert_eq!(instant.to_offset(UtcOffset::UTC).hour(), 9);
        assert_eq!(instant.to_offset(UtcOffset::UTC).minute(), 0);
    }

    #[test]
    fn unparseable_date_makes_the_boundary_unresolvable() {
        assert!(resolve_boundary("someday", "14:30", offset!(+5:30)).is_none());
        assert!(resolve_boundary("2026-13-40", "14:30", offset!(+5:30)).is_none());
    }

    #[test]
    fn end_boundary_is_exclusive() {
        let end = resolve_boundary("2026-03-14", "14:30", offset!(+5:30)).unwrap();
        let window = ExamWindow { start: None, end: Some(end) };

        assert!(window.is_active(end - time::Duration::seconds(1), false));
        assert!(!window.is_active(end, false));
        assert!(!window.is_active(end + time::Duration::seconds(1), false));
    }

    #[test]
    fn start_gate_only_applies_when_enforced() {
        let start = resolve_boundary("2026-03-14", "10:00", offset!(+5:30)).unwrap();
        let end = resolve_boundary("2026-03-14", "14:30", offset!(+5:30)).unwrap();
        let window = ExamWindow { start: Some(start), end: Some(end) };

        let before_start = start - time::Duration::hours(1);
        assert!(window.is_active(before_start, false));
        assert!(!window.is_active(before_start, true));
        assert!(window.is_active(start, true));
    }

    #[test]
    fn unresolvable_end_is_never_active() {
        let window = ExamWindow { start: None, end: None };
        assert!(!window.is_active(OffsetDateTime::now_utc(), false));
    }
}
