//! crates/reminder_core/src/recurrence.rs
//!
//! Recurrence keyword classification and the calendar arithmetic used to roll a
//! recurring reminder forward. Everything here is pure.

use chrono::{Datelike, Duration, Months, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{Disposition, RecurrenceKind, Reminder};

/// Keyword variants per kind, in priority order.
const KEYWORDS: &[(RecurrenceKind, &[&str])] = &[
    (
        RecurrenceKind::Daily,
        &["daily", "every day", "everyday", "ежедневно", "каждый день"],
    ),
    (
        RecurrenceKind::Weekly,
        &["weekly", "every week", "еженедельно", "каждую неделю"],
    ),
    (
        RecurrenceKind::Monthly,
        &["monthly", "every month", "ежемесячно", "каждый месяц"],
    ),
    (
        RecurrenceKind::Yearly,
        &["yearly", "annually", "every year", "ежегодно", "каждый год"],
    ),
];

/// Result of scanning a message for recurrence keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: RecurrenceKind,
    pub enabled: bool,
    /// The input with the winning kind's keywords removed.
    pub cleaned_text: String,
}

fn patterns() -> &'static [(RecurrenceKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(RecurrenceKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        KEYWORDS
            .iter()
            .map(|(kind, variants)| {
                let alternatives = variants
                    .iter()
                    .map(|v| regex::escape(v).replace(' ', r"\s+"))
                    .collect::<Vec<_>>()
                    .join("|");
                let regex = Regex::new(&format!(r"(?i)\b(?:{alternatives})\b"))
                    .expect("recurrence keyword pattern is valid");
                (*kind, regex)
            })
            .collect()
    })
}

/// Detects the recurrence kind of `text` and strips its keywords.
///
/// The first kind in daily, weekly, monthly, yearly order wins. Keywords that belong
/// to other kinds stay in the text.
pub fn classify(text: &str) -> Classification {
    for (kind, regex) in patterns() {
        if regex.is_match(text) {
            let mut cleaned = text.to_string();
            // Removing one keyword can join two halves into another one.
            while regex.is_match(&cleaned) {
                cleaned = regex.replace_all(&cleaned, " ").into_owned();
            }
            return Classification {
                kind: *kind,
                enabled: true,
                cleaned_text: collapse_whitespace(&cleaned),
            };
        }
    }

    Classification {
        kind: RecurrenceKind::None,
        enabled: false,
        cleaned_text: text.to_string(),
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Moves `from` forward by one period of `kind`. `None` has no next occurrence.
///
/// Month and year steps keep the day of month; days past the end of a shorter
/// month roll into the following one (Jan 31 + 1 month = Mar 3 in a common year).
pub fn advance(from: NaiveDateTime, kind: RecurrenceKind) -> Option<NaiveDateTime> {
    match kind {
        RecurrenceKind::None => None,
        RecurrenceKind::Daily => from.checked_add_signed(Duration::days(1)),
        RecurrenceKind::Weekly => from.checked_add_signed(Duration::days(7)),
        RecurrenceKind::Monthly => add_months_rolling(from, 1),
        RecurrenceKind::Yearly => add_months_rolling(from, 12),
    }
}

fn add_months_rolling(from: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
    let first_of_month = from.date().with_day(1)?;
    let target = first_of_month
        .checked_add_months(Months::new(months))?
        .checked_add_signed(Duration::days(i64::from(from.day()) - 1))?;
    Some(target.and_time(from.time()))
}

/// The first calendar slot after `now`, stepping from the reminder's own fire time.
pub fn next_occurrence(
    fire_at: NaiveDateTime,
    kind: RecurrenceKind,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let mut next = advance(fire_at, kind)?;
    while next <= now {
        next = advance(next, kind)?;
    }
    Some(next)
}

/// Decides what happens to a reminder that was just delivered at `now`.
pub fn disposition(reminder: &Reminder, now: NaiveDateTime) -> Disposition {
    if !reminder.is_recurring() {
        return Disposition::Delete;
    }
    match next_occurrence(reminder.fire_at, reminder.recurrence_kind, now) {
        Some(next) => Disposition::Reschedule(next),
        None => Disposition::Delete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn plain_text_is_not_recurring() {
        let c = classify("tomorrow at 10:00 dentist");
        assert_eq!(c.kind, RecurrenceKind::None);
        assert!(!c.enabled);
        assert_eq!(c.cleaned_text, "tomorrow at 10:00 dentist");
    }

    #[test]
    fn daily_keyword_is_stripped_case_insensitively() {
        let c = classify("Daily at 9:00 take vitamins");
        assert_eq!(c.kind, RecurrenceKind::Daily);
        assert!(c.enabled);
        assert_eq!(c.cleaned_text, "at 9:00 take vitamins");
    }

    #[test]
    fn russian_synonyms_are_recognised() {
        let c = classify("Каждый месяц 1 числа оплата");
        assert_eq!(c.kind, RecurrenceKind::Monthly);
        assert_eq!(c.cleaned_text, "1 числа оплата");

        let c = classify("еженедельно в понедельник совещание");
        assert_eq!(c.kind, RecurrenceKind::Weekly);
        assert_eq!(c.cleaned_text, "в понедельник совещание");
    }

    #[test]
    fn multi_word_keyword_survives_extra_spaces() {
        let c = classify("every   year on 2026-03-08 flowers");
        assert_eq!(c.kind, RecurrenceKind::Yearly);
        assert_eq!(c.cleaned_text, "on 2026-03-08 flowers");
    }

    #[test]
    fn keywords_inside_words_do_not_match() {
        let c = classify("at 9:00 read the weeklyish digest");
        assert_eq!(c.kind, RecurrenceKind::None);
    }

    #[test]
    fn ambiguous_markers_resolve_by_priority() {
        let c = classify("weekly review daily at 18:00");
        assert_eq!(c.kind, RecurrenceKind::Daily);
        assert_eq!(c.cleaned_text, "weekly review at 18:00");
    }

    #[test]
    fn stripping_is_idempotent() {
        for input in [
            "daily at 9:00 take vitamins",
            "every every day day at 7:00 run",
            "ежегодно 08.03 цветы",
        ] {
            let first = classify(input);
            assert!(first.enabled);
            let second = classify(&first.cleaned_text);
            assert_eq!(second.kind, RecurrenceKind::None);
            assert!(!second.enabled);
            assert_eq!(second.cleaned_text, first.cleaned_text);
        }
    }

    #[test]
    fn advance_table() {
        let t = dt(2026, 10, 19, 9, 0);
        assert_eq!(advance(t, RecurrenceKind::Daily), Some(dt(2026, 10, 20, 9, 0)));
        assert_eq!(advance(t, RecurrenceKind::Weekly), Some(dt(2026, 10, 26, 9, 0)));
        assert_eq!(advance(t, RecurrenceKind::Monthly), Some(dt(2026, 11, 19, 9, 0)));
        assert_eq!(advance(t, RecurrenceKind::Yearly), Some(dt(2027, 10, 19, 9, 0)));
        assert_eq!(advance(t, RecurrenceKind::None), None);
    }

    #[test]
    fn monthly_overflow_rolls_into_next_month() {
        let jan_31 = dt(2027, 1, 31, 8, 0);
        let march = advance(jan_31, RecurrenceKind::Monthly).unwrap();
        assert_eq!(march, dt(2027, 3, 3, 8, 0));
        assert_eq!(advance(march, RecurrenceKind::Monthly), Some(dt(2027, 4, 3, 8, 0)));

        // Leap February keeps one more day.
        assert_eq!(
            advance(dt(2028, 1, 30, 8, 0), RecurrenceKind::Monthly),
            Some(dt(2028, 3, 1, 8, 0))
        );
        assert_eq!(
            advance(dt(2027, 3, 31, 8, 0), RecurrenceKind::Monthly),
            Some(dt(2027, 5, 1, 8, 0))
        );
        assert_eq!(
            advance(dt(2027, 1, 28, 8, 0), RecurrenceKind::Monthly),
            Some(dt(2027, 2, 28, 8, 0))
        );
    }

    #[test]
    fn yearly_from_leap_day_rolls_to_march() {
        let leap = dt(2028, 2, 29, 8, 0);
        assert_eq!(advance(leap, RecurrenceKind::Yearly), Some(dt(2029, 3, 1, 8, 0)));
        assert_eq!(
            advance(dt(2027, 12, 31, 23, 59), RecurrenceKind::Yearly),
            Some(dt(2028, 12, 31, 23, 59))
        );
    }

    #[test]
    fn twelve_months_equal_one_year() {
        let start = dt(2026, 10, 19, 9, 30);
        let mut t = start;
        for _ in 0..12 {
            t = advance(t, RecurrenceKind::Monthly).unwrap();
        }
        assert_eq!(Some(t), advance(start, RecurrenceKind::Yearly));
    }

    #[test]
    fn next_occurrence_steps_from_fire_time() {
        let fire_at = dt(2026, 10, 19, 9, 0);
        let now = dt(2026, 10, 19, 9, 1);
        assert_eq!(
            next_occurrence(fire_at, RecurrenceKind::Daily, now),
            Some(dt(2026, 10, 20, 9, 0))
        );
    }

    #[test]
    fn next_occurrence_skips_missed_slots() {
        let fire_at = dt(2026, 10, 1, 9, 0);
        let now = dt(2026, 10, 19, 12, 0);
        assert_eq!(
            next_occurrence(fire_at, RecurrenceKind::Weekly, now),
            Some(dt(2026, 10, 22, 9, 0))
        );
    }

    #[test]
    fn disposition_deletes_non_recurring_and_unadvanceable() {
        let now = dt(2026, 10, 19, 9, 1);
        let mut reminder = Reminder {
            id: 3,
            owner_id: 1,
            text: "x".to_string(),
            fire_at: dt(2026, 10, 19, 9, 0),
            recurrence_kind: RecurrenceKind::Daily,
            recurrence_enabled: false,
        };
        assert_eq!(disposition(&reminder, now), Disposition::Delete);

        reminder.recurrence_enabled = true;
        assert_eq!(
            disposition(&reminder, now),
            Disposition::Reschedule(dt(2026, 10, 20, 9, 0))
        );

        reminder.recurrence_kind = RecurrenceKind::None;
        assert_eq!(disposition(&reminder, now), Disposition::Delete);
    }
}
