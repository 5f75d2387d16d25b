//! crates/reminder_core/src/time_phrase.rs
//!
//! A rule-based English/Russian time expression parser.
//!
//! Each rule is a regular expression that claims at most one span of the input;
//! spans never overlap. Whatever no rule claimed becomes the reminder payload.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::ports::{ParseError, ParsedTime, TimeExpressionParser};
use crate::recurrence::collapse_whitespace;

/// Time used when a phrase names a day but no time of day.
const DEFAULT_HOUR: u32 = 9;

/// Parser used by the bot for both new reminders and edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseParser;

impl PhraseParser {
    pub fn new() -> Self {
        Self
    }
}

impl TimeExpressionParser for PhraseParser {
    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<ParsedTime, ParseError> {
        let rules = rules();
        let mut scanner = Scanner::new(text);

        if let Some(offset) = scanner.take(&rules.offset, offset_from) {
            let fire_at = truncate_to_minute(now + offset);
            return Ok(ParsedTime {
                fire_at,
                payload: scanner.remainder(),
            });
        }

        let mut date = scanner
            .take(&rules.iso_date, |c| {
                let (year, month, day) = (number(c, 1)?, number(c, 2)?, number(c, 3)?);
                Some(
                    NaiveDate::from_ymd_opt(year as i32, month, day)
                        .map(DateHint::On)
                        .ok_or(ParseError::InvalidDate),
                )
            })
            .or_else(|| scanner.take(&rules.dotted_date, dotted_date))
            .or_else(|| scanner.take(&rules.day_of_month, day_of_month))
            .transpose()?;

        let mut default_time = None;
        if date.is_none() {
            if let Some((day, default)) = scanner.take(&rules.relative_day, |c| {
                relative_day(&c[1], now.date())
            }) {
                date = Some(DateHint::On(day));
                default_time = default;
            }
        }
        if date.is_none() {
            date = scanner.take(&rules.weekday, weekday);
        }

        let mut time = scanner
            .take(&rules.twelve_hour, twelve_hour)
            .or_else(|| scanner.take(&rules.russian_hour, russian_hour))
            .or_else(|| {
                scanner.take(&rules.clock, |c| {
                    NaiveTime::from_hms_opt(number(c, 1)?, number(c, 2)?, 0)
                })
            });
        let part_of_day = scanner.take(&rules.part_of_day, |c| part_of_day(&c[1]));
        time = time.or(part_of_day);
        if time.is_none() {
            time = scanner.take(&rules.bare_hour, |c| {
                NaiveTime::from_hms_opt(number(c, 1)?, 0, 0)
            });
        }

        let fire_at = match (date, time) {
            (None, None) => return Err(ParseError::NoTemporalPhrase),
            (None, Some(time)) => {
                let today = now.date().and_time(time);
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            (Some(hint), time) => {
                let time = time.or(default_time).unwrap_or_else(default_time_of_day);
                hint.resolve(time, now)?
            }
        };

        Ok(ParsedTime {
            fire_at,
            payload: scanner.remainder(),
        })
    }
}

//=========================================================================================
// Span Bookkeeping
//=========================================================================================

struct Scanner<'a> {
    text: &'a str,
    consumed: Vec<(usize, usize)>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            consumed: Vec::new(),
        }
    }

    /// Claims the first free match that `convert` accepts.
    fn take<T>(
        &mut self,
        regex: &Regex,
        convert: impl Fn(&Captures<'a>) -> Option<T>,
    ) -> Option<T> {
        let text = self.text;
        for caps in regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let free = self
                .consumed
                .iter()
                .all(|&(start, end)| whole.end() <= start || whole.start() >= end);
            if !free {
                continue;
            }
            if let Some(value) = convert(&caps) {
                self.consumed.push((whole.start(), whole.end()));
                return Some(value);
            }
        }
        None
    }

    fn remainder(&self) -> String {
        let mut spans = self.consumed.clone();
        spans.sort_unstable();

        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for (start, end) in spans {
            out.push_str(&self.text[cursor..start]);
            out.push(' ');
            cursor = end;
        }
        out.push_str(&self.text[cursor..]);

        collapse_whitespace(&out)
            .trim_matches(|c: char| {
                c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '–' | '—')
            })
            .to_string()
    }
}

//=========================================================================================
// Rules
//=========================================================================================

struct Rules {
    offset: Regex,
    iso_date: Regex,
    dotted_date: Regex,
    day_of_month: Regex,
    relative_day: Regex,
    weekday: Regex,
    twelve_hour: Regex,
    russian_hour: Regex,
    clock: Regex,
    part_of_day: Regex,
    bare_hour: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        let build = |pattern: &str| Regex::new(pattern).expect("time phrase pattern is valid");
        Rules {
            offset: build(
                r"(?i)\b(?:in\s+(\d{1,4}|an?|one|half\s+an)\s+(minutes?|mins?|hours?|hrs?|days?|weeks?)|через\s+(?:(\d{1,4})\s+)?(полчаса|минуту|минуты|минут|мин|час|часа|часов|день|дня|дней|неделю|недели|недель))\b",
            ),
            iso_date: build(r"(?i)\b(?:on\s+)?(\d{4})-(\d{1,2})-(\d{1,2})\b"),
            dotted_date: build(r"(?i)\b(?:on\s+)?(\d{1,2})\.(\d{1,2})(?:\.(\d{4}))?\b"),
            day_of_month: build(
                r"(?i)\b(?:on\s+)?(?:(?:the\s+)?(\d{1,2})(?:st|nd|rd|th)|(\d{1,2})(?:-?го)?\s+числа)\b",
            ),
            relative_day: build(
                r"(?i)\b(day\s+after\s+tomorrow|tomorrow|today|tonight|послезавтра|завтра|сегодня)\b",
            ),
            weekday: build(
                r"(?i)\b(?:(?:on|в|во)\s+)?(?:(next|this|следующ(?:ий|ую|ее|его|ей))\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday|понедельника|понедельник|вторника|вторник|среду|среды|среда|четверга|четверг|пятницу|пятницы|пятница|субботу|субботы|суббота|воскресенье|воскресенья)\b",
            ),
            twelve_hour: build(r"(?i)\b(?:at\s+)?(\d{1,2})(?::([0-5]\d))?\s*(am|pm)\b"),
            russian_hour: build(
                r"(?i)\b(?:(?:в|во)\s+)?(\d{1,2})(?::([0-5]\d))?\s+(утра|дня|вечера|ночи)\b",
            ),
            clock: build(r"(?i)\b(?:(?:at|в|во)\s+)?([01]?\d|2[0-3]):([0-5]\d)\b"),
            part_of_day: build(
                r"(?i)\b(?:in\s+the\s+|at\s+|в\s+)?(morning|afternoon|evening|night|noon|midday|midnight|after\s+lunch|утром|днём|днем|вечером|ночью|после\s+обеда|полдень|полночь)\b",
            ),
            bare_hour: build(r"(?i)\b(?:at|в|во)\s+(\d{1,2})\b"),
        }
    })
}

fn default_time_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn truncate_to_minute(value: NaiveDateTime) -> NaiveDateTime {
    value
        .with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(value)
}

fn offset_from(caps: &Captures<'_>) -> Option<Duration> {
    if let Some(unit) = caps.get(2) {
        let amount = caps[1].to_lowercase();
        let unit = unit.as_str().to_lowercase();
        if amount.starts_with("half") {
            return unit.starts_with('h').then(|| Duration::minutes(30));
        }
        let count = match amount.as_str() {
            "a" | "an" | "one" => 1,
            digits => digits.parse().ok()?,
        };
        return english_unit(&unit, count);
    }

    let unit = caps.get(4)?.as_str().to_lowercase();
    if unit == "полчаса" {
        return caps.get(3).is_none().then(|| Duration::minutes(30));
    }
    let count = match caps.get(3) {
        Some(digits) => digits.as_str().parse().ok()?,
        None => 1,
    };
    if unit.starts_with("мин") {
        Some(Duration::minutes(count))
    } else if unit.starts_with("час") {
        Some(Duration::hours(count))
    } else if unit.starts_with("д") {
        Some(Duration::days(count))
    } else {
        Some(Duration::weeks(count))
    }
}

fn english_unit(unit: &str, count: i64) -> Option<Duration> {
    if unit.starts_with("min") {
        Some(Duration::minutes(count))
    } else if unit.starts_with('h') {
        Some(Duration::hours(count))
    } else if unit.starts_with("day") {
        Some(Duration::days(count))
    } else if unit.starts_with("week") {
        Some(Duration::weeks(count))
    } else {
        None
    }
}

fn dotted_date(caps: &Captures<'_>) -> Option<Result<DateHint, ParseError>> {
    let day = number(caps, 1)?;
    let month = number(caps, 2)?;
    // Reject shapes like "9.30" that are not a day and month at all.
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }
    let hint = match caps.get(3) {
        Some(year) => {
            let year = year.as_str().parse().ok()?;
            match NaiveDate::from_ymd_opt(year, month, day) {
                Some(date) => DateHint::On(date),
                None => return Some(Err(ParseError::InvalidDate)),
            }
        }
        None => DateHint::Annual { month, day },
    };
    Some(Ok(hint))
}

fn day_of_month(caps: &Captures<'_>) -> Option<Result<DateHint, ParseError>> {
    let day = number(caps, 1).or_else(|| number(caps, 2))?;
    if !(1..=31).contains(&day) {
        return Some(Err(ParseError::InvalidDate));
    }
    Some(Ok(DateHint::DayOfMonth(day)))
}

fn relative_day(word: &str, today: NaiveDate) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let word = collapse_whitespace(&word.to_lowercase());
    match word.as_str() {
        "today" | "сегодня" => Some((today, None)),
        "tonight" => Some((today, NaiveTime::from_hms_opt(20, 0, 0))),
        "tomorrow" | "завтра" => Some((today.succ_opt()?, None)),
        "day after tomorrow" | "послезавтра" => Some((today.succ_opt()?.succ_opt()?, None)),
        _ => None,
    }
}

fn weekday(caps: &Captures<'_>) -> Option<DateHint> {
    let name = caps[2].to_lowercase();
    let day = if name.starts_with("mon") || name.starts_with("пон") {
        Weekday::Mon
    } else if name.starts_with("tue") || name.starts_with("вт") {
        Weekday::Tue
    } else if name.starts_with("wed") || name.starts_with("ср") {
        Weekday::Wed
    } else if name.starts_with("thu") || name.starts_with("чет") {
        Weekday::Thu
    } else if name.starts_with("fri") || name.starts_with("пят") {
        Weekday::Fri
    } else if name.starts_with("sat") || name.starts_with("суб") {
        Weekday::Sat
    } else {
        Weekday::Sun
    };
    let next = caps
        .get(1)
        .map(|m| {
            let m = m.as_str().to_lowercase();
            m == "next" || m.starts_with("след")
        })
        .unwrap_or(false);
    Some(DateHint::Weekday { day, next })
}

fn twelve_hour(caps: &Captures<'_>) -> Option<NaiveTime> {
    let hour = number(caps, 1)?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let minute = number(caps, 2).unwrap_or(0);
    let pm = caps[3].eq_ignore_ascii_case("pm");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn russian_hour(caps: &Captures<'_>) -> Option<NaiveTime> {
    let hour = number(caps, 1)?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let minute = number(caps, 2).unwrap_or(0);
    let hour = match caps[3].to_lowercase().as_str() {
        "утра" => hour % 12,
        "ночи" if hour == 12 => 0,
        "ночи" if hour >= 9 => hour + 12,
        "ночи" => hour,
        _ if hour == 12 => 12,
        _ => hour + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn part_of_day(word: &str) -> Option<NaiveTime> {
    let word = collapse_whitespace(&word.to_lowercase());
    let hour = match word.as_str() {
        "morning" | "утром" => 9,
        "noon" | "midday" | "полдень" => 12,
        "after lunch" | "после обеда" => 14,
        "afternoon" | "днём" | "днем" => 15,
        "evening" | "вечером" => 19,
        "night" | "ночью" => 22,
        "midnight" | "полночь" => 0,
        _ => return None,
    };
    NaiveTime::from_hms_opt(hour, 0, 0)
}

//=========================================================================================
// Date Resolution
//=========================================================================================

#[derive(Debug, Clone, Copy)]
enum DateHint {
    On(NaiveDate),
    /// Day and month without a year; the next one that is still ahead.
    Annual { month: u32, day: u32 },
    /// A day of the month; the next month that has it and is still ahead.
    DayOfMonth(u32),
    Weekday { day: Weekday, next: bool },
}

impl DateHint {
    fn resolve(self, time: NaiveTime, now: NaiveDateTime) -> Result<NaiveDateTime, ParseError> {
        match self {
            DateHint::On(date) => Ok(date.and_time(time)),
            DateHint::Annual { month, day } => (0..=4)
                .filter_map(|years| NaiveDate::from_ymd_opt(now.year() + years, month, day))
                .map(|date| date.and_time(time))
                .find(|candidate| *candidate > now)
                .ok_or(ParseError::InvalidDate),
            DateHint::DayOfMonth(day) => {
                let (mut year, mut month) = (now.year(), now.month());
                for _ in 0..=12 {
                    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                        let candidate = date.and_time(time);
                        if candidate > now {
                            return Ok(candidate);
                        }
                    }
                    if month == 12 {
                        year += 1;
                        month = 1;
                    } else {
                        month += 1;
                    }
                }
                Err(ParseError::InvalidDate)
            }
            DateHint::Weekday { day, next } => {
                let start = if next {
                    now.date().succ_opt().ok_or(ParseError::InvalidDate)?
                } else {
                    now.date()
                };
                start
                    .iter_days()
                    .take(15)
                    .filter(|date| date.weekday() == day)
                    .map(|date| date.and_time(time))
                    .find(|candidate| next || *candidate > now)
                    .ok_or(ParseError::InvalidDate)
            }
        }
    }
}
