//! Parser for the visit date-time token found in reservation emails,
//! e.g. `2025年07月11日（金）14:00`.
//!
//! The weekday glyph in parentheses is consumed and thrown away. It
//! is never checked against the computed date.
use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::{any, take_while};

use super::extract::ExtractError;

/// Raw components of a visit token before range validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl VisitParts {
    /// Textual form `YYYY/M/D H:MM` with the weekday dropped
    pub fn normalized(&self) -> String {
        format!(
            "{}/{}/{} {}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }

    /// Validate every component and build a naive local date-time
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?;
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        Some(NaiveDateTime::new(date, time))
    }
}

fn year(input: &mut &str) -> ModalResult<i32> {
    take_while(4, '0'..='9').parse_to().parse_next(input)
}

fn one_or_two_digits(input: &mut &str) -> ModalResult<u32> {
    take_while(1..=2, '0'..='9').parse_to().parse_next(input)
}

fn two_digits(input: &mut &str) -> ModalResult<u32> {
    take_while(2, '0'..='9').parse_to().parse_next(input)
}

fn weekday(input: &mut &str) -> ModalResult<()> {
    (alt(('（', '(')), any, alt(('）', ')')))
        .void()
        .parse_next(input)
}

fn spacing(input: &mut &str) -> ModalResult<()> {
    take_while(0.., [' ', '\u{3000}']).void().parse_next(input)
}

/// Parse a visit token from the front of `input`, advancing past it.
/// Trailing text after the minutes is left untouched.
pub fn visit_token(input: &mut &str) -> ModalResult<VisitParts> {
    (
        year,
        '年',
        one_or_two_digits,
        '月',
        one_or_two_digits,
        '日',
        weekday,
        spacing,
        one_or_two_digits,
        alt((':', '：')),
        two_digits,
    )
        .map(|(year, _, month, _, day, _, _, _, hour, _, minute)| VisitParts {
            year,
            month,
            day,
            hour,
            minute,
        })
        .parse_next(input)
}

/// Parse the token at the start of `text` and return its components
pub fn parse_visit_token(text: &str) -> Result<VisitParts, ExtractError> {
    let mut input = text;
    visit_token
        .parse_next(&mut input)
        .map_err(|_| ExtractError::MalformedVisitDate {
            found: first_line(text).to_string(),
        })
}

/// Convert the token at the start of `text` into a timestamp in the
/// host's local time zone.
pub fn normalize_visit_token(text: &str) -> Result<DateTime<Local>, ExtractError> {
    let parts = parse_visit_token(text)?;
    resolve_local(&parts)
}

/// Interpret validated components as local wall-clock time
pub fn resolve_local(parts: &VisitParts) -> Result<DateTime<Local>, ExtractError> {
    let invalid = |reason: &str| ExtractError::InvalidVisitDate {
        normalized: parts.normalized(),
        reason: reason.to_string(),
    };

    let naive = parts
        .to_naive()
        .ok_or_else(|| invalid("date or time component out of range"))?;

    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        // Wall-clock time repeats when clocks fall back, use the first one
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(invalid("local time does not exist in this time zone")),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}
