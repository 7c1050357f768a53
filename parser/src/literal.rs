//! Converts the text of literal tokens into values.
//!
//! The errors are the names of what was expected so that the grammar can
//! report them.
use stplc_dsl::diagnostic::{Diagnostic, Label};
use stplc_problems::Problem;
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use crate::token::{Token, TokenType};

fn digits(text: &str) -> String {
    text.chars().filter(|c| *c != '_').collect()
}

pub fn integer(text: &str) -> Result<i128, &'static str> {
    digits(text).parse::<i128>().map_err(|_| "integer")
}

/// An integer with a base prefix such as `16#FF`.
pub fn based_integer(text: &str) -> Result<i128, &'static str> {
    let (base, value) = text.split_once('#').ok_or("based integer")?;
    let radix = base.parse::<u32>().map_err(|_| "based integer")?;
    i128::from_str_radix(&digits(value), radix).map_err(|_| "based integer")
}

pub fn real(text: &str) -> Result<f64, &'static str> {
    digits(text).parse::<f64>().map_err(|_| "real")
}

/// A single byte string with the surrounding quotes and `$` escapes.
pub fn string(text: &str) -> Result<String, &'static str> {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .ok_or("string")?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('$') => out.push('$'),
            Some('\'') => out.push('\''),
            Some('L') | Some('N') => out.push('\n'),
            Some('R') => out.push('\r'),
            Some('T') => out.push('\t'),
            _ => return Err("string escape"),
        }
    }
    Ok(out)
}

enum DurationUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    fn per_sec(&self) -> f64 {
        match *self {
            Self::Milliseconds => 0.001,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 3600.0 * 24.0,
        }
    }

    fn to_duration(&self, value: f64) -> Duration {
        let secs = value * self.per_sec();
        Duration::new(secs.trunc() as i64, (secs.fract() * 1_000_000_000f64).round() as i32)
    }
}

/// A duration such as `T#1h_30m` or `TIME#-1.5s`.
pub fn duration(text: &str) -> Result<Duration, &'static str> {
    let (_, interval) = text.split_once('#').ok_or("duration")?;
    let interval = interval.to_ascii_lowercase();
    let (negative, mut rest) = match interval.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, interval.as_str()),
    };

    let mut total = Duration::ZERO;
    let mut parts = 0;
    while !rest.is_empty() {
        rest = rest.trim_start_matches('_');
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or("duration unit")?;
        let value = rest[..end].parse::<f64>().map_err(|_| "duration value")?;
        rest = &rest[end..];
        let unit = if let Some(r) = rest.strip_prefix("ms") {
            rest = r;
            DurationUnit::Milliseconds
        } else if let Some(r) = rest.strip_prefix('d') {
            rest = r;
            DurationUnit::Days
        } else if let Some(r) = rest.strip_prefix('h') {
            rest = r;
            DurationUnit::Hours
        } else if let Some(r) = rest.strip_prefix('m') {
            rest = r;
            DurationUnit::Minutes
        } else if let Some(r) = rest.strip_prefix('s') {
            rest = r;
            DurationUnit::Seconds
        } else {
            return Err("duration unit");
        };
        total += unit.to_duration(value);
        parts += 1;
    }
    if parts == 0 {
        return Err("duration");
    }
    Ok(if negative { -total } else { total })
}

fn date_parts(text: &str) -> Result<Date, &'static str> {
    let mut parts = text.splitn(3, '-');
    let mut next = || parts.next().ok_or("date");
    let year = next()?.parse::<i32>().map_err(|_| "year")?;
    let month = next()?.parse::<u8>().map_err(|_| "month")?;
    let day = next()?.parse::<u8>().map_err(|_| "day")?;
    let month = Month::try_from(month).map_err(|_| "month")?;
    Date::from_calendar_date(year, month, day).map_err(|_| "date")
}

fn time_parts(text: &str) -> Result<Time, &'static str> {
    let mut parts = text.splitn(3, ':');
    let mut next = || parts.next().ok_or("time of day");
    let hour = next()?.parse::<u8>().map_err(|_| "hour")?;
    let minute = next()?.parse::<u8>().map_err(|_| "minute")?;
    let second = next()?.parse::<f64>().map_err(|_| "second")?;
    let nanos = (second.fract() * 1_000_000_000f64).round() as u32;
    Time::from_hms_nano(hour, minute, second.trunc() as u8, nanos).map_err(|_| "time of day")
}

/// A date such as `D#2024-01-31`.
pub fn date(text: &str) -> Result<Date, &'static str> {
    let (_, value) = text.split_once('#').ok_or("date")?;
    date_parts(value)
}

/// A time of day such as `TOD#12:00:00`.
pub fn time_of_day(text: &str) -> Result<Time, &'static str> {
    let (_, value) = text.split_once('#').ok_or("time of day")?;
    time_parts(value)
}

/// A date and time such as `DT#2024-01-31-12:00:00`.
pub fn date_and_time(text: &str) -> Result<PrimitiveDateTime, &'static str> {
    let (_, value) = text.split_once('#').ok_or("date and time")?;
    // The date has exactly two dashes before the time starts.
    let split = value
        .match_indices('-')
        .nth(2)
        .map(|(i, _)| i)
        .ok_or("date and time")?;
    let date = date_parts(&value[..split])?;
    let time = time_parts(&value[split + 1..])?;
    Ok(PrimitiveDateTime::new(date, time))
}

/// Checks that every literal token converts to a value.
pub fn check(tokens: &[Token]) -> Vec<Diagnostic> {
    tokens
        .iter()
        .filter_map(|token| {
            let text = token.text.as_str();
            let result = match token.token_type {
                TokenType::Integer => integer(text).map(|_| ()),
                TokenType::BasedInteger => based_integer(text).map(|_| ()),
                TokenType::Real => real(text).map(|_| ()),
                TokenType::String => string(text).map(|_| ()),
                TokenType::Duration => duration(text).map(|_| ()),
                TokenType::Date => date(text).map(|_| ()),
                TokenType::TimeOfDay => time_of_day(text).map(|_| ()),
                TokenType::DateAndTime => date_and_time(text).map(|_| ()),
                _ => Ok(()),
            };
            result.err().map(|expected| {
                Diagnostic::problem(
                    Problem::InvalidLiteral,
                    Label::span(token.span.clone(), format!("Expected a valid {}. Found {}", expected, token.text)),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::{date, datetime, time};

    #[rstest]
    #[case("T#1s", Duration::seconds(1))]
    #[case("t#1h_30m", Duration::minutes(90))]
    #[case("TIME#1.5s", Duration::milliseconds(1500))]
    #[case("T#-250ms", Duration::milliseconds(-250))]
    #[case("T#1d2h", Duration::hours(26))]
    fn duration_when_valid_then_value(#[case] text: &str, #[case] expected: Duration) {
        assert_eq!(duration(text).unwrap(), expected);
    }

    #[test]
    fn duration_when_no_unit_then_err() {
        assert!(duration("T#15").is_err());
    }

    #[rstest]
    #[case("2#1010", 10)]
    #[case("8#17", 15)]
    #[case("16#FF", 255)]
    #[case("16#ff_ff", 65535)]
    fn based_integer_when_valid_then_value(#[case] text: &str, #[case] expected: i128) {
        assert_eq!(based_integer(text).unwrap(), expected);
    }

    #[test]
    fn integer_when_underscores_then_ignored() {
        assert_eq!(integer("1_000").unwrap(), 1000);
    }

    #[test]
    fn string_when_escapes_then_replaced() {
        assert_eq!(string("'it$'s $$5$N'").unwrap(), "it's $5\n");
    }

    #[test]
    fn date_and_time_when_valid_then_value() {
        assert_eq!(date("D#2024-01-31").unwrap(), date!(2024-01-31));
        assert_eq!(time_of_day("TOD#12:30:05").unwrap(), time!(12:30:05));
        assert_eq!(
            date_and_time("DT#2024-01-31-12:30:05").unwrap(),
            datetime!(2024-01-31 12:30:05)
        );
    }

    #[test]
    fn date_when_month_out_of_range_then_err() {
        assert!(date("D#2024-13-01").is_err());
    }

    #[test]
    fn check_when_invalid_date_then_invalid_literal() {
        let (tokens, _) = crate::lexer::tokenize("x := D#2024-13-01;", &stplc_dsl::core::FileId::default());
        let diagnostics = check(&tokens);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), Problem::InvalidLiteral.code());
    }
}
