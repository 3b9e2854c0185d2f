//! Type-directed parsing of raw CSV cells.
//!
//! All formats are locale independent: `.` is the only decimal separator and
//! dates are read in ISO or invariant (`MM/dd/yyyy`) order.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{ConvertError, ConvertResult};
use crate::types::{FieldType, Value};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S%.f %:z",
];

/// Converts `raw` into a [`Value`] of the declared type.
///
/// `string` cells are returned untouched, blank nullable cells become
/// [`Value::Null`], and anything else must conform to the type's format.
/// An empty cell for a non-nullable, non-string type is an error.
pub fn parse_value(ty: &FieldType, raw: &str) -> ConvertResult<Value> {
    match ty {
        FieldType::String => Ok(Value::String(String::from(raw))),
        FieldType::Nullable(inner) => {
            if raw.trim().is_empty() {
                Ok(Value::Null)
            } else {
                parse_value(inner, raw)
            }
        }
        FieldType::Enum(e) => e.lookup(raw.trim()).map(Value::Enum).ok_or_else(|| {
            ConvertError::UnknownEnumMember {
                enumeration: e.name.clone(),
                raw: String::from(raw),
            }
        }),
        FieldType::Bool => parse_bool(raw),
        FieldType::I8 => number(ty, raw).map(Value::I8),
        FieldType::U8 => number(ty, raw).map(Value::U8),
        FieldType::I16 => number(ty, raw).map(Value::I16),
        FieldType::U16 => number(ty, raw).map(Value::U16),
        FieldType::I32 => number(ty, raw).map(Value::I32),
        FieldType::U32 => number(ty, raw).map(Value::U32),
        FieldType::I64 => number(ty, raw).map(Value::I64),
        FieldType::U64 => number(ty, raw).map(Value::U64),
        FieldType::F32 => number(ty, raw).map(Value::F32),
        FieldType::F64 => number(ty, raw).map(Value::F64),
        FieldType::Decimal => parse_decimal(raw).map(Value::Decimal),
        FieldType::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(ConvertError::invalid_literal(ty, raw)),
            }
        }
        FieldType::DateTime => parse_date_time(raw).map(Value::DateTime),
        FieldType::DateTimeOffset => parse_date_time_offset(raw).map(Value::DateTimeOffset),
        FieldType::Duration => parse_duration(raw).map(Value::Duration),
        FieldType::Uuid => Uuid::parse_str(raw.trim())
            .map(Value::Uuid)
            .map_err(|_| ConvertError::invalid_literal(ty, raw)),
        FieldType::Other(name) => Err(ConvertError::UnsupportedType(name.clone())),
    }
}

/// Integers first (nonzero is `true`), then `true`/`false` in any case.
fn parse_bool(raw: &str) -> ConvertResult<Value> {
    let text = raw.trim();
    if let Ok(n) = text.parse::<i32>() {
        return Ok(Value::Bool(n != 0));
    }
    if text.eq_ignore_ascii_case("true") {
        Ok(Value::Bool(true))
    } else if text.eq_ignore_ascii_case("false") {
        Ok(Value::Bool(false))
    } else {
        Err(ConvertError::InvalidBoolean(String::from(raw)))
    }
}

#[inline]
fn number<T: FromStr>(ty: &FieldType, raw: &str) -> ConvertResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ConvertError::invalid_literal(ty, raw))
}

fn parse_decimal(raw: &str) -> ConvertResult<Decimal> {
    let text = raw.trim();
    Decimal::from_str(text).map_err(|_| ConvertError::invalid_literal(FieldType::Decimal, raw))
}

fn parse_date_time(raw: &str) -> ConvertResult<NaiveDateTime> {
    let text = raw.trim();
    if let Some(dt) = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Ok(dt);
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(date);
    }
    offset_date_time(text)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| ConvertError::invalid_literal(FieldType::DateTime, raw))
}

fn parse_date_time_offset(raw: &str) -> ConvertResult<DateTime<FixedOffset>> {
    let text = raw.trim();
    if let Some(dt) = offset_date_time(text) {
        return Ok(dt);
    }
    parse_date_time(text)
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|_| ConvertError::invalid_literal(FieldType::DateTimeOffset, raw))
}

fn offset_date_time(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    })
}

/// Largest whole day count a duration may carry.
const MAX_DAYS: i64 = 10_675_199;

/// `[-]d` or `[-][d.]hh:mm[:ss[.fffffff]]`.
fn parse_duration(raw: &str) -> ConvertResult<TimeDelta> {
    let invalid = || ConvertError::invalid_literal(FieldType::Duration, raw);
    let text = raw.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = |s: &str| -> Option<i64> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    };

    let span = if !text.contains(':') {
        let days = digits(text).filter(|d| *d <= MAX_DAYS).ok_or_else(invalid)?;
        TimeDelta::try_days(days).ok_or_else(invalid)?
    } else {
        let mut parts = text.split(':');
        let head = parts.next().ok_or_else(invalid)?;
        let (days, hours) = match head.split_once('.') {
            Some((d, h)) => (digits(d).ok_or_else(invalid)?, digits(h).ok_or_else(invalid)?),
            None => (0, digits(head).ok_or_else(invalid)?),
        };
        let minutes = parts.next().and_then(digits).ok_or_else(invalid)?;
        let (seconds, nanos) = match parts.next() {
            Some(sec) => {
                let (whole, frac) = match sec.split_once('.') {
                    Some((w, f)) => (w, Some(f)),
                    None => (sec, None),
                };
                let whole = digits(whole).ok_or_else(invalid)?;
                let nanos = match frac {
                    Some(f) if f.len() <= 7 => digits(f).ok_or_else(invalid)? * 10i64.pow(9 - f.len() as u32),
                    Some(_) => return Err(invalid()),
                    None => 0,
                };
                (whole, nanos)
            }
            None => (0, 0),
        };
        if parts.next().is_some() || days > MAX_DAYS || hours > 23 || minutes > 59 || seconds > 59 {
            return Err(invalid());
        }
        let total = days
            .checked_mul(86_400)
            .and_then(|s| s.checked_add(hours * 3_600 + minutes * 60 + seconds))
            .ok_or_else(invalid)?;
        TimeDelta::try_seconds(total)
            .and_then(|span| span.checked_add(&TimeDelta::nanoseconds(nanos)))
            .ok_or_else(invalid)?
    };
    Ok(if negative { -span } else { span })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnumType, EnumValue};
    use std::sync::Arc;

    #[test]
    fn strings_are_verbatim() {
        assert_eq!(
            parse_value(&FieldType::String, "").unwrap(),
            Value::String(String::new())
        );
        assert_eq!(
            parse_value(&FieldType::String, " padded ").unwrap(),
            Value::String(String::from(" padded "))
        );
    }

    #[test]
    fn booleans_prefer_integers() {
        let ty = FieldType::Bool;
        assert_eq!(parse_value(&ty, "1").unwrap(), Value::Bool(true));
        assert_eq!(parse_value(&ty, "0").unwrap(), Value::Bool(false));
        assert_eq!(parse_value(&ty, "-4").unwrap(), Value::Bool(true));
        assert_eq!(parse_value(&ty, "true").unwrap(), Value::Bool(true));
        assert_eq!(parse_value(&ty, "False").unwrap(), Value::Bool(false));
        assert!(matches!(
            parse_value(&ty, "yes"),
            Err(ConvertError::InvalidBoolean(raw)) if raw == "yes"
        ));
    }

    #[test]
    fn nullable_blank_is_null() {
        let ty = FieldType::I32.nullable();
        assert_eq!(parse_value(&ty, "").unwrap(), Value::Null);
        assert_eq!(parse_value(&ty, " \t").unwrap(), Value::Null);
        assert_eq!(parse_value(&ty, "3").unwrap(), Value::I32(3));
    }

    #[test]
    fn empty_non_nullable_fails() {
        for ty in [FieldType::I32, FieldType::F64, FieldType::Uuid, FieldType::DateTime] {
            assert!(matches!(
                parse_value(&ty, ""),
                Err(ConvertError::InvalidLiteral { .. })
            ));
        }
    }

    #[test]
    fn integer_ranges_are_checked() {
        assert_eq!(parse_value(&FieldType::U8, "255").unwrap(), Value::U8(255));
        assert!(parse_value(&FieldType::U8, "256").is_err());
        assert!(parse_value(&FieldType::U32, "-1").is_err());
        assert_eq!(parse_value(&FieldType::I16, " -7 ").unwrap(), Value::I16(-7));
        assert_eq!(
            parse_value(&FieldType::U64, "18446744073709551615").unwrap(),
            Value::U64(u64::MAX)
        );
        assert!(parse_value(&FieldType::I32, "1,000").is_err());
    }

    #[test]
    fn floats_and_decimals_use_dot() {
        assert_eq!(parse_value(&FieldType::F32, "1.5").unwrap(), Value::F32(1.5));
        assert_eq!(parse_value(&FieldType::F64, "-2e3").unwrap(), Value::F64(-2000.0));
        assert!(parse_value(&FieldType::F64, "1,5").is_err());
        assert_eq!(
            parse_value(&FieldType::Decimal, "12.50").unwrap(),
            Value::Decimal(Decimal::new(1250, 2))
        );
        assert!(matches!(
            parse_value(&FieldType::Decimal, "1.5e2"),
            Err(ConvertError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn chars_need_exactly_one() {
        assert_eq!(parse_value(&FieldType::Char, "x").unwrap(), Value::Char('x'));
        assert_eq!(parse_value(&FieldType::Char, "剣").unwrap(), Value::Char('剣'));
        assert!(parse_value(&FieldType::Char, "").is_err());
        assert!(parse_value(&FieldType::Char, "xy").is_err());
    }

    #[test]
    fn date_times() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(13, 5, 0)
            .unwrap();
        for raw in ["2024-03-09T13:05:00", "2024-03-09 13:05", "2024/03/09 13:05:00", "03/09/2024 13:05"] {
            assert_eq!(parse_value(&FieldType::DateTime, raw).unwrap(), Value::DateTime(expected));
        }
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            parse_value(&FieldType::DateTime, "2024-03-09").unwrap(),
            Value::DateTime(midnight)
        );
        assert_eq!(
            parse_value(&FieldType::DateTime, "2024-03-09T09:00:00+09:00").unwrap(),
            Value::DateTime(midnight)
        );
        assert!(parse_value(&FieldType::DateTime, "2024-13-01").is_err());
    }

    #[test]
    fn date_time_offsets() {
        let Value::DateTimeOffset(dt) =
            parse_value(&FieldType::DateTimeOffset, "2024-03-09T13:05:00+09:00").unwrap()
        else {
            panic!("expected an offset date time");
        };
        assert_eq!(dt.offset().local_minus_utc(), 9 * 3600);

        let Value::DateTimeOffset(dt) =
            parse_value(&FieldType::DateTimeOffset, "2024-03-09 13:05:00").unwrap()
        else {
            panic!("expected an offset date time");
        };
        assert_eq!(dt.offset().local_minus_utc(), 0);
    }

    #[test]
    fn durations() {
        let d = |raw| parse_value(&FieldType::Duration, raw).unwrap();
        assert_eq!(d("3"), Value::Duration(TimeDelta::days(3)));
        assert_eq!(d("01:30"), Value::Duration(TimeDelta::minutes(90)));
        assert_eq!(
            d("1.02:00:05"),
            Value::Duration(TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::seconds(5))
        );
        assert_eq!(d("-00:00:01.5"), Value::Duration(-TimeDelta::milliseconds(1500)));
        assert!(parse_value(&FieldType::Duration, "24:00").is_err());
        assert!(parse_value(&FieldType::Duration, "1:2:3:4").is_err());
        assert!(parse_value(&FieldType::Duration, "").is_err());
        assert_eq!(d("10675199"), Value::Duration(TimeDelta::days(10_675_199)));
        for raw in ["10675200", "10675200.00:00", "106751991167.07:12:55.9", "9223372036854775807"] {
            assert!(matches!(
                parse_value(&FieldType::Duration, raw),
                Err(ConvertError::InvalidLiteral { .. })
            ));
        }
    }

    #[test]
    fn uuids_accept_common_forms() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        for raw in [
            "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "67e5504410b1426f9247bb680e5fe0c8",
            "{67e55044-10b1-426f-9247-bb680e5fe0c8}",
        ] {
            assert_eq!(parse_value(&FieldType::Uuid, raw).unwrap(), Value::Uuid(id));
        }
        assert!(parse_value(&FieldType::Uuid, "not-a-guid").is_err());
    }

    #[test]
    fn enums_by_case_sensitive_name() {
        let ty = FieldType::Enum(Arc::new(EnumType::new("Rarity", ["Common", "Rare"])));
        assert_eq!(
            parse_value(&ty, "Rare").unwrap(),
            Value::Enum(EnumValue { member: "Rare".into(), value: 1 })
        );
        assert!(matches!(
            parse_value(&ty, "rare"),
            Err(ConvertError::UnknownEnumMember { enumeration, .. }) if enumeration == "Rarity"
        ));
        assert!(parse_value(&ty, "1").is_err());
    }

    #[test]
    fn unknown_types_are_unsupported() {
        let ty = FieldType::Other(String::from("Vector3"));
        assert!(matches!(
            parse_value(&ty, "1,2,3"),
            Err(ConvertError::UnsupportedType(name)) if name == "Vector3"
        ));
    }
}
