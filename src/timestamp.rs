use crate::error::MapError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

const JST_OFFSET_SECS: i32 = 9 * 3600;
const DISPLAY_FORMAT: &str = "%Y年%m月%d日 %H時%M分 JST";

/// Formats a UTC timestamp as Japan Standard Time, e.g. `2024年01月15日 12時00分 JST`.
///
/// Accepts RFC 3339 (`2024-01-15T03:00:00.000Z`) or a naive
/// `YYYY-MM-DD HH:MM:SS` which is read as UTC.
pub fn format_jst(input: &str) -> Result<String, MapError> {
    let utc = parse_utc(input.trim()).map_err(|reason| MapError::TimestampParse {
        input: input.to_string(),
        reason,
    })?;

    let jst = FixedOffset::east_opt(JST_OFFSET_SECS).expect("UTC+9 is within the valid offset range");
    Ok(utc.with_timezone(&jst).format(DISPLAY_FORMAT).to_string())
}

fn parse_utc(input: &str) -> Result<DateTime<Utc>, String> {
    match DateTime::parse_from_rfc3339(input) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| rfc_err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_modified_time_is_shown_in_jst() {
        assert_eq!(
            format_jst("2024-01-15T03:00:00.000Z").unwrap(),
            "2024年01月15日 12時00分 JST"
        );
    }

    #[test]
    fn conversion_crosses_the_date_line() {
        assert_eq!(
            format_jst("2024-01-01T15:30:59Z").unwrap(),
            "2024年01月02日 00時30分 JST"
        );
    }

    #[test]
    fn explicit_offsets_are_honoured() {
        assert_eq!(
            format_jst("2024-01-15T12:00:00+09:00").unwrap(),
            "2024年01月15日 12時00分 JST"
        );
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        assert_eq!(
            format_jst("2024-07-01 00:00:00").unwrap(),
            "2024年07月01日 09時00分 JST"
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        for input in ["", "yesterday", "2024-13-01T00:00:00Z"] {
            match format_jst(input) {
                Err(MapError::TimestampParse { input: got, .. }) => assert_eq!(got, input),
                other => panic!("expected parse error for {input:?}, got {other:?}"),
            }
        }
    }
}
