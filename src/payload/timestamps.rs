// src/payload/timestamps.rs

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;

use crate::errors::{Result, TaskgraphError};
use crate::payload::rewrite;

static RELATIVE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-)?\s*(\d+)\s*([a-z]+)\s*$").expect("static regex"));

/// Parse a relative time such as `"1 day"`, `"2 weeks"` or `"-30 min"`.
pub fn parse_relative_time(input: &str) -> Option<Duration> {
    let caps = RELATIVE_TIME.captures(input)?;
    let negative = caps.get(1).is_some();
    let value: i64 = caps[2].parse().ok()?;
    let seconds_per_unit = match &caps[3] {
        "s" | "sec" | "second" | "seconds" => 1,
        "m" | "min" | "minute" | "minutes" => 60,
        "h" | "hour" | "hours" => 60 * 60,
        "d" | "day" | "days" => 24 * 60 * 60,
        "w" | "week" | "weeks" => 7 * 24 * 60 * 60,
        "mo" | "month" | "months" => 30 * 24 * 60 * 60,
        "y" | "year" | "years" => 365 * 24 * 60 * 60,
        _ => return None,
    };
    let seconds = value.checked_mul(seconds_per_unit)?;
    Duration::try_seconds(if negative { -seconds } else { seconds })
}

/// Format `now + input` the way the execution service expects.
pub fn json_time_from_now(input: &str, now: DateTime<Utc>) -> Option<String> {
    let offset = parse_relative_time(input)?;
    let time = now.checked_add_signed(offset)?;
    Some(time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// Replace every `{"relative-datestamp": "..."}` in `task` with an absolute
/// timestamp relative to `now`.
pub fn resolve_timestamps(label: &str, task: &Value, now: DateTime<Utc>) -> Result<Value> {
    rewrite(task, &mut |key, value| {
        if key != "relative-datestamp" {
            return Ok(None);
        }
        let input = value.as_str().unwrap_or_default();
        json_time_from_now(input, now)
            .map(|s| Some(Value::String(s)))
            .ok_or_else(|| TaskgraphError::TaskReference {
                label: label.to_string(),
                message: format!("invalid relative-datestamp {value}"),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_units_and_aliases() {
        assert_eq!(parse_relative_time("1 day"), Some(Duration::days(1)));
        assert_eq!(parse_relative_time("2w"), Some(Duration::weeks(2)));
        assert_eq!(parse_relative_time("1 month"), Some(Duration::days(30)));
        assert_eq!(parse_relative_time("-30 min"), Some(Duration::minutes(-30)));
        assert_eq!(parse_relative_time("3 fortnights"), None);
        assert_eq!(parse_relative_time("soon"), None);
    }

    #[test]
    fn resolves_nested_datestamps() {
        let task = json!({
            "created": {"relative-datestamp": "0 seconds"},
            "deadline": {"relative-datestamp": "1 day"},
            "payload": {"artifacts": [{"expires": {"relative-datestamp": "1 year"}}]},
        });
        let out = resolve_timestamps("t", &task, now()).unwrap();
        assert_eq!(out["created"], "2024-01-31T12:00:00.000Z");
        assert_eq!(out["deadline"], "2024-02-01T12:00:00.000Z");
        assert_eq!(
            out["payload"]["artifacts"][0]["expires"],
            "2025-01-30T12:00:00.000Z"
        );
    }

    #[test]
    fn invalid_datestamp_is_an_error() {
        let task = json!({"deadline": {"relative-datestamp": "tomorrow"}});
        assert!(resolve_timestamps("t", &task, now()).is_err());
    }
}
