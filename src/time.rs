use chrono::Utc;

const MINUTE_MS: i64 = 60_000;

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{} {} ago", count, unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Short "how long ago" label for an epoch-millisecond timestamp.
///
/// Unset, future and sub-minute timestamps all read "just now".
pub fn format_relative_time(timestamp: i64, now: i64) -> String {
    if timestamp <= 0 {
        return "just now".to_string();
    }
    let delta = now - timestamp;
    let minutes = delta / MINUTE_MS;
    if delta < 0 || minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "min");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hr");
    }

    let days = hours / 24;
    if days < 7 {
        return plural(days, "day");
    }

    let weeks = days / 7;
    if weeks < 5 {
        return plural(weeks, "wk");
    }

    let months = days / 30;
    if months < 12 {
        return plural(months, "mo");
    }

    plural(days / 365, "yr")
}
