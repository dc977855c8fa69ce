// Helper functions shared by the detection paths

use time::macros::format_description;
use time::OffsetDateTime;

/// Current local time as `YYYY-MM-DD HH:MM:SS` (UTC if the local offset is unknown)
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_default()
}

/// First `max` characters of `text` (never splits a UTF-8 sequence)
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Round to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
