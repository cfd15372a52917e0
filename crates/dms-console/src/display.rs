//! Presentation helpers shared by renderers.

use chrono::FixedOffset;
use dms_api_models::ServerTimestamp;

/// Offset timestamps are shown in unless configured otherwise.
pub const DEFAULT_DISPLAY_OFFSET: &str = "+05:30";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Parse an offset such as `+05:30`, `-0800` or `Z`.
#[must_use]
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Render a server timestamp in `offset`, e.g. `1/3/2024, 3:45:30 pm`.
/// Unparseable values are returned verbatim; empty values render empty.
#[must_use]
pub fn format_timestamp(timestamp: &ServerTimestamp, offset: FixedOffset) -> String {
    timestamp.to_utc().map_or_else(
        || timestamp.as_str().to_string(),
        |utc| {
            utc.with_timezone(&offset)
                .format("%-d/%-m/%Y, %-I:%M:%S %P")
                .to_string()
        },
    )
}

/// Render a byte count in megabytes with two decimals.
#[must_use]
pub fn format_megabytes(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let megabytes = bytes as f64 / BYTES_PER_MB;
    format!("{megabytes:.2} MB")
}
