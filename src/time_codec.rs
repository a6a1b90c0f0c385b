//! Conversion between the backend's "HH:MM:SS" interval strings and
//! structured durations, plus the compact display forms used for
//! personal bests.

use std::fmt;

const UNSET: &str = "Not set";
const MAX_MINUTES: i64 = 59;
const MAX_SECONDS: i64 = 59;

/// Raw interval fields as they came off the wire, each left-padded to two
/// characters. Nothing is validated here; see [`IntervalParts::to_duration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalParts {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
}

impl IntervalParts {
    /// Numeric view of the fields. Non-numeric fields count as zero and
    /// out-of-range values are clamped.
    pub fn to_duration(&self) -> Duration {
        Duration::new(
            numeric_field(&self.hours).unwrap_or(0),
            numeric_field(&self.minutes).unwrap_or(0),
            numeric_field(&self.seconds).unwrap_or(0),
        )
    }
}

/// A finish time with minutes and seconds kept in `0..=59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl Duration {
    /// Build a duration, clamping negatives to zero and minutes/seconds to 59.
    pub fn new(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self {
            hours: hours.clamp(0, u32::MAX as i64) as u32,
            minutes: minutes.clamp(0, MAX_MINUTES) as u32,
            seconds: seconds.clamp(0, MAX_SECONDS) as u32,
        }
    }

    pub fn from_total_seconds(total: u64) -> Self {
        let hours = (total / 3600).min(u32::MAX as u64) as u32;
        let minutes = ((total % 3600) / 60) as u32;
        let seconds = (total % 60) as u32;
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn total_seconds(&self) -> i64 {
        self.hours as i64 * 3600 + self.minutes as i64 * 60 + self.seconds as i64
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

fn numeric_field(field: &str) -> Option<i64> {
    field.trim().parse::<i64>().ok()
}

/// Split an interval string into its three fields.
///
/// Missing trailing fields default to "00", fields past the third are
/// ignored, and `None` or an empty string yields all zeros.
pub fn parse(interval: Option<&str>) -> IntervalParts {
    let mut fields = interval
        .unwrap_or_default()
        .split(':')
        .map(|field| format!("{:0>2}", field));

    let mut next = || fields.next().unwrap_or_else(|| "00".to_string());
    let hours = next();
    let minutes = next();
    let seconds = next();

    IntervalParts {
        hours,
        minutes,
        seconds,
    }
}

/// Tagged view of an interval: `None` when nothing was recorded.
///
/// Unlike [`render`], this keeps "unset" apart from an explicit zero.
pub fn parse_duration(interval: Option<&str>) -> Option<Duration> {
    match interval {
        None | Some("") => None,
        Some(_) => Some(parse(interval).to_duration()),
    }
}

/// Wire representation sent back to the backend.
pub fn format(duration: &Duration) -> String {
    duration.to_string()
}

/// Compact display such as "1h 5m 30s".
///
/// Fields equal to "00" are dropped. When nothing is left the interval reads
/// as "Not set", so a recorded zero is indistinguishable from no record.
pub fn render(interval: Option<&str>) -> String {
    let Some(raw) = interval else {
        return UNSET.to_string();
    };

    let parts = parse(Some(raw));
    let rendered = [(&parts.hours, 'h'), (&parts.minutes, 'm'), (&parts.seconds, 's')]
        .into_iter()
        .filter(|(field, _)| field.as_str() != "00")
        .filter_map(|(field, unit)| numeric_field(field).map(|n| format!("{}{}", n, unit)))
        .collect::<Vec<_>>()
        .join(" ");

    if rendered.is_empty() {
        UNSET.to_string()
    } else {
        rendered
    }
}

/// `a - b` in seconds.
pub fn diff_seconds(a: &str, b: &str) -> i64 {
    parse(Some(a)).to_duration().total_seconds() - parse(Some(b)).to_duration().total_seconds()
}

/// Signed, compact rendering of a difference in seconds: "Equal", "+ 1m 5s",
/// "- 2h 3s". Components are shown only when greater than zero.
pub fn format_difference(diff_seconds: i64) -> String {
    if diff_seconds == 0 {
        return "Equal".to_string();
    }

    let sign = if diff_seconds > 0 { '+' } else { '-' };
    let magnitude = Duration::from_total_seconds(diff_seconds.unsigned_abs());

    let body = [
        (magnitude.hours(), 'h'),
        (magnitude.minutes(), 'm'),
        (magnitude.seconds(), 's'),
    ]
    .into_iter()
    .filter(|(value, _)| *value > 0)
    .map(|(value, unit)| format!("{}{}", value, unit))
    .collect::<Vec<_>>()
    .join(" ");

    format!("{} {}", sign, body)
}
