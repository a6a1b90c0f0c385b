use std::fmt;

/// A club's advertised pace band in fractional minutes per mile
/// (6.25 is 6:15/mile). `low` and `high` are not ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceRange {
    pub low: f64,
    pub high: f64,
}

impl PaceRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

impl From<[f64; 2]> for PaceRange {
    fn from([low, high]: [f64; 2]) -> Self {
        Self { low, high }
    }
}

impl fmt::Display for PaceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_range(self))
    }
}

/// Format fractional minutes per mile as "M:SS min/mile"
pub fn format_pace(pace: f64) -> String {
    let minutes = pace.floor();
    let seconds = ((pace - minutes) * 60.0).round() as i64;

    format!("{}:{:02} min/mile", minutes as i64, seconds)
}

/// Format a pace band as "M:SS min/mile - M:SS min/mile"
pub fn format_range(range: &PaceRange) -> String {
    format!("{} - {}", format_pace(range.low), format_pace(range.high))
}
