use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::time_codec::{self, Duration};

/// Race distance categories that personal bests are recorded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    #[serde(rename = "5k")]
    FiveK,
    #[serde(rename = "10k")]
    TenK,
    #[serde(rename = "half_marathon")]
    HalfMarathon,
    #[serde(rename = "marathon")]
    Marathon,
}

impl Distance {
    pub const ALL: [Distance; 4] = [
        Distance::FiveK,
        Distance::TenK,
        Distance::HalfMarathon,
        Distance::Marathon,
    ];

    /// Key used by the backend's `distance` column
    pub fn key(&self) -> &'static str {
        match self {
            Distance::FiveK => "5k",
            Distance::TenK => "10k",
            Distance::HalfMarathon => "half_marathon",
            Distance::Marathon => "marathon",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Distance::FiveK => "5K",
            Distance::TenK => "10K",
            Distance::HalfMarathon => "Half Marathon",
            Distance::Marathon => "Marathon",
        }
    }

    pub fn kilometers(&self) -> f64 {
        match self {
            Distance::FiveK => 5.0,
            Distance::TenK => 10.0,
            Distance::HalfMarathon => 21.0975,
            Distance::Marathon => 42.195,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown distance '{0}' (expected one of: 5k, 10k, half_marathon, marathon)")]
pub struct ParseDistanceError(pub String);

impl FromStr for Distance {
    type Err = ParseDistanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Distance::ALL
            .into_iter()
            .find(|d| d.key() == s)
            .ok_or_else(|| ParseDistanceError(s.to_string()))
    }
}

/// A row of the personal bests table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalBestRow {
    pub user_id: String,
    pub distance: Distance,
    /// Interval column, "HH:MM:SS"
    #[serde(default)]
    pub finish_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PersonalBestRow {
    pub fn duration(&self) -> Option<Duration> {
        time_codec::parse_duration(self.finish_time.as_deref())
    }
}

/// Projection used when reading the reference population
#[derive(Debug, Clone, Deserialize)]
pub struct FinishTimeRow {
    #[serde(default)]
    pub finish_time: Option<String>,
}

/// Body of a personal best upsert
#[derive(Debug, Clone, Serialize)]
pub struct PersonalBestUpsert<'a> {
    pub user_id: &'a str,
    pub distance: Distance,
    pub finish_time: String,
}
