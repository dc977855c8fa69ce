// Common data models for detection

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Outcome of a detection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Which path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Local generator, no network
    Synthetic,
    /// External inference endpoint
    Remote,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synthetic => write!(f, "synthetic"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Ordinal disease impact: none < mild < moderate < severe.
/// `Unknown` is not ranked against the other levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
    Unknown,
}

impl Severity {
    /// Levels the synthetic path draws from for a diseased plant
    pub const DISEASED: [Severity; 3] = [Self::Mild, Self::Moderate, Self::Severe];

    /// Position on the impact scale, None for `Unknown`
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::None => Some(0),
            Self::Mild => Some(1),
            Self::Moderate => Some(2),
            Self::Severe => Some(3),
            Self::Unknown => None,
        }
    }

    /// Label used in Chinese summaries
    pub fn label_zh(&self) -> &'static str {
        match self {
            Self::None => "无",
            Self::Mild => "轻微",
            Self::Moderate => "中等",
            Self::Severe => "严重",
            Self::Unknown => "未知",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Placeholder for fields nothing could be extracted for
pub const UNKNOWN: &str = "unknown";

/// Structured subset of a diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Details {
    pub disease: String,
    pub severity: Severity,
    /// In [0, 1]
    pub confidence: f64,
    pub solution: String,
    pub symptoms: String,
}

impl Default for Details {
    fn default() -> Self {
        Self {
            disease: UNKNOWN.to_string(),
            severity: Severity::Unknown,
            confidence: 0.0,
            solution: UNKNOWN.to_string(),
            symptoms: UNKNOWN.to_string(),
        }
    }
}

/// Uniform contract returned by every detection path.
///
/// `result` and `details` are set iff `status` is `Success`; `error` is set
/// iff it is `Error`. Use the constructors to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub status: Status,
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds, 2 decimals; remote attempts only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    /// Why the remote path was abandoned, on a fallback result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
    /// Remote payload kept for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

impl DetectionResult {
    pub fn success(mode: Mode, text: String, details: Details) -> Self {
        Self {
            status: Status::Success,
            mode,
            result: Some(text),
            details: Some(details),
            error: None,
            response_time: None,
            remote_error: None,
            raw_response: None,
        }
    }

    pub fn failure(mode: Mode, error: impl fmt::Display) -> Self {
        Self {
            status: Status::Error,
            mode,
            result: None,
            details: None,
            error: Some(error.to_string()),
            response_time: None,
            remote_error: None,
            raw_response: None,
        }
    }

    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }

    pub fn with_raw_response(mut self, raw: serde_json::Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub fn with_remote_error(mut self, error: Option<String>) -> Self {
        self.remote_error = error;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Read-only view of the dispatcher counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    /// Successful remote calls only
    pub success_calls: u64,
    pub synthetic_calls: u64,
    pub remote_calls: u64,
    /// Percent, 2 decimals
    pub success_rate: f64,
    /// Mean seconds per successful remote call, 2 decimals
    pub avg_response_time: f64,
    pub remote_available: bool,
}
