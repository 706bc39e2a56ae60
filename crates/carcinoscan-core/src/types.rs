//! Core types for carcinoscan verdicts.
//!
//! Every field of a [`Verdict`] is always present on the wire. `"unknown"`
//! is a valid terminal value for every field, never an absent key.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Literal used on the wire for any field without an assessment.
pub const UNKNOWN: &str = "unknown";

/// Coarse risk classification for an ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    /// Parse a risk level case-insensitively.
    ///
    /// Returns `None` for anything outside the four known levels, including
    /// template echoes such as `"Low/Medium/High"`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "unknown" => Some(RiskLevel::Unknown),
            _ => None,
        }
    }

    /// Risk band for a numeric score: 0-30 low, 31-60 medium, 61-100 high.
    pub fn for_score(score: u32) -> Self {
        match score {
            0..=30 => RiskLevel::Low,
            31..=60 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, RiskLevel::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Unknown => UNKNOWN,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RiskLevel::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid risk level '{}'", raw)))
    }
}

/// Risk score: an integer in 0..=100, or `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    Value(u32),
    Unknown,
}

impl Score {
    /// Highest valid score.
    pub const MAX: u32 = 100;

    /// Create a numeric score, rejecting values above [`Score::MAX`].
    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX).then_some(Score::Value(value))
    }

    /// Numeric value, if any.
    pub fn value(&self) -> Option<u32> {
        match self {
            Score::Value(v) => Some(*v),
            Score::Unknown => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Score::Value(0))
    }

    /// Lenient conversion from a generated JSON value.
    ///
    /// Accepts integers, floats (rounded), numeric strings (`"0"`, `"45"`)
    /// and the `"unknown"` literal. Out-of-range numbers yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_u64() {
                    u32::try_from(i).ok().and_then(Score::new)
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite() && *f >= 0.0 && *f <= Self::MAX as f64)
                        .map(|f| Score::Value(f.round() as u32))
                }
            }
            serde_json::Value::String(s) => Score::parse(s),
            _ => None,
        }
    }

    /// Parse a score from text.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(UNKNOWN) {
            return Some(Score::Unknown);
        }
        if let Ok(n) = trimmed.parse::<u32>() {
            return Score::new(n);
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0 && *f <= Self::MAX as f64)
            .map(|f| Score::Value(f.round() as u32))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Value(v) => write!(f, "{}", v),
            Score::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Value(v) => serializer.serialize_u32(*v),
            Score::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Score::from_json(&raw).ok_or_else(|| de::Error::custom(format!("invalid score {}", raw)))
    }
}

/// Processing classification, 1 (unprocessed) through 4 (ultra-processed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessingClass(u8);

impl ProcessingClass {
    pub fn new(value: u8) -> Option<Self> {
        (1..=4).contains(&value).then_some(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ProcessingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ProcessingClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for ProcessingClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        ProcessingClass::new(raw)
            .ok_or_else(|| de::Error::custom(format!("processing class {} not in 1..=4", raw)))
    }
}

/// The structured per-ingredient risk assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub name: String,
    pub risk_level: RiskLevel,
    pub score: Score,
    pub source: String,
    pub explanation: String,
    /// Always serialized; `null` when no classification is available.
    pub processing_class: Option<ProcessingClass>,
}

impl Verdict {
    /// A verdict with every field set to "unknown".
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            risk_level: RiskLevel::Unknown,
            score: Score::Unknown,
            source: UNKNOWN.to_string(),
            explanation: UNKNOWN.to_string(),
            processing_class: None,
        }
    }

    /// True when every field carries the "unknown" value.
    pub fn is_unknown(&self) -> bool {
        self.risk_level.is_unknown()
            && self.score == Score::Unknown
            && self.source == UNKNOWN
            && self.explanation == UNKNOWN
            && self.processing_class.is_none()
    }
}

/// A possibly incomplete verdict: a parsed reasoning response or a
/// known-table entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialVerdict {
    pub name: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub score: Option<Score>,
    pub source: Option<String>,
    pub explanation: Option<String>,
    #[serde(alias = "nova_group")]
    pub processing_class: Option<ProcessingClass>,
}

impl PartialVerdict {
    /// Risk level, if it carries an actual assessment.
    pub fn informative_risk_level(&self) -> Option<RiskLevel> {
        self.risk_level.filter(|r| !r.is_unknown())
    }

    /// Score, if numeric.
    pub fn informative_score(&self) -> Option<Score> {
        self.score.filter(|s| s.value().is_some())
    }

    pub fn informative_source(&self) -> Option<&str> {
        informative_text(self.source.as_deref())
    }

    pub fn informative_explanation(&self) -> Option<&str> {
        informative_text(self.explanation.as_deref())
    }

    /// True when no field carries data worth merging.
    pub fn is_empty(&self) -> bool {
        self.informative_risk_level().is_none()
            && self.informative_score().is_none()
            && self.informative_source().is_none()
            && self.informative_explanation().is_none()
            && self.processing_class.is_none()
    }
}

fn informative_text(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(UNKNOWN))
}
