//! Core type definitions for substrate design matching

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every design parameter the form collects
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum DesignField {
    SubstrateLength,
    SubstrateWidth,
    SubstrateThickness,
    TraceWidth,
    TraceGap,
    TraceCount,
    StretchRate,
    StretchCycles,
    Temperature,
}

impl DesignField {
    /// Declaration order; also the order of the serialized input
    pub const ALL: [DesignField; 9] = [
        DesignField::SubstrateLength,
        DesignField::SubstrateWidth,
        DesignField::SubstrateThickness,
        DesignField::TraceWidth,
        DesignField::TraceGap,
        DesignField::TraceCount,
        DesignField::StretchRate,
        DesignField::StretchCycles,
        DesignField::Temperature,
    ];

    /// Range-validated before anything else runs
    pub const PRIMARY: [DesignField; 5] = [
        DesignField::SubstrateLength,
        DesignField::SubstrateWidth,
        DesignField::SubstrateThickness,
        DesignField::TraceWidth,
        DesignField::TraceGap,
    ];

    /// Free-form, only used for scoring
    pub const SECONDARY: [DesignField; 4] = [
        DesignField::TraceCount,
        DesignField::StretchRate,
        DesignField::StretchCycles,
        DesignField::Temperature,
    ];

    /// Scoring vector order. The trace gap is validated but never scored.
    pub const SCORING: [DesignField; SCORING_LEN] = [
        DesignField::SubstrateLength,
        DesignField::SubstrateWidth,
        DesignField::SubstrateThickness,
        DesignField::TraceWidth,
        DesignField::TraceCount,
        DesignField::StretchRate,
        DesignField::StretchCycles,
        DesignField::Temperature,
    ];

    /// Display label, identical to the reference sheet column header
    pub fn label(self) -> &'static str {
        match self {
            DesignField::SubstrateLength => "基板長さ_mm",
            DesignField::SubstrateWidth => "基板幅_mm",
            DesignField::SubstrateThickness => "基板厚み_mm",
            DesignField::TraceWidth => "配線幅_mm",
            DesignField::TraceGap => "配線間ギャップ_mm",
            DesignField::TraceCount => "配線本数",
            DesignField::StretchRate => "伸縮率_%",
            DesignField::StretchCycles => "伸縮回数",
            DesignField::Temperature => "温度_℃",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.label() == label)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DesignField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub const SCORING_LEN: usize = 8;

/// User-entered design values. A value is either unset or finite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignInput {
    values: [Option<f64>; 9],
}

impl DesignInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: DesignField) -> Option<f64> {
        self.values[field.index()]
    }

    /// Non-finite values are stored as unset
    pub fn set(&mut self, field: DesignField, value: Option<f64>) {
        self.values[field.index()] = value.filter(|v| v.is_finite());
    }

    pub fn with(mut self, field: DesignField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    /// Scoring vector in `DesignField::SCORING` order
    pub fn scoring_vector(&self) -> [Option<f64>; SCORING_LEN] {
        DesignField::SCORING.map(|f| self.get(f))
    }

    pub fn clear(&mut self) {
        self.values = Default::default();
    }
}

impl Serialize for DesignInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(DesignField::ALL.len()))?;
        for field in DesignField::ALL {
            map.serialize_entry(field.label(), &self.get(field))?;
        }
        map.end()
    }
}

/// Inclusive range rule for a primary field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub field: DesignField,
    pub lower: f64,
    pub upper: f64, // f64::INFINITY when unbounded
}

impl FieldRule {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Placeholder text shown next to the form prompt
    pub fn placeholder(&self) -> String {
        if self.upper.is_infinite() {
            format!("{} ~ inf mm", self.lower)
        } else {
            format!("{} ~ {} mm", self.lower, self.upper)
        }
    }
}

/// One row of a reference sheet
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub attributes: [f64; SCORING_LEN], // DesignField::SCORING order
    pub metadata: Vec<(String, String)>, // remaining sheet columns, sheet order
}

/// A named reference table, rows in sheet order
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDataset {
    pub name: String,
    pub records: Vec<ReferenceRecord>,
}

/// Reference row tagged with its origin and error score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: ReferenceRecord,
    pub dataset: String,
    pub score: f64,
}

/// Every scored record across the selected datasets, ascending by score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedResultSet {
    pub records: Vec<ScoredRecord>,
}

impl RankedResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Best records per dataset, datasets in order of first appearance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopNSelection {
    pub n: usize,
    pub groups: Vec<(String, Vec<ScoredRecord>)>,
}

impl TopNSelection {
    pub fn get(&self, dataset: &str) -> Option<&[ScoredRecord]> {
        self.groups
            .iter()
            .find(|(name, _)| name == dataset)
            .map(|(_, records)| records.as_slice())
    }
}

/// Text block embedded verbatim in the chat system prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContext(String);

impl ChatContext {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Chat API credential. Held in session memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Blank input yields `None`
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// How unset user values enter the error score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingValuePolicy {
    /// Treat unset as 0.0 (compatible behavior)
    #[default]
    ZeroFill,
    /// Average only over the fields the user supplied
    Skip,
}

impl MissingValuePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "zero" | "zero-fill" | "zerofill" => Some(Self::ZeroFill),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_serializes_in_field_order() {
        let input = DesignInput::new()
            .with(DesignField::SubstrateLength, 150.0)
            .with(DesignField::Temperature, 25.0);
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.starts_with("{\"基板長さ_mm\":150.0,\"基板幅_mm\":null"));
        assert!(json.ends_with("\"温度_℃\":25.0}"));
    }

    #[test]
    fn test_non_finite_is_unset() {
        let mut input = DesignInput::new();
        input.set(DesignField::TraceWidth, Some(f64::NAN));
        assert_eq!(input.get(DesignField::TraceWidth), None);
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret").unwrap();
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
        assert!(ApiKey::new("   ").is_none());
    }

    #[test]
    fn test_label_round_trip() {
        for field in DesignField::ALL {
            assert_eq!(DesignField::from_label(field.label()), Some(field));
        }
    }
}
