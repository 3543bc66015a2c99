//! Static design rules and form input validation

use crate::error::{AdvisorError, Result};
use crate::types::{DesignField, DesignInput, FieldRule};

/// Manufacturable ranges for the primary fields
pub const DESIGN_RULES: [FieldRule; 5] = [
    FieldRule { field: DesignField::SubstrateLength, lower: 50.0, upper: 200.0 },
    FieldRule { field: DesignField::SubstrateWidth, lower: 30.0, upper: 100.0 },
    FieldRule { field: DesignField::SubstrateThickness, lower: 0.1, upper: 1.0 },
    FieldRule { field: DesignField::TraceWidth, lower: 0.2, upper: 5.0 },
    FieldRule { field: DesignField::TraceGap, lower: 0.5, upper: f64::INFINITY },
];

pub fn rule_for(field: DesignField) -> Option<&'static FieldRule> {
    DESIGN_RULES.iter().find(|r| r.field == field)
}

/// Parse raw form text. Blank means unset.
pub fn parse_field(field: DesignField, raw: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(AdvisorError::Parse {
            field,
            input: trimmed.to_string(),
        }),
    }
}

/// Fields that are unset or outside their rule, in rule order
pub fn validate(input: &DesignInput, rules: &[FieldRule]) -> Vec<DesignField> {
    rules
        .iter()
        .filter(|rule| match input.get(rule.field) {
            Some(value) => !rule.contains(value),
            None => true,
        })
        .map(|rule| rule.field)
        .collect()
}
