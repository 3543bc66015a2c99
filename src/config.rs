//! Environment-driven configuration

use crate::selection::DEFAULT_TOP_N;
use crate::types::{ApiKey, MissingValuePolicy};
use std::path::PathBuf;

pub const DEFAULT_WORKBOOK: &str = "ダミーデータ.xlsx";
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Where reference datasets come from
#[derive(Debug, Clone, PartialEq)]
pub enum DataLocation {
    Workbook(PathBuf),
    CsvDirectory(PathBuf),
}

/// Pipeline tuning shared by every session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub top_n: usize,
    pub missing_values: MissingValuePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            missing_values: MissingValuePolicy::ZeroFill,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data: DataLocation,
    pub pipeline: PipelineConfig,
    pub chat_base_url: String,
    pub chat_model: String,
    pub api_key: Option<ApiKey>, // pre-fills the chat credential; never logged
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data = match lookup("ADVISOR_CSV_DIR") {
            Some(dir) if !dir.trim().is_empty() => DataLocation::CsvDirectory(PathBuf::from(dir)),
            _ => DataLocation::Workbook(PathBuf::from(
                lookup("ADVISOR_WORKBOOK").unwrap_or_else(|| DEFAULT_WORKBOOK.to_string()),
            )),
        };

        let top_n = lookup("ADVISOR_TOP_N")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TOP_N);

        let missing_values = lookup("ADVISOR_MISSING_VALUES")
            .and_then(|v| MissingValuePolicy::parse(&v))
            .unwrap_or_default();

        Self {
            data,
            pipeline: PipelineConfig { top_n, missing_values },
            chat_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CHAT_BASE_URL.to_string()),
            chat_model: lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            api_key: lookup("OPENAI_API_KEY").and_then(ApiKey::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.data, DataLocation::Workbook(PathBuf::from(DEFAULT_WORKBOOK)));
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("ADVISOR_CSV_DIR", "/data/sheets"),
            ("ADVISOR_TOP_N", "3"),
            ("ADVISOR_MISSING_VALUES", "skip"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        assert_eq!(config.data, DataLocation::CsvDirectory(PathBuf::from("/data/sheets")));
        assert_eq!(config.pipeline.top_n, 3);
        assert_eq!(config.pipeline.missing_values, MissingValuePolicy::Skip);
        assert_eq!(config.api_key.unwrap().expose(), "sk-test");
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[("ADVISOR_TOP_N", "0"), ("ADVISOR_MISSING_VALUES", "mean")]);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }
}
