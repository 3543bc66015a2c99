use crate::types::DesignField;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("{field}には数値を入力してください。")]
    Parse { field: DesignField, input: String },

    #[error("設計不可能です。以下の項目が不適合です: {}", join_fields(.0))]
    RangeViolation(Vec<DesignField>),

    #[error("データ検索中にエラーが発生しました: {sheet}: {reason}")]
    DataSource { sheet: String, reason: String },

    #[error("OpenAI API Keyを入力してください。({0})")]
    ChatAuth(String),

    #[error("エラーが発生しました: {0}")]
    ChatTransport(String),

    #[error("Invalid session state: {0}")]
    InvalidState(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by a chat backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<ChatError> for AdvisorError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Auth(msg) => AdvisorError::ChatAuth(msg),
            ChatError::Transport(msg) => AdvisorError::ChatTransport(msg),
        }
    }
}

fn join_fields(fields: &[DesignField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}
