//! Substrate Design Advisor
//!
//! Validates flexible-substrate design parameters and matches them against
//! reference characteristic sheets:
//! - Static range rules for the primary design fields
//! - Size-based selection of electrical/mechanical reference sheets
//! - Mean-absolute-error ranking with per-sheet top-N extraction
//! - Text context for a streamed LLM chat about the matches

pub mod types;
pub mod error;
pub mod config;
pub mod validation;
pub mod sheets;
pub mod data_source;
pub mod scoring;
pub mod selection;
pub mod context;
pub mod chat;
pub mod session;
pub mod console;

pub use types::*;
pub use error::{AdvisorError, ChatError};
pub use config::{AppConfig, DataLocation, PipelineConfig};
pub use data_source::{CsvDirectorySource, InMemorySource, ReferenceSource, WorkbookSource};
pub use chat::{ChatBackend, OpenAiChat, ScriptedChat};
pub use session::{DesignSession, Mode, SearchOutcome};
pub use console::Console;
