//! Per-user design session: form state, search results, and chat transcript

use crate::chat::ChatBackend;
use crate::config::PipelineConfig;
use crate::context::{build_system_prompt, format_context};
use crate::data_source::ReferenceSource;
use crate::error::{AdvisorError, Result};
use crate::scoring::rank_datasets;
use crate::selection::top_n_per_dataset;
use crate::sheets::{select_sheets, SheetPair};
use crate::types::*;
use crate::validation::{parse_field, validate, DESIGN_RULES};
use futures::StreamExt;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Form,
    Chat,
}

/// Results of the last successful search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub sheets: SheetPair,
    pub ranked: RankedResultSet,
    pub top: TopNSelection,
}

/// State frozen when the user switches to chat
#[derive(Debug)]
struct ChatState {
    inputs: DesignInput,
    context: ChatContext,
    system_prompt: String,
    api_key: Option<ApiKey>,
    transcript: Vec<ChatMessage>,
}

/// Everything one user owns. Mutated only through the methods below.
#[derive(Debug)]
pub struct DesignSession {
    config: PipelineConfig,
    mode: Mode,
    inputs: DesignInput,
    search: Option<SearchOutcome>,
    chat: Option<ChatState>,
}

impl DesignSession {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            mode: Mode::Form,
            inputs: DesignInput::new(),
            search: None,
            chat: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn inputs(&self) -> &DesignInput {
        &self.inputs
    }

    pub fn search_outcome(&self) -> Option<&SearchOutcome> {
        self.search.as_ref()
    }

    pub fn chat_context(&self) -> Option<&ChatContext> {
        self.chat.as_ref().map(|c| &c.context)
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        self.chat.as_ref().map(|c| c.transcript.as_slice()).unwrap_or(&[])
    }

    pub fn has_api_key(&self) -> bool {
        self.chat.as_ref().map_or(false, |c| c.api_key.is_some())
    }

    /// Parse and store one form field. Editing invalidates earlier results.
    pub fn set_field(&mut self, field: DesignField, raw: &str) -> Result<()> {
        self.require_mode(Mode::Form)?;
        let value = parse_field(field, raw)?;
        self.inputs.set(field, value);
        self.search = None;
        Ok(())
    }

    /// Every primary field that is unset or out of range, reported together
    pub fn validate(&self) -> Result<()> {
        let invalid = validate(&self.inputs, &DESIGN_RULES);
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(AdvisorError::RangeViolation(invalid))
        }
    }

    /// Validate, load the size-matched sheets, rank, and keep the top N.
    ///
    /// Datasets are loaded fresh each call. Any load failure aborts the whole
    /// search and leaves no partial results behind.
    pub async fn search(&mut self, source: &dyn ReferenceSource) -> Result<&SearchOutcome> {
        self.require_mode(Mode::Form)?;
        self.search = None;
        self.validate()?;

        let start = Instant::now();
        let (length, width) = match (
            self.inputs.get(DesignField::SubstrateLength),
            self.inputs.get(DesignField::SubstrateWidth),
        ) {
            (Some(length), Some(width)) => (length, width),
            _ => return Err(AdvisorError::InvalidState("substrate size is not set")),
        };

        let sheets = select_sheets(length, width);
        info!(
            "Searching {:?} reference sheets via {} source",
            sheets.size,
            source.name()
        );

        let mut datasets = Vec::with_capacity(2);
        for sheet in sheets.names() {
            match source.load(sheet).await {
                Ok(dataset) => {
                    debug!("  loaded {}: {} records", sheet, dataset.records.len());
                    datasets.push(dataset);
                }
                Err(e) => {
                    warn!("Failed to load sheet {}: {:#}", sheet, e);
                    return Err(AdvisorError::DataSource {
                        sheet: sheet.to_string(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        let ranked = rank_datasets(&datasets, &self.inputs, self.config.missing_values);
        let top = top_n_per_dataset(&ranked, self.config.top_n);

        info!(
            "Search complete: {} records ranked, {} datasets in top {} ({} ms)",
            ranked.len(),
            top.groups.len(),
            self.config.top_n,
            start.elapsed().as_millis()
        );

        Ok(&*self.search.insert(SearchOutcome { sheets, ranked, top }))
    }

    /// Freeze the context block and input snapshot and switch to chat
    pub fn enter_chat(&mut self, api_key: Option<ApiKey>) -> Result<()> {
        self.require_mode(Mode::Form)?;
        let outcome = self
            .search
            .as_ref()
            .ok_or(AdvisorError::InvalidState("no search results to discuss"))?;
        if outcome.ranked.is_empty() {
            return Err(AdvisorError::InvalidState("search returned no records"));
        }

        let context = format_context(&outcome.top);
        let system_prompt = build_system_prompt(&self.inputs, &context)?;

        self.chat = Some(ChatState {
            inputs: self.inputs.clone(),
            context,
            system_prompt,
            api_key,
            transcript: Vec::new(),
        });
        self.mode = Mode::Chat;
        info!("Entered chat mode");
        Ok(())
    }

    /// Inputs as they were when chat started
    pub fn chat_inputs(&self) -> Option<&DesignInput> {
        self.chat.as_ref().map(|c| &c.inputs)
    }

    pub fn set_api_key(&mut self, api_key: Option<ApiKey>) -> Result<()> {
        let chat = self.chat_state_mut()?;
        chat.api_key = api_key;
        Ok(())
    }

    /// Ask one question and fold the streamed reply into the transcript.
    ///
    /// `on_fragment` sees each fragment as it arrives. The question and the
    /// reply are appended together only when the stream completes; on error
    /// the transcript is left as it was and partial text is dropped.
    pub async fn ask<F>(
        &mut self,
        backend: &dyn ChatBackend,
        question: &str,
        mut on_fragment: F,
    ) -> Result<&str>
    where
        F: FnMut(&str),
    {
        let chat = self.chat_state_mut()?;
        let api_key = chat
            .api_key
            .clone()
            .ok_or_else(|| AdvisorError::ChatAuth("API key is not set".to_string()))?;

        let question = ChatMessage::user(question);
        let mut messages = chat.transcript.clone();
        messages.push(question.clone());

        debug!(
            "Chat request via {}: {} messages",
            backend.name(),
            messages.len()
        );

        let mut stream = backend
            .stream_completion(&api_key, &chat.system_prompt, &messages)
            .await
            .map_err(|e| {
                warn!("Chat request failed: {}", e);
                AdvisorError::from(e)
            })?;

        let mut reply = String::new();
        let mut fragments = 0usize;
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(text) => {
                    on_fragment(&text);
                    reply.push_str(&text);
                    fragments += 1;
                }
                Err(e) => {
                    warn!("Chat stream aborted after {} fragments: {}", fragments, e);
                    return Err(e.into());
                }
            }
        }

        info!("Chat reply complete: {} fragments, {} chars", fragments, reply.chars().count());

        chat.transcript.push(question);
        chat.transcript.push(ChatMessage::assistant(reply));
        Ok(chat
            .transcript
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default())
    }

    /// Back to an empty form; all results, context, key, and history are dropped
    pub fn return_to_form(&mut self) {
        self.inputs.clear();
        self.search = None;
        self.chat = None;
        self.mode = Mode::Form;
        info!("Session reset to form");
    }

    fn require_mode(&self, mode: Mode) -> Result<()> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(AdvisorError::InvalidState(match mode {
                Mode::Form => "operation requires form mode",
                Mode::Chat => "operation requires chat mode",
            }))
        }
    }

    fn chat_state_mut(&mut self) -> Result<&mut ChatState> {
        self.require_mode(Mode::Chat)?;
        self.chat
            .as_mut()
            .ok_or(AdvisorError::InvalidState("operation requires chat mode"))
    }
}
