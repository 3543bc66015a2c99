//! Line-oriented terminal front end for a design session

use crate::chat::ChatBackend;
use crate::context::{render_summary_table, render_table};
use crate::data_source::ReferenceSource;
use crate::error::AdvisorError;
use crate::session::{DesignSession, SearchOutcome};
use crate::types::{ApiKey, DesignField};
use crate::validation::rule_for;
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

pub const TITLE: &str = "設計値検証アプリと類似データ検索";
const BACK_COMMAND: &str = "/back";
const QUIT_COMMAND: &str = "/quit";
const KEY_COMMAND: &str = "/key";

enum FormExit {
    Chat,
    Restart,
    Quit,
}

enum ChatExit {
    Back,
    Quit,
}

/// Drives one session over a line reader and a text writer
pub struct Console<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
        }
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    /// Run until the user quits or input ends
    pub async fn run(
        &mut self,
        session: &mut DesignSession,
        source: &dyn ReferenceSource,
        backend: &dyn ChatBackend,
        default_key: Option<ApiKey>,
    ) -> Result<()> {
        self.say(TITLE)?;
        loop {
            match self.form_stage(session, source).await? {
                FormExit::Quit => return Ok(()),
                FormExit::Restart => {
                    session.return_to_form();
                    continue;
                }
                FormExit::Chat => {}
            }

            match self.chat_stage(session, backend, default_key.clone()).await? {
                ChatExit::Back => session.return_to_form(),
                ChatExit::Quit => return Ok(()),
            }
        }
    }

    async fn form_stage(
        &mut self,
        session: &mut DesignSession,
        source: &dyn ReferenceSource,
    ) -> Result<FormExit> {
        self.say("設計値を入力してください")?;

        let mut pending: Vec<DesignField> = DesignField::PRIMARY.to_vec();
        loop {
            for field in pending {
                if !self.prompt_field(session, field).await? {
                    return Ok(FormExit::Quit);
                }
            }
            match session.validate() {
                Ok(()) => break,
                Err(AdvisorError::RangeViolation(fields)) => {
                    self.say("設計不可能です。以下の項目が不適合です:")?;
                    for field in &fields {
                        self.say(&format!("- {}", field))?;
                    }
                    pending = fields;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.say("設計可能です！ 次の項目を入力してください：")?;
        for field in DesignField::SECONDARY {
            if !self.prompt_field(session, field).await? {
                return Ok(FormExit::Quit);
            }
        }

        loop {
            match session.search(source).await {
                Ok(outcome) => {
                    self.render_outcome(outcome)?;
                    if outcome.ranked.is_empty() {
                        self.say("類似データが見つかりませんでした。")?;
                        return self.ask_restart().await;
                    }
                    break;
                }
                Err(e @ AdvisorError::DataSource { .. }) => {
                    self.say(&e.to_string())?;
                    self.write("Enterで再試行、qで終了: ")?;
                    match self.read_line().await? {
                        Some(line) if line.trim().eq_ignore_ascii_case("q") => {
                            return Ok(FormExit::Quit)
                        }
                        Some(_) => continue,
                        None => return Ok(FormExit::Quit),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.write("OpenAIとチャットする? [y: チャット / r: 入力し直す / q: 終了]: ")?;
        Ok(match self.read_line().await? {
            Some(line) => match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => FormExit::Chat,
                "r" => FormExit::Restart,
                _ => FormExit::Quit,
            },
            None => FormExit::Quit,
        })
    }

    async fn ask_restart(&mut self) -> Result<FormExit> {
        self.write("r: 入力し直す / q: 終了: ")?;
        Ok(match self.read_line().await? {
            Some(line) if line.trim().eq_ignore_ascii_case("r") => FormExit::Restart,
            _ => FormExit::Quit,
        })
    }

    /// Prompt until the field parses. `false` when input ends.
    async fn prompt_field(&mut self, session: &mut DesignSession, field: DesignField) -> Result<bool> {
        let prompt = match rule_for(field) {
            Some(rule) => format!("{} ({}): ", field, rule.placeholder()),
            None => format!("{} (ここに値を入力): ", field),
        };

        loop {
            self.write(&prompt)?;
            let line = match self.read_line().await? {
                Some(line) => line,
                None => return Ok(false),
            };
            match session.set_field(field, &line) {
                Ok(()) => return Ok(true),
                Err(e @ AdvisorError::Parse { .. }) => self.say(&e.to_string())?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn render_outcome(&mut self, outcome: &SearchOutcome) -> Result<()> {
        self.say("誤差平均計算結果:")?;
        self.write(&render_summary_table(&outcome.ranked.records))?;
        self.say(&format!("### 類似度上位{}件", outcome.top.n))?;
        for (name, records) in &outcome.top.groups {
            self.say(&format!("{}:", name))?;
            self.write(&render_table(records))?;
        }
        Ok(())
    }

    async fn chat_stage(
        &mut self,
        session: &mut DesignSession,
        backend: &dyn ChatBackend,
        default_key: Option<ApiKey>,
    ) -> Result<ChatExit> {
        let key = match default_key {
            Some(key) => Some(key),
            None => match self.prompt_key().await? {
                Some(key) => key,
                None => return Ok(ChatExit::Quit),
            },
        };
        session.enter_chat(key)?;

        self.say("### チャット")?;
        if let Some(inputs) = session.chat_inputs() {
            let summary = DesignField::ALL
                .into_iter()
                .filter_map(|field| inputs.get(field).map(|v| format!("{}={}", field, v)))
                .collect::<Vec<_>>()
                .join(", ");
            self.say(&format!("入力された設計値: {}", summary))?;
        }
        self.say(&format!(
            "質問を入力してください ({} で入力画面に戻る, {} でキー入力, {} で終了)",
            BACK_COMMAND, KEY_COMMAND, QUIT_COMMAND
        ))?;

        loop {
            self.write("> ")?;
            let line = match self.read_line().await? {
                Some(line) => line,
                None => return Ok(ChatExit::Quit),
            };
            let question = line.trim();
            match question {
                "" => continue,
                BACK_COMMAND => return Ok(ChatExit::Back),
                QUIT_COMMAND => return Ok(ChatExit::Quit),
                KEY_COMMAND => {
                    match self.prompt_key().await? {
                        Some(key) => session.set_api_key(key)?,
                        None => return Ok(ChatExit::Quit),
                    }
                    continue;
                }
                _ => {}
            }

            if !session.has_api_key() {
                self.say("OpenAI API Keyを入力してください。")?;
                continue;
            }

            let mut write_error: Option<std::io::Error> = None;
            let out = &mut self.out;
            let result = session
                .ask(backend, question, |fragment| {
                    if write_error.is_none() {
                        if let Err(e) = out.write_all(fragment.as_bytes()).and_then(|_| out.flush()) {
                            write_error = Some(e);
                        }
                    }
                })
                .await
                .map(|_| ());
            if let Some(e) = write_error {
                return Err(e.into());
            }

            match result {
                Ok(()) => self.say("")?,
                Err(e @ (AdvisorError::ChatAuth(_) | AdvisorError::ChatTransport(_))) => {
                    self.say("")?;
                    self.say(&e.to_string())?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// `None` when input ends; `Some(None)` for a blank key
    async fn prompt_key(&mut self) -> Result<Option<Option<ApiKey>>> {
        self.write("OpenAI API Key: ")?;
        Ok(self.read_line().await?.map(ApiKey::new))
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(())
    }
}
