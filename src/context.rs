//! Text rendering of similarity results for the chat prompt

use crate::types::*;
use anyhow::{Context as _, Result};

pub const CONTEXT_HEADER: &str = "検索された類似データ:\n\n";
pub const SCORE_COLUMN: &str = "誤差平均";
pub const DATASET_COLUMN: &str = "シート名";
const SECTION_MARKER: &str = "の上位";
const SECTION_SUFFIX: &str = "件:";
const CELL_SEPARATOR: &str = " | ";

/// Scores in rendered tables are rounded to this many decimals
pub const SCORE_DECIMALS: usize = 4;

/// Column headers for a group of records from one dataset
pub fn table_columns(records: &[ScoredRecord]) -> Vec<String> {
    let mut columns: Vec<String> = DesignField::SCORING
        .iter()
        .map(|f| f.label().to_string())
        .collect();
    if let Some(first) = records.first() {
        columns.extend(first.record.metadata.iter().map(|(name, _)| sanitize_cell(name)));
    }
    columns.push(SCORE_COLUMN.to_string());
    columns.push(DATASET_COLUMN.to_string());
    columns
}

/// One rendered line per record, cells joined by ` | `
pub fn table_row(scored: &ScoredRecord) -> String {
    let mut cells: Vec<String> = scored
        .record
        .attributes
        .iter()
        .map(|v| v.to_string())
        .collect();
    cells.extend(scored.record.metadata.iter().map(|(_, value)| sanitize_cell(value)));
    cells.push(format_score(scored.score));
    cells.push(sanitize_cell(&scored.dataset));
    cells.join(CELL_SEPARATOR)
}

/// Header line plus one line per record
pub fn render_table(records: &[ScoredRecord]) -> String {
    let mut out = table_columns(records).join(CELL_SEPARATOR);
    out.push('\n');
    for scored in records {
        out.push_str(&table_row(scored));
        out.push('\n');
    }
    out
}

/// Merged table across datasets: scoring columns, score, and dataset only
pub fn render_summary_table(records: &[ScoredRecord]) -> String {
    let mut columns: Vec<&str> = DesignField::SCORING.iter().map(|f| f.label()).collect();
    columns.push(SCORE_COLUMN);
    columns.push(DATASET_COLUMN);

    let mut out = columns.join(CELL_SEPARATOR);
    out.push('\n');
    for scored in records {
        let mut cells: Vec<String> = scored
            .record
            .attributes
            .iter()
            .map(|v| v.to_string())
            .collect();
        cells.push(format_score(scored.score));
        cells.push(sanitize_cell(&scored.dataset));
        out.push_str(&cells.join(CELL_SEPARATOR));
        out.push('\n');
    }
    out
}

/// Build the context block handed to the chat session
pub fn format_context(selection: &TopNSelection) -> ChatContext {
    let mut text = String::from(CONTEXT_HEADER);
    for (name, records) in &selection.groups {
        text.push_str(&format!(
            "\n{}{}{}{}\n",
            name, SECTION_MARKER, selection.n, SECTION_SUFFIX
        ));
        text.push_str(&render_table(records));
    }
    ChatContext::new(text)
}

/// Dataset tag and rounded score recovered from a context block
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRow {
    pub dataset: String,
    pub score: f64,
}

/// Read a block produced by [`format_context`] back into rows
pub fn parse_context(text: &str) -> Result<Vec<ContextRow>> {
    let body = text
        .strip_prefix(CONTEXT_HEADER)
        .context("context block is missing its header")?;

    let mut rows = Vec::new();
    let mut columns: Option<(usize, usize)> = None;
    let mut expect_header = false;

    for (line_no, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if line.ends_with(SECTION_SUFFIX) && line.contains(SECTION_MARKER) {
            expect_header = true;
            continue;
        }
        let cells: Vec<&str> = line.split(CELL_SEPARATOR).collect();
        if expect_header {
            // Score and dataset columns always come last; metadata may reuse their names
            let score_idx = cells
                .iter()
                .rposition(|c| *c == SCORE_COLUMN)
                .with_context(|| format!("line {}: header has no {} column", line_no + 1, SCORE_COLUMN))?;
            let dataset_idx = cells
                .iter()
                .rposition(|c| *c == DATASET_COLUMN)
                .with_context(|| format!("line {}: header has no {} column", line_no + 1, DATASET_COLUMN))?;
            columns = Some((score_idx, dataset_idx));
            expect_header = false;
            continue;
        }

        let (score_idx, dataset_idx) =
            columns.with_context(|| format!("line {}: row before any table header", line_no + 1))?;
        let score = cells
            .get(score_idx)
            .with_context(|| format!("line {}: missing score cell", line_no + 1))?
            .parse::<f64>()
            .with_context(|| format!("line {}: score is not numeric", line_no + 1))?;
        let dataset = cells
            .get(dataset_idx)
            .with_context(|| format!("line {}: missing dataset cell", line_no + 1))?
            .to_string();
        rows.push(ContextRow { dataset, score });
    }

    Ok(rows)
}

fn format_score(score: f64) -> String {
    format!("{:.*}", SCORE_DECIMALS, score)
}

/// Round a score the way the context block renders it
pub fn round_score(score: f64) -> f64 {
    format_score(score).parse().unwrap_or(score)
}

/// System instruction for the chat session
pub fn build_system_prompt(input: &DesignInput, context: &ChatContext) -> serde_json::Result<String> {
    let inputs_json = serde_json::to_string_pretty(input)?;
    Ok(format!(
        "あなたは基板の管理を行なっている会社の従業員として回答してください。\
ユーザーからの質問に対して与えられたデータや入力された設計値をもとに回答します。\n\
\n\
入力された設計値:\n\
{inputs_json}\n\
\n\
検索された類似データ:\n\
{context}\n\
\n\
上記の情報を基に、具体的な数値を示しながら回答してください。\n\
特性値の予想の際には類似データを参考に平均値や分散、回帰的な分析をした上で予測してください。\n",
        context = context.as_str(),
    ))
}

fn sanitize_cell(value: &str) -> String {
    value.replace('|', "/").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(dataset: &str, score: f64, metadata: Vec<(&str, &str)>) -> ScoredRecord {
        ScoredRecord {
            record: ReferenceRecord {
                attributes: [150.0, 60.0, 0.5, 1.0, 10.0, 20.0, 1000.0, 25.0],
                metadata: metadata
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
            dataset: dataset.to_string(),
            score,
        }
    }

    fn selection() -> TopNSelection {
        TopNSelection {
            n: 5,
            groups: vec![
                (
                    "大型品_電気特性".to_string(),
                    vec![
                        scored("大型品_電気特性", 1.234567, vec![("抵抗値_Ω", "0.8")]),
                        scored("大型品_電気特性", 2.5, vec![("抵抗値_Ω", "a|b")]),
                    ],
                ),
                (
                    "大型品_機械特性".to_string(),
                    vec![
                        scored("大型品_機械特性", 0.00004, vec![]),
                        scored("大型品_機械特性", 0.00035, vec![]),
                        scored("大型品_機械特性", 0.00045, vec![]),
                    ],
                ),
            ],
        }
    }

    #[test]
    fn test_format_layout() {
        let text = format_context(&selection());
        let lines: Vec<&str> = text.as_str().lines().collect();
        assert_eq!(lines[0], "検索された類似データ:");
        assert_eq!(lines[3], "大型品_電気特性の上位5件:");
        assert!(lines[4].starts_with("基板長さ_mm | 基板幅_mm"));
        assert!(lines[4].ends_with("抵抗値_Ω | 誤差平均 | シート名"));
        assert!(lines[5].ends_with("0.8 | 1.2346 | 大型品_電気特性"));
        assert!(lines[6].contains("a/b"));
    }

    #[test]
    fn test_round_trip_preserves_tags_and_scores() {
        let selection = selection();
        let rows = parse_context(format_context(&selection).as_str()).unwrap();

        let expected: Vec<ContextRow> = selection
            .groups
            .iter()
            .flat_map(|(_, records)| records.iter())
            .map(|r| ContextRow {
                dataset: r.dataset.clone(),
                score: round_score(r.score),
            })
            .collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn test_round_score_matches_rendered_cell() {
        for score in [0.00035, 0.00045, 0.00065, 1.23455, 2.5] {
            let rendered: f64 = format!("{:.4}", score).parse().unwrap();
            assert_eq!(round_score(score), rendered, "score {}", score);
        }
    }

    #[test]
    fn test_parse_ignores_metadata_named_like_tag_columns() {
        let selection = TopNSelection {
            n: 5,
            groups: vec![(
                "小型品_電気特性".to_string(),
                vec![scored(
                    "小型品_電気特性",
                    0.75,
                    vec![("シート名", "旧シート"), ("誤差平均", "9.9")],
                )],
            )],
        };

        let rows = parse_context(format_context(&selection).as_str()).unwrap();
        assert_eq!(
            rows,
            vec![ContextRow {
                dataset: "小型品_電気特性".to_string(),
                score: 0.75,
            }]
        );
    }

    #[test]
    fn test_parse_rejects_foreign_text() {
        assert!(parse_context("hello").is_err());
    }

    #[test]
    fn test_system_prompt_embeds_inputs_and_context() {
        let input = DesignInput::new().with(DesignField::SubstrateLength, 150.0);
        let context = format_context(&selection());
        let prompt = build_system_prompt(&input, &context).unwrap();
        assert!(prompt.contains("\"基板長さ_mm\": 150.0"));
        assert!(prompt.contains("\"温度_℃\": null"));
        assert!(prompt.contains(context.as_str()));
    }
}
