//! Interactive substrate design advisor

use substrate_advisor::{
    ApiKey, AppConfig, ChatBackend, Console, CsvDirectorySource, DataLocation, DesignSession,
    InMemorySource, OpenAiChat, ReferenceDataset, ReferenceRecord, ReferenceSource, ScriptedChat,
    WorkbookSource, SCORING_LEN,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the dialogue
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env();
    let demo = std::env::args().any(|arg| arg == "--demo");

    let (source, backend, default_key): (Box<dyn ReferenceSource>, Box<dyn ChatBackend>, Option<ApiKey>) =
        if demo {
            tracing::info!("Mode: DEMO reference data and scripted chat");
            (
                Box::new(InMemorySource::new(demo_datasets())) as Box<dyn ReferenceSource>,
                Box::new(ScriptedChat::replying(&[
                    "類似データの平均値から見ると、",
                    "入力された設計値は大型品の実績範囲内です。",
                ])) as Box<dyn ChatBackend>,
                ApiKey::new("demo"),
            )
        } else {
            let source: Box<dyn ReferenceSource> = match &config.data {
                DataLocation::Workbook(path) => {
                    tracing::info!("Reference workbook: {}", path.display());
                    Box::new(WorkbookSource::new(path.clone()))
                }
                DataLocation::CsvDirectory(dir) => {
                    tracing::info!("Reference CSV directory: {}", dir.display());
                    Box::new(CsvDirectorySource::new(dir.clone()))
                }
            };
            tracing::info!("Chat model: {} at {}", config.chat_model, config.chat_base_url);
            (
                source,
                Box::new(OpenAiChat::new(config.chat_base_url.clone(), config.chat_model.clone()))
                    as Box<dyn ChatBackend>,
                config.api_key.clone(),
            )
        };

    let mut session = DesignSession::new(config.pipeline);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut console = Console::new(stdin, std::io::stdout());

    console
        .run(&mut session, source.as_ref(), backend.as_ref(), default_key)
        .await
}

/// Built-in reference rows for `--demo`
fn demo_datasets() -> Vec<ReferenceDataset> {
    let sheet = |name: &str, rows: &[([f64; SCORING_LEN], &str, &str)], extra: &str| ReferenceDataset {
        name: name.to_string(),
        records: rows
            .iter()
            .map(|(attributes, part, value)| ReferenceRecord {
                attributes: *attributes,
                metadata: vec![
                    ("品番".to_string(), part.to_string()),
                    (extra.to_string(), value.to_string()),
                ],
            })
            .collect(),
    };

    vec![
        sheet(
            "大型品_電気特性",
            &[
                ([150.0, 60.0, 0.5, 1.0, 10.0, 20.0, 1000.0, 25.0], "L-E01", "0.82"),
                ([180.0, 80.0, 0.8, 2.0, 12.0, 30.0, 5000.0, 60.0], "L-E02", "0.45"),
                ([130.0, 55.0, 0.4, 0.8, 8.0, 10.0, 500.0, 20.0], "L-E03", "1.10"),
                ([200.0, 100.0, 1.0, 3.0, 16.0, 40.0, 10000.0, 85.0], "L-E04", "0.30"),
            ],
            "抵抗値_Ω",
        ),
        sheet(
            "大型品_機械特性",
            &[
                ([160.0, 70.0, 0.6, 1.5, 10.0, 25.0, 2000.0, 30.0], "L-M01", "12.5"),
                ([140.0, 52.0, 0.5, 1.0, 8.0, 15.0, 800.0, 25.0], "L-M02", "10.1"),
                ([190.0, 90.0, 0.9, 2.5, 14.0, 35.0, 8000.0, 70.0], "L-M03", "15.8"),
            ],
            "引張強度_MPa",
        ),
        sheet(
            "小型品_電気特性",
            &[
                ([80.0, 40.0, 0.2, 0.5, 4.0, 10.0, 500.0, 25.0], "S-E01", "1.35"),
                ([60.0, 35.0, 0.1, 0.3, 2.0, 5.0, 200.0, 20.0], "S-E02", "2.10"),
                ([120.0, 50.0, 0.3, 0.8, 6.0, 15.0, 1000.0, 40.0], "S-E03", "0.95"),
            ],
            "抵抗値_Ω",
        ),
        sheet(
            "小型品_機械特性",
            &[
                ([90.0, 45.0, 0.3, 0.6, 6.0, 15.0, 800.0, 40.0], "S-M01", "8.4"),
                ([70.0, 32.0, 0.2, 0.4, 3.0, 8.0, 300.0, 25.0], "S-M02", "6.9"),
            ],
            "引張強度_MPa",
        ),
    ]
}
