//! Reference dataset sources: workbook sheets, CSV files, in-memory tables

use crate::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use calamine::{open_workbook_auto, DataType, Reader};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Trait for pluggable reference data backends
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Load one dataset by name. Loads are never cached.
    async fn load(&self, dataset: &str) -> Result<ReferenceDataset>;
}

/// Build a dataset from a header row and string cells.
///
/// Every scoring column must be present and numeric in every non-blank row.
/// Remaining columns are kept as metadata in sheet order.
pub fn dataset_from_table(
    name: &str,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<ReferenceDataset> {
    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

    let mut scoring_idx = [0usize; SCORING_LEN];
    for (slot, field) in scoring_idx.iter_mut().zip(DesignField::SCORING) {
        *slot = headers
            .iter()
            .position(|h| h == field.label())
            .with_context(|| format!("sheet '{}' has no column '{}'", name, field.label()))?;
    }

    let metadata_idx: Vec<usize> = (0..headers.len())
        .filter(|idx| !scoring_idx.contains(idx) && !headers[*idx].is_empty())
        .collect();

    let mut records = Vec::new();
    for (row_no, row) in rows.iter().enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut attributes = [0.0; SCORING_LEN];
        for (attr, (idx, field)) in attributes
            .iter_mut()
            .zip(scoring_idx.iter().zip(DesignField::SCORING))
        {
            let cell = row.get(*idx).map(|c| c.trim()).unwrap_or("");
            *attr = cell
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .with_context(|| {
                    format!(
                        "sheet '{}' row {}: '{}' is not numeric ({:?})",
                        name,
                        row_no + 2,
                        field.label(),
                        cell
                    )
                })?;
        }

        let metadata = metadata_idx
            .iter()
            .map(|idx| {
                let value = row.get(*idx).map(|c| c.trim().to_string()).unwrap_or_default();
                (headers[*idx].clone(), value)
            })
            .collect();

        records.push(ReferenceRecord { attributes, metadata });
    }

    Ok(ReferenceDataset {
        name: name.to_string(),
        records,
    })
}

/// Excel workbook where each sheet is a dataset
pub struct WorkbookSource {
    path: PathBuf,
}

impl WorkbookSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_sheet(path: &Path, sheet: &str) -> Result<ReferenceDataset> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Unable to open workbook {}", path.display()))?;

        let range = workbook
            .worksheet_range(sheet)
            .with_context(|| format!("workbook has no sheet named '{}'", sheet))?
            .with_context(|| format!("Unable to read sheet '{}'", sheet))?;

        let mut rows_iter = range.rows();
        let headers: Vec<String> = rows_iter
            .next()
            .with_context(|| format!("sheet '{}' is empty", sheet))?
            .iter()
            .map(cell_to_string)
            .collect();
        let rows: Vec<Vec<String>> = rows_iter
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        dataset_from_table(sheet, &headers, &rows)
    }
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        _ => cell.to_string().trim().to_string(),
    }
}

#[async_trait]
impl ReferenceSource for WorkbookSource {
    fn name(&self) -> &'static str {
        "workbook"
    }

    async fn load(&self, dataset: &str) -> Result<ReferenceDataset> {
        let path = self.path.clone();
        let sheet = dataset.to_string();
        tokio::task::spawn_blocking(move || Self::read_sheet(&path, &sheet))
            .await
            .context("workbook reader task failed")?
    }
}

/// Directory holding one `<dataset>.csv` per dataset
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_csv(path: &Path, name: &str) -> Result<ReferenceDataset> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Unable to open {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Unable to read headers of {}", path.display()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("Unable to read rows of {}", path.display()))?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        dataset_from_table(name, &headers, &rows)
    }
}

#[async_trait]
impl ReferenceSource for CsvDirectorySource {
    fn name(&self) -> &'static str {
        "csv_directory"
    }

    async fn load(&self, dataset: &str) -> Result<ReferenceDataset> {
        let path = self.dir.join(format!("{}.csv", dataset));
        let name = dataset.to_string();
        tokio::task::spawn_blocking(move || Self::read_csv(&path, &name))
            .await
            .context("csv reader task failed")?
    }
}

/// Fixed in-memory datasets, for tests and the demo mode
pub struct InMemorySource {
    datasets: HashMap<String, ReferenceDataset>,
}

impl InMemorySource {
    pub fn new(datasets: Vec<ReferenceDataset>) -> Self {
        Self {
            datasets: datasets.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }
}

#[async_trait]
impl ReferenceSource for InMemorySource {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    async fn load(&self, dataset: &str) -> Result<ReferenceDataset> {
        self.datasets
            .get(dataset)
            .cloned()
            .with_context(|| format!("no dataset named '{}'", dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn scoring_headers() -> Vec<String> {
        DesignField::SCORING.iter().map(|f| f.label().to_string()).collect()
    }

    #[test]
    fn test_table_keeps_metadata_columns() {
        let mut headers = vec!["品番".to_string()];
        headers.extend(scoring_headers());
        headers.push("抵抗値_Ω".to_string());
        let rows = vec![
            vec!["P-1", "150", "60", "0.5", "1", "10", "20", "1000", "25", "0.8"],
            vec!["", "", "", "", "", "", "", "", "", ""],
            vec!["P-2", "100", "40", "0.2", "0.5", "4", "10", "500", "60", "1.1"],
        ]
        .into_iter()
        .map(|r| r.into_iter().map(String::from).collect())
        .collect::<Vec<Vec<String>>>();

        let dataset = assert_ok!(dataset_from_table("小型品_電気特性", &headers, &rows));
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0].attributes[0], 150.0);
        assert_eq!(
            dataset.records[1].metadata,
            vec![
                ("品番".to_string(), "P-2".to_string()),
                ("抵抗値_Ω".to_string(), "1.1".to_string())
            ]
        );
    }

    #[test]
    fn test_missing_column_fails() {
        let headers: Vec<String> = scoring_headers().into_iter().skip(1).collect();
        let err = assert_err!(dataset_from_table("S", &headers, &[]));
        assert!(err.to_string().contains("基板長さ_mm"));
    }

    #[test]
    fn test_non_numeric_cell_fails() {
        let headers = scoring_headers();
        let rows = vec![vec!["x".to_string(); SCORING_LEN]];
        assert_err!(dataset_from_table("S", &headers, &rows));
    }

    #[tokio::test]
    async fn test_csv_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = scoring_headers().join(",");
        content.push_str(",備考\n150,60,0.5,1,10,20,1000,25,ok\n");
        std::fs::write(dir.path().join("大型品_機械特性.csv"), content).unwrap();

        let source = CsvDirectorySource::new(dir.path());
        let dataset = assert_ok!(source.load("大型品_機械特性").await);
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].metadata[0].1, "ok");

        assert_err!(source.load("大型品_電気特性").await);
    }

    #[tokio::test]
    async fn test_workbook_source_reads_named_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("小型品_電気特性").unwrap();
        for (col, header) in scoring_headers().iter().enumerate() {
            sheet.write_string(0, col as u16, header.as_str()).unwrap();
        }
        sheet.write_string(0, SCORING_LEN as u16, "備考").unwrap();
        let values = [100.0, 40.0, 0.2, 0.5, 4.0, 10.0, 500.0, 60.0];
        for (col, value) in values.iter().enumerate() {
            sheet.write_number(1, col as u16, *value).unwrap();
        }
        sheet.write_string(1, SCORING_LEN as u16, "sample").unwrap();
        workbook.save(&path).unwrap();

        let source = WorkbookSource::new(&path);
        let dataset = assert_ok!(source.load("小型品_電気特性").await);
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].attributes, values);
        assert_eq!(dataset.records[0].metadata[0], ("備考".to_string(), "sample".to_string()));

        assert_err!(source.load("大型品_電気特性").await);
    }

    #[tokio::test]
    async fn test_in_memory_missing_dataset() {
        let source = InMemorySource::new(vec![]);
        assert_err!(source.load("anything").await);
    }
}
