//! Tabular file access.
//!
//! The orchestrator only talks to [`DatasetIo`]; [`CsvDatasetIo`] is the
//! implementation used by the binary.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use csv::{ReaderBuilder, Writer};
use enrich_core::DatasetName;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of the files the pipeline writes.
pub const OUTPUT_SUFFIX: &str = "_enriched.csv";

/// Reads input tables and writes final ones.
pub trait DatasetIo: Send + Sync {
    /// Read the table at `path`.
    fn read(&self, path: &Path) -> Result<Dataset>;

    /// Write `dataset` to `path`, replacing any existing file.
    fn write(&self, path: &Path, dataset: &Dataset) -> Result<()>;
}

/// CSV files with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDatasetIo;

impl DatasetIo for CsvDatasetIo {
    fn read(&self, path: &Path) -> Result<Dataset> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| PipelineError::csv(path, e))?;

        let columns = reader
            .headers()
            .map_err(|e| PipelineError::csv(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut dataset = Dataset::new(columns);
        for record in reader.records() {
            let record = record.map_err(|e| PipelineError::csv(path, e))?;
            dataset.push_row(record.iter().map(ToString::to_string).collect());
        }

        tracing::debug!(path = %path.display(), rows = dataset.len(), "Read dataset");
        Ok(dataset)
    }

    fn write(&self, path: &Path, dataset: &Dataset) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let mut writer = Writer::from_path(path).map_err(|e| PipelineError::csv(path, e))?;
        writer
            .write_record(dataset.columns())
            .map_err(|e| PipelineError::csv(path, e))?;
        for row in dataset.rows() {
            writer
                .write_record(row)
                .map_err(|e| PipelineError::csv(path, e))?;
        }
        writer.flush().map_err(|e| PipelineError::io(path, e))?;

        tracing::debug!(path = %path.display(), rows = dataset.len(), "Wrote dataset");
        Ok(())
    }
}

/// Input datasets in `dir`: every `*.csv` file that is not a pipeline output,
/// sorted by path.
pub fn discover_datasets(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && !name.ends_with(OUTPUT_SUFFIX) {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

/// Where the final table for `dataset` is written.
#[must_use]
pub fn final_output_path(data_dir: &Path, dataset: &DatasetName) -> PathBuf {
    data_dir.join(format!("{}_final{OUTPUT_SUFFIX}", dataset.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_write_preserves_cells() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("leads.csv");
        fs::write(
            &path,
            "Name, LinkedIn URL\nAda,https://linkedin.com/in/ada\n\"Doe, Jane\",\nShort\n",
        )
        .expect("write input");

        let io = CsvDatasetIo;
        let dataset = io.read(&path).expect("read");
        assert_eq!(dataset.columns(), &["Name".to_string(), "LinkedIn URL".to_string()]);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.cell(1, 0), Some("Doe, Jane"));
        assert_eq!(dataset.cell(2, 1), Some(""));

        let out = temp_dir.path().join("out").join("leads_final_enriched.csv");
        io.write(&out, &dataset).expect("write");
        assert_eq!(io.read(&out).expect("read back"), dataset);
    }

    #[test]
    fn test_discovery_skips_outputs() {
        let temp_dir = TempDir::new().expect("create temp dir");
        for name in ["b.csv", "a.csv", "a_final_enriched.csv", "notes.txt"] {
            fs::write(temp_dir.path().join(name), "x\n").expect("write");
        }
        fs::create_dir(temp_dir.path().join("dir.csv")).expect("mkdir");

        let found: Vec<String> = discover_datasets(temp_dir.path())
            .expect("discover")
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(ToString::to_string))
            .collect();
        assert_eq!(found, vec!["a.csv".to_string(), "b.csv".to_string()]);
    }

    #[test]
    fn test_final_output_path() {
        let name = DatasetName::new("leads").expect("valid name");
        assert_eq!(
            final_output_path(Path::new("data"), &name),
            PathBuf::from("data/leads_final_enriched.csv")
        );
    }
}
