use crate::domain::records::{RawRow, Record, RowValidationError};
use crate::utils::error_chain_fmt;
use std::path::{Path, PathBuf};
use telemetry::spawn_blocking_with_tracing;

#[derive(thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Valid records of one file plus the rows that were dropped.
#[derive(Debug)]
pub struct LoadReport<R> {
    pub records: Vec<R>,
    pub rejected: Vec<RowValidationError>,
}

impl<R> LoadReport<R> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load and validate a CSV file on the blocking pool.
#[tracing::instrument(name = "Loading records", fields(kind = R::KIND.as_str()))]
pub async fn load<R: Record>(path: &Path) -> Result<LoadReport<R>, LoadError> {
    let owned = path.to_path_buf();
    let report = spawn_blocking_with_tracing(move || load_blocking::<R>(&owned))
        .await
        .map_err(|e| anyhow::anyhow!(e).context("CSV loading task failed"))??;

    tracing::info!(
        valid = report.records.len(),
        rejected = report.rejected.len(),
        "Loaded {} records from {}",
        R::KIND.as_str(),
        path.display()
    );
    Ok(report)
}

pub fn load_blocking<R: Record>(path: &Path) -> Result<LoadReport<R>, LoadError> {
    let unreadable = |source: csv::Error| LoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(unreadable)?;

    let headers = reader.headers().map_err(unreadable)?.clone();

    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for result in reader.records() {
        let record = result.map_err(unreadable)?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();

        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();

        match R::validate(&row, line) {
            Ok(valid) => records.push(valid),
            Err(e) => {
                tracing::warn!(
                    error.message = %e,
                    line = e.line,
                    "Skipping an invalid {} row",
                    R::KIND.as_str()
                );
                rejected.push(e);
            }
        }
    }

    Ok(LoadReport { records, rejected })
}
