//! Category classifier training from the masked dataset.

use std::path::Path;

use mailmask_classify::{default_param_grid, select, train_test_split, GridSearch, PipelineParams};
use mailmask_core::{Error, Result};
use tracing::info;

const TEXT_COLUMN: &str = "masked_body";
const LABEL_COLUMN: &str = "type";
const TEST_SIZE: f64 = 0.2;
const CV_FOLDS: usize = 5;
const SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub samples: usize,
    pub best_params: PipelineParams,
    pub cv_accuracy: f64,
    pub test_accuracy: f64,
}

fn column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::MissingColumn(format!("'{}' not found in {}", name, path.display())))
}

/// Read (text, label) pairs from the masked CSV.
fn load_dataset(path: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let text_idx = column(&headers, TEXT_COLUMN, path)?;
    let label_idx = column(&headers, LABEL_COLUMN, path)?;

    let mut texts = Vec::new();
    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record?;
        texts.push(record.get(text_idx).unwrap_or_default().to_string());
        labels.push(record.get(label_idx).unwrap_or_default().to_string());
    }
    if texts.is_empty() {
        return Err(Error::Training(format!("{} has no rows", path.display())));
    }
    Ok((texts, labels))
}

/// Grid-search a classifier on `input` and persist the best one to `model_path`.
pub fn train_from_csv(input: &Path, model_path: &Path) -> Result<TrainReport> {
    let (texts, labels) = load_dataset(input)?;
    let docs: Vec<&str> = texts.iter().map(String::as_str).collect();
    info!("Loaded {} labeled emails from {}", docs.len(), input.display());

    let (train_idx, test_idx) = train_test_split(&labels, TEST_SIZE, SEED)?;
    let (train_docs, train_labels) = select(&docs, &labels, &train_idx);
    let (test_docs, test_labels) = select(&docs, &labels, &test_idx);

    let search = GridSearch::new(default_param_grid(), CV_FOLDS, SEED);
    let result = search.fit(&train_docs, &train_labels)?;
    info!("Best params: {}", result.best_params);
    info!("Best CV accuracy: {:.4}", result.best_score);

    let test_accuracy = result.best_pipeline.score(&test_docs, &test_labels)?;
    info!("Held-out test accuracy: {:.4}", test_accuracy);

    result.best_pipeline.save(model_path)?;

    Ok(TrainReport {
        samples: docs.len(),
        best_params: result.best_params,
        cv_accuracy: result.best_score,
        test_accuracy,
    })
}
