//! Fitted vectorizer + classifier pipeline and its JSON artifact.

use std::fmt;
use std::path::Path;

use mailmask_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyzer::Analyzer;
use crate::svm::LinearSvc;
use crate::tfidf::TfidfVectorizer;
use crate::CategoryClassifier;

/// Artifact layout version; bump when the serialized shape changes.
pub const FORMAT_VERSION: u32 = 1;

/// Hyperparameters searched by `GridSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub max_features: Option<usize>,
    pub ngram_range: (usize, usize),
    pub c: f64,
}

impl fmt::Display for PipelineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max_features = self
            .max_features
            .map(|m| m.to_string())
            .unwrap_or_else(|| "all".to_string());
        write!(
            f,
            "C={} max_features={} ngram_range=({}, {})",
            self.c, max_features, self.ngram_range.0, self.ngram_range.1
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPipeline {
    pub format_version: u32,
    pub params: PipelineParams,
    pub trained_at: String,
    vectorizer: TfidfVectorizer,
    classifier: LinearSvc,
}

impl TextPipeline {
    /// Fit a pipeline on labeled documents.
    pub fn fit(params: PipelineParams, seed: u64, docs: &[&str], labels: &[String]) -> Result<Self> {
        if docs.is_empty() {
            return Err(Error::Training("no training documents".into()));
        }
        let mut vectorizer = TfidfVectorizer::new(Analyzer::new(params.ngram_range), params.max_features);
        let rows = vectorizer.fit_transform(docs)?;

        let mut classifier = LinearSvc::new(params.c, seed);
        classifier.fit(&rows, labels, vectorizer.vocabulary_len())?;

        Ok(Self {
            format_version: FORMAT_VERSION,
            params,
            trained_at: chrono::Utc::now().to_rfc3339(),
            vectorizer,
            classifier,
        })
    }

    pub fn predict_one(&self, text: &str) -> Result<&str> {
        self.classifier.predict(&self.vectorizer.transform(text))
    }

    /// Fraction of documents whose prediction equals the label.
    pub fn score(&self, docs: &[&str], labels: &[String]) -> Result<f64> {
        if docs.is_empty() {
            return Err(Error::Training("cannot score an empty set".into()));
        }
        let mut correct = 0usize;
        for (doc, label) in docs.iter().zip(labels) {
            if self.predict_one(doc)? == label.as_str() {
                correct += 1;
            }
        }
        Ok(correct as f64 / docs.len() as f64)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vectorizer.vocabulary_len()
    }

    /// Write the pipeline as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(self)?;
        std::fs::write(path, data)?;
        info!("Saved classifier to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Model(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let pipeline: Self = serde_json::from_str(&data)?;
        if pipeline.format_version != FORMAT_VERSION {
            return Err(Error::Model(format!(
                "Unsupported classifier format version {} (expected {})",
                pipeline.format_version, FORMAT_VERSION
            )));
        }
        info!(
            "Loaded classifier: {} classes, {} terms ({})",
            pipeline.classifier.classes().len(),
            pipeline.vocabulary_len(),
            pipeline.params
        );
        Ok(pipeline)
    }
}

impl CategoryClassifier for TextPipeline {
    fn predict(&self, text: &str) -> Result<String> {
        self.predict_one(text).map(str::to_string)
    }

    fn classes(&self) -> &[String] {
        self.classifier.classes()
    }
}
