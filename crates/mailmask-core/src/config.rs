//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths to all MailMask data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Raw email export read by the batch masker (`data/raw_emails.csv`).
    pub raw_emails: PathBuf,
    /// Masked dataset written by the batch masker (`data/masked_emails.csv`).
    pub masked_emails: PathBuf,
    /// Model directory (`data/model/`).
    pub model_dir: PathBuf,
    /// Fitted classifier artifact (`data/model/classifier.json`).
    pub classifier_file: PathBuf,
    /// Default location of the ONNX NER model (`data/model/ner/`).
    pub ner_model_dir: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Does not touch the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let model_dir = root.join("model");
        Self {
            raw_emails: root.join("raw_emails.csv"),
            masked_emails: root.join("masked_emails.csv"),
            classifier_file: model_dir.join("classifier.json"),
            ner_model_dir: model_dir.join("ner"),
            model_dir,
            root,
        }
    }
}

/// Top-level MailMask configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMaskConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// NER model directory. `Some` only when set explicitly, in which case
    /// the ONNX recognizer must load or startup fails.
    pub ner_model_dir: Option<PathBuf>,
}

impl MailMaskConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let ner_model_dir = std::env::var("MAILMASK_NER_MODEL_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            port,
            data_paths: DataPaths::new(data_dir),
            ner_model_dir,
        }
    }

    /// Directory the recognizer loads from, and whether it is required.
    pub fn recognizer_source(&self) -> (&Path, bool) {
        match &self.ner_model_dir {
            Some(dir) => (dir.as_path(), true),
            None => (self.data_paths.ner_model_dir.as_path(), false),
        }
    }
}
