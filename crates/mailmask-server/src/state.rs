//! Shared application state.

use std::sync::Arc;

use mailmask_classify::{CategoryClassifier, TextPipeline};
use mailmask_core::MailMaskConfig;
use mailmask_pii::{create_recognizer, Masker};
use tracing::info;

/// Immutable service context built once at startup and shared by all handlers.
pub struct AppState {
    pub config: MailMaskConfig,
    pub masker: Masker,
    pub classifier: Arc<dyn CategoryClassifier>,
}

impl AppState {
    pub fn new(config: MailMaskConfig, masker: Masker, classifier: Arc<dyn CategoryClassifier>) -> Self {
        Self {
            config,
            masker,
            classifier,
        }
    }

    /// Load the recognizer and the persisted classifier named by `config`.
    ///
    /// Fails if the classifier artifact is missing or unreadable, or if an
    /// explicitly configured NER model cannot be loaded.
    pub fn load(config: MailMaskConfig) -> anyhow::Result<Self> {
        let (ner_dir, required) = config.recognizer_source();
        let recognizer = create_recognizer(ner_dir, required)
            .map_err(|e| anyhow::anyhow!("Failed to load recognizer: {}", e))?;
        let masker = Masker::new(recognizer);

        let classifier_path = &config.data_paths.classifier_file;
        let pipeline = TextPipeline::load(classifier_path)
            .map_err(|e| anyhow::anyhow!("Failed to load classifier: {}", e))?;

        info!(
            "Service ready: recognizer={}, categories={:?}",
            masker.recognizer_id(),
            pipeline.classes()
        );

        Ok(Self::new(config, masker, Arc::new(pipeline)))
    }
}
