//! MailMask Classify — email category classification.
//!
//! Provides the `CategoryClassifier` trait used by the server. `TextPipeline`
//! implements it with a TF-IDF vectorizer feeding a one-vs-rest linear SVM,
//! and is persisted as JSON. `GridSearch` selects pipeline hyperparameters
//! by stratified k-fold cross-validation.

pub mod analyzer;
pub mod pipeline;
pub mod selection;
pub mod svm;
pub mod tfidf;

pub use analyzer::Analyzer;
pub use pipeline::{PipelineParams, TextPipeline};
pub use selection::{
    default_param_grid, select, stratified_kfold, train_test_split, CvResult, GridSearch,
    GridSearchResult,
};
pub use svm::LinearSvc;
pub use tfidf::{SparseVector, TfidfVectorizer};

use mailmask_core::Result;

/// Trait for category classifiers over masked email text.
pub trait CategoryClassifier: Send + Sync {
    /// Predict the category label for one text.
    fn predict(&self, text: &str) -> Result<String>;

    /// Labels the classifier can emit.
    fn classes(&self) -> &[String];
}
