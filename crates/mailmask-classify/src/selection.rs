//! Model selection: stratified split, stratified k-fold, grid search.

use std::collections::BTreeMap;

use mailmask_core::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::pipeline::{PipelineParams, TextPipeline};

/// Sample indices grouped by label, in input order.
fn indices_by_class(labels: &[String]) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(label.as_str()).or_default().push(i);
    }
    groups
}

/// Split indices into (train, test), keeping class proportions.
///
/// Each class contributes `round(count * test_size)` samples to the test
/// side, clamped so both sides keep at least one. Both lists come back sorted.
pub fn train_test_split(labels: &[String], test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::Training(format!("test_size must be in (0, 1), got {}", test_size)));
    }

    let groups = indices_by_class(labels);
    if let Some((label, members)) = groups.iter().find(|(_, m)| m.len() < 2) {
        return Err(Error::Training(format!(
            "class '{}' has only {} member(s); stratified split needs at least 2",
            label,
            members.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (_, mut members) in groups {
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_size).round() as usize).clamp(1, members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Assign samples to `k` folds; the j-th member of each class goes to fold `j % k`.
///
/// Returns one (train, validation) index pair per fold.
pub fn stratified_kfold(labels: &[String], k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(Error::Training(format!("k must be at least 2, got {}", k)));
    }
    if labels.len() < k {
        return Err(Error::Training(format!(
            "cannot split {} samples into {} folds",
            labels.len(),
            k
        )));
    }

    let groups = indices_by_class(labels);
    if let Some(smallest) = groups.values().map(Vec::len).min() {
        if smallest < k {
            warn!(
                "The least populated class has only {} members, fewer than {} folds",
                smallest, k
            );
        }
    }

    let mut fold_of = vec![0usize; labels.len()];
    for members in groups.values() {
        for (j, &i) in members.iter().enumerate() {
            fold_of[i] = j % k;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (val, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == fold);
            (train, val)
        })
        .collect())
}

/// The hyperparameter grid used for email categories.
///
/// Ordered with `C` outermost and n-gram range innermost.
pub fn default_param_grid() -> Vec<PipelineParams> {
    let mut grid = Vec::new();
    for c in [0.1, 1.0, 10.0] {
        for max_features in [5000, 10000] {
            for ngram_range in [(1, 1), (1, 2)] {
                grid.push(PipelineParams {
                    max_features: Some(max_features),
                    ngram_range,
                    c,
                });
            }
        }
    }
    grid
}

/// Cross-validation outcome for one grid point.
#[derive(Debug, Clone, Serialize)]
pub struct CvResult {
    pub params: PipelineParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

pub struct GridSearchResult {
    pub best_params: PipelineParams,
    pub best_score: f64,
    pub cv_results: Vec<CvResult>,
    /// Best configuration refit on all provided documents.
    pub best_pipeline: TextPipeline,
}

/// Exhaustive search over pipeline parameters scored by mean k-fold accuracy.
pub struct GridSearch {
    pub grid: Vec<PipelineParams>,
    pub folds: usize,
    pub seed: u64,
}

impl GridSearch {
    pub fn new(grid: Vec<PipelineParams>, folds: usize, seed: u64) -> Self {
        Self { grid, folds, seed }
    }

    /// Evaluate every grid point, pick the best mean score (earliest on ties)
    /// and refit it on the full input.
    pub fn fit(&self, docs: &[&str], labels: &[String]) -> Result<GridSearchResult> {
        if self.grid.is_empty() {
            return Err(Error::Training("empty parameter grid".into()));
        }
        let folds = stratified_kfold(labels, self.folds)?;
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            self.folds,
            self.grid.len(),
            self.folds * self.grid.len()
        );

        let mut cv_results = Vec::with_capacity(self.grid.len());
        for params in &self.grid {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for (train_idx, val_idx) in &folds {
                let (train_docs, train_labels) = select(docs, labels, train_idx);
                let (val_docs, val_labels) = select(docs, labels, val_idx);
                let pipeline = TextPipeline::fit(*params, self.seed, &train_docs, &train_labels)?;
                fold_scores.push(pipeline.score(&val_docs, &val_labels)?);
            }
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            info!("[CV] {} mean accuracy={:.4}", params, mean_score);
            cv_results.push(CvResult {
                params: *params,
                fold_scores,
                mean_score,
            });
        }

        let mut best = 0;
        for (i, result) in cv_results.iter().enumerate() {
            if result.mean_score > cv_results[best].mean_score {
                best = i;
            }
        }
        let best_params = cv_results[best].params;
        let best_score = cv_results[best].mean_score;
        let best_pipeline = TextPipeline::fit(best_params, self.seed, docs, labels)?;

        Ok(GridSearchResult {
            best_params,
            best_score,
            cv_results,
            best_pipeline,
        })
    }
}

/// Gather documents and labels at the given indices.
pub fn select<'a>(docs: &[&'a str], labels: &[String], idx: &[usize]) -> (Vec<&'a str>, Vec<String>) {
    (
        idx.iter().map(|&i| docs[i]).collect(),
        idx.iter().map(|&i| labels[i].clone()).collect(),
    )
}
