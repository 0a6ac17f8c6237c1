//! Linear support vector classifier.
//!
//! Squared hinge loss with L2 penalty, solved in the dual by coordinate
//! descent. Multi-class problems are reduced one-vs-rest; a two-class problem
//! trains a single model. Classes are weighted inversely to their frequency
//! and the intercept is learned as an extra unit feature.

use std::collections::BTreeMap;

use mailmask_core::{Error, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tfidf::SparseVector;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvc {
    /// Regularization strength; larger means less regularization.
    pub c: f64,
    pub tol: f64,
    pub max_iter: usize,
    pub seed: u64,
    classes: Vec<String>,
    weights: Vec<Array1<f64>>,
    intercepts: Vec<f64>,
}

impl LinearSvc {
    pub fn new(c: f64, seed: u64) -> Self {
        Self {
            c,
            tol: 1e-4,
            max_iter: 1000,
            seed,
            classes: Vec::new(),
            weights: Vec::new(),
            intercepts: Vec::new(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn fit(&mut self, rows: &[SparseVector], labels: &[String], n_features: usize) -> Result<()> {
        if rows.len() != labels.len() {
            return Err(Error::Training(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in labels {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }
        if counts.len() < 2 {
            return Err(Error::Training(format!(
                "need at least two classes, got {}",
                counts.len()
            )));
        }

        self.classes = counts.keys().map(|s| s.to_string()).collect();
        let n_samples = labels.len() as f64;
        let n_classes = counts.len() as f64;
        let class_weight: BTreeMap<&str, f64> = counts
            .iter()
            .map(|(&label, &count)| (label, n_samples / (n_classes * count as f64)))
            .collect();
        let cost: Vec<f64> = labels
            .iter()
            .map(|l| self.c * class_weight[l.as_str()])
            .collect();

        let augmented: Vec<SparseVector> = rows.iter().map(|r| r.with_bias(n_features, 1.0)).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let positives: Vec<&String> = if self.classes.len() == 2 {
            vec![&self.classes[1]]
        } else {
            self.classes.iter().collect()
        };

        let mut weights = Vec::with_capacity(positives.len());
        let mut intercepts = Vec::with_capacity(positives.len());
        for positive in positives {
            let y: Vec<f64> = labels
                .iter()
                .map(|l| if l == positive { 1.0 } else { -1.0 })
                .collect();
            let w = self.solve_binary(&augmented, &y, &cost, n_features + 1, &mut rng);
            intercepts.push(w[n_features]);
            weights.push(w.slice(ndarray::s![..n_features]).to_owned());
        }

        self.weights = weights;
        self.intercepts = intercepts;
        Ok(())
    }

    fn solve_binary(
        &self,
        x: &[SparseVector],
        y: &[f64],
        cost: &[f64],
        dim: usize,
        rng: &mut StdRng,
    ) -> Array1<f64> {
        let n = x.len();
        let diag: Vec<f64> = cost.iter().map(|c| 0.5 / c).collect();
        let qd: Vec<f64> = (0..n).map(|i| x[i].norm_sq() + diag[i]).collect();
        let mut alpha = vec![0.0; n];
        let mut w = Array1::<f64>::zeros(dim);
        let mut order: Vec<usize> = (0..n).collect();

        for iter in 0..self.max_iter {
            order.shuffle(rng);
            let mut max_pg = f64::NEG_INFINITY;
            let mut min_pg = f64::INFINITY;

            for &i in &order {
                let g = y[i] * x[i].dot(&w) - 1.0 + alpha[i] * diag[i];
                let pg = if alpha[i] == 0.0 { g.min(0.0) } else { g };
                max_pg = max_pg.max(pg);
                min_pg = min_pg.min(pg);

                if pg.abs() > 1e-12 {
                    let old = alpha[i];
                    alpha[i] = (alpha[i] - g / qd[i]).max(0.0);
                    x[i].add_scaled_to((alpha[i] - old) * y[i], &mut w);
                }
            }

            if max_pg - min_pg <= self.tol {
                debug!("Coordinate descent converged after {} epochs", iter + 1);
                return w;
            }
        }

        warn!(
            "Coordinate descent did not converge in {} epochs; consider more iterations",
            self.max_iter
        );
        w
    }

    /// One score per class, in `classes()` order.
    pub fn decision_function(&self, row: &SparseVector) -> Vec<f64> {
        let scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| row.dot(w) + b)
            .collect();
        if self.classes.len() == 2 {
            vec![-scores[0], scores[0]]
        } else {
            scores
        }
    }

    pub fn predict(&self, row: &SparseVector) -> Result<&str> {
        if self.weights.is_empty() {
            return Err(Error::Classifier("model is not fitted".into()));
        }
        let scores = self.decision_function(row);
        let mut best = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = i;
            }
        }
        Ok(&self.classes[best])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(usize, f64)]) -> SparseVector {
        SparseVector {
            indices: pairs.iter().map(|p| p.0).collect(),
            values: pairs.iter().map(|p| p.1).collect(),
        }
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_binary_separable() {
        let rows = vec![
            row(&[(0, 1.0)]),
            row(&[(0, 0.9), (2, 0.1)]),
            row(&[(1, 1.0)]),
            row(&[(1, 0.8), (2, 0.2)]),
        ];
        let y = labels(&["billing", "billing", "technical", "technical"]);
        let mut svm = LinearSvc::new(1.0, 42);
        svm.fit(&rows, &y, 3).unwrap();

        assert_eq!(svm.classes(), &["billing".to_string(), "technical".to_string()]);
        assert_eq!(svm.predict(&row(&[(0, 1.0)])).unwrap(), "billing");
        assert_eq!(svm.predict(&row(&[(1, 1.0)])).unwrap(), "technical");
    }

    #[test]
    fn test_multiclass_one_vs_rest() {
        let rows = vec![
            row(&[(0, 1.0)]),
            row(&[(0, 1.0)]),
            row(&[(1, 1.0)]),
            row(&[(1, 1.0)]),
            row(&[(2, 1.0)]),
            row(&[(2, 1.0)]),
        ];
        let y = labels(&["a", "a", "b", "b", "c", "c"]);
        let mut svm = LinearSvc::new(10.0, 42);
        svm.fit(&rows, &y, 3).unwrap();

        assert_eq!(svm.decision_function(&row(&[(0, 1.0)])).len(), 3);
        for (feature, expected) in [(0, "a"), (1, "b"), (2, "c")] {
            assert_eq!(svm.predict(&row(&[(feature, 1.0)])).unwrap(), expected);
        }
    }

    #[test]
    fn test_single_class_rejected() {
        let mut svm = LinearSvc::new(1.0, 42);
        let err = svm
            .fit(&[row(&[(0, 1.0)])], &labels(&["only"]), 1)
            .unwrap_err();
        assert!(err.to_string().contains("at least two classes"));
    }

    #[test]
    fn test_unfitted_predict_errors() {
        let svm = LinearSvc::new(1.0, 42);
        assert!(svm.predict(&row(&[(0, 1.0)])).is_err());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let rows = vec![
            row(&[(0, 0.7), (1, 0.3)]),
            row(&[(0, 0.2), (1, 0.8)]),
            row(&[(0, 0.6), (2, 0.4)]),
            row(&[(1, 0.5), (2, 0.5)]),
        ];
        let y = labels(&["x", "y", "x", "y"]);
        let mut first = LinearSvc::new(0.1, 42);
        let mut second = LinearSvc::new(0.1, 42);
        first.fit(&rows, &y, 3).unwrap();
        second.fit(&rows, &y, 3).unwrap();
        assert_eq!(first.weights, second.weights);
        assert_eq!(first.intercepts, second.intercepts);
    }
}
