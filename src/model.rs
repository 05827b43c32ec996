//! Feature vectors, predictions and the concrete models shipped with the crate.
//!
//! The ensemble models the domains were trained with are external; what lives
//! here is enough to serve a fixed or linear scorer and to stand in for the
//! real thing in tests.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::traits::PredictiveModel;

const EPOCHS: usize = 2000;
const LEARNING_RATE: f64 = 0.1;

/// Named numeric model inputs, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features(BTreeMap<String, f64>);

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

/// Model output: a probability or value, plus an optional second output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    pub secondary: Option<f64>,
}

impl Prediction {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            secondary: None,
        }
    }
}

/// Returns the same prediction for every input.
#[derive(Debug, Clone)]
pub struct FixedModel {
    name: String,
    prediction: Prediction,
    ready: bool,
}

impl FixedModel {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            prediction: Prediction::new(value),
            ready: true,
        }
    }

    /// A model that has not finished initializing.
    pub fn untrained(name: impl Into<String>) -> Self {
        Self {
            ready: false,
            ..Self::new(name, 0.0)
        }
    }
}

impl PredictiveModel for FixedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn predict(&self, _features: &Features) -> Prediction {
        self.prediction
    }

    /// Learns the mean target.
    fn train(&mut self, dataset: &[(Features, f64)]) -> Result<(), PlannerError> {
        check_dataset(&self.name, dataset)?;
        let mean = dataset.iter().map(|(_, target)| target).sum::<f64>() / dataset.len() as f64;
        self.prediction = Prediction::new(mean);
        self.ready = true;
        Ok(())
    }
}

fn check_dataset(name: &str, dataset: &[(Features, f64)]) -> Result<(), PlannerError> {
    if dataset.is_empty() {
        return Err(PlannerError::InvalidInput(format!("empty training set for {}", name)));
    }
    let finite = dataset
        .iter()
        .all(|(features, target)| target.is_finite() && features.iter().all(|(_, v)| v.is_finite()));
    if !finite {
        return Err(PlannerError::InvalidInput(format!("non-finite sample in training set for {}", name)));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Identity,
    /// Squashes the linear score into a probability.
    Logistic,
}

/// Weighted sum of named features plus a bias.
///
/// Features absent from the input contribute zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub name: String,
    pub weights: BTreeMap<String, f64>,
    pub bias: f64,
    pub link: Link,
}

impl LinearModel {
    pub fn new(name: impl Into<String>, bias: f64, link: Link) -> Self {
        Self {
            name: name.into(),
            weights: BTreeMap::new(),
            bias,
            link,
        }
    }

    pub fn weight(mut self, feature: &str, weight: f64) -> Self {
        self.weights.insert(feature.to_string(), weight);
        self
    }
}

impl PredictiveModel for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, features: &Features) -> Prediction {
        let score = self
            .weights
            .iter()
            .map(|(name, weight)| weight * features.get(name).unwrap_or(0.0))
            .sum::<f64>()
            + self.bias;

        Prediction::new(self.link.apply(score))
    }

    /// Batch gradient descent on standardized features: squared error for
    /// the identity link, log loss for the logistic one. Both share the
    /// gradient `(prediction - target) * x`.
    ///
    /// Every feature seen in the dataset gets a weight; existing weights for
    /// features absent from it are dropped.
    fn train(&mut self, dataset: &[(Features, f64)]) -> Result<(), PlannerError> {
        check_dataset(&self.name, dataset)?;

        let names: Vec<String> = dataset
            .iter()
            .flat_map(|(features, _)| features.iter().map(|(name, _)| name.to_string()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n = dataset.len() as f64;

        // Per-feature mean and spread; constant features keep a unit spread.
        let scaling: Vec<(f64, f64)> = names
            .iter()
            .map(|name| {
                let values = dataset.iter().map(|(f, _)| f.get(name).unwrap_or(0.0));
                let mean = values.clone().sum::<f64>() / n;
                let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                (mean, if std > 1e-12 { std } else { 1.0 })
            })
            .collect();

        let rows: Vec<(Vec<f64>, f64)> = dataset
            .iter()
            .map(|(features, target)| {
                let x = names
                    .iter()
                    .zip(&scaling)
                    .map(|(name, (mean, std))| (features.get(name).unwrap_or(0.0) - mean) / std)
                    .collect();
                (x, *target)
            })
            .collect();

        let mut weights = vec![0.0; names.len()];
        let mut bias = 0.0;
        for _ in 0..EPOCHS {
            let mut grad = vec![0.0; names.len()];
            let mut grad_bias = 0.0;
            for (x, target) in &rows {
                let score = bias + x.iter().zip(&weights).map(|(xi, wi)| xi * wi).sum::<f64>();
                let err = self.link.apply(score) - target;
                for (g, xi) in grad.iter_mut().zip(x) {
                    *g += err * xi;
                }
                grad_bias += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= LEARNING_RATE * g / n;
            }
            bias -= LEARNING_RATE * grad_bias / n;
        }

        // Back to raw feature units.
        self.weights = names
            .into_iter()
            .zip(weights.iter().zip(&scaling))
            .map(|(name, (w, (_, std)))| (name, w / std))
            .collect();
        self.bias = bias
            - weights
                .iter()
                .zip(&scaling)
                .map(|(w, (mean, std))| w * mean / std)
                .sum::<f64>();
        Ok(())
    }
}

impl Link {
    fn apply(self, score: f64) -> f64 {
        match self {
            Link::Identity => score,
            Link::Logistic => 1.0 / (1.0 + (-score).exp()),
        }
    }
}
