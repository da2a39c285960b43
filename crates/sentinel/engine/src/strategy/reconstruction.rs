//! Reconstruction-error strategy: a small dense autoencoder.
//!
//! Architecture for input width `w`: `w -> w/2 -> w/4 -> w/2 -> w`, tanh on
//! the hidden layers and a linear output. Rows the network reconstructs
//! poorly are anomalous.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use sentinel_types::Classification;

use super::{check_width, label_by_cutoff, DetectionStrategy};
use crate::config::AutoencoderConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureMatrix;
use crate::stats;

const NAME: &str = "autoencoder";

/// Fully connected layer; `weights[o][i]` maps input `i` to output `o`.
#[derive(Debug, Clone)]
struct Dense {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    activation: bool,
}

impl Dense {
    /// Xavier-uniform initialised layer.
    fn new(inputs: usize, outputs: usize, activation: bool, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..outputs)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-limit..=limit)).collect())
            .collect();
        Self {
            weights,
            bias: vec![0.0; outputs],
            activation,
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| {
                let z = w.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                if self.activation {
                    z.tanh()
                } else {
                    z
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Network {
    layers: Vec<Dense>,
}

impl Network {
    fn new(width: usize, rng: &mut StdRng) -> Self {
        let half = (width / 2).max(1);
        let quarter = (width / 4).max(1);
        let sizes = [width, half, quarter, half, width];
        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Dense::new(pair[0], pair[1], i < last, rng))
            .collect();
        Self { layers }
    }

    /// Activations of every layer, input first.
    fn activations(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut out = Vec::with_capacity(self.layers.len() + 1);
        out.push(input.to_vec());
        for layer in &self.layers {
            let next = layer.forward(out[out.len() - 1].as_slice());
            out.push(next);
        }
        out
    }

    fn reconstruction_error(&self, row: &[f64]) -> f64 {
        let acts = self.activations(row);
        let output = &acts[acts.len() - 1];
        let sum: f64 = output.iter().zip(row).map(|(o, x)| (o - x) * (o - x)).sum();
        sum / row.len().max(1) as f64
    }

    /// One SGD step on the mean squared reconstruction error of `row`.
    /// Returns the loss before the update.
    fn step(&mut self, row: &[f64], learning_rate: f64) -> f64 {
        let acts = self.activations(row);
        let n = row.len().max(1) as f64;
        let output = &acts[acts.len() - 1];

        let loss = output.iter().zip(row).map(|(o, x)| (o - x) * (o - x)).sum::<f64>() / n;
        let mut delta: Vec<f64> = output
            .iter()
            .zip(row)
            .map(|(o, x)| 2.0 * (o - x) / n)
            .collect();

        for l in (0..self.layers.len()).rev() {
            let input = &acts[l];
            let layer_out = &acts[l + 1];
            if self.layers[l].activation {
                for (d, a) in delta.iter_mut().zip(layer_out) {
                    *d *= 1.0 - a * a;
                }
            }

            let upstream: Vec<f64> = (0..input.len())
                .map(|i| {
                    self.layers[l]
                        .weights
                        .iter()
                        .zip(&delta)
                        .map(|(w, d)| w[i] * d)
                        .sum()
                })
                .collect();

            let layer = &mut self.layers[l];
            for (o, d) in delta.iter().enumerate() {
                for (w, x) in layer.weights[o].iter_mut().zip(input) {
                    *w -= learning_rate * d * x;
                }
                layer.bias[o] -= learning_rate * d;
            }
            delta = upstream;
        }
        loss
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    network: Network,
    cutoff: f64,
}

/// Reconstruction-error strategy.
#[derive(Debug, Clone)]
pub struct Autoencoder {
    config: AutoencoderConfig,
    contamination: f64,
    width: usize,
    fitted: Option<Fitted>,
}

impl Autoencoder {
    pub fn new(config: AutoencoderConfig, contamination: f64, width: usize) -> Self {
        Self {
            config,
            contamination,
            width,
            fitted: None,
        }
    }

    fn fitted(&self) -> EngineResult<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| EngineError::NotTrained(NAME.into()))
    }

    /// Per-row mean squared reconstruction error.
    pub fn reconstruction_errors(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<f64>> {
        let fitted = self.fitted()?;
        check_width(NAME, self.width, matrix)?;
        Ok(matrix
            .rows()
            .iter()
            .map(|r| fitted.network.reconstruction_error(r))
            .collect())
    }
}

impl DetectionStrategy for Autoencoder {
    fn name(&self) -> &str {
        NAME
    }

    fn train(&mut self, matrix: &FeatureMatrix) -> EngineResult<()> {
        check_width(NAME, self.width, matrix)?;
        if matrix.is_empty() || self.width == 0 {
            return Err(EngineError::InsufficientData {
                stage: NAME,
                rows: matrix.nrows(),
                required: 1,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut network = Network::new(self.width, &mut rng);
        let mut order: Vec<usize> = (0..matrix.nrows()).collect();

        let mut epoch_loss = 0.0;
        for _ in 0..self.config.epochs {
            order.shuffle(&mut rng);
            epoch_loss = order
                .iter()
                .map(|&i| network.step(matrix.row(i), self.config.learning_rate))
                .sum::<f64>()
                / order.len() as f64;
            if !epoch_loss.is_finite() {
                return Err(EngineError::Strategy {
                    strategy: NAME.into(),
                    reason: "training loss diverged".into(),
                });
            }
        }

        let errors: Vec<f64> = matrix
            .rows()
            .iter()
            .map(|r| network.reconstruction_error(r))
            .collect();
        let cutoff = stats::percentile(&errors, 100.0 * (1.0 - self.contamination));

        debug!(epochs = self.config.epochs, loss = epoch_loss, cutoff, "Autoencoder trained");
        self.fitted = Some(Fitted { network, cutoff });
        Ok(())
    }

    fn classify(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<Classification>> {
        let cutoff = self.fitted()?.cutoff;
        Ok(label_by_cutoff(&self.reconstruction_errors(matrix)?, cutoff))
    }

    fn score(&self, matrix: &FeatureMatrix) -> EngineResult<Vec<f64>> {
        let cutoff = self.fitted()?.cutoff;
        Ok(self
            .reconstruction_errors(matrix)?
            .into_iter()
            .map(|e| stats::relative_to_cutoff(e, cutoff))
            .collect())
    }

    fn input_width(&self) -> usize {
        self.width
    }
}
