use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayViewD};
use ndarray_rand::rand_distr::Bernoulli;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::{Component, Process};
use crate::components::linear::Linear;
use crate::error::{ComponentError, Result};
use crate::ops::Activation;
use crate::params::ArrayTree;
use crate::random::RngKey;

pub trait MlpConfigs {
    fn n_in(&self) -> usize;
    fn n_hidden(&self) -> &[usize];
    fn n_out(&self) -> usize;
    fn activation(&self) -> Activation;
    fn dropout_keep_rate(&self) -> f32;
}

/// Stack of linear layers with an activation and dropout after every hidden
/// layer. The last layer is purely linear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    pub n_in: usize,
    pub n_hidden: Vec<usize>,
    pub n_out: usize,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_keep_rate")]
    pub dropout_keep_rate: f32,
}

fn default_keep_rate() -> f32 {
    1.0
}

impl MlpConfigs for Mlp {
    fn n_in(&self) -> usize {
        self.n_in
    }
    fn n_hidden(&self) -> &[usize] {
        &self.n_hidden
    }
    fn n_out(&self) -> usize {
        self.n_out
    }
    fn activation(&self) -> Activation {
        self.activation
    }
    fn dropout_keep_rate(&self) -> f32 {
        self.dropout_keep_rate
    }
}

impl Mlp {
    pub fn make<C: MlpConfigs + ?Sized>(config: &C) -> Result<Component> {
        let keep = config.dropout_keep_rate();
        if !(keep > 0.0 && keep <= 1.0) {
            return Err(ComponentError::config(format!(
                "dropout keep rate must be in (0, 1], got {}",
                keep
            )));
        }

        let widths: Vec<usize> = std::iter::once(config.n_in())
            .chain(config.n_hidden().iter().copied())
            .chain(std::iter::once(config.n_out()))
            .collect();
        let layers = widths
            .windows(2)
            .map(|pair| Linear::make(&Linear::new(pair[0], pair[1])))
            .collect::<Result<Vec<_>>>()?;

        let components: BTreeMap<String, _> = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (layer_name(i), layer.params().clone()))
            .collect();

        debug!(
            widths = ?widths,
            activation = %config.activation(),
            keep_rate = keep,
            "built mlp"
        );

        Ok(Component::from_fixed_pipeline(
            components,
            MlpProcess {
                layers,
                activation: config.activation(),
                dropout_keep_rate: keep,
            },
        ))
    }
}

fn layer_name(i: usize) -> String {
    format!("layer_{}", i)
}

struct MlpProcess {
    layers: Vec<Component>,
    activation: Activation,
    dropout_keep_rate: f32,
}

impl Process for MlpProcess {
    fn process(&self, params: &ArrayTree, x: ArrayViewD<f32>, rng: RngKey) -> Result<ArrayD<f32>> {
        let last = self.layers.len() - 1;
        let mut h = x.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.process(params.get(&layer_name(i))?, h.view(), rng)?;
            if i < last {
                h = self.activation.apply_array(h);
                h = dropout(h, self.dropout_keep_rate, rng.fold_in(i as u64))?;
            }
        }
        Ok(h)
    }
}

/// Inverted dropout: kept units are scaled by `1 / keep_rate`.
pub fn dropout(x: ArrayD<f32>, keep_rate: f32, rng: RngKey) -> Result<ArrayD<f32>> {
    if keep_rate >= 1.0 {
        return Ok(x);
    }
    let bernoulli = Bernoulli::new(keep_rate as f64).map_err(|e| ComponentError::Distribution {
        reason: e.to_string(),
    })?;
    let mask: ArrayD<bool> = ArrayD::random_using(x.raw_dim(), bernoulli, &mut rng.to_rng());
    let scale = 1.0 / keep_rate;
    Ok(ndarray::Zip::from(&x)
        .and(&mask)
        .map_collect(|&v, &keep| if keep { v * scale } else { 0.0 }))
}
