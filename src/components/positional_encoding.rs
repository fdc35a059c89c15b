//! Learned positional encodings over an n-dimensional grid.
//!
//! Inputs are `[channels, *input_shape]`; outputs are
//! `[channels, prod(input_shape)]`. Three strategies share one config:
//!
//! * `dot` - one `[dim_encoding, axis_size]` table per axis, combined by a
//!   per-channel outer product and multiplied into the input.
//! * `sum` - the same tables, broadcast along the other axes, summed, and
//!   added to the input.
//! * `naive_sum` - one `[dim_encoding, prod(input_shape)]` table added to the
//!   flattened input.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis, Ix2, IxDyn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::{Component, Process};
use crate::error::{ComponentError, Result};
use crate::ops::{axis_broadcast_shape, prepend_dim, reshape_owned};
use crate::params::{ArrayTree, WeightInit, WeightParams};
use crate::random::RngKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionalEncodeStrategy {
    Dot,
    Sum,
    NaiveSum,
}

impl FromStr for PositionalEncodeStrategy {
    type Err = ComponentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dot" => Ok(PositionalEncodeStrategy::Dot),
            "sum" => Ok(PositionalEncodeStrategy::Sum),
            "naive_sum" => Ok(PositionalEncodeStrategy::NaiveSum),
            other => Err(ComponentError::UnsupportedStrategy { tag: other.to_string() }),
        }
    }
}

impl fmt::Display for PositionalEncodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PositionalEncodeStrategy::Dot => "dot",
            PositionalEncodeStrategy::Sum => "sum",
            PositionalEncodeStrategy::NaiveSum => "naive_sum",
        };
        f.write_str(tag)
    }
}

pub trait PositionalEncodingConfigs {
    fn input_shape(&self) -> &[usize];
    fn input_channels(&self) -> usize;
    fn output_channels(&self) -> usize;
    fn dim_encoding(&self) -> usize;
    fn positional_encode_strategy(&self) -> &str;
    fn init_scale(&self) -> f32;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionalEncoding {
    pub input_shape: Vec<usize>,
    pub input_channels: usize,
    pub output_channels: usize,
    pub dim_encoding: usize,
    pub positional_encode_strategy: String,
    pub init_scale: f32,
}

impl PositionalEncodingConfigs for PositionalEncoding {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }
    fn input_channels(&self) -> usize {
        self.input_channels
    }
    fn output_channels(&self) -> usize {
        self.output_channels
    }
    fn dim_encoding(&self) -> usize {
        self.dim_encoding
    }
    fn positional_encode_strategy(&self) -> &str {
        &self.positional_encode_strategy
    }
    fn init_scale(&self) -> f32 {
        self.init_scale
    }
}

impl PositionalEncoding {
    /// Validates the config and fixes the strategy for the component's
    /// lifetime.
    pub fn make<C: PositionalEncodingConfigs + ?Sized>(config: &C) -> Result<Component> {
        let channels = config.dim_encoding();
        if config.output_channels() != channels || config.input_channels() != channels {
            return Err(ComponentError::config(format!(
                "positional encoding must preserve channels: output_channels {} / dim_encoding {} / input_channels {}",
                config.output_channels(),
                channels,
                config.input_channels()
            )));
        }
        let strategy: PositionalEncodeStrategy = config.positional_encode_strategy().parse()?;
        let input_shape = config.input_shape().to_vec();
        if channels == 0 || input_shape.is_empty() || input_shape.contains(&0) {
            return Err(ComponentError::config(format!(
                "positional encoding needs non-empty dims, got dim_encoding {} and input_shape {:?}",
                channels, input_shape
            )));
        }

        let n_axes = input_shape.len();
        let mut components = BTreeMap::new();
        match strategy {
            PositionalEncodeStrategy::Dot | PositionalEncodeStrategy::Sum => {
                let scale = config.init_scale() / n_axes as f32;
                for (i, &dim) in input_shape.iter().enumerate() {
                    components.insert(
                        axis_key(i),
                        Component::weight(WeightParams::new(&[channels, dim], WeightInit::Embedding, scale)?),
                    );
                }
            }
            PositionalEncodeStrategy::NaiveSum => {
                let dict_size: usize = input_shape.iter().product();
                components.insert(
                    ALL_DIM_KEY.to_string(),
                    Component::weight(WeightParams::new(
                        &[channels, dict_size],
                        WeightInit::Embedding,
                        config.init_scale(),
                    )?),
                );
            }
        }

        debug!(
            strategy = %strategy,
            input_shape = ?input_shape,
            dim_encoding = channels,
            "built positional encoding"
        );

        let encoder = Encoder {
            strategy,
            input_shape,
            channels,
        };
        Ok(Component::from_fixed_pipeline(components, encoder))
    }
}

const ALL_DIM_KEY: &str = "encoding_all_dim";

fn axis_key(i: usize) -> String {
    format!("encoding_dim_{}", i)
}

/// Resolved strategy plus the geometry it needs.
struct Encoder {
    strategy: PositionalEncodeStrategy,
    input_shape: Vec<usize>,
    channels: usize,
}

impl Process for Encoder {
    // [channels, *input_shape] -> [channels, prod(input_shape)]
    fn process(&self, params: &ArrayTree, x: ArrayViewD<f32>, _rng: RngKey) -> Result<ArrayD<f32>> {
        let expected = prepend_dim(self.channels, &self.input_shape);
        if x.shape() != expected.as_slice() {
            return Err(ComponentError::shape_mismatch("positional encoding input", &expected, x.shape()));
        }
        let flat = [self.channels, self.input_shape.iter().product::<usize>()];

        match self.strategy {
            PositionalEncodeStrategy::Dot => {
                let encoding = dot_product_encode(params, self.input_shape.len())?;
                check_encoding_shape(&encoding, &expected)?;
                reshape_owned(&x * &encoding, &flat)
            }
            PositionalEncodeStrategy::Sum => {
                let encoding = sum_encode(params, &self.input_shape)?;
                check_encoding_shape(&encoding, &expected)?;
                reshape_owned(&x + &encoding, &flat)
            }
            PositionalEncodeStrategy::NaiveSum => {
                let x = x.to_shape(IxDyn(&flat))?;
                let table = params.get_arr(ALL_DIM_KEY)?;
                if table.shape() != &flat[..] {
                    return Err(ComponentError::shape_mismatch(ALL_DIM_KEY, &flat, table.shape()));
                }
                Ok(&x + table)
            }
        }
    }
}

fn check_encoding_shape(encoding: &ArrayD<f32>, expected: &[usize]) -> Result<()> {
    if encoding.shape() != expected {
        return Err(ComponentError::shape_mismatch("positional encoding table", expected, encoding.shape()));
    }
    Ok(())
}

/// Per-axis tables as `[d, n_i]` views; every table must share `d`.
fn axis_tables(weights: &ArrayTree, n_axes: usize) -> Result<Vec<ArrayView2<'_, f32>>> {
    if n_axes == 0 {
        return Err(ComponentError::config("positional encoding needs at least one axis"));
    }
    let tables = (0..n_axes)
        .map(|i| axis_table(weights, i))
        .collect::<Result<Vec<_>>>()?;
    let d = tables[0].nrows();
    for (i, t) in tables.iter().enumerate() {
        if t.nrows() != d {
            return Err(ComponentError::shape_mismatch(axis_key(i), &[d, t.ncols()], t.shape()));
        }
    }
    Ok(tables)
}

fn axis_table(weights: &ArrayTree, i: usize) -> Result<ArrayView2<'_, f32>> {
    let table = weights.get_arr(&axis_key(i))?;
    if table.ndim() != 2 {
        // [d, n_i] 이외의 랭크
        let d = table.shape().first().copied().unwrap_or(0);
        let n = table.shape().last().copied().unwrap_or(0);
        return Err(ComponentError::shape_mismatch(axis_key(i), &[d, n], table.shape()));
    }
    Ok(table.view().into_dimensionality::<Ix2>()?)
}

fn axis_tables_for<'a>(weights: &'a ArrayTree, input_shape: &[usize]) -> Result<Vec<ArrayView2<'a, f32>>> {
    let tables = axis_tables(weights, input_shape.len())?;
    let d = tables[0].nrows();
    for (i, (t, &n)) in tables.iter().zip(input_shape).enumerate() {
        if t.ncols() != n {
            return Err(ComponentError::shape_mismatch(axis_key(i), &[d, n], t.shape()));
        }
    }
    Ok(tables)
}

/// Outer-product fold of the axis tables, one channel at a time.
///
/// `{encoding_dim_i: [d, n_i]} -> [d, n_0, .., n_k]`
pub fn dot_product_encode(weights: &ArrayTree, input_n_dims: usize) -> Result<ArrayD<f32>> {
    let tables = axis_tables(weights, input_n_dims)?;
    let d = tables[0].nrows();
    let mut dims = vec![tables[0].ncols()];
    let mut acc: Array2<f32> = tables[0].to_owned();

    for table in &tables[1..] {
        let n = table.ncols();
        let p = acc.ncols();
        let mut next = Array2::<f32>::zeros((d, p * n));
        next.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(c, mut row)| {
                let a = acc.row(c);
                let b = table.row(c);
                for (i, &av) in a.iter().enumerate() {
                    for (j, &bv) in b.iter().enumerate() {
                        row[i * n + j] = av * bv;
                    }
                }
            });
        acc = next;
        dims.push(n);
    }

    reshape_owned(acc, &prepend_dim(d, &dims))
}

/// Same result as `dot_product_encode`, written as a broadcast multiply of
/// reshaped tables.
pub fn dot_product_encode2(weights: &ArrayTree, input_shape: &[usize]) -> Result<ArrayD<f32>> {
    fold_broadcast(weights, input_shape, |acc, t| &acc * t)
}

/// Sum of every axis table broadcast along the other axes.
///
/// `{encoding_dim_i: [d, n_i]} -> [d, *input_shape]`
pub fn sum_encode(weights: &ArrayTree, input_shape: &[usize]) -> Result<ArrayD<f32>> {
    fold_broadcast(weights, input_shape, |acc, t| &acc + t)
}

fn fold_broadcast<F>(weights: &ArrayTree, input_shape: &[usize], combine: F) -> Result<ArrayD<f32>>
where
    F: Fn(ArrayD<f32>, &ArrayViewD<f32>) -> ArrayD<f32>,
{
    let tables = axis_tables_for(weights, input_shape)?;
    let d = tables[0].nrows();
    let mut acc: Option<ArrayD<f32>> = None;
    for (i, table) in tables.iter().enumerate() {
        let shaped = table.to_shape(IxDyn(&axis_broadcast_shape(d, i, input_shape)))?;
        let shaped = shaped.view();
        acc = Some(match acc {
            None => shaped.to_owned(),
            Some(prev) => combine(prev, &shaped),
        });
    }
    acc.ok_or_else(|| ComponentError::config("positional encoding needs at least one axis"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Tree;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn config(strategy: &str, input_shape: &[usize], channels: usize) -> PositionalEncoding {
        PositionalEncoding {
            input_shape: input_shape.to_vec(),
            input_channels: channels,
            output_channels: channels,
            dim_encoding: channels,
            positional_encode_strategy: strategy.to_string(),
            init_scale: 1.0,
        }
    }

    #[test]
    fn test_strategy_tags() {
        assert_eq!("naive_sum".parse::<PositionalEncodeStrategy>().unwrap(), PositionalEncodeStrategy::NaiveSum);
        assert_eq!(PositionalEncodeStrategy::Dot.to_string(), "dot");
    }

    #[test]
    fn test_axis_scale_is_divided_by_axis_count() {
        let pe = PositionalEncoding::make(&config("sum", &[2, 3, 5], 4)).unwrap();
        let leaves = pe.params().leaves();
        assert_eq!(leaves.len(), 3);
        for (_, spec) in leaves {
            assert_abs_diff_eq!(spec.scale, 1.0 / 3.0);
            assert_eq!(spec.init, WeightInit::Embedding);
        }
    }

    #[test]
    fn test_dot_product_encode_small() {
        let weights = Tree::node([
            ("encoding_dim_0", Tree::leaf(arr2(&[[1.0f32, 2.0]]).into_dyn())),
            ("encoding_dim_1", Tree::leaf(arr2(&[[3.0f32, 4.0, 5.0]]).into_dyn())),
        ]);
        let enc = dot_product_encode(&weights, 2).unwrap();
        let expected = ndarray::arr3(&[[[3.0f32, 4.0, 5.0], [6.0, 8.0, 10.0]]]).into_dyn();
        assert_eq!(enc, expected);
    }

    #[test]
    fn test_mismatched_channel_tables_are_rejected() {
        let weights = Tree::node([
            ("encoding_dim_0", Tree::leaf(arr2(&[[1.0f32, 2.0]]).into_dyn())),
            ("encoding_dim_1", Tree::leaf(arr2(&[[3.0f32], [4.0]]).into_dyn())),
        ]);
        assert!(matches!(
            dot_product_encode(&weights, 2),
            Err(ComponentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_rank_table_is_shape_mismatch() {
        let weights = Tree::node([
            ("encoding_dim_0", Tree::leaf(arr2(&[[1.0f32, 2.0]]).into_dyn())),
            ("encoding_dim_1", Tree::leaf(ndarray::arr1(&[3.0f32, 4.0, 5.0]).into_dyn())),
        ]);
        match sum_encode(&weights, &[2, 3]) {
            Err(ComponentError::ShapeMismatch { context, got, .. }) => {
                assert_eq!(context, "encoding_dim_1");
                assert_eq!(got, vec![3]);
            }
            other => panic!("unexpected: {:?}", other),
        }

        // process는 트리 검증 없이도 같은 에러 종류를 내야 함
        let pe = PositionalEncoding::make(&config("dot", &[2, 3], 1)).unwrap();
        let x = ArrayD::<f32>::ones(IxDyn(&[1, 2, 3]));
        assert!(matches!(
            pe.process(&weights, x.view(), RngKey::new(0)),
            Err(ComponentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_input_shape_is_rejected() {
        assert!(matches!(
            PositionalEncoding::make(&config("dot", &[], 4)),
            Err(ComponentError::Config { .. })
        ));
    }
}
