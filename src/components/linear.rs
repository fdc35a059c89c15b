// src/components/linear.rs

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayViewD, Ix1, Ix2};
use serde::{Deserialize, Serialize};

use crate::component::{Component, Process};
use crate::error::{ComponentError, Result};
use crate::ops::linear_nd;
use crate::params::{ArrayTree, WeightInit, WeightParams};
use crate::random::RngKey;

/// Affine map over the last axis: `[..., n_in] -> [..., n_out]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    pub n_in: usize,
    pub n_out: usize,
    pub init_scale: f32,
}

impl Linear {
    pub fn new(n_in: usize, n_out: usize) -> Self {
        Self {
            n_in,
            n_out,
            init_scale: 1.0,
        }
    }

    pub fn make(config: &Linear) -> Result<Component> {
        if config.n_in == 0 || config.n_out == 0 {
            return Err(ComponentError::config(format!(
                "linear layer needs non-zero widths, got {} -> {}",
                config.n_in, config.n_out
            )));
        }
        let mut components = BTreeMap::new();
        components.insert(
            "w".to_string(),
            Component::weight(WeightParams::new(
                &[config.n_out, config.n_in],
                WeightInit::Kaiming,
                config.init_scale,
            )?),
        );
        components.insert(
            "b".to_string(),
            Component::weight(WeightParams::new(&[config.n_out], WeightInit::Zeros, 1.0)?),
        );
        Ok(Component::from_fixed_pipeline(components, LinearProcess))
    }
}

struct LinearProcess;

impl Process for LinearProcess {
    fn process(&self, params: &ArrayTree, x: ArrayViewD<f32>, _rng: RngKey) -> Result<ArrayD<f32>> {
        let w = params.get_arr("w")?.view().into_dimensionality::<Ix2>()?;
        let b = params.get_arr("b")?.view().into_dimensionality::<Ix1>()?;
        linear_nd(&x, &w, &b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Tree;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_linear_params_and_forward() {
        let linear = Linear::make(&Linear::new(3, 2)).unwrap();
        assert_eq!(linear.params().keys(), vec!["b", "w"]);
        assert_eq!(linear.n_params(), 8);

        let params = Tree::node([
            ("w", Tree::leaf(arr2(&[[1.0f32, 0.0, 0.0], [0.0, 1.0, 1.0]]).into_dyn())),
            ("b", Tree::leaf(arr1(&[0.0f32, 1.0]).into_dyn())),
        ]);
        let y = linear
            .call(&params, arr1(&[2.0f32, 3.0, 4.0]).into_dyn().view(), RngKey::new(0))
            .unwrap();
        assert_eq!(y, arr1(&[2.0f32, 8.0]).into_dyn());
    }

    #[test]
    fn test_zero_width_is_rejected() {
        assert!(matches!(
            Linear::make(&Linear::new(0, 2)),
            Err(ComponentError::Config { .. })
        ));
    }
}
