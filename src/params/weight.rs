use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::error::{ComponentError, Result};
use crate::random::RngKey;

/// Initialization scheme of one learnable array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightInit {
    /// Normal with std = scale.
    Embedding,
    /// Normal with std = scale * sqrt(2 / fan_in).
    Kaiming,
    Zeros,
    Ones,
}

impl FromStr for WeightInit {
    type Err = ComponentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "embedding" => Ok(WeightInit::Embedding),
            "kaiming" => Ok(WeightInit::Kaiming),
            "zeros" => Ok(WeightInit::Zeros),
            "ones" => Ok(WeightInit::Ones),
            other => Err(ComponentError::UnsupportedStrategy { tag: other.to_string() }),
        }
    }
}

impl fmt::Display for WeightInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            WeightInit::Embedding => "embedding",
            WeightInit::Kaiming => "kaiming",
            WeightInit::Zeros => "zeros",
            WeightInit::Ones => "ones",
        };
        f.write_str(tag)
    }
}

/// Shape, init and scale of one learnable array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightParams {
    pub shape: Vec<usize>,
    pub init: WeightInit,
    pub scale: f32,
}

impl WeightParams {
    pub fn new(shape: &[usize], init: WeightInit, scale: f32) -> Result<Self> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(ComponentError::config(format!(
                "weight scale must be finite and non-negative, got {}",
                scale
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            init,
            scale,
        })
    }

    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Product of every dim after the first; 1 for vectors and scalars.
    pub fn fan_in(&self) -> usize {
        if self.shape.len() <= 1 {
            1
        } else {
            self.shape[1..].iter().product::<usize>().max(1)
        }
    }

    /// Draws one array from this spec.
    pub fn realize(&self, key: RngKey) -> Result<ArrayD<f32>> {
        let dim = IxDyn(&self.shape);
        match self.init {
            WeightInit::Zeros => Ok(ArrayD::zeros(dim)),
            WeightInit::Ones => Ok(ArrayD::ones(dim)),
            WeightInit::Embedding => sample_normal(dim, self.scale, key),
            WeightInit::Kaiming => {
                let std = self.scale * (2.0 / self.fan_in() as f32).sqrt();
                sample_normal(dim, std, key)
            }
        }
    }
}

fn sample_normal(dim: IxDyn, std: f32, key: RngKey) -> Result<ArrayD<f32>> {
    let normal = Normal::new(0.0f32, std).map_err(|e| ComponentError::Distribution {
        reason: e.to_string(),
    })?;
    let mut rng = key.to_rng();
    Ok(ArrayD::random_using(dim, normal, &mut rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tags() {
        assert_eq!("embedding".parse::<WeightInit>().unwrap(), WeightInit::Embedding);
        assert_eq!(WeightInit::Kaiming.to_string(), "kaiming");
        assert!(matches!(
            "xavier".parse::<WeightInit>(),
            Err(ComponentError::UnsupportedStrategy { tag }) if tag == "xavier"
        ));
    }

    #[test]
    fn test_negative_scale_is_rejected() {
        assert!(matches!(
            WeightParams::new(&[2], WeightInit::Embedding, -1.0),
            Err(ComponentError::Config { .. })
        ));
        assert!(WeightParams::new(&[2], WeightInit::Embedding, f32::NAN).is_err());
    }

    #[test]
    fn test_constant_inits() {
        let zeros = WeightParams::new(&[3, 2], WeightInit::Zeros, 1.0).unwrap();
        let ones = WeightParams::new(&[3, 2], WeightInit::Ones, 1.0).unwrap();
        assert!(zeros.realize(RngKey::new(0)).unwrap().iter().all(|&v| v == 0.0));
        assert!(ones.realize(RngKey::new(0)).unwrap().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_embedding_scale_controls_spread() {
        let spec = WeightParams::new(&[64, 64], WeightInit::Embedding, 0.01).unwrap();
        let arr = spec.realize(RngKey::new(11)).unwrap();
        assert_eq!(arr.shape(), &[64, 64]);
        let max = arr.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        // 0.01 표준편차에서 0.1을 넘을 일은 사실상 없음
        assert!(max < 0.1, "max abs {}", max);
        assert!(max > 0.0);
    }

    #[test]
    fn test_kaiming_fan_in() {
        let spec = WeightParams::new(&[8, 4, 2], WeightInit::Kaiming, 1.0).unwrap();
        assert_eq!(spec.fan_in(), 8);
        assert_eq!(WeightParams::new(&[5], WeightInit::Kaiming, 1.0).unwrap().fan_in(), 1);
    }
}
