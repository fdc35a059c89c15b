use std::fmt;
use std::str::FromStr;

use ndarray::ArrayD;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
    /// tanh approximation
    Gelu,
    Identity,
}

impl Activation {
    pub fn apply<F: Float>(&self, v: F) -> F {
        match self {
            Activation::Relu => v.max(F::zero()),
            Activation::Tanh => v.tanh(),
            Activation::Sigmoid => sigmoid(v),
            Activation::Gelu => gelu(v),
            Activation::Identity => v,
        }
    }

    pub fn apply_array(&self, x: ArrayD<f32>) -> ArrayD<f32> {
        match self {
            Activation::Identity => x,
            act => x.mapv_into(|v| act.apply(v)),
        }
    }
}

pub fn sigmoid<F: Float>(v: F) -> F {
    F::one() / (F::one() + (-v).exp())
}

pub fn gelu<F: Float>(v: F) -> F {
    let half = F::from(0.5).unwrap_or_else(F::zero);
    let c = F::from(0.797_884_560_802_865_4).unwrap_or_else(F::zero);
    let k = F::from(0.044_715).unwrap_or_else(F::zero);
    half * v * (F::one() + (c * (v + k * v * v * v)).tanh())
}

impl FromStr for Activation {
    type Err = ComponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            "gelu" => Ok(Activation::Gelu),
            "identity" => Ok(Activation::Identity),
            other => Err(ComponentError::UnsupportedStrategy { tag: other.to_string() }),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Gelu => "gelu",
            Activation::Identity => "identity",
        };
        f.write_str(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_values() {
        assert_eq!(Activation::Relu.apply(-2.0f32), 0.0);
        assert_eq!(Activation::Relu.apply(3.0f32), 3.0);
        assert_relative_eq!(Activation::Sigmoid.apply(0.0f32), 0.5);
        assert_relative_eq!(Activation::Gelu.apply(0.0f64), 0.0);
        // 큰 양수에서 gelu(x) ≈ x
        assert_relative_eq!(Activation::Gelu.apply(10.0f64), 10.0, epsilon = 1e-6);
        assert_eq!(Activation::Identity.apply(-1.5f32), -1.5);
    }

    #[test]
    fn test_tags_round_trip_through_serde() {
        let act: Activation = serde_json::from_str("\"gelu\"").unwrap();
        assert_eq!(act, Activation::Gelu);
        assert_eq!("tanh".parse::<Activation>().unwrap(), Activation::Tanh);
        assert!("swish".parse::<Activation>().is_err());
    }
}
