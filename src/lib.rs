//! Component Make - composable parameterized neural-network components.
//!
//! A [`Component`] pairs a weight specification tree with a pure processing
//! function. Weights are realized outside the component, handed back on every
//! call, and checked against the spec before use.
//!
//! ```no_run
//! use component_make::{PositionalEncoding, RngKey};
//! use ndarray::{ArrayD, IxDyn};
//!
//! # fn main() -> component_make::Result<()> {
//! let pe = PositionalEncoding::make(&PositionalEncoding {
//!     input_shape: vec![2, 3],
//!     input_channels: 4,
//!     output_channels: 4,
//!     dim_encoding: 4,
//!     positional_encode_strategy: "dot".to_string(),
//!     init_scale: 1.0,
//! })?;
//! let params = pe.init(RngKey::new(0))?;
//! let x = ArrayD::<f32>::ones(IxDyn(&[4, 2, 3]));
//! let y = pe.call(&params, x.view(), RngKey::new(1))?;
//! assert_eq!(y.shape(), &[4, 6]);
//! # Ok(())
//! # }
//! ```

pub mod component;
pub mod components;
pub mod error;
pub mod ops;
pub mod params;
pub mod random;

#[cfg(feature = "python")]
pub mod bindings;

pub use component::{Component, Process};
pub use components::{
    GridPatches, GridPatchesConfigs, Linear, Mlp, MlpConfigs, PatchGeometry,
    PositionalEncodeStrategy, PositionalEncoding, PositionalEncodingConfigs,
};
pub use error::{ComponentError, Result};
pub use ops::Activation;
pub use params::{ArrayTree, Tree, WeightInit, WeightParams, WeightTree};
pub use random::RngKey;
