//! The component contract: a weight spec paired with a pure processing function.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD};

use crate::error::Result;
use crate::params::{ArrayTree, Tree, WeightParams, WeightTree};
use crate::random::RngKey;

/// Forward computation of a component.
///
/// Implementations must be pure in `(params, x, rng)`. `params` is already
/// restricted to the component's own namespace.
pub trait Process: Send + Sync {
    fn process(&self, params: &ArrayTree, x: ArrayViewD<f32>, rng: RngKey) -> Result<ArrayD<f32>>;
}

impl<F> Process for F
where
    F: Fn(&ArrayTree, ArrayViewD<f32>, RngKey) -> Result<ArrayD<f32>> + Send + Sync,
{
    fn process(&self, params: &ArrayTree, x: ArrayViewD<f32>, rng: RngKey) -> Result<ArrayD<f32>> {
        self(params, x, rng)
    }
}

#[derive(Clone)]
pub struct Component {
    params: WeightTree,
    processor: Arc<dyn Process>,
}

impl Component {
    /// The one way to build a compound component: a mapping of named
    /// sub-specs plus the function that drives them.
    pub fn from_fixed_pipeline<P>(components: BTreeMap<String, WeightTree>, f: P) -> Self
    where
        P: Process + 'static,
    {
        Self {
            params: Tree::Node(components),
            processor: Arc::new(f),
        }
    }

    /// Leaf spec, for mixing raw weights with sub-components in one mapping.
    pub fn weight(params: WeightParams) -> WeightTree {
        Tree::Leaf(params)
    }

    pub fn params(&self) -> &WeightTree {
        &self.params
    }

    pub fn n_params(&self) -> usize {
        self.params.n_params()
    }

    /// Realizes initial weights from the spec.
    pub fn init(&self, rng: RngKey) -> Result<ArrayTree> {
        self.params.realize(rng)
    }

    /// Raw forward pass. Used by parents that already validated the tree.
    pub fn process(&self, params: &ArrayTree, x: ArrayViewD<f32>, rng: RngKey) -> Result<ArrayD<f32>> {
        self.processor.process(params, x, rng)
    }

    /// Validates `params` against the spec, then runs the forward pass.
    pub fn call(&self, params: &ArrayTree, x: ArrayViewD<f32>, rng: RngKey) -> Result<ArrayD<f32>> {
        params.check_against(&self.params)?;
        self.process(params, x, rng)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
