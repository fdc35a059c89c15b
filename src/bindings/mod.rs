mod components;
mod tree;

pub use components::*;
pub use tree::{dict_to_tree, tree_to_dict};

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;

use crate::error::ComponentError;

impl From<ComponentError> for PyErr {
    fn from(err: ComponentError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Component Make - parameterized neural-network components in Rust
#[pymodule]
pub fn _rust(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_class::<PyPositionalEncoding>()?;
    m.add_class::<PyGridPatches>()?;
    Ok(())
}
