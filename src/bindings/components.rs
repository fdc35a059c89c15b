// src/bindings/components.rs

//! # 컴포넌트 Python 클래스
//!
//! 가중치는 Python 쪽에서 dict로 들고 다니며, 매 호출마다 함께 넘깁니다.
//! 클래스 자체는 상태를 갖지 않습니다.

use numpy::{IntoPyArray, PyArrayDyn, PyReadonlyArrayDyn};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::tree::{dict_to_tree, tree_to_dict};
use crate::component::Component;
use crate::components::{GridPatches, PositionalEncoding};
use crate::ops::Activation;
use crate::random::RngKey;

fn init_dict<'py>(py: Python<'py>, component: &Component, seed: u64) -> PyResult<&'py PyDict> {
    let params = component.init(RngKey::new(seed))?;
    tree_to_dict(py, &params)
}

fn process_dict<'py>(
    py: Python<'py>,
    component: &Component,
    params: &PyDict,
    x: PyReadonlyArrayDyn<'py, f32>,
    seed: u64,
) -> PyResult<&'py PyArrayDyn<f32>> {
    let params = dict_to_tree(params)?;
    let y = component.call(&params, x.as_array(), RngKey::new(seed))?;
    Ok(y.into_pyarray(py))
}

#[pyclass(name = "PositionalEncoding", module = "component_make._rust")]
pub struct PyPositionalEncoding {
    config: PositionalEncoding,
    inner: Component,
}

#[pymethods]
impl PyPositionalEncoding {
    #[new]
    #[pyo3(signature = (input_shape, input_channels, output_channels, dim_encoding, positional_encode_strategy="dot", init_scale=1.0))]
    fn new(
        input_shape: Vec<usize>,
        input_channels: usize,
        output_channels: usize,
        dim_encoding: usize,
        positional_encode_strategy: &str,
        init_scale: f32,
    ) -> PyResult<Self> {
        let config = PositionalEncoding {
            input_shape,
            input_channels,
            output_channels,
            dim_encoding,
            positional_encode_strategy: positional_encode_strategy.to_string(),
            init_scale,
        };
        let inner = PositionalEncoding::make(&config)?;
        Ok(Self { config, inner })
    }

    /// 초기 가중치를 중첩 dict로 반환
    #[pyo3(signature = (seed=0))]
    pub fn init<'py>(&self, py: Python<'py>, seed: u64) -> PyResult<&'py PyDict> {
        init_dict(py, &self.inner, seed)
    }

    /// `[c, *input_shape] -> [c, prod(input_shape)]`
    #[pyo3(signature = (params, x, seed=0))]
    pub fn process<'py>(
        &self,
        py: Python<'py>,
        params: &PyDict,
        x: PyReadonlyArrayDyn<'py, f32>,
        seed: u64,
    ) -> PyResult<&'py PyArrayDyn<f32>> {
        process_dict(py, &self.inner, params, x, seed)
    }

    #[getter]
    pub fn n_params(&self) -> usize {
        self.inner.n_params()
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.config)
    }
}

#[pyclass(name = "GridPatches", module = "component_make._rust")]
pub struct PyGridPatches {
    config: GridPatches,
    inner: Component,
}

#[pymethods]
impl PyGridPatches {
    #[new]
    #[pyo3(signature = (dim_out, n_sections_w, n_sections_h, w, h, ch, mlp_n_hidden=Vec::new(), mlp_activation="relu", dropout_keep_rate=1.0))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        dim_out: usize,
        n_sections_w: usize,
        n_sections_h: usize,
        w: usize,
        h: usize,
        ch: usize,
        mlp_n_hidden: Vec<usize>,
        mlp_activation: &str,
        dropout_keep_rate: f32,
    ) -> PyResult<Self> {
        let config = GridPatches {
            dim_out,
            n_sections_w,
            n_sections_h,
            w,
            h,
            ch,
            mlp_n_hidden,
            mlp_activation: mlp_activation.parse::<Activation>()?,
            dropout_keep_rate,
        };
        let inner = GridPatches::make(&config)?;
        Ok(Self { config, inner })
    }

    #[pyo3(signature = (seed=0))]
    pub fn init<'py>(&self, py: Python<'py>, seed: u64) -> PyResult<&'py PyDict> {
        init_dict(py, &self.inner, seed)
    }

    /// `[h, w, ch] -> [dim_out, n_sections_h, n_sections_w, ch]`
    #[pyo3(signature = (params, x, seed=0))]
    pub fn process<'py>(
        &self,
        py: Python<'py>,
        params: &PyDict,
        x: PyReadonlyArrayDyn<'py, f32>,
        seed: u64,
    ) -> PyResult<&'py PyArrayDyn<f32>> {
        process_dict(py, &self.inner, params, x, seed)
    }

    #[getter]
    pub fn n_params(&self) -> usize {
        self.inner.n_params()
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.config)
    }
}
