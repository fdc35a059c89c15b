// src/bindings/tree.rs

//! 중첩 dict <-> `ArrayTree` 변환
//!
//! dict는 노드, float32 ndarray는 리프로 대응됩니다.

use std::collections::BTreeMap;

use numpy::{IntoPyArray, PyReadonlyArrayDyn};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::params::{ArrayTree, Tree};

pub fn tree_to_dict<'py>(py: Python<'py>, tree: &ArrayTree) -> PyResult<&'py PyDict> {
    let children = match tree {
        Tree::Node(children) => children,
        Tree::Leaf(_) => return Err(PyValueError::new_err("parameter root must be a mapping")),
    };
    let dict = PyDict::new(py);
    for (key, child) in children {
        match child {
            Tree::Leaf(arr) => dict.set_item(key, arr.clone().into_pyarray(py))?,
            Tree::Node(_) => dict.set_item(key, tree_to_dict(py, child)?)?,
        }
    }
    Ok(dict)
}

pub fn dict_to_tree(dict: &PyDict) -> PyResult<ArrayTree> {
    let mut children = BTreeMap::new();
    for (key, value) in dict.iter() {
        let key: String = key.extract()?;
        let child = match value.downcast::<PyDict>() {
            Ok(sub) => dict_to_tree(sub)?,
            Err(_) => {
                let arr: PyReadonlyArrayDyn<f32> = value.extract()?;
                Tree::Leaf(arr.as_array().to_owned())
            }
        };
        children.insert(key, child);
    }
    Ok(Tree::Node(children))
}
