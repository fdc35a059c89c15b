// src/components/patches.rs

//! # 격자 패치 추출
//!
//! `[h, w, ch]` 격자를 겹치지 않는 블록으로 나누고, 모든 블록에 같은 가중치의
//! 하위 컴포넌트(MLP)를 적용한 뒤 `[out, n_sections_h, n_sections_w, ch]`로
//! 다시 조립합니다.

use std::collections::BTreeMap;

use ndarray::{Array2, Array4, ArrayD, ArrayView2, ArrayViewD, Axis, Ix3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::component::{Component, Process};
use crate::components::mlp::Mlp;
use crate::error::{ComponentError, Result};
use crate::ops::Activation;
use crate::params::ArrayTree;
use crate::random::RngKey;

pub trait GridPatchesConfigs {
    fn dim_out(&self) -> usize;
    fn n_sections_w(&self) -> usize;
    fn n_sections_h(&self) -> usize;
    fn w(&self) -> usize;
    fn h(&self) -> usize;
    fn ch(&self) -> usize;
    fn mlp_n_hidden(&self) -> &[usize];
    fn mlp_activation(&self) -> Activation;
    fn dropout_keep_rate(&self) -> f32;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPatches {
    pub dim_out: usize,
    pub n_sections_w: usize,
    pub n_sections_h: usize,
    pub w: usize,
    pub h: usize,
    pub ch: usize,
    pub mlp_n_hidden: Vec<usize>,
    pub mlp_activation: Activation,
    pub dropout_keep_rate: f32,
}

impl GridPatchesConfigs for GridPatches {
    fn dim_out(&self) -> usize {
        self.dim_out
    }
    fn n_sections_w(&self) -> usize {
        self.n_sections_w
    }
    fn n_sections_h(&self) -> usize {
        self.n_sections_h
    }
    fn w(&self) -> usize {
        self.w
    }
    fn h(&self) -> usize {
        self.h
    }
    fn ch(&self) -> usize {
        self.ch
    }
    fn mlp_n_hidden(&self) -> &[usize] {
        &self.mlp_n_hidden
    }
    fn mlp_activation(&self) -> Activation {
        self.mlp_activation
    }
    fn dropout_keep_rate(&self) -> f32 {
        self.dropout_keep_rate
    }
}

/// Block partition of a `[h, w, ch]` grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGeometry {
    pub h: usize,
    pub w: usize,
    pub ch: usize,
    pub n_sections_h: usize,
    pub n_sections_w: usize,
}

impl PatchGeometry {
    /// Sections must evenly divide the grid; no floor division.
    pub fn new(h: usize, w: usize, ch: usize, n_sections_h: usize, n_sections_w: usize) -> Result<Self> {
        if h == 0 || w == 0 || ch == 0 || n_sections_h == 0 || n_sections_w == 0 {
            return Err(ComponentError::config(format!(
                "patch grid needs non-zero dims and sections, got {}x{}x{} grid, {}x{} sections",
                h, w, ch, n_sections_h, n_sections_w
            )));
        }
        if h % n_sections_h != 0 {
            return Err(ComponentError::shape_mismatch(
                format!("grid height must be a multiple of n_sections_h ({})", n_sections_h),
                &[h - h % n_sections_h],
                &[h],
            ));
        }
        if w % n_sections_w != 0 {
            return Err(ComponentError::shape_mismatch(
                format!("grid width must be a multiple of n_sections_w ({})", n_sections_w),
                &[w - w % n_sections_w],
                &[w],
            ));
        }
        Ok(Self {
            h,
            w,
            ch,
            n_sections_h,
            n_sections_w,
        })
    }

    pub fn dim_h(&self) -> usize {
        self.h / self.n_sections_h
    }

    pub fn dim_w(&self) -> usize {
        self.w / self.n_sections_w
    }

    /// Pixels per block per channel.
    pub fn block_len(&self) -> usize {
        self.dim_h() * self.dim_w()
    }

    /// One row per (block, channel).
    pub fn n_rows(&self) -> usize {
        self.n_sections_h * self.n_sections_w * self.ch
    }

    fn row_index(&self, i: usize, j: usize, c: usize) -> usize {
        (i * self.n_sections_w + j) * self.ch + c
    }
}

/// `[h, w, ch] -> [(n_sections_h n_sections_w ch), (dim_h dim_w)]`
///
/// Rows run block-row, block-col, channel; each row holds one block of one
/// channel, block-height-major.
pub fn extract_patches(x: &ArrayViewD<f32>, geometry: &PatchGeometry) -> Result<Array2<f32>> {
    let expected = [geometry.h, geometry.w, geometry.ch];
    if x.shape() != &expected[..] {
        return Err(ComponentError::shape_mismatch("patch input", &expected, x.shape()));
    }
    let x = x.view().into_dimensionality::<Ix3>()?;
    let (dim_h, dim_w) = (geometry.dim_h(), geometry.dim_w());
    let per_block = geometry.n_sections_w * geometry.ch;

    Ok(Array2::from_shape_fn((geometry.n_rows(), geometry.block_len()), |(r, k)| {
        let i = r / per_block;
        let j = (r % per_block) / geometry.ch;
        let c = r % geometry.ch;
        let (ph, pw) = (k / dim_w, k % dim_w);
        x[[i * dim_h + ph, j * dim_w + pw, c]]
    }))
}

/// `[(n_sections_h n_sections_w ch), out] -> [out, n_sections_h, n_sections_w, ch]`
pub fn assemble_patches(features: &ArrayView2<f32>, geometry: &PatchGeometry) -> Result<Array4<f32>> {
    let (rows, out) = features.dim();
    if rows != geometry.n_rows() {
        return Err(ComponentError::shape_mismatch(
            "patch features",
            &[geometry.n_rows(), out],
            features.shape(),
        ));
    }
    Ok(Array4::from_shape_fn(
        (out, geometry.n_sections_h, geometry.n_sections_w, geometry.ch),
        |(o, i, j, c)| features[[geometry.row_index(i, j, c), o]],
    ))
}

const MLP_KEY: &str = "mlp";

impl GridPatches {
    pub fn geometry<C: GridPatchesConfigs + ?Sized>(config: &C) -> Result<PatchGeometry> {
        PatchGeometry::new(
            config.h(),
            config.w(),
            config.ch(),
            config.n_sections_h(),
            config.n_sections_w(),
        )
    }

    /// Patch extraction with a shared MLP of `dim_h * dim_w -> dim_out`.
    pub fn make<C: GridPatchesConfigs + ?Sized>(config: &C) -> Result<Component> {
        let geometry = Self::geometry(config)?;
        let mlp = Mlp::make(&Mlp {
            n_in: geometry.block_len(),
            n_hidden: config.mlp_n_hidden().to_vec(),
            n_out: config.dim_out(),
            activation: config.mlp_activation(),
            dropout_keep_rate: config.dropout_keep_rate(),
        })?;
        Ok(Self::with_block_component(geometry, MLP_KEY, mlp))
    }

    /// Patch extraction around any per-block component, stored under `name`.
    pub fn with_block_component(geometry: PatchGeometry, name: &str, block: Component) -> Component {
        debug!(
            h = geometry.h,
            w = geometry.w,
            ch = geometry.ch,
            sections = ?(geometry.n_sections_h, geometry.n_sections_w),
            block = ?(geometry.dim_h(), geometry.dim_w()),
            n_params = block.n_params(),
            "built grid patches"
        );
        let mut components = BTreeMap::new();
        components.insert(name.to_string(), block.params().clone());
        Component::from_fixed_pipeline(
            components,
            PatchProcess {
                geometry,
                name: name.to_string(),
                block,
            },
        )
    }
}

struct PatchProcess {
    geometry: PatchGeometry,
    name: String,
    block: Component,
}

impl Process for PatchProcess {
    // [h, w, ch] -> [out, n_sections_h, n_sections_w, ch]
    fn process(&self, params: &ArrayTree, x: ArrayViewD<f32>, rng: RngKey) -> Result<ArrayD<f32>> {
        let patches = extract_patches(&x, &self.geometry)?;
        let block_params = params.get(&self.name)?;

        // 모든 블록이 같은 가중치와 같은 키를 공유
        let outputs = patches
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.block.process(block_params, row.into_dyn(), rng))
            .collect::<Result<Vec<_>>>()?;

        let out = outputs.first().map(|o| o.len()).unwrap_or(0);
        let mut features = Array2::<f32>::zeros((outputs.len(), out));
        for (mut dst, src) in features.axis_iter_mut(Axis(0)).zip(&outputs) {
            if src.ndim() != 1 || src.len() != out {
                return Err(ComponentError::shape_mismatch("block output", &[out], src.shape()));
            }
            dst.iter_mut().zip(src.iter()).for_each(|(d, &s)| *d = s);
        }
        trace!(rows = outputs.len(), out, "mapped patch blocks");

        Ok(assemble_patches(&features.view(), &self.geometry)?.into_dyn())
    }
}
