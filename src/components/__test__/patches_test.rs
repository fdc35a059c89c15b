use std::collections::BTreeMap;

use crate::component::Component;
use crate::components::patches::{assemble_patches, extract_patches, GridPatches, PatchGeometry};
use crate::error::ComponentError;
use crate::ops::Activation;
use crate::params::ArrayTree;
use crate::random::RngKey;
use ndarray::{Array3, ArrayD, ArrayViewD, Ix4};

fn config(h: usize, w: usize, n_sections_h: usize, n_sections_w: usize) -> GridPatches {
    GridPatches {
        dim_out: 5,
        n_sections_w,
        n_sections_h,
        w,
        h,
        ch: 2,
        mlp_n_hidden: vec![8],
        mlp_activation: Activation::Tanh,
        dropout_keep_rate: 1.0,
    }
}

fn grid(h: usize, w: usize, ch: usize) -> ArrayD<f32> {
    Array3::from_shape_fn((h, w, ch), |(y, x, c)| (y * 100 + x * 10 + c) as f32).into_dyn()
}

fn identity() -> Component {
    Component::from_fixed_pipeline(BTreeMap::new(), |_: &ArrayTree, x: ArrayViewD<f32>, _: RngKey| {
        Ok(x.to_owned())
    })
}

#[test]
fn test_identity_round_trip() {
    let geometry = PatchGeometry::new(4, 6, 2, 2, 3).unwrap();
    let patches = GridPatches::with_block_component(geometry, "identity", identity());
    let params = patches.init(RngKey::new(0)).unwrap();
    let x = grid(4, 6, 2);
    let y = patches
        .call(&params, x.view(), RngKey::new(0))
        .unwrap()
        .into_dimensionality::<Ix4>()
        .unwrap();
    assert_eq!(y.shape(), &[4, 2, 3, 2]);

    let x3 = x.into_dimensionality::<ndarray::Ix3>().unwrap();
    for i in 0..2 {
        for j in 0..3 {
            for c in 0..2 {
                for ph in 0..2 {
                    for pw in 0..2 {
                        // 블록 내부는 높이 우선, 너비 다음 순서
                        assert_eq!(y[[ph * 2 + pw, i, j, c]], x3[[i * 2 + ph, j * 2 + pw, c]]);
                    }
                }
            }
        }
    }
}

#[test]
fn test_extract_then_assemble_matches() {
    let geometry = PatchGeometry::new(4, 6, 2, 2, 3).unwrap();
    let x = grid(4, 6, 2);
    let rows = extract_patches(&x.view(), &geometry).unwrap();
    assert_eq!(rows.shape(), &[12, 4]);
    // 첫 행: 블록 (0, 0), 채널 0
    assert_eq!(rows.row(0).to_vec(), vec![0.0, 10.0, 100.0, 110.0]);
    // 두 번째 행: 블록 (0, 0), 채널 1
    assert_eq!(rows.row(1).to_vec(), vec![1.0, 11.0, 101.0, 111.0]);

    let assembled = assemble_patches(&rows.view(), &geometry).unwrap();
    assert_eq!(assembled.shape(), &[4, 2, 3, 2]);
    // 블록 (1, 2), 채널 1, 블록 내 (1, 1) -> x[3, 5, 1]
    assert_eq!(assembled[[3, 1, 2, 1]], 351.0);
}

#[test]
fn test_non_divisible_sections_fail_construction() {
    assert!(matches!(
        GridPatches::make(&config(4, 6, 3, 3)),
        Err(ComponentError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        GridPatches::make(&config(4, 6, 2, 4)),
        Err(ComponentError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_mlp_patches_shape_and_sharing() {
    let patches = GridPatches::make(&config(4, 6, 2, 3)).unwrap();
    assert_eq!(patches.params().keys(), vec!["mlp"]);
    let params = patches.init(RngKey::new(21)).unwrap();

    // 모든 블록이 같은 내용이면 출력도 같아야 함 (가중치 공유)
    let x = ArrayD::<f32>::from_elem(ndarray::IxDyn(&[4, 6, 2]), 0.25);
    let y = patches
        .call(&params, x.view(), RngKey::new(1))
        .unwrap()
        .into_dimensionality::<Ix4>()
        .unwrap();
    assert_eq!(y.shape(), &[5, 2, 3, 2]);
    for o in 0..5 {
        let first = y[[o, 0, 0, 0]];
        assert!(y.index_axis(ndarray::Axis(0), o).iter().all(|&v| v == first));
    }
}

#[test]
fn test_block_outputs_depend_only_on_their_block() {
    let patches = GridPatches::make(&config(4, 6, 2, 3)).unwrap();
    let params = patches.init(RngKey::new(3)).unwrap();
    let x = grid(4, 6, 2).mapv(|v| v / 100.0);
    let mut x2 = x.clone();
    x2[[0, 1, 0]] += 1.0;

    let y = patches.call(&params, x.view(), RngKey::new(0)).unwrap();
    let y2 = patches.call(&params, x2.view(), RngKey::new(0)).unwrap();
    let y = y.into_dimensionality::<Ix4>().unwrap();
    let y2 = y2.into_dimensionality::<Ix4>().unwrap();
    for ((o, i, j, c), &v) in y.indexed_iter() {
        if (i, j, c) == (0, 0, 0) {
            continue;
        }
        assert_eq!(v, y2[[o, i, j, c]], "block ({}, {}, {}) changed", i, j, c);
    }
    assert!((0..5).any(|o| y[[o, 0, 0, 0]] != y2[[o, 0, 0, 0]]));
}

#[test]
fn test_parallel_map_is_deterministic() {
    let mut cfg = config(8, 8, 4, 4);
    cfg.dropout_keep_rate = 0.7;
    let patches = GridPatches::make(&cfg).unwrap();
    let params = patches.init(RngKey::new(10)).unwrap();
    let x = grid(8, 8, 2);
    let a = patches.call(&params, x.view(), RngKey::new(99)).unwrap();
    let b = patches.call(&params, x.view(), RngKey::new(99)).unwrap();
    assert_eq!(a, b);
}
