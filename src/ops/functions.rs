//! Elementary forward functions: softmax and losses.
//!
//! These are plain array formulas for an external driver to pair with
//! component outputs. No gradients are computed here.

use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewD, Axis, Array2, Zip};

use crate::error::{ComponentError, Result};

fn check_same(context: &str, x: &[usize], y: &[usize]) -> Result<()> {
    if x != y {
        return Err(ComponentError::shape_mismatch(context, x, y));
    }
    Ok(())
}

/// Row-wise softmax (along axis 1), max-shifted.
pub fn softmax(inputs: &ArrayView2<f32>) -> Array2<f32> {
    let max = inputs.map_axis(Axis(1), |row| row.fold(f32::NEG_INFINITY, |m, &v| m.max(v)));
    let un_normalized = (inputs - &max.insert_axis(Axis(1))).mapv_into(f32::exp);
    let sums = un_normalized.sum_axis(Axis(1)).insert_axis(Axis(1));
    un_normalized / &sums
}

pub fn l2loss(x: &ArrayViewD<f32>, y: &ArrayViewD<f32>) -> Result<f32> {
    check_same("l2loss", x.shape(), y.shape())?;
    Ok((x - y).mapv(|d| d * d).mean().unwrap_or(0.0))
}

pub fn l1loss(x: &ArrayViewD<f32>, y: &ArrayViewD<f32>) -> Result<f32> {
    check_same("l1loss", x.shape(), y.shape())?;
    Ok((x - y).mapv(f32::abs).mean().unwrap_or(0.0))
}

/// Negative mean of the product of the two normalized vectors; smaller is
/// better. Norms are clamped below by `sqrt(eps)`.
pub fn get_cosine_similarity_loss(
    eps: f32,
) -> impl Fn(&ArrayView1<f32>, &ArrayView1<f32>) -> Result<f32> {
    let floor = eps.sqrt();
    move |x, y| {
        check_same("cosine similarity", x.shape(), y.shape())?;
        let x_norm = x.dot(x).sqrt().max(floor);
        let y_norm = y.dot(y).sqrt().max(floor);
        let prod = Zip::from(x).and(y).fold(0.0f32, |acc, &a, &b| acc + (a / x_norm) * (b / y_norm));
        Ok(-prod / x.len().max(1) as f32)
    }
}

/// `logits`, `target`: `[C, N]` → cross entropy per column, `[N]`.
pub fn softmax_cross_entropy(logits: &ArrayView2<f32>, target: &ArrayView2<f32>) -> Result<Array1<f32>> {
    check_same("softmax cross entropy", logits.shape(), target.shape())?;
    let max = logits.map_axis(Axis(0), |col| col.fold(f32::NEG_INFINITY, |m, &v| m.max(v)));
    let shifted = logits - &max.view().insert_axis(Axis(0));
    let logsumexp = shifted.mapv(f32::exp).sum_axis(Axis(0)).mapv(f32::ln) + &max;
    let log_softmax = logits - &logsumexp.insert_axis(Axis(0));
    Ok(-(target * &log_softmax).sum_axis(Axis(0)))
}

/// Mean of `max(x, 0) - x * t + log(1 + exp(-|x|))`.
pub fn sigmoid_cross_entropy_loss(logits: &ArrayViewD<f32>, targets: &ArrayViewD<f32>) -> Result<f32> {
    check_same("sigmoid cross entropy", logits.shape(), targets.shape())?;
    let n = logits.len().max(1) as f32;
    let total = Zip::from(logits)
        .and(targets)
        .fold(0.0f32, |acc, &x, &t| acc + x.max(0.0) - x * t + (-x.abs()).exp().ln_1p());
    Ok(total / n)
}
