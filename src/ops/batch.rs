use ndarray::{Array, ArrayBase, ArrayD, ArrayViewD, Data, Dimension, Ix1, Ix2, IxDyn};

use crate::error::{ComponentError, Result};

/// `x @ w^T + b` over the last axis of `x`.
///
/// `x`: `[..., n_in]`, `w`: `[n_out, n_in]`, `b`: `[n_out]`.
/// Leading axes are flattened into one batch axis for the product and
/// restored afterwards.
pub fn linear_nd<S, T>(
    x: &ArrayViewD<f32>,
    w: &ArrayBase<S, Ix2>,
    b: &ArrayBase<T, Ix1>,
) -> Result<ArrayD<f32>>
where
    S: Data<Elem = f32>,
    T: Data<Elem = f32>,
{
    let x_shape = x.shape();
    let (n_out, n_in) = w.dim();
    let last = x_shape.last().copied().unwrap_or(0);
    if x_shape.is_empty() || last != n_in {
        return Err(ComponentError::shape_mismatch("linear input", &[n_in], &[last]));
    }
    if b.len() != n_out {
        return Err(ComponentError::shape_mismatch("linear bias", &[n_out], b.shape()));
    }

    let total_batch_size: usize = x_shape[..x_shape.len() - 1].iter().product();
    let x_2d = x.to_shape((total_batch_size, n_in))?;
    let out_2d = x_2d.dot(&w.t()) + b;

    let mut output_shape = x_shape.to_vec();
    let last_axis = output_shape.len() - 1;
    output_shape[last_axis] = n_out;
    reshape_owned(out_2d, &output_shape)
}

/// Row-major reshape of an owned array. Copies only when `x` is not already
/// in standard layout.
pub fn reshape_owned<D: Dimension>(x: Array<f32, D>, shape: &[usize]) -> Result<ArrayD<f32>> {
    let x = if x.is_standard_layout() {
        x
    } else {
        x.as_standard_layout().into_owned()
    };
    Ok(x.into_shape(IxDyn(shape))?)
}

/// Shape of `[lead, *rest]`.
pub fn prepend_dim(lead: usize, rest: &[usize]) -> Vec<usize> {
    let mut shape = Vec::with_capacity(rest.len() + 1);
    shape.push(lead);
    shape.extend_from_slice(rest);
    shape
}

/// `[d, 1, .., n_axis, .., 1]`: the shape an axis table takes to broadcast
/// against `[d, *input_shape]`.
pub fn axis_broadcast_shape(d: usize, axis: usize, input_shape: &[usize]) -> Vec<usize> {
    let rest: Vec<usize> = input_shape
        .iter()
        .enumerate()
        .map(|(i, &n)| if i == axis { n } else { 1 })
        .collect();
    prepend_dim(d, &rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array3};

    #[test]
    fn test_linear_nd_matches_2d() {
        let w = arr2(&[[1.0f32, 0.0, 2.0], [0.0, 1.0, -1.0]]);
        let b = arr1(&[0.5f32, -0.5]);
        let x = arr2(&[[1.0f32, 2.0, 3.0], [0.0, 0.0, 1.0]]).into_dyn();
        let y = linear_nd(&x.view(), &w, &b).unwrap();
        let expected = arr2(&[[7.5f32, -1.5], [2.5, -1.5]]).into_dyn();
        assert_abs_diff_eq!(y, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_nd_keeps_leading_axes() {
        let w = arr2(&[[1.0f32, 1.0]]);
        let b = arr1(&[0.0f32]);
        let x = Array3::<f32>::ones((2, 3, 2)).into_dyn();
        let y = linear_nd(&x.view(), &w, &b).unwrap();
        assert_eq!(y.shape(), &[2, 3, 1]);
        assert!(y.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_linear_nd_rejects_wrong_width() {
        let w = arr2(&[[1.0f32, 1.0]]);
        let b = arr1(&[0.0f32]);
        let x = arr1(&[1.0f32, 2.0, 3.0]).into_dyn();
        assert!(matches!(
            linear_nd(&x.view(), &w, &b),
            Err(ComponentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_reshape_owned_is_row_major_for_transposed_input() {
        let x = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).reversed_axes();
        let y = reshape_owned(x, &[4]).unwrap();
        assert_eq!(y, arr1(&[1.0f32, 3.0, 2.0, 4.0]).into_dyn());
    }

    #[test]
    fn test_axis_broadcast_shape() {
        assert_eq!(axis_broadcast_shape(4, 1, &[2, 3, 5]), vec![4, 1, 3, 1]);
        assert_eq!(prepend_dim(4, &[2, 3]), vec![4, 2, 3]);
    }
}
