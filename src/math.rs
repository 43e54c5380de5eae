use crate::error::{Error, Result};
use ndarray::{Array1, Array2, s};

/// The logistic function σ(z) = 1 / (1 + e^(-z)).
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-z))
}

/// Derivative of the logistic function with respect to its input, computed
/// directly from the raw value via the closed form e^(-z) / (1 + e^(-z))².
/// Algebraically identical to σ(z)·(1 - σ(z)).
pub fn sigmoid_derivative(z: f64) -> f64 {
    let e = f64::exp(-z);
    e / ((1.0 + e) * (1.0 + e))
}

/// Multiplies a matrix by a column vector, producing a vector whose length is
/// the matrix height. The matrix width must match the vector length.
pub fn mat_vec_mul(m: &Array2<f64>, v: &Array1<f64>) -> Result<Array1<f64>> {
    if m.ncols() != v.len() {
        return Err(Error::DimensionMismatch {
            expected: m.ncols(),
            actual: v.len(),
        });
    }
    Ok(m.dot(v))
}

/// Adds `v` into `dest` elementwise. Both vectors must have the same length.
pub fn add_assign(dest: &mut Array1<f64>, v: &Array1<f64>) -> Result<()> {
    if dest.len() != v.len() {
        return Err(Error::DimensionMismatch {
            expected: dest.len(),
            actual: v.len(),
        });
    }
    *dest += v;
    Ok(())
}

/// Sum of the squared differences between corresponding entries of two
/// equal-length vectors (the squared Euclidean distance).
pub fn squared_distance(a: &Array1<f64>, b: &Array1<f64>) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum())
}

/// Euclidean norm of a vector.
pub fn magnitude(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Index of the greatest value in the vector. Ties resolve to the lowest
/// index. An empty vector yields index 0.
pub fn max_index(v: &Array1<f64>) -> usize {
    let mut index = 0;
    let mut max = f64::NEG_INFINITY;
    for (i, &value) in v.iter().enumerate() {
        if value > max {
            max = value;
            index = i;
        }
    }
    index
}

/// Copies all of `src` into `dest` starting at `offset`. The destination must
/// have room for the whole source past the offset.
pub fn copy_into(dest: &mut Array1<f64>, src: &Array1<f64>, offset: usize) -> Result<()> {
    if dest.len() < offset + src.len() {
        return Err(Error::RangeOutOfBounds {
            offset,
            len: src.len(),
            destination: dest.len(),
        });
    }
    dest.slice_mut(s![offset..offset + src.len()]).assign(src);
    Ok(())
}
