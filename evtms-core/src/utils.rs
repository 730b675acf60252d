//! Module containing miscellaneous utility functions.

use ndarray::{Array1, ArrayView1};

/// Returns true if `val1` and `val2` are within a relative/absolute `epsilon` of each other,
/// depending on magnitude.
pub fn almost_eq(val1: f64, val2: f64, epsilon: Option<f64>) -> bool {
    let epsilon = epsilon.unwrap_or(1e-8);
    ((val2 - val1) / (val1 + val2)).abs() < epsilon || (val2 - val1).abs() < epsilon
}

/// Returns true if `data` is non-decreasing
pub fn is_sorted<T: std::cmp::PartialOrd>(data: &[T]) -> bool {
    data.windows(2).all(|w| w[0] <= w[1])
}

/// Returns true if `data` is strictly increasing
pub fn is_strictly_sorted<T: std::cmp::PartialOrd>(data: &[T]) -> bool {
    data.windows(2).all(|w| w[0] < w[1])
}

/// Returns the index of the first element of `arr` that `x` does not exceed,
/// i.e. the first `i` with `x <= arr[i]`.
pub fn first_not_exceeded(arr: &[f64], x: f64) -> Option<usize> {
    arr.iter().position(|&cut| x <= cut)
}

/// Number of leading elements of `arr` that `x` strictly exceeds, stopping at
/// the first element that is not exceeded.
pub fn count_leading_exceeded(arr: &[f64], x: f64) -> usize {
    arr.iter().take_while(|&&cut| x > cut).count()
}

/// Divides `num` by `den`, returning `0.0` when `den` is not positive.
pub fn div_or_zero(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Returns differences between consecutive elements, with a leading zero so
/// the output has the same length as `x`.
pub fn diff(x: ArrayView1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(x.len());
    for i in 1..x.len() {
        out[i] = x[i] - x[i - 1];
    }
    out
}

/// Trapezoidal integral of `y` over `x`
pub fn trapz(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let dx = diff(x);
    (1..x.len().min(y.len()))
        .map(|i| dx[i] * (y[i] + y[i - 1]) / 2.0)
        .sum()
}
