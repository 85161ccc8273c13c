use tracing::debug;

use crate::labeled::{Axis, LabeledArray};
use crate::types::IndexError;

/// Largest filter window, in samples.
pub const MAX_WINDOW: usize = 1 << 24;

/// Number of samples spanned by a window of `window_days` at time step `dt` days.
///
/// `n = floor(window_days / dt) + 1`, e.g. 30 days of 6-hourly data gives 121.
pub fn window_length(window_days: f64, dt: f64) -> Result<usize, IndexError> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(IndexError::InvalidInput(format!(
            "time step must be positive, got {dt}"
        )));
    }
    if !(window_days.is_finite() && window_days >= 0.0) {
        return Err(IndexError::InvalidInput(format!(
            "window length must be non-negative, got {window_days}"
        )));
    }
    let ratio = (window_days / dt).floor();
    if !ratio.is_finite() || ratio >= MAX_WINDOW as f64 {
        return Err(IndexError::InvalidInput(format!(
            "window of {window_days} days at step {dt} exceeds {MAX_WINDOW} samples"
        )));
    }
    (ratio as usize).checked_add(1).ok_or_else(|| {
        IndexError::InvalidInput(format!("window of {window_days} days is too long"))
    })
}

/// Normalized triangular kernel of width `n`.
///
/// Weights rise `1, 2, ..., ceil(n/2)` then fall `floor(n/2), ..., 1`, divided
/// by their sum. For even `n` the peak value appears twice.
pub fn triangular_kernel(n: usize) -> Result<Vec<f64>, IndexError> {
    if n == 0 {
        return Err(IndexError::InvalidInput(
            "window length must be at least 1".into(),
        ));
    }
    let ramp: Vec<f64> = (1..=n.div_ceil(2))
        .chain((1..=n / 2).rev())
        .map(|w| w as f64)
        .collect();
    let total: f64 = ramp.iter().sum();
    Ok(ramp.into_iter().map(|w| w / total).collect())
}

/// Normalized `triang` window of width `n`.
///
/// Odd `n`: `2k/(n+1)` for `k = 1..=(n+1)/2`, mirrored. Even `n`:
/// `(2k−1)/n` for `k = 1..=n/2`, mirrored. Divided by the sum. For odd `n`
/// this equals [`triangular_kernel`]; for even `n` the weights differ.
pub fn triang_window(n: usize) -> Result<Vec<f64>, IndexError> {
    if n == 0 {
        return Err(IndexError::InvalidInput(
            "window length must be at least 1".into(),
        ));
    }
    let half: Vec<f64> = if n % 2 == 1 {
        (1..=n.div_ceil(2))
            .map(|k| 2.0 * k as f64 / (n + 1) as f64)
            .collect()
    } else {
        (1..=n / 2)
            .map(|k| (2 * k - 1) as f64 / n as f64)
            .collect()
    };
    let window: Vec<f64> = half
        .iter()
        .chain(half.iter().rev().skip(n % 2))
        .copied()
        .collect();
    let total: f64 = window.iter().sum();
    Ok(window.into_iter().map(|w| w / total).collect())
}

/// Circular convolution of `x` with `kernel`, the kernel's sample `centre`
/// landing on the output position.
///
/// out[i] = Σⱼ kernel[j] · x[(i + j − centre) mod L]
pub fn convolve_wrapped(x: &[f64], kernel: &[f64], centre: usize) -> Vec<f64> {
    let len = x.len() as isize;
    if len == 0 || kernel.is_empty() {
        return x.to_vec();
    }
    let c = centre as isize;

    (0..len)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(j, w)| w * x[(i + j as isize - c).rem_euclid(len) as usize])
                .sum::<f64>()
        })
        .collect()
}

/// Circular convolution of `x` with `kernel`.
///
/// The series wraps around: the last sample is adjacent to the first. Odd
/// kernels are centered; even kernels have their centre at `len/2 − 1`, so
/// they reach one sample further forward than backward.
pub fn convolve_periodic(x: &[f64], kernel: &[f64]) -> Vec<f64> {
    let k = kernel.len();
    let centre = if k % 2 == 0 { (k / 2).saturating_sub(1) } else { k / 2 };
    convolve_wrapped(x, kernel, centre)
}

/// Samples dropped from the (start, end) of the series when `valid` is set.
///
/// Start drops `(n−1)/2` (floor), end drops the remainder `(n−1) − (n−1)/2`.
pub fn valid_trim(n: usize) -> (usize, usize) {
    let span = n.saturating_sub(1);
    let start = span / 2;
    (start, span - start)
}

/// Lowpass-filter `field` along `dim` with a triangular window of width `n`.
///
/// The axis is treated as periodic. With `valid`, samples affected by the
/// wrap-around are trimmed from both ends (see [`valid_trim`]).
///
/// # Arguments
/// * `field` - Input array.
/// * `dim` - Axis to filter along (e.g. "time" or "dayofyear").
/// * `n` - Window length in samples.
/// * `valid` - Trim edge samples.
pub fn lowpass(
    field: &LabeledArray,
    dim: &str,
    n: usize,
    valid: bool,
) -> Result<LabeledArray, IndexError> {
    let kernel = triangular_kernel(n)?;
    let axis = field.axis(dim)?.clone();
    let len = axis.len();

    let (start, end) = if valid { valid_trim(n) } else { (0, 0) };
    if start + end >= len {
        return Err(IndexError::InsufficientData(format!(
            "axis '{dim}' has {len} samples, trimming a window of {n} leaves none"
        )));
    }
    let keep = start..len - end;
    let out_axis = Axis::new(dim, axis.coords[keep.clone()].to_vec());

    debug!(dim, n, len, valid, "lowpass filter");
    field.map_lanes(dim, out_axis, |lane| {
        let filtered = convolve_periodic(lane, &kernel);
        Ok(filtered[keep.clone()].to_vec())
    })
}
