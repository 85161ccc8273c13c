use rayon::prelude::*;
use tracing::debug;

use crate::labeled::{Axis, LabeledArray, LAT, LON};
use crate::types::IndexError;
use crate::utils::cos_lat;

/// Area weights `cos(lat)` for the projection.
pub fn cos_weights(lat: &[f64]) -> Vec<f64> {
    lat.iter().map(|&l| cos_lat(l)).collect()
}

/// Weighted least-squares coefficient of `sample` on `pattern`.
///
/// `Σ pattern·sample·w / Σ pattern²·w`. Missing values (NaN) are skipped:
/// a NaN in the pattern drops the point from both sums, a NaN in the sample
/// drops it from the numerator only.
pub fn project_slice(sample: &[f64], pattern: &[f64], weights: &[f64]) -> Result<f64, IndexError> {
    if sample.len() != pattern.len() || pattern.len() != weights.len() {
        return Err(IndexError::InvalidInput(format!(
            "projection inputs differ in length: sample {}, pattern {}, weights {}",
            sample.len(),
            pattern.len(),
            weights.len()
        )));
    }

    let mut num = 0.0;
    let mut den = 0.0;
    let mut valid = 0usize;
    for ((&s, &p), &w) in sample.iter().zip(pattern).zip(weights) {
        if p.is_nan() {
            continue;
        }
        den += p * p * w;
        if !s.is_nan() {
            num += p * s * w;
            valid += 1;
        }
    }

    if valid == 0 {
        return Err(IndexError::InsufficientData(
            "no valid sample points under the pattern".into(),
        ));
    }
    if den == 0.0 || !den.is_finite() {
        return Err(IndexError::DegenerateWeight(
            "pattern has zero weighted norm".into(),
        ));
    }
    Ok(num / den)
}

/// Project every lat/lon slice of `sample` onto `pattern`.
///
/// The pattern must contain "lat" and "lon", and each of its axes must also
/// be in `sample` on the same coordinates. Sample axes absent from the
/// pattern (e.g. "time") are kept; the result drops "lat" and "lon" and has
/// the sample's remaining axes in their original order.
pub fn projection(sample: &LabeledArray, pattern: &LabeledArray) -> Result<LabeledArray, IndexError> {
    for name in [LAT, LON] {
        if !pattern.has_axis(name) {
            return Err(IndexError::InvalidInput(format!(
                "pattern has no '{name}' axis"
            )));
        }
    }

    let others: Vec<&str> = sample
        .axis_names()
        .into_iter()
        .filter(|n| *n != LAT && *n != LON)
        .collect();
    let mut order = others.clone();
    order.extend([LAT, LON]);
    let sample = sample.transpose_to(&order)?;

    // Broadcast pattern and weights onto the sample grid; fails on any misalignment
    let pattern_full = pattern.broadcast_to(sample.axes())?;
    let lat_axis = sample.axis(LAT)?.clone();
    let weights = LabeledArray::from_vec(vec![lat_axis.clone()], cos_weights(&lat_axis.coords))?
        .broadcast_to(&[lat_axis, sample.axis(LON)?.clone()])?;
    let weights: Vec<f64> = weights.iter().copied().collect();

    let plane = weights.len();
    let out_axes: Vec<Axis> = others
        .iter()
        .map(|o| sample.axis(o).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        n_points = plane,
        n_slices = out_axes.iter().map(Axis::len).product::<usize>(),
        "projecting onto pattern"
    );

    let values = sample.values();
    let pattern_values: Vec<f64> = pattern_full.iter().copied().collect();
    let result = values
        .par_chunks_exact(plane)
        .zip(pattern_values.par_chunks_exact(plane))
        .map(|(s, p)| project_slice(s, p, &weights))
        .collect::<Result<Vec<_>, _>>()?;

    LabeledArray::from_vec(out_axes, result)
}
