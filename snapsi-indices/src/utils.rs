use faer::Mat;

use crate::types::IndexError;

/// Latitudes closer than this (in degrees) to ±90 are treated as poles.
pub const POLE_TOL_DEG: f64 = 1e-9;

/// Validate that a matrix meets minimum dimension requirements and contains no NaN/Inf.
pub fn validate_matrix(x: &Mat<f64>, min_rows: usize, min_cols: usize) -> Result<(), IndexError> {
    let (rows, cols) = (x.nrows(), x.ncols());
    if rows < min_rows {
        return Err(IndexError::InsufficientData(format!(
            "matrix has {rows} rows, need at least {min_rows}"
        )));
    }
    if cols < min_cols {
        return Err(IndexError::InsufficientData(format!(
            "matrix has {cols} columns, need at least {min_cols}"
        )));
    }
    for j in 0..cols {
        for i in 0..rows {
            if !x[(i, j)].is_finite() {
                return Err(IndexError::InvalidInput(
                    "matrix contains NaN or Inf values".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Copy a row-major `rows × cols` slice into a matrix.
pub fn mat_from_row_major(values: &[f64], rows: usize, cols: usize) -> Mat<f64> {
    Mat::from_fn(rows, cols, |i, j| values[i * cols + j])
}

/// Cosine of latitude in degrees; exactly zero at the poles.
pub fn cos_lat(lat_deg: f64) -> f64 {
    if (lat_deg.abs() - 90.0).abs() <= POLE_TOL_DEG {
        0.0
    } else {
        lat_deg.to_radians().cos()
    }
}

/// Arithmetic mean. Empty input gives NaN.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the non-NaN values. NaN if there are none.
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Check that coordinates are strictly ascending or strictly descending.
pub fn check_monotonic(coords: &[f64], name: &str) -> Result<(), IndexError> {
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(IndexError::InvalidInput(format!(
            "axis '{name}' has non-finite coordinates"
        )));
    }
    let ascending = coords.windows(2).all(|w| w[1] > w[0]);
    let descending = coords.windows(2).all(|w| w[1] < w[0]);
    if ascending || descending {
        Ok(())
    } else {
        Err(IndexError::InvalidInput(format!(
            "axis '{name}' is not strictly monotonic"
        )))
    }
}
