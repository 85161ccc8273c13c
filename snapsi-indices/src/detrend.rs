use tracing::debug;

use crate::labeled::{LabeledArray, TIME};
use crate::types::IndexError;
use crate::utils::{mean, nan_mean};

/// Center time coordinates and return them with their variance.
fn centered_time(time: &[f64]) -> Result<(Vec<f64>, f64), IndexError> {
    if time.len() < 2 {
        return Err(IndexError::DegenerateInput(format!(
            "cannot detrend {} time step(s)",
            time.len()
        )));
    }
    let t_mean = mean(time);
    let centered: Vec<f64> = time.iter().map(|t| t - t_mean).collect();
    let var = mean(&centered.iter().map(|x| x * x).collect::<Vec<_>>());
    if var == 0.0 || !var.is_finite() {
        return Err(IndexError::DegenerateInput(
            "time coordinate has zero variance".into(),
        ));
    }
    Ok((centered, var))
}

fn remove_trend(values: &[f64], centered: &[f64], var: f64) -> Vec<f64> {
    let cov = nan_mean(values.iter().zip(centered).map(|(v, x)| v * x));
    let slope = cov / var;
    values
        .iter()
        .zip(centered)
        .map(|(v, x)| v - slope * x)
        .collect()
}

/// Remove the least-squares linear trend from one series.
///
/// Time is centered before fitting, so the time-mean of the series is kept.
/// Missing values (NaN) are left out of the covariance and stay NaN; a series
/// with no valid value comes back all NaN.
pub fn detrend_slice(values: &[f64], time: &[f64]) -> Result<Vec<f64>, IndexError> {
    if values.len() != time.len() {
        return Err(IndexError::InvalidInput(format!(
            "series has {} values but {} time coordinates",
            values.len(),
            time.len()
        )));
    }
    let (centered, var) = centered_time(time)?;
    Ok(remove_trend(values, &centered, var))
}

/// Remove the linear trend along "time" from every series of `field`.
///
/// # Algorithm
/// 1. x = t − mean(t)
/// 2. slope = mean(field · x) / mean(x²), the first mean skipping NaN
/// 3. result = field − slope · x
pub fn detrend(field: &LabeledArray) -> Result<LabeledArray, IndexError> {
    let time_axis = field.axis(TIME)?.clone();
    let (centered, var) = centered_time(&time_axis.coords)?;
    debug!(n_time = time_axis.len(), "detrending along time");
    field.map_lanes(TIME, time_axis, |lane| Ok(remove_trend(lane, &centered, var)))
}
