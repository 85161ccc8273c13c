use tracing::{debug, info, info_span};

use crate::calendar::DayOfYear;
use crate::climatology::anomalies;
use crate::config::{IndexConfig, SignConvention};
use crate::interpolate::{interp_latlon, interp_log_pressure, REFERENCE_PRESSURE};
use crate::labeled::{Axis, LabeledArray, LAT, LON, PLEV, TIME};
use crate::lowpass::lowpass;
use crate::pca::pca;
use crate::projection::projection;
use crate::region::{area_selection, select_months};
use crate::types::{EofMode, IndexError, IndexSeries};
use crate::utils::nan_mean;

/// Standard gravity used to turn geopotential into geopotential height (m s⁻²).
pub const GRAVITY: f64 = 9.81;

/// Geopotential (m² s⁻²) to geopotential height (m).
pub fn geopotential_to_height(field: &LabeledArray) -> LabeledArray {
    field.map(|v| v / GRAVITY)
}

/// Normalize longitudes and cut out the configured region.
pub fn select_index_area(
    field: &LabeledArray,
    config: &IndexConfig,
) -> Result<LabeledArray, IndexError> {
    area_selection(field, &config.region)
}

/// Zonal mean ignoring missing values, at the latitude nearest `lat`.
fn zonal_mean_near(pattern: &LabeledArray, lat: f64) -> Result<LabeledArray, IndexError> {
    pattern
        .sel_nearest(LAT, lat)?
        .map_lanes(LON, Axis::new(LON, vec![0.0]), |lane| {
            Ok(vec![nan_mean(lane.iter().copied())])
        })?
        .index_axis(LON, 0)
}

/// Sign (±1) that makes the pattern's mid-latitude zonal mean exceed its
/// high-latitude zonal mean, for each slice of the non-lat/lon axes.
///
/// A zero difference counts as positive rather than giving a sign of 0, which
/// would zero out both the series and the pattern instead of leaving them
/// unflipped. If the difference is undefined (no valid pattern values at
/// either latitude) the sign cannot be fixed.
pub fn sign_convention(
    pattern: &LabeledArray,
    convention: &SignConvention,
) -> Result<LabeledArray, IndexError> {
    let mid = zonal_mean_near(pattern, convention.mid_lat)?;
    let high = zonal_mean_near(pattern, convention.high_lat)?;
    let diff = mid.zip_with(&high, |a, b| a - b)?;
    if diff.values().iter().any(|d| d.is_nan()) {
        return Err(IndexError::DegenerateInput(format!(
            "pattern has no values near latitudes {} and {}",
            convention.mid_lat, convention.high_lat
        )));
    }
    Ok(diff.map(|d| if d < 0.0 { -1.0 } else { 1.0 }))
}

/// Multiply `array` by `sign`, broadcasting over axes `sign` does not have.
pub fn apply_sign(array: &LabeledArray, sign: &LabeledArray) -> Result<LabeledArray, IndexError> {
    array.zip_with(sign, |v, s| v * s)
}

/// Projection of a daily climatology onto `pattern`: the index value of each
/// climatological day.
pub fn climatological_index(
    clim: &LabeledArray,
    pattern: &LabeledArray,
) -> Result<LabeledArray, IndexError> {
    projection(clim, pattern)
}

/// Subtract the climatological index of the matching day-of-year.
pub fn remove_climatological_index(
    index: &LabeledArray,
    clim_index: &LabeledArray,
    convention: DayOfYear,
) -> Result<LabeledArray, IndexError> {
    anomalies(index, clim_index, convention)
}

/// Leading EOF of seasonal lowpass-filtered anomalies.
///
/// Anomalies are filtered along "time", restricted to the configured months
/// and decomposed over the configured spatial axes.
pub fn compute_eof(anomalies: &LabeledArray, config: &IndexConfig) -> Result<EofMode, IndexError> {
    config.validate()?;
    let n = config.window_length()?;
    let span = info_span!("compute_eof", window = n, valid = config.valid);
    let _enter = span.enter();

    let filtered = lowpass(anomalies, TIME, n, config.valid)?;
    let seasonal = select_months(&filtered, &config.season_months)?;
    debug!(n_time = seasonal.axis(TIME)?.len(), "seasonal selection");

    let eofs = pca(&seasonal, &config.stack_axes())?;
    let leading = eofs.leading()?;
    info!(explained = ?leading.expl.values(), "leading mode");
    Ok(leading)
}

/// Index time series of `sample` with respect to a stored pattern.
///
/// # Algorithm
/// 1. Interpolate the pattern onto the sample's lat/lon grid, and in
///    log-pressure onto its levels if both carry "plev"
/// 2. Project the sample onto the interpolated pattern
/// 3. Subtract `clim_index` matched by day-of-year
/// 4. Fix the sign of series and pattern by the configured convention
pub fn project_index(
    sample: &LabeledArray,
    pattern: &LabeledArray,
    clim_index: &LabeledArray,
    config: &IndexConfig,
) -> Result<IndexSeries, IndexError> {
    let span = info_span!("project_index");
    let _enter = span.enter();

    let mut pattern = interp_latlon(pattern, sample.coords(LAT)?, sample.coords(LON)?)?;
    if pattern.has_axis(PLEV) && sample.has_axis(PLEV) {
        pattern = interp_log_pressure(&pattern, sample.coords(PLEV)?, REFERENCE_PRESSURE)?;
    }

    let index = projection(sample, &pattern)?;
    let index = remove_climatological_index(&index, clim_index, config.day_of_year)?;

    let sign = sign_convention(&pattern, &config.sign)?;
    debug!(sign = ?sign.values(), "sign convention");
    Ok(IndexSeries {
        series: apply_sign(&index, &sign)?,
        pattern: apply_sign(&pattern, &sign)?,
    })
}
