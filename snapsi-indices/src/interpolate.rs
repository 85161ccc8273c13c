use tracing::debug;

use crate::labeled::{Axis, LabeledArray, COORD_TOL, LAT, LON, PLEV};
use crate::types::IndexError;
use crate::utils::check_monotonic;

/// Reference surface pressure (Pa) for the log-pressure coordinate.
pub const REFERENCE_PRESSURE: f64 = 100_000.0;

/// Piecewise-linear interpolation of `(x, y)` at `targets`.
///
/// `x` must be strictly monotonic (ascending or descending). Targets outside
/// the range of `x` give NaN; NaN in `y` propagates to the intervals it bounds.
pub fn interp_linear(x: &[f64], y: &[f64], targets: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 || n != y.len() {
        return vec![f64::NAN; targets.len()];
    }
    let descending = n > 1 && x[n - 1] < x[0];
    // Work on an ascending view of x
    let at = |i: usize| if descending { n - 1 - i } else { i };
    let xa = |i: usize| x[at(i)];
    let (lo, hi) = (xa(0), xa(n - 1));

    targets
        .iter()
        .map(|&t| {
            if !t.is_finite() || t < lo - COORD_TOL || t > hi + COORD_TOL {
                return f64::NAN;
            }
            if n == 1 {
                return y[0];
            }
            // first index with xa(i) >= t, clamped to an interior interval
            let (mut a, mut b) = (0usize, n - 1);
            while b - a > 1 {
                let mid = (a + b) / 2;
                if xa(mid) < t {
                    a = mid;
                } else {
                    b = mid;
                }
            }
            let (x0, x1) = (xa(a), xa(b));
            let (y0, y1) = (y[at(a)], y[at(b)]);
            if (t - x0).abs() <= COORD_TOL {
                return y0;
            }
            if (t - x1).abs() <= COORD_TOL {
                return y1;
            }
            let w = (t - x0) / (x1 - x0);
            y0 + w * (y1 - y0)
        })
        .collect()
}

fn interp_axis(
    field: &LabeledArray,
    name: &str,
    source: &[f64],
    targets: &[f64],
    new_axis: Axis,
) -> Result<LabeledArray, IndexError> {
    check_monotonic(source, name)?;
    field.map_lanes(name, new_axis, |lane| Ok(interp_linear(source, lane, targets)))
}

/// Bilinear interpolation of `field` onto the grid `lat × lon`.
///
/// Done as two linear passes, along "lat" then along "lon". Target points
/// outside the source grid are NaN.
pub fn interp_latlon(
    field: &LabeledArray,
    lat: &[f64],
    lon: &[f64],
) -> Result<LabeledArray, IndexError> {
    let src_lat = field.coords(LAT)?.to_vec();
    let src_lon = field.coords(LON)?.to_vec();
    debug!(
        from = ?(src_lat.len(), src_lon.len()),
        to = ?(lat.len(), lon.len()),
        "interpolating onto lat/lon grid"
    );
    let along_lat = interp_axis(field, LAT, &src_lat, lat, Axis::new(LAT, lat.to_vec()))?;
    interp_axis(&along_lat, LON, &src_lon, lon, Axis::new(LON, lon.to_vec()))
}

/// Interpolate `field` along "plev" to `levels` (Pa), linearly in `−ln(p/ps)`.
pub fn interp_log_pressure(
    field: &LabeledArray,
    levels: &[f64],
    ps: f64,
) -> Result<LabeledArray, IndexError> {
    let log_p = |p: f64| -> Result<f64, IndexError> {
        if p > 0.0 && p.is_finite() {
            Ok(-(p / ps).ln())
        } else {
            Err(IndexError::InvalidInput(format!(
                "pressure {p} must be positive"
            )))
        }
    };
    if !(ps > 0.0 && ps.is_finite()) {
        return Err(IndexError::InvalidInput(format!(
            "reference pressure {ps} must be positive"
        )));
    }
    let source = field
        .coords(PLEV)?
        .iter()
        .map(|&p| log_p(p))
        .collect::<Result<Vec<_>, _>>()?;
    let targets = levels
        .iter()
        .map(|&p| log_p(p))
        .collect::<Result<Vec<_>, _>>()?;
    interp_axis(field, PLEV, &source, &targets, Axis::new(PLEV, levels.to_vec()))
}
