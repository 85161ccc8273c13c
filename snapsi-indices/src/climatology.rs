use std::collections::BTreeMap;

use tracing::debug;

use crate::calendar::{day_of_year, DayOfYear};
use crate::labeled::{Axis, LabeledArray, TIME};
use crate::lowpass::{convolve_wrapped, lowpass, triang_window};
use crate::types::IndexError;
use crate::utils::nan_mean;

/// Name of the day-of-year axis of a climatology.
pub const DAYOFYEAR: &str = "dayofyear";

/// Day-of-year of every time coordinate; `None` for days the convention removes.
fn days_of_year(time: &[f64], convention: DayOfYear) -> Result<Vec<Option<u32>>, IndexError> {
    time.iter().map(|&t| day_of_year(t, convention)).collect()
}

/// Mean over all time steps sharing a day-of-year.
///
/// Missing values (NaN) are skipped; a day with no valid value at a point
/// stays NaN there. The "time" axis is replaced by "dayofyear" (ascending, 1-based). Days
/// without a number under `convention` (30 June of leap years for
/// [`DayOfYear::NoLeap`]) are left out.
pub fn daily_climatology(
    field: &LabeledArray,
    convention: DayOfYear,
) -> Result<LabeledArray, IndexError> {
    let time = field.axis(TIME)?;
    let doys = days_of_year(&time.coords, convention)?;

    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, doy) in doys.iter().enumerate() {
        if let Some(d) = doy {
            groups.entry(*d).or_default().push(i);
        }
    }
    if groups.is_empty() {
        return Err(IndexError::InsufficientData(
            "no time steps to build a climatology from".into(),
        ));
    }

    let skipped = doys.iter().filter(|d| d.is_none()).count();
    debug!(
        n_time = time.len(),
        n_days = groups.len(),
        skipped,
        "daily climatology"
    );

    let axis = Axis::new(DAYOFYEAR, groups.keys().map(|&d| d as f64).collect());
    let members: Vec<Vec<usize>> = groups.into_values().collect();
    let clim = field.map_lanes(TIME, axis, |lane| {
        Ok(members
            .iter()
            .map(|idx| nan_mean(idx.iter().map(|&i| lane[i])))
            .collect())
    })?;
    Ok(clim)
}

/// Smooth a climatology with the triangular lowpass filter, wrapping around the year.
pub fn smooth_climatology(clim: &LabeledArray, n: usize) -> Result<LabeledArray, IndexError> {
    lowpass(clim, DAYOFYEAR, n, false)
}

/// Smooth a climatology with a normalized `triang` window of `window_len`
/// days, wrapping around the year.
///
/// The output keeps the "dayofyear" axis. The window's sample `window_len/2`
/// sits on each output day, so even windows reach one day further back than
/// forward.
pub fn smooth_climatology_triang(
    clim: &LabeledArray,
    window_len: usize,
) -> Result<LabeledArray, IndexError> {
    let window = triang_window(window_len)?;
    let axis = clim.axis(DAYOFYEAR)?.clone();
    debug!(window_len, n_days = axis.len(), "smoothing climatology");
    clim.map_lanes(DAYOFYEAR, axis, |lane| {
        Ok(convolve_wrapped(lane, &window, window_len / 2))
    })
}

/// Subtract the climatology of the matching day-of-year from every time step.
///
/// `clim` may lack axes of `field` (they are broadcast) but every axis it has
/// besides "dayofyear" must match `field`. A time step whose day is missing
/// from `clim`, or has no number under `convention`, is an error; see
/// [`drop_leap_june30`].
pub fn anomalies(
    field: &LabeledArray,
    clim: &LabeledArray,
    convention: DayOfYear,
) -> Result<LabeledArray, IndexError> {
    let time = field.axis(TIME)?.clone();
    let clim_days = clim.axis(DAYOFYEAR)?;

    let positions = days_of_year(&time.coords, convention)?
        .into_iter()
        .zip(&time.coords)
        .map(|(doy, &t)| {
            let d = doy.ok_or_else(|| {
                IndexError::InvalidInput(format!(
                    "time {t} has no day-of-year under the {convention:?} calendar"
                ))
            })?;
            clim_days.position(d as f64).ok_or_else(|| {
                IndexError::InvalidInput(format!("day-of-year {d} missing from climatology"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let matched = clim
        .isel(DAYOFYEAR, &positions)?
        .replace_axis(DAYOFYEAR, time)?;
    field.zip_with(&matched, |v, c| v - c)
}

/// Time steps with coordinates in `[start, end]` (days since epoch).
pub fn select_period(field: &LabeledArray, start: f64, end: f64) -> Result<LabeledArray, IndexError> {
    let out = field.sel_range(TIME, start, end)?;
    if out.axis(TIME)?.is_empty() {
        return Err(IndexError::InsufficientData(format!(
            "no time steps between {start} and {end}"
        )));
    }
    Ok(out)
}

/// Remove 30 June of leap years, the day the no-leap convention has no number for.
pub fn drop_leap_june30(field: &LabeledArray) -> Result<LabeledArray, IndexError> {
    let keep: Vec<usize> = days_of_year(field.coords(TIME)?, DayOfYear::NoLeap)?
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.map(|_| i))
        .collect();
    field.isel(TIME, &keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::date_to_days;
    use crate::labeled::LAT;
    use chrono::NaiveDate;

    fn assert_near(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() < eps,
            "expected {a} ≈ {b} (diff = {})",
            (a - b).abs()
        );
    }

    fn days(y: i32, m: u32, d: u32) -> f64 {
        date_to_days(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    /// Daily series over whole years whose value is the no-leap day-of-year.
    fn daily_field(years: std::ops::Range<i32>) -> LabeledArray {
        let start = days(years.start, 1, 1);
        let end = days(years.end, 1, 1);
        let time: Vec<f64> = (0..(end - start) as usize).map(|i| start + i as f64).collect();
        let values: Vec<f64> = time
            .iter()
            .map(|&t| day_of_year(t, DayOfYear::NoLeap).unwrap().unwrap_or(0) as f64)
            .collect();
        LabeledArray::from_vec(vec![Axis::new(TIME, time)], values).unwrap()
    }

    #[test]
    fn test_noleap_climatology_of_periodic_signal() {
        let field = drop_leap_june30(&daily_field(2019..2021)).unwrap();
        assert_eq!(field.axis(TIME).unwrap().len(), 730);
        let clim = daily_climatology(&field, DayOfYear::NoLeap).unwrap();
        assert_eq!(clim.axis_names(), vec![DAYOFYEAR]);
        assert_eq!(clim.axis(DAYOFYEAR).unwrap().len(), 365);
        for d in 0..365 {
            assert_near(clim.get(&[d]).unwrap(), (d + 1) as f64, 1e-12);
        }
        let anom = anomalies(&field, &clim, DayOfYear::NoLeap).unwrap();
        assert!(anom.values().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_anomalies_reject_leap_june30() {
        let field = daily_field(2020..2021);
        let clim = daily_climatology(&field, DayOfYear::NoLeap).unwrap();
        assert!(matches!(
            anomalies(&field, &clim, DayOfYear::NoLeap),
            Err(IndexError::InvalidInput(_))
        ));
        let dropped = drop_leap_june30(&field).unwrap();
        assert!(anomalies(&dropped, &clim, DayOfYear::NoLeap).is_ok());
    }

    #[test]
    fn test_standard_climatology_groups_sub_daily_steps() {
        // 6-hourly steps over two days, two latitudes
        let time: Vec<f64> = (0..8).map(|i| days(2001, 3, 1) + i as f64 * 0.25).collect();
        let field = LabeledArray::from_fn(
            vec![Axis::new(LAT, vec![10.0, 20.0]), Axis::new(TIME, time)],
            |idx| (idx[0] * 10 + idx[1]) as f64,
        )
        .unwrap();
        let clim = daily_climatology(&field, DayOfYear::Standard).unwrap();
        assert_eq!(clim.axis_names(), vec![LAT, DAYOFYEAR]);
        assert_eq!(clim.coords(DAYOFYEAR).unwrap(), &[60.0, 61.0]);
        assert_near(clim.get(&[0, 0]).unwrap(), 1.5, 1e-12);
        assert_near(clim.get(&[1, 1]).unwrap(), 15.5, 1e-12);
    }

    #[test]
    fn test_anomalies_missing_day() {
        let field = daily_field(2019..2020);
        let clim = daily_climatology(&field.isel(TIME, &[0, 1, 2]).unwrap(), DayOfYear::NoLeap)
            .unwrap();
        assert!(anomalies(&field, &clim, DayOfYear::NoLeap).is_err());
    }

    #[test]
    fn test_smooth_climatology_keeps_constant() {
        let clim = LabeledArray::from_vec(
            vec![Axis::new(DAYOFYEAR, (1..=365).map(|d| d as f64).collect())],
            vec![4.0; 365],
        )
        .unwrap();
        let smooth = smooth_climatology(&clim, 31).unwrap();
        assert!(smooth.values().iter().all(|v| (v - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_triang_smoothing_wraps_around_the_year() {
        // impulse on day 1 spread by triang(4) = [1, 3, 3, 1] / 8, centred on its third weight
        let mut values = vec![0.0; 6];
        values[0] = 1.0;
        let clim = LabeledArray::from_vec(
            vec![Axis::new(DAYOFYEAR, (1..=6).map(|d| d as f64).collect())],
            values,
        )
        .unwrap();
        let smooth = smooth_climatology_triang(&clim, 4).unwrap();
        assert_eq!(smooth.coords(DAYOFYEAR).unwrap(), clim.coords(DAYOFYEAR).unwrap());
        let expected = [3.0, 3.0, 1.0, 0.0, 0.0, 1.0];
        for (d, e) in expected.iter().enumerate() {
            assert_near(smooth.get(&[d]).unwrap(), e / 8.0, 1e-15);
        }
    }

    #[test]
    fn test_triang_smoothing_odd_window_over_grid() {
        let clim = LabeledArray::from_fn(
            vec![
                Axis::new(DAYOFYEAR, (1..=365).map(|d| d as f64).collect()),
                Axis::new(LAT, vec![10.0, 20.0]),
            ],
            |idx| if idx[1] == 0 { 7.0 } else { idx[0] as f64 },
        )
        .unwrap();
        let smooth = smooth_climatology_triang(&clim, 5).unwrap();
        assert_eq!(smooth.axis_names(), vec![DAYOFYEAR, LAT]);
        // constant stays constant, a ramp is unchanged away from the wrap
        assert_near(smooth.get(&[0, 0]).unwrap(), 7.0, 1e-12);
        assert_near(smooth.get(&[100, 1]).unwrap(), 100.0, 1e-12);
        // day 1 sees days 364, 365 across the year boundary
        let wrapped = (363.0 + 2.0 * 364.0 + 3.0 * 0.0 + 2.0 * 1.0 + 2.0) / 9.0;
        assert_near(smooth.get(&[0, 1]).unwrap(), wrapped, 1e-12);
        assert!(smooth_climatology_triang(&clim, 0).is_err());
    }

    #[test]
    fn test_climatology_skips_missing_values() {
        let time: Vec<f64> = vec![days(2018, 1, 1), days(2019, 1, 1), days(2020, 1, 1)];
        let field = LabeledArray::from_fn(
            vec![Axis::new(TIME, time), Axis::new(LAT, vec![10.0, 20.0])],
            |idx| match (idx[0], idx[1]) {
                (1, 0) => f64::NAN,
                (_, 1) => f64::NAN,
                (t, _) => t as f64,
            },
        )
        .unwrap();
        let clim = daily_climatology(&field, DayOfYear::Standard).unwrap();
        assert_eq!(clim.coords(DAYOFYEAR).unwrap(), &[1.0]);
        assert_near(clim.get(&[0, 0]).unwrap(), 1.0, 1e-12);
        assert!(clim.get(&[0, 1]).unwrap().is_nan());
    }

    #[test]
    fn test_select_period() {
        let field = daily_field(2019..2020);
        let jan = select_period(&field, days(2019, 1, 1), days(2019, 1, 31)).unwrap();
        assert_eq!(jan.axis(TIME).unwrap().len(), 31);
        assert!(matches!(
            select_period(&field, days(1990, 1, 1), days(1990, 2, 1)),
            Err(IndexError::InsufficientData(_))
        ));
    }
}
