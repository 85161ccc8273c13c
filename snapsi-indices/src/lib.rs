//! # snapsi-indices
//!
//! Circulation indices (NAO, NAM, SAM) from gridded geopotential fields.
//!
//! The library works on [`LabeledArray`]s, n-dimensional `f64` arrays whose
//! axes carry a name and coordinates ("time", "lat", "lon", "plev", ...):
//!
//! - **Detrend** ([`detrend()`]): remove the linear trend along time
//! - **Lowpass** ([`lowpass()`], [`convolve_periodic`]): triangular window,
//!   circular convolution
//! - **EOF analysis** ([`pca()`], [`svd_modes`]): area-weighted SVD over a stacked
//!   spatial axis, broadcast over levels
//! - **Projection** ([`projection()`]): area-weighted least-squares index of a
//!   sample on a fixed pattern
//! - **Climatology** ([`daily_climatology`], [`anomalies`],
//!   [`smooth_climatology_triang`]): day-of-year means
//!   with standard or no-leap numbering
//! - **Workflow** ([`compute_eof`], [`project_index`]): EOF from anomalies and
//!   bias- and sign-corrected index series, configured by [`IndexConfig`]
//!
//! Time coordinates are days since 1970-01-01 UTC. Independent slices are
//! processed in parallel with rayon. Progress is reported through `tracing`;
//! installing a subscriber is left to the caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use snapsi_indices::{projection, Axis, LabeledArray, LAT, LON, TIME};
//!
//! let grid = vec![
//!     Axis::new(LAT, vec![70.0, 50.0, 30.0]),
//!     Axis::new(LON, vec![-30.0, 0.0]),
//! ];
//! let pattern = LabeledArray::from_fn(grid.clone(), |idx| idx[0] as f64 - 1.0).unwrap();
//!
//! let mut axes = vec![Axis::new(TIME, vec![0.0, 1.0])];
//! axes.extend(grid);
//! let sample = LabeledArray::from_fn(axes, |idx| {
//!     (idx[0] as f64 + 1.0) * (idx[1] as f64 - 1.0)
//! })
//! .unwrap();
//!
//! let index = projection(&sample, &pattern).unwrap();
//! assert!((index.get(&[1]).unwrap() - 2.0).abs() < 1e-12);
//! ```
//!
//! ## References
//!
//! - Hurrell et al. (2003), *The North Atlantic Oscillation*, AGU Monograph 134
//! - Thompson & Wallace (2000), *J. Climate*, 13, 1000-1016
//! - Hitchcock et al. (2022), *Geosci. Model Dev.*, 15, 5073-5092 (SNAPSI)

pub mod labeled;
pub mod types;

pub mod calendar;
pub mod climatology;
pub mod config;
pub mod detrend;
pub mod index;
pub mod interpolate;
pub mod lowpass;
pub mod pca;
pub mod projection;
pub mod region;
pub mod stack;
pub mod utils;
pub mod zonal;

pub use calendar::{date_to_days, day_of_year, days_to_datetime, month, DayOfYear};
pub use climatology::{
    anomalies, daily_climatology, drop_leap_june30, select_period, smooth_climatology,
    smooth_climatology_triang, DAYOFYEAR,
};
pub use config::{IndexConfig, IndexKind, SignConvention};
pub use detrend::{detrend, detrend_slice};
pub use index::{
    apply_sign, climatological_index, compute_eof, geopotential_to_height, project_index,
    remove_climatological_index, select_index_area, sign_convention, GRAVITY,
};
pub use interpolate::{interp_latlon, interp_linear, interp_log_pressure, REFERENCE_PRESSURE};
pub use labeled::{Axis, LabeledArray, LAT, LON, PLEV, TIME};
pub use lowpass::{
    convolve_periodic, convolve_wrapped, lowpass, triang_window, triangular_kernel, valid_trim,
    window_length, MAX_WINDOW,
};
pub use pca::{pca, sqrt_cos_weights, svd_modes};
pub use projection::{cos_weights, project_slice, projection};
pub use region::{area_selection, normalize_longitude, select_months, select_region, Region};
pub use stack::{stack, unstack, StackMap, ALLPOINTS};
pub use types::{EofDataset, EofMode, IndexError, IndexSeries, SvdModes, MODE};
pub use zonal::{zonal_eddy, zonal_mean};
