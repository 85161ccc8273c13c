use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::month;
use crate::labeled::{Axis, LabeledArray, LAT, LON, TIME};
use crate::types::IndexError;

/// Latitude/longitude box, bounds inclusive and given in either order.
///
/// `lon: None` keeps every longitude. Longitudes are in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub lat: (f64, f64),
    #[serde(default)]
    pub lon: Option<(f64, f64)>,
}

impl Region {
    /// North Atlantic box of the station-free (Hurrell) NAO definition.
    pub const NAO: Region = Region {
        lat: (20.0, 80.0),
        lon: Some((-90.0, 40.0)),
    };
    /// Northern Annular Mode: the extratropical northern hemisphere.
    pub const NAM: Region = Region {
        lat: (20.0, 90.0),
        lon: None,
    };
    /// Southern Annular Mode: the extratropical southern hemisphere.
    pub const SAM: Region = Region {
        lat: (-90.0, -20.0),
        lon: None,
    };
}

/// Map longitudes above 180 to `lon − 360` and sort the "lon" axis ascending.
pub fn normalize_longitude(field: &LabeledArray) -> Result<LabeledArray, IndexError> {
    let lon = field.coords(LON)?;
    let wrapped: Vec<f64> = lon
        .iter()
        .map(|&l| if l > 180.0 { l - 360.0 } else { l })
        .collect();
    let mut order: Vec<usize> = (0..wrapped.len()).collect();
    order.sort_by(|&a, &b| wrapped[a].total_cmp(&wrapped[b]));
    if order.windows(2).any(|w| wrapped[w[0]] == wrapped[w[1]]) {
        return Err(IndexError::InvalidInput(
            "longitudes collide after wrapping to [-180, 180]".into(),
        ));
    }

    let sorted = field.isel(LON, &order)?;
    let coords = order.iter().map(|&i| wrapped[i]).collect();
    sorted.replace_axis(LON, Axis::new(LON, coords))
}

/// Restrict `field` to `region`. An empty selection is an error.
pub fn select_region(field: &LabeledArray, region: &Region) -> Result<LabeledArray, IndexError> {
    let mut out = field.sel_range(LAT, region.lat.0, region.lat.1)?;
    if let Some((a, b)) = region.lon {
        out = out.sel_range(LON, a, b)?;
    }
    if out.is_empty() {
        return Err(IndexError::InsufficientData(format!(
            "no grid points inside region {region:?}"
        )));
    }
    debug!(shape = ?out.shape(), "selected region");
    Ok(out)
}

/// Normalize longitudes, then select `region`.
pub fn area_selection(field: &LabeledArray, region: &Region) -> Result<LabeledArray, IndexError> {
    select_region(&normalize_longitude(field)?, region)
}

/// Keep time steps whose calendar month is in `months` (1..=12).
pub fn select_months(field: &LabeledArray, months: &[u32]) -> Result<LabeledArray, IndexError> {
    if let Some(bad) = months.iter().find(|m| !(1..=12).contains(*m)) {
        return Err(IndexError::InvalidInput(format!("invalid month {bad}")));
    }
    let mut keep = Vec::new();
    for (i, &t) in field.coords(TIME)?.iter().enumerate() {
        if months.contains(&month(t)?) {
            keep.push(i);
        }
    }
    if keep.is_empty() {
        return Err(IndexError::InsufficientData(format!(
            "no time steps in months {months:?}"
        )));
    }
    field.isel(TIME, &keep)
}
