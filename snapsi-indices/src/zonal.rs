use crate::labeled::{LabeledArray, LON};
use crate::types::IndexError;

/// Mean over longitude.
pub fn zonal_mean(field: &LabeledArray) -> Result<LabeledArray, IndexError> {
    field.mean_over(&[LON])
}

/// Deviation from the zonal mean (the eddy part of the field).
pub fn zonal_eddy(field: &LabeledArray) -> Result<LabeledArray, IndexError> {
    let mean = zonal_mean(field)?;
    field.zip_with(&mean, |v, m| v - m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeled::{Axis, LAT};

    #[test]
    fn test_zonal_mean_and_eddy() {
        let field = LabeledArray::from_fn(
            vec![
                Axis::new(LAT, vec![30.0, 60.0]),
                Axis::new(LON, vec![0.0, 90.0, 180.0, 270.0]),
            ],
            |idx| idx[0] as f64 * 10.0 + idx[1] as f64,
        )
        .unwrap();
        let mean = zonal_mean(&field).unwrap();
        assert_eq!(mean.axis_names(), vec![LAT]);
        assert_eq!(mean.values(), vec![1.5, 11.5]);

        let eddy = zonal_eddy(&field).unwrap();
        assert_eq!(eddy.axis_names(), vec![LAT, LON]);
        assert_eq!(eddy.values(), vec![-1.5, -0.5, 0.5, 1.5, -1.5, -0.5, 0.5, 1.5]);
    }

    #[test]
    fn test_zonal_mean_needs_lon() {
        let field = LabeledArray::from_vec(vec![Axis::new(LAT, vec![0.0])], vec![1.0]).unwrap();
        assert!(zonal_mean(&field).is_err());
    }
}
