use faer::Mat;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::labeled::{Axis, LabeledArray, LAT, TIME};
use crate::stack::{stack, unstack, ALLPOINTS};
use crate::types::{EofDataset, IndexError, SvdModes, MODE};
use crate::utils::{cos_lat, mat_from_row_major, population_std, validate_matrix};

/// Relative tolerance below which a left singular vector counts as constant in time.
const STD_TOL: f64 = 1e-12;

/// Area weights `sqrt(cos(lat))` for the decomposition.
///
/// Fails with [`IndexError::DegenerateWeight`] if the grid includes a pole,
/// since the weighting could not be removed from the patterns afterwards.
pub fn sqrt_cos_weights(lat: &[f64]) -> Result<Vec<f64>, IndexError> {
    lat.iter()
        .map(|&l| {
            let w = cos_lat(l).sqrt();
            if w == 0.0 || !w.is_finite() {
                Err(IndexError::DegenerateWeight(format!(
                    "latitude {l} has zero area weight; exclude the poles"
                )))
            } else {
                Ok(w)
            }
        })
        .collect()
}

/// Decompose one `time × points` matrix.
///
/// # Algorithm
/// 1. Thin SVD: X = U diag(S) Vᵗ, k = min(m, n)
/// 2. σⱼ = std over time of column j of U
/// 3. Principal components: U[:, j] / σⱼ (unit variance)
/// 4. Patterns: V[:, j] · Sⱼ · σⱼ
/// 5. Explained variance: Sⱼ² / Σ S²
///
/// A mode whose left vector is constant in time cannot be standardized; it is
/// left unscaled if its singular value is negligible, and is an error otherwise.
pub fn svd_modes(x: &Mat<f64>) -> Result<SvdModes, IndexError> {
    validate_matrix(x, 2, 2)?;
    let (m, n) = (x.nrows(), x.ncols());

    let svd = x
        .thin_svd()
        .map_err(|e| IndexError::SvdFailed(format!("{e:?}")))?;
    let u_full = svd.U();
    let v_full = svd.V();
    let s_col = svd.S().column_vector();

    let k = s_col.nrows().min(m).min(n);
    let s: Vec<f64> = (0..k).map(|i| s_col[i]).collect();
    let u = u_full.subcols(0, k).to_owned();
    let v = v_full.subcols(0, k).to_owned();

    let total: f64 = s.iter().map(|sv| sv * sv).sum();
    if total == 0.0 {
        return Err(IndexError::DegenerateInput(
            "field has zero variance".into(),
        ));
    }
    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    let negligible = s_max * m.max(n) as f64 * f64::EPSILON;

    let mut pc = Mat::<f64>::zeros(m, k);
    let mut patterns = Mat::<f64>::zeros(n, k);
    for j in 0..k {
        let column: Vec<f64> = (0..m).map(|i| u[(i, j)]).collect();
        let mut scale = population_std(&column);
        if scale * (m as f64).sqrt() <= STD_TOL {
            if s[j] > negligible {
                return Err(IndexError::DegenerateInput(format!(
                    "mode {j} has a time-constant principal component"
                )));
            }
            scale = 1.0;
        }
        for i in 0..m {
            pc[(i, j)] = u[(i, j)] / scale;
        }
        for i in 0..n {
            patterns[(i, j)] = v[(i, j)] * s[j] * scale;
        }
    }

    let explained = s.iter().map(|sv| sv * sv / total).collect();

    Ok(SvdModes {
        u,
        s,
        v,
        pc,
        patterns,
        explained,
    })
}

/// Area-weighted principal component analysis.
///
/// The spatial axes in `stack_axes` are flattened into one composite axis;
/// every other axis except "time" is broadcast over (e.g. pressure level),
/// with an independent decomposition per slice.
///
/// # Arguments
/// * `anomalies` - Field with "time", "lat" and the axes in `stack_axes`.
/// * `stack_axes` - Spatial axes to decompose over, e.g. `["lat", "lon"]`.
///
/// # Returns
/// [`EofDataset`] with modes in descending order of singular value.
pub fn pca(anomalies: &LabeledArray, stack_axes: &[&str]) -> Result<EofDataset, IndexError> {
    if stack_axes.is_empty() {
        return Err(IndexError::InvalidInput(
            "no spatial axes given for the decomposition".into(),
        ));
    }
    if stack_axes.contains(&TIME) {
        return Err(IndexError::InvalidInput(
            "the time axis cannot be stacked".into(),
        ));
    }

    let lat_axis = anomalies.axis(LAT)?.clone();
    let weights = LabeledArray::from_vec(
        vec![lat_axis.clone()],
        sqrt_cos_weights(&lat_axis.coords)?,
    )?;
    let weighted = anomalies.zip_with(&weights, |a, w| a * w)?;

    let (stacked, map) = stack(&weighted, ALLPOINTS, stack_axes)?;
    let extras: Vec<&str> = stacked
        .axis_names()
        .into_iter()
        .filter(|n| *n != TIME && *n != ALLPOINTS)
        .collect();
    let mut order = extras.clone();
    order.extend([TIME, ALLPOINTS]);
    let stacked = stacked.transpose_to(&order)?;

    let time_axis = stacked.axis(TIME)?.clone();
    let m = time_axis.len();
    let n = map.len();
    if m < 2 || n < 2 {
        return Err(IndexError::InsufficientData(format!(
            "decomposition needs at least 2 time steps and 2 points, got {m} × {n}"
        )));
    }
    let k = m.min(n);

    let extra_axes = extras
        .iter()
        .map(|e| stacked.axis(e).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        n_time = m,
        n_points = n,
        n_slices = extra_axes.iter().map(Axis::len).product::<usize>(),
        "computing EOFs"
    );

    let values = stacked.values();
    let slices = values
        .par_chunks_exact(m * n)
        .map(|chunk| svd_modes(&mat_from_row_major(chunk, m, n)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut pc_values = Vec::with_capacity(slices.len() * m * k);
    let mut eof_values = Vec::with_capacity(slices.len() * n * k);
    let mut expl_values = Vec::with_capacity(slices.len() * k);
    for modes in &slices {
        debug!(leading_fraction = modes.explained[0], "slice decomposed");
        for i in 0..m {
            for j in 0..k {
                pc_values.push(modes.pc[(i, j)]);
            }
        }
        for i in 0..n {
            for j in 0..k {
                eof_values.push(modes.patterns[(i, j)]);
            }
        }
        expl_values.extend_from_slice(&modes.explained);
    }

    let mode_axis = Axis::range(MODE, k);
    let with_extras = |tail: &[Axis]| -> Vec<Axis> {
        extra_axes.iter().chain(tail).cloned().collect()
    };

    let pc = LabeledArray::from_vec(with_extras(&[time_axis, mode_axis.clone()]), pc_values)?;
    let expl = LabeledArray::from_vec(with_extras(&[mode_axis.clone()]), expl_values)?;
    let eof_stacked = LabeledArray::from_vec(
        with_extras(&[stacked.axis(ALLPOINTS)?.clone(), mode_axis]),
        eof_values,
    )?;

    // Back to the original spatial axes, then undo the area weighting
    let eof = unstack(&eof_stacked, &map)?;
    let mut eof_order = extras.clone();
    eof_order.extend(stack_axes.iter().copied());
    eof_order.push(MODE);
    let eof = eof
        .transpose_to(&eof_order)?
        .zip_with(&weights, |e, w| e / w)?;

    Ok(EofDataset { pc, eof, expl })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeled::LON;

    fn assert_near(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() < eps,
            "expected {a} ≈ {b} (diff = {})",
            (a - b).abs()
        );
    }

    fn make_matrix(m: usize, n: usize) -> Mat<f64> {
        Mat::from_fn(m, n, |i, j| {
            let t = i as f64 * 0.3;
            (t + j as f64).sin() + 0.5 * (2.0 * t - j as f64 * 0.7).cos()
        })
    }

    #[test]
    fn test_svd_modes_reconstruct() {
        let x = make_matrix(12, 7);
        let modes = svd_modes(&x).unwrap();
        assert_eq!(modes.n_modes(), 7);
        let recon = &modes.u * Mat::<f64>::from_fn(7, 7, |i, j| if i == j { modes.s[i] } else { 0.0 })
            * modes.v.transpose();
        for i in 0..12 {
            for j in 0..7 {
                assert_near(recon[(i, j)], x[(i, j)], 1e-10);
            }
        }
    }

    #[test]
    fn test_svd_modes_rescaling_keeps_product() {
        let x = make_matrix(9, 15);
        let modes = svd_modes(&x).unwrap();
        let recon = &modes.pc * modes.patterns.transpose();
        for i in 0..9 {
            for j in 0..15 {
                assert_near(recon[(i, j)], x[(i, j)], 1e-10);
            }
        }
    }

    #[test]
    fn test_svd_modes_unit_variance_and_fractions() {
        let x = make_matrix(20, 6);
        let modes = svd_modes(&x).unwrap();
        for j in 0..modes.n_modes() {
            let col: Vec<f64> = (0..20).map(|i| modes.pc[(i, j)]).collect();
            assert_near(population_std(&col), 1.0, 1e-10);
        }
        assert_near(modes.explained.iter().sum::<f64>(), 1.0, 1e-12);
        for w in modes.explained.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn test_svd_modes_too_small() {
        let x = Mat::<f64>::zeros(1, 5);
        assert!(matches!(
            svd_modes(&x),
            Err(IndexError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_svd_modes_zero_field() {
        let x = Mat::<f64>::zeros(4, 5);
        assert!(matches!(
            svd_modes(&x),
            Err(IndexError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_sqrt_cos_weights_rejects_pole() {
        assert!(sqrt_cos_weights(&[80.0, 85.0]).is_ok());
        assert!(matches!(
            sqrt_cos_weights(&[85.0, 90.0]),
            Err(IndexError::DegenerateWeight(_))
        ));
    }

    #[test]
    fn test_pca_output_axes() {
        let field = LabeledArray::from_fn(
            vec![
                Axis::range(TIME, 10),
                Axis::new("plev", vec![50000.0, 85000.0]),
                Axis::new(LAT, vec![70.0, 50.0, 30.0]),
                Axis::new(LON, vec![-40.0, -20.0, 0.0, 20.0]),
            ],
            |idx| {
                let (t, p, i, j) = (idx[0] as f64, idx[1] as f64, idx[2] as f64, idx[3] as f64);
                (0.37 * t * t + 1.3 * i * j + 0.7 * p * t * j + 0.11 * i * t).sin()
            },
        )
        .unwrap();
        let ds = pca(&field, &[LAT, LON]).unwrap();
        assert_eq!(ds.pc.axis_names(), vec!["plev", TIME, MODE]);
        assert_eq!(ds.eof.axis_names(), vec!["plev", LAT, LON, MODE]);
        assert_eq!(ds.expl.axis_names(), vec!["plev", MODE]);
        assert_eq!(ds.n_modes(), 10);
        assert_eq!(ds.eof.coords(LAT).unwrap(), &[70.0, 50.0, 30.0]);
        let lead = ds.leading().unwrap();
        assert_eq!(lead.eof.axis_names(), vec!["plev", LAT, LON]);
    }

    #[test]
    fn test_pca_rank_one_field() {
        let pattern = [1.0, -2.0, 0.5, 3.0, -1.0, 0.25];
        let series = [1.0, -1.0, 2.0, -2.0, 0.5, -0.5, 3.0];
        let field = LabeledArray::from_fn(
            vec![
                Axis::range(TIME, 7),
                Axis::new(LAT, vec![60.0, 40.0]),
                Axis::new(LON, vec![0.0, 10.0, 20.0]),
            ],
            |idx| series[idx[0]] * pattern[idx[1] * 3 + idx[2]],
        )
        .unwrap();
        let ds = pca(&field, &[LAT, LON]).unwrap();
        assert_near(ds.expl.get(&[0]).unwrap(), 1.0, 1e-12);

        // pc ⊗ eof of the leading mode reproduces the field in physical units
        let lead = ds.leading().unwrap();
        for t in 0..7 {
            for i in 0..2 {
                for j in 0..3 {
                    let recon = lead.pc.get(&[t]).unwrap() * lead.eof.get(&[i, j]).unwrap();
                    assert_near(recon, field.get(&[t, i, j]).unwrap(), 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_pca_levels_are_independent() {
        let field = LabeledArray::from_fn(
            vec![
                Axis::new(LAT, vec![70.0, 50.0, 30.0]),
                Axis::range(TIME, 8),
                Axis::new("plev", vec![10_000.0, 50_000.0, 85_000.0]),
                Axis::new(LON, vec![-40.0, -20.0, 0.0, 20.0]),
            ],
            |idx| {
                let (i, t, p, j) = (idx[0] as f64, idx[1] as f64, idx[2] as f64, idx[3] as f64);
                (0.41 * t * t + 1.7 * i * j + 0.9 * (p + 1.0) * t * j + 0.13 * i * t).sin()
                    + p * (0.3 * t + j).cos()
            },
        )
        .unwrap();
        let ds = pca(&field, &[LAT, LON]).unwrap();
        let k = ds.n_modes();

        for level in 0..3 {
            let alone = pca(&field.index_axis("plev", level).unwrap(), &[LAT, LON]).unwrap();
            assert_eq!(alone.n_modes(), k);
            for mode in 0..k {
                assert_near(
                    ds.expl.get(&[level, mode]).unwrap(),
                    alone.expl.get(&[mode]).unwrap(),
                    1e-12,
                );
                // pc ⊗ eof does not depend on the sign of the mode
                for t in 0..8 {
                    for i in 0..3 {
                        for j in 0..4 {
                            let full = ds.pc.get(&[level, t, mode]).unwrap()
                                * ds.eof.get(&[level, i, j, mode]).unwrap();
                            let single = alone.pc.get(&[t, mode]).unwrap()
                                * alone.eof.get(&[i, j, mode]).unwrap();
                            assert_near(full, single, 1e-10);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_pca_rejects_stacked_time() {
        let field = LabeledArray::from_fn(
            vec![Axis::range(TIME, 4), Axis::new(LAT, vec![10.0, 20.0])],
            |idx| idx[0] as f64 * idx[1] as f64,
        )
        .unwrap();
        assert!(pca(&field, &[TIME]).is_err());
        assert!(pca(&field, &[]).is_err());
    }
}
