use numpy::ndarray::{Array1, Array2, Array3, ArrayD, ShapeError};
use numpy::{
    IntoPyArray, PyArray1, PyArray2, PyArray3, PyArrayDyn, PyReadonlyArray1, PyReadonlyArray2,
    PyReadonlyArray3, PyReadonlyArrayDyn,
};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use ::snapsi_indices as si;
use si::{Axis, LabeledArray, LAT, LON, TIME};

// ============================================================================
// Helper conversions
// ============================================================================

fn mat_to_faer(arr: &Array2<f64>) -> faer::Mat<f64> {
    let (nrows, ncols) = arr.dim();
    faer::Mat::from_fn(nrows, ncols, |i, j| arr[[i, j]])
}

fn faer_to_array2(m: &faer::Mat<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn err_to_py(e: si::IndexError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn shape_err(e: ShapeError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Generic axis names "dim_0", "dim_1", ... for an unlabeled array.
fn unlabeled(data: ArrayD<f64>) -> PyResult<LabeledArray> {
    let axes = data
        .shape()
        .iter()
        .enumerate()
        .map(|(i, &len)| Axis::range(format!("dim_{i}"), len))
        .collect();
    LabeledArray::new(axes, data).map_err(err_to_py)
}

/// (time, lat, lon) array with the given latitudes and longitudes.
fn time_lat_lon(data: ArrayD<f64>, lat: Vec<f64>, lon: Vec<f64>) -> PyResult<LabeledArray> {
    let n_time = data.shape().first().copied().unwrap_or(0);
    let axes = vec![Axis::range(TIME, n_time), Axis::new(LAT, lat), Axis::new(LON, lon)];
    LabeledArray::new(axes, data).map_err(err_to_py)
}

// ============================================================================
// Filtering
// ============================================================================

/// Normalized triangular kernel of width n.
#[pyfunction]
fn triangular_kernel<'py>(py: Python<'py>, n: usize) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let k = si::triangular_kernel(n).map_err(err_to_py)?;
    Ok(Array1::from(k).into_pyarray(py))
}

/// Lowpass filter along one axis with a periodic triangular window.
///
/// Parameters
/// ----------
/// x : numpy.ndarray
///     Input array of any dimension.
/// n : int
///     Window length in samples.
/// axis : int
///     Axis to filter along.
/// valid : bool
///     Trim samples affected by wrap-around.
#[pyfunction]
#[pyo3(signature = (x, n, axis=0, valid=false))]
fn lowpass<'py>(
    py: Python<'py>,
    x: PyReadonlyArrayDyn<'py, f64>,
    n: usize,
    axis: usize,
    valid: bool,
) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
    let field = unlabeled(x.as_array().to_owned())?;
    let out = si::lowpass(&field, &format!("dim_{axis}"), n, valid).map_err(err_to_py)?;
    Ok(out.into_data().into_pyarray(py))
}

/// Remove the linear trend along axis 0, given the time coordinates.
#[pyfunction]
fn detrend<'py>(
    py: Python<'py>,
    x: PyReadonlyArrayDyn<'py, f64>,
    time: PyReadonlyArray1<'py, f64>,
) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
    let field = unlabeled(x.as_array().to_owned())?;
    let time_axis = Axis::new(TIME, time.as_array().to_vec());
    let field = field.replace_axis("dim_0", time_axis).map_err(err_to_py)?;
    let out = si::detrend(&field).map_err(err_to_py)?;
    Ok(out.into_data().into_pyarray(py))
}

// ============================================================================
// EOF analysis and projection
// ============================================================================

/// Decompose a (time, points) matrix.
///
/// Returns
/// -------
/// (pc, patterns, explained) with shapes (time, k), (points, k), (k,).
#[pyfunction]
fn svd_modes<'py>(
    py: Python<'py>,
    x: PyReadonlyArray2<'py, f64>,
) -> PyResult<(
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray1<f64>>,
)> {
    let mat = mat_to_faer(&x.as_array().to_owned());
    let modes = si::svd_modes(&mat).map_err(err_to_py)?;
    Ok((
        faer_to_array2(&modes.pc).into_pyarray(py),
        faer_to_array2(&modes.patterns).into_pyarray(py),
        Array1::from(modes.explained).into_pyarray(py),
    ))
}

/// Area-weighted EOF analysis of (time, lat, lon) anomalies.
///
/// Returns
/// -------
/// (pc, eof, expl) with shapes (time, mode), (lat, lon, mode), (mode,).
#[pyfunction]
fn pca<'py>(
    py: Python<'py>,
    anomalies: PyReadonlyArray3<'py, f64>,
    lat: PyReadonlyArray1<'py, f64>,
    lon: PyReadonlyArray1<'py, f64>,
) -> PyResult<(
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray3<f64>>,
    Bound<'py, PyArray1<f64>>,
)> {
    let field = time_lat_lon(
        anomalies.as_array().to_owned().into_dyn(),
        lat.as_array().to_vec(),
        lon.as_array().to_vec(),
    )?;
    let ds = si::pca(&field, &[LAT, LON]).map_err(err_to_py)?;
    let pc: Array2<f64> = ds.pc.into_data().into_dimensionality().map_err(shape_err)?;
    let eof: Array3<f64> = ds.eof.into_data().into_dimensionality().map_err(shape_err)?;
    let expl: Array1<f64> = ds.expl.into_data().into_dimensionality().map_err(shape_err)?;
    Ok((pc.into_pyarray(py), eof.into_pyarray(py), expl.into_pyarray(py)))
}

/// Project (time, lat, lon) samples onto a (lat, lon) pattern.
#[pyfunction]
fn projection<'py>(
    py: Python<'py>,
    sample: PyReadonlyArray3<'py, f64>,
    pattern: PyReadonlyArray2<'py, f64>,
    lat: PyReadonlyArray1<'py, f64>,
    lon: PyReadonlyArray1<'py, f64>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let lat = lat.as_array().to_vec();
    let lon = lon.as_array().to_vec();
    let sample = time_lat_lon(sample.as_array().to_owned().into_dyn(), lat.clone(), lon.clone())?;
    let pattern = LabeledArray::new(
        vec![Axis::new(LAT, lat), Axis::new(LON, lon)],
        pattern.as_array().to_owned().into_dyn(),
    )
    .map_err(err_to_py)?;
    let index = si::projection(&sample, &pattern).map_err(err_to_py)?;
    Ok(Array1::from(index.values()).into_pyarray(py))
}

// ============================================================================
// Module definition
// ============================================================================

/// SNAPSI circulation indices - lowpass filtering, EOF analysis, projection.
///
/// Functions
/// ---------
/// triangular_kernel : Normalized triangular window
/// lowpass : Periodic triangular lowpass filter along an axis
/// detrend : Remove the linear trend along axis 0
/// svd_modes : Standardized SVD of a (time, points) matrix
/// pca : Area-weighted EOF analysis of (time, lat, lon) anomalies
/// projection : Index of samples on a fixed pattern
#[pymodule]
fn snapsi_indices_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(triangular_kernel, m)?)?;
    m.add_function(wrap_pyfunction!(lowpass, m)?)?;
    m.add_function(wrap_pyfunction!(detrend, m)?)?;
    m.add_function(wrap_pyfunction!(svd_modes, m)?)?;
    m.add_function(wrap_pyfunction!(pca, m)?)?;
    m.add_function(wrap_pyfunction!(projection, m)?)?;
    Ok(())
}
