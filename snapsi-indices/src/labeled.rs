//! Labeled n-dimensional arrays: f64 data with named axes carrying coordinates.

use ndarray::{ArrayD, Axis as NdAxis, Dimension, IxDyn, Zip};
use rayon::prelude::*;

use crate::types::IndexError;

pub const TIME: &str = "time";
pub const LAT: &str = "lat";
pub const LON: &str = "lon";
pub const PLEV: &str = "plev";

/// Tolerance used when comparing coordinates of shared axes.
pub const COORD_TOL: f64 = 1e-9;

/// A named axis with its ordered coordinate values.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub coords: Vec<f64>,
}

impl Axis {
    pub fn new(name: impl Into<String>, coords: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            coords,
        }
    }

    /// Axis with coordinates `0, 1, ..., len-1`.
    pub fn range(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, (0..len).map(|i| i as f64).collect())
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Same name, same length, coordinates equal within [`COORD_TOL`].
    pub fn is_aligned_with(&self, other: &Axis) -> bool {
        self.name == other.name
            && self.len() == other.len()
            && self
                .coords
                .iter()
                .zip(&other.coords)
                .all(|(a, b)| (a - b).abs() <= COORD_TOL)
    }

    /// Index of the coordinate closest to `value`.
    pub fn nearest(&self, value: f64) -> Option<usize> {
        self.coords
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_finite())
            .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
            .map(|(i, _)| i)
    }

    /// Index of the coordinate equal to `value` within [`COORD_TOL`].
    pub fn position(&self, value: f64) -> Option<usize> {
        self.coords
            .iter()
            .position(|c| (c - value).abs() <= COORD_TOL)
    }
}

/// N-dimensional f64 array whose axes are identified by name.
///
/// Operations never mutate their inputs; each returns a new array.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    axes: Vec<Axis>,
    data: ArrayD<f64>,
}

impl LabeledArray {
    /// Build from axes and data. Axis lengths must match the data shape and
    /// axis names must be unique.
    pub fn new(axes: Vec<Axis>, data: ArrayD<f64>) -> Result<Self, IndexError> {
        if axes.len() != data.ndim() {
            return Err(IndexError::InvalidInput(format!(
                "{} axes given for {}-dimensional data",
                axes.len(),
                data.ndim()
            )));
        }
        for (i, ax) in axes.iter().enumerate() {
            if ax.len() != data.shape()[i] {
                return Err(IndexError::InvalidInput(format!(
                    "axis '{}' has {} coordinates but data has length {}",
                    ax.name,
                    ax.len(),
                    data.shape()[i]
                )));
            }
            if axes[..i].iter().any(|a| a.name == ax.name) {
                return Err(IndexError::InvalidInput(format!(
                    "duplicate axis name '{}'",
                    ax.name
                )));
            }
        }
        Ok(Self { axes, data })
    }

    /// Build from row-major values (last axis varies fastest).
    pub fn from_vec(axes: Vec<Axis>, values: Vec<f64>) -> Result<Self, IndexError> {
        let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| IndexError::InvalidInput(format!("values do not fit axes: {e}")))?;
        Self::new(axes, data)
    }

    /// Build by evaluating `f` at every multi-index.
    pub fn from_fn<F>(axes: Vec<Axis>, mut f: F) -> Result<Self, IndexError>
    where
        F: FnMut(&[usize]) -> f64,
    {
        let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let data = ArrayD::from_shape_fn(IxDyn(&shape), |idx| f(idx.slice()));
        Self::new(axes, data)
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn axis_names(&self) -> Vec<&str> {
        self.axes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn has_axis(&self, name: &str) -> bool {
        self.axes.iter().any(|a| a.name == name)
    }

    pub fn axis_index(&self, name: &str) -> Result<usize, IndexError> {
        self.axes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| IndexError::InvalidInput(format!("no axis named '{name}'")))
    }

    pub fn axis(&self, name: &str) -> Result<&Axis, IndexError> {
        Ok(&self.axes[self.axis_index(name)?])
    }

    pub fn coords(&self, name: &str) -> Result<&[f64], IndexError> {
        Ok(&self.axis(name)?.coords)
    }

    /// Values in row-major order.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.data.get(index).copied()
    }

    /// The single value of a 0-dimensional array.
    pub fn scalar(&self) -> Option<f64> {
        if self.ndim() == 0 {
            self.data.iter().next().copied()
        } else {
            None
        }
    }

    /// Reorder axes. `order` must name every axis exactly once.
    pub fn transpose_to(&self, order: &[&str]) -> Result<Self, IndexError> {
        if order.len() != self.ndim() {
            return Err(IndexError::InvalidInput(format!(
                "transpose order names {} axes, array has {}",
                order.len(),
                self.ndim()
            )));
        }
        let perm = order
            .iter()
            .map(|n| self.axis_index(n))
            .collect::<Result<Vec<_>, _>>()?;
        let mut check = perm.clone();
        check.sort_unstable();
        check.dedup();
        if check.len() != perm.len() {
            return Err(IndexError::InvalidInput(
                "transpose order repeats an axis".into(),
            ));
        }
        let data = self
            .data
            .view()
            .permuted_axes(IxDyn(&perm))
            .as_standard_layout()
            .into_owned();
        let axes = perm.iter().map(|&i| self.axes[i].clone()).collect();
        Ok(Self { axes, data })
    }

    /// Replace the metadata of axis `name` by `axis` (same length, possibly new name).
    pub fn replace_axis(&self, name: &str, axis: Axis) -> Result<Self, IndexError> {
        let p = self.axis_index(name)?;
        if axis.len() != self.axes[p].len() {
            return Err(IndexError::InvalidInput(format!(
                "replacement for axis '{name}' has length {}, expected {}",
                axis.len(),
                self.axes[p].len()
            )));
        }
        let mut axes = self.axes.clone();
        axes[p] = axis;
        Self::new(axes, self.data.clone())
    }

    /// Apply `f` to every 1-D lane along `name`, replacing that axis by `new_axis`.
    ///
    /// Lanes are independent and evaluated in parallel. `f` must return
    /// exactly `new_axis.len()` values.
    pub fn map_lanes<F>(&self, name: &str, new_axis: Axis, f: F) -> Result<Self, IndexError>
    where
        F: Fn(&[f64]) -> Result<Vec<f64>, IndexError> + Sync,
    {
        let p = self.axis_index(name)?;
        let lane_len = self.axes[p].len();
        if lane_len == 0 {
            return Err(IndexError::InsufficientData(format!(
                "axis '{name}' is empty"
            )));
        }
        if new_axis.name != name && self.has_axis(&new_axis.name) {
            return Err(IndexError::InvalidInput(format!(
                "axis '{}' already exists",
                new_axis.name
            )));
        }

        // Move the lane axis last so lanes are contiguous
        let mut perm: Vec<usize> = (0..self.ndim()).filter(|&i| i != p).collect();
        perm.push(p);
        let moved = self
            .data
            .view()
            .permuted_axes(IxDyn(&perm))
            .as_standard_layout()
            .into_owned();
        let flat = moved
            .as_slice()
            .ok_or_else(|| IndexError::InvalidInput("array is not contiguous".into()))?;

        let out_len = new_axis.len();
        let lanes = flat
            .par_chunks_exact(lane_len)
            .map(|lane| {
                let out = f(lane)?;
                if out.len() != out_len {
                    return Err(IndexError::InvalidInput(format!(
                        "lane produced {} values, expected {out_len}",
                        out.len()
                    )));
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut shape: Vec<usize> = perm[..perm.len() - 1]
            .iter()
            .map(|&i| self.data.shape()[i])
            .collect();
        shape.push(out_len);
        let values: Vec<f64> = lanes.into_iter().flatten().collect();
        let out = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| IndexError::InvalidInput(format!("{e}")))?;

        let mut inverse = vec![0; perm.len()];
        for (pos, &ax) in perm.iter().enumerate() {
            inverse[ax] = pos;
        }
        let data = out
            .permuted_axes(IxDyn(&inverse))
            .as_standard_layout()
            .into_owned();

        let mut axes = self.axes.clone();
        axes[p] = new_axis;
        Self::new(axes, data)
    }

    /// Select positions along `name`.
    pub fn isel(&self, name: &str, indices: &[usize]) -> Result<Self, IndexError> {
        let p = self.axis_index(name)?;
        let axis = &self.axes[p];
        if let Some(&bad) = indices.iter().find(|&&i| i >= axis.len()) {
            return Err(IndexError::InvalidInput(format!(
                "index {bad} out of bounds for axis '{name}' of length {}",
                axis.len()
            )));
        }
        let data = self.data.select(NdAxis(p), indices);
        let mut axes = self.axes.clone();
        axes[p] = Axis::new(name, indices.iter().map(|&i| axis.coords[i]).collect());
        Self::new(axes, data)
    }

    /// Select coordinates in the inclusive range between `a` and `b` (either order).
    pub fn sel_range(&self, name: &str, a: f64, b: f64) -> Result<Self, IndexError> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let indices: Vec<usize> = self
            .coords(name)?
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c >= lo - COORD_TOL && c <= hi + COORD_TOL)
            .map(|(i, _)| i)
            .collect();
        self.isel(name, &indices)
    }

    /// Take position `idx` along `name`, dropping the axis.
    pub fn index_axis(&self, name: &str, idx: usize) -> Result<Self, IndexError> {
        let p = self.axis_index(name)?;
        if idx >= self.axes[p].len() {
            return Err(IndexError::InvalidInput(format!(
                "index {idx} out of bounds for axis '{name}' of length {}",
                self.axes[p].len()
            )));
        }
        let data = self.data.index_axis(NdAxis(p), idx).to_owned();
        let mut axes = self.axes.clone();
        axes.remove(p);
        Self::new(axes, data)
    }

    /// Take the coordinate nearest to `value` along `name`, dropping the axis.
    pub fn sel_nearest(&self, name: &str, value: f64) -> Result<Self, IndexError> {
        let idx = self.axis(name)?.nearest(value).ok_or_else(|| {
            IndexError::InsufficientData(format!("axis '{name}' has no finite coordinates"))
        })?;
        self.index_axis(name, idx)
    }

    /// Sum over the named axes.
    pub fn sum_over(&self, names: &[&str]) -> Result<Self, IndexError> {
        let mut idx = names
            .iter()
            .map(|n| self.axis_index(n))
            .collect::<Result<Vec<_>, _>>()?;
        idx.sort_unstable();
        idx.dedup();
        let mut data = self.data.clone();
        let mut axes = self.axes.clone();
        for &p in idx.iter().rev() {
            data = data.sum_axis(NdAxis(p));
            axes.remove(p);
        }
        Self::new(axes, data)
    }

    /// Mean over the named axes.
    pub fn mean_over(&self, names: &[&str]) -> Result<Self, IndexError> {
        let mut count = 1usize;
        let mut seen: Vec<&str> = Vec::new();
        for n in names {
            if !seen.contains(n) {
                count *= self.axis(n)?.len();
                seen.push(n);
            }
        }
        if count == 0 {
            return Err(IndexError::InsufficientData(format!(
                "cannot average over empty axes {names:?}"
            )));
        }
        let summed = self.sum_over(names)?;
        Ok(summed.map(|v| v / count as f64))
    }

    /// Elementwise map.
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            axes: self.axes.clone(),
            data: self.data.mapv(f),
        }
    }

    /// Broadcast this array onto `target` axes.
    ///
    /// Every axis of `self` must appear in `target` with aligned coordinates;
    /// target axes absent from `self` are broadcast.
    pub fn broadcast_to(&self, target: &[Axis]) -> Result<ArrayD<f64>, IndexError> {
        let mut positions = Vec::with_capacity(self.ndim());
        for ax in &self.axes {
            let t = target
                .iter()
                .position(|a| a.name == ax.name)
                .ok_or_else(|| {
                    IndexError::InvalidInput(format!(
                        "axis '{}' not present in broadcast target",
                        ax.name
                    ))
                })?;
            if !ax.is_aligned_with(&target[t]) {
                return Err(IndexError::InvalidInput(format!(
                    "coordinates of axis '{}' are not aligned",
                    ax.name
                )));
            }
            positions.push(t);
        }

        let mut order: Vec<usize> = (0..self.ndim()).collect();
        order.sort_by_key(|&i| positions[i]);
        let mut view = self.data.view().permuted_axes(IxDyn(&order));
        for t in 0..target.len() {
            if !positions.contains(&t) {
                view = view.insert_axis(NdAxis(t));
            }
        }

        let shape: Vec<usize> = target.iter().map(Axis::len).collect();
        let b = view.broadcast(IxDyn(&shape)).ok_or_else(|| {
            IndexError::InvalidInput(format!("cannot broadcast to shape {shape:?}"))
        })?;
        Ok(b.to_owned())
    }

    /// Combine with `other` elementwise, broadcasting `other` onto this array's axes.
    pub fn zip_with<F>(&self, other: &LabeledArray, f: F) -> Result<Self, IndexError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let b = other.broadcast_to(&self.axes)?;
        let mut data = self.data.clone();
        Zip::from(&mut data).and(&b).for_each(|a, &o| *a = f(*a, o));
        Ok(Self {
            axes: self.axes.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> LabeledArray {
        LabeledArray::from_fn(
            vec![
                Axis::new(TIME, vec![0.0, 1.0]),
                Axis::new(LAT, vec![10.0, 20.0, 30.0]),
                Axis::new(LON, vec![0.0, 90.0]),
            ],
            |idx| (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_shape() {
        let data = ArrayD::zeros(IxDyn(&[2, 3]));
        let axes = vec![Axis::range("a", 2), Axis::range("b", 2)];
        assert!(LabeledArray::new(axes, data).is_err());
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let data = ArrayD::zeros(IxDyn(&[2, 2]));
        let axes = vec![Axis::range("a", 2), Axis::range("a", 2)];
        assert!(LabeledArray::new(axes, data).is_err());
    }

    #[test]
    fn test_transpose_to() {
        let a = grid();
        let t = a.transpose_to(&[LON, TIME, LAT]).unwrap();
        assert_eq!(t.shape(), &[2, 2, 3]);
        assert_eq!(t.get(&[1, 0, 2]), a.get(&[0, 2, 1]));
    }

    #[test]
    fn test_map_lanes_middle_axis() {
        let a = grid();
        let reversed = a
            .map_lanes(LAT, a.axis(LAT).unwrap().clone(), |lane| {
                Ok(lane.iter().rev().copied().collect())
            })
            .unwrap();
        assert_eq!(reversed.axis_names(), vec![TIME, LAT, LON]);
        assert_eq!(reversed.get(&[1, 0, 1]), a.get(&[1, 2, 1]));
        assert_eq!(reversed.get(&[0, 2, 0]), a.get(&[0, 0, 0]));
    }

    #[test]
    fn test_map_lanes_changes_length() {
        let a = grid();
        let summed = a
            .map_lanes(TIME, Axis::range("total", 1), |lane| Ok(vec![lane.iter().sum()]))
            .unwrap();
        assert_eq!(summed.shape(), &[1, 3, 2]);
        assert_eq!(summed.get(&[0, 1, 1]), Some(11.0 + 111.0));
    }

    #[test]
    fn test_sum_and_mean_over() {
        let a = grid();
        let s = a.sum_over(&[LAT, LON]).unwrap();
        assert_eq!(s.axis_names(), vec![TIME]);
        assert_eq!(s.get(&[0]), Some(0.0 + 1.0 + 10.0 + 11.0 + 20.0 + 21.0));
        let m = a.mean_over(&[LON]).unwrap();
        assert_eq!(m.get(&[1, 2]), Some(120.5));
    }

    #[test]
    fn test_sel_range_and_nearest() {
        let a = grid();
        let r = a.sel_range(LAT, 25.0, 10.0).unwrap();
        assert_eq!(r.coords(LAT).unwrap(), &[10.0, 20.0]);
        let n = a.sel_nearest(LAT, 27.0).unwrap();
        assert_eq!(n.axis_names(), vec![TIME, LON]);
        assert_eq!(n.get(&[0, 1]), Some(21.0));
    }

    #[test]
    fn test_broadcast_and_zip_with() {
        let a = grid();
        let w = LabeledArray::from_vec(
            vec![Axis::new(LAT, vec![10.0, 20.0, 30.0])],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        let prod = a.zip_with(&w, |x, y| x * y).unwrap();
        assert_eq!(prod.get(&[1, 2, 1]), Some(121.0 * 3.0));
        assert_eq!(prod.get(&[0, 0, 1]), Some(1.0));
    }

    #[test]
    fn test_zip_with_rejects_misaligned() {
        let a = grid();
        let w = LabeledArray::from_vec(
            vec![Axis::new(LAT, vec![10.0, 20.0, 31.0])],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        assert!(a.zip_with(&w, |x, y| x * y).is_err());
    }

    #[test]
    fn test_index_axis_to_scalar() {
        let v = LabeledArray::from_vec(vec![Axis::range("x", 3)], vec![4.0, 5.0, 6.0]).unwrap();
        let s = v.index_axis("x", 1).unwrap();
        assert_eq!(s.scalar(), Some(5.0));
    }
}
