use crate::labeled::{Axis, LabeledArray};
use crate::types::IndexError;

/// Default name of the stacked spatial axis.
pub const ALLPOINTS: &str = "allpoints";

/// Mapping between a composite axis and the axes it was built from.
///
/// Flattening is row-major: the last original axis varies fastest.
/// `table[c]` holds the per-axis indices of composite position `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct StackMap {
    /// Name of the composite axis.
    pub name: String,
    /// Original axes, in flattening order.
    pub axes: Vec<Axis>,
    /// Composite index → original axis indices.
    pub table: Vec<Vec<usize>>,
}

impl StackMap {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Original axis indices of composite position `c`.
    pub fn original_index(&self, c: usize) -> Option<&[usize]> {
        self.table.get(c).map(|v| v.as_slice())
    }

    /// Original coordinates of composite position `c`.
    pub fn original_coords(&self, c: usize) -> Option<Vec<f64>> {
        let idx = self.original_index(c)?;
        Some(
            idx.iter()
                .zip(&self.axes)
                .map(|(&i, ax)| ax.coords[i])
                .collect(),
        )
    }

    /// Composite position of the given original axis indices.
    pub fn composite_index(&self, idx: &[usize]) -> Option<usize> {
        if idx.len() != self.axes.len() {
            return None;
        }
        let mut c = 0;
        for (&i, ax) in idx.iter().zip(&self.axes) {
            if i >= ax.len() {
                return None;
            }
            c = c * ax.len() + i;
        }
        Some(c)
    }
}

fn unravel(mut c: usize, lens: &[usize]) -> Vec<usize> {
    let mut idx = vec![0; lens.len()];
    for (k, &len) in lens.iter().enumerate().rev() {
        idx[k] = c % len;
        c /= len;
    }
    idx
}

/// Flatten `dims` into one composite axis called `name`, appended last.
///
/// Remaining axes keep their relative order in front of the composite axis.
pub fn stack(
    array: &LabeledArray,
    name: &str,
    dims: &[&str],
) -> Result<(LabeledArray, StackMap), IndexError> {
    if dims.is_empty() {
        return Err(IndexError::InvalidInput(
            "at least one axis is required to stack".into(),
        ));
    }
    for (i, d) in dims.iter().enumerate() {
        if dims[..i].contains(d) {
            return Err(IndexError::InvalidInput(format!(
                "axis '{d}' listed twice for stacking"
            )));
        }
    }
    if array.has_axis(name) && !dims.contains(&name) {
        return Err(IndexError::InvalidInput(format!(
            "axis '{name}' already exists"
        )));
    }

    let stacked_axes = dims
        .iter()
        .map(|d| array.axis(d).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    let others: Vec<&str> = array
        .axis_names()
        .into_iter()
        .filter(|n| !dims.contains(n))
        .collect();
    let order: Vec<&str> = others.iter().chain(dims.iter()).copied().collect();
    let moved = array.transpose_to(&order)?;

    let lens: Vec<usize> = stacked_axes.iter().map(Axis::len).collect();
    let n: usize = lens.iter().product();
    let table = (0..n).map(|c| unravel(c, &lens)).collect();

    let mut axes = others
        .iter()
        .map(|o| array.axis(o).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    axes.push(Axis::range(name, n));
    let stacked = LabeledArray::from_vec(axes, moved.values())?;

    Ok((
        stacked,
        StackMap {
            name: name.to_string(),
            axes: stacked_axes,
            table,
        },
    ))
}

/// Restore the original axes of a composite axis, appended last.
pub fn unstack(array: &LabeledArray, map: &StackMap) -> Result<LabeledArray, IndexError> {
    let p = array.axis_index(&map.name)?;
    if array.axes()[p].len() != map.len() {
        return Err(IndexError::InvalidInput(format!(
            "axis '{}' has length {}, stack map expects {}",
            map.name,
            array.axes()[p].len(),
            map.len()
        )));
    }
    let others: Vec<&str> = array
        .axis_names()
        .into_iter()
        .filter(|n| *n != map.name)
        .collect();
    if let Some(clash) = map.axes.iter().find(|a| others.contains(&a.name.as_str())) {
        return Err(IndexError::InvalidInput(format!(
            "cannot unstack: axis '{}' already exists",
            clash.name
        )));
    }

    let mut order = others.clone();
    order.push(&map.name);
    let moved = array.transpose_to(&order)?;

    let mut axes = others
        .iter()
        .map(|o| array.axis(o).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    axes.extend(map.axes.iter().cloned());
    LabeledArray::from_vec(axes, moved.values())
}
