//! Subset Engine: cell-level and curve-level slices of a figure's data.
//!
//! Every slice is a fresh copy. Axis transforms are applied to those copies and
//! never to the figure dataset itself.

use crate::config::AxisTransform;
use crate::data::{Dataset, Value};
use crate::grid::GridShape;
use crate::group::{filter_value, GroupValues};
use crate::legend::LegendEntry;
use crate::range::Scope;
use tracing::debug;

/// Grouping values that shape the grid of one figure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FacetGroups {
    pub row: Option<GroupValues>,
    pub col: Option<GroupValues>,
    pub wrap: Option<GroupValues>,
}

/// Column-wise transforms: each listed column gets its transform.
pub type TransformPlan = Vec<(String, AxisTransform)>;

fn transform_column(values: &[Value], transform: AxisTransform) -> Vec<Value> {
    let max = values
        .iter()
        .filter_map(|v| match v {
            Value::Number(x) => Some(*x),
            _ => None,
        })
        .reduce(f64::max);

    values
        .iter()
        .map(|v| match v {
            Value::Number(x) => {
                let out = match transform {
                    AxisTransform::Abs => x.abs(),
                    AxisTransform::Negate => -x,
                    AxisTransform::Inverse => 1.0 / x,
                    AxisTransform::Pow(k) => x.powf(k),
                    AxisTransform::Flip => (x - max.unwrap_or(*x)).abs(),
                };
                Value::from(out)
            }
            other => other.clone(),
        })
        .collect()
}

/// Apply `plan` to a copy of `data`. Columns absent from `data` are skipped.
pub fn apply_transforms(data: &Dataset, plan: &[(String, AxisTransform)]) -> Dataset {
    let mut out = data.clone();
    for (column, transform) in plan {
        if let Some(values) = out.column(column) {
            let transformed = transform_column(values, *transform);
            out = out.with_column(column, transformed);
        }
    }
    out
}

/// Structural subset of cell `(ir, ic)`, before any transform.
pub fn cell_subset(data: &Dataset, shape: &GridShape, groups: &FacetGroups, ir: usize, ic: usize) -> Dataset {
    if let Some(wrap) = &groups.wrap {
        if shape.is_trailing_empty(ir, ic) {
            return data.empty_like();
        }
        return wrap.subset(data, shape.linear_index(ir, ic));
    }

    let mut sub = match &groups.row {
        Some(row) => row.subset(data, ir),
        None => data.clone(),
    };
    if let Some(col) = &groups.col {
        sub = col.subset(&sub, ic);
    }
    sub
}

/// Rows of grid row `ir`. In wrap mode this is the union of that row's cells.
pub fn row_slice(data: &Dataset, shape: &GridShape, groups: &FacetGroups, ir: usize) -> Dataset {
    if groups.wrap.is_some() {
        return (0..shape.ncol).fold(data.empty_like(), |acc, ic| {
            acc.concat(&cell_subset(data, shape, groups, ir, ic))
        });
    }
    match &groups.row {
        Some(row) => row.subset(data, ir),
        None => data.clone(),
    }
}

/// Rows of grid column `ic`. In wrap mode this is the union of that column's cells.
pub fn col_slice(data: &Dataset, shape: &GridShape, groups: &FacetGroups, ic: usize) -> Dataset {
    if groups.wrap.is_some() {
        return (0..shape.nrow).fold(data.empty_like(), |acc, ir| {
            acc.concat(&cell_subset(data, shape, groups, ir, ic))
        });
    }
    match &groups.col {
        Some(col) => col.subset(data, ic),
        None => data.clone(),
    }
}

/// Rows of one curve: legend match (if any), then rows missing the bound x or y dropped.
pub fn curve_subset(cell: &Dataset, legend_column: Option<&str>, entry: &LegendEntry) -> Dataset {
    let sub = match (legend_column, &entry.value) {
        (Some(column), Some(value)) => filter_value(cell, column, value),
        _ => cell.clone(),
    };

    let bound: Vec<&str> = [&entry.x, &entry.y]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .filter(|c| sub.has_column(c))
        .collect();
    let mask: Vec<bool> = (0..sub.n_rows())
        .map(|r| {
            bound
                .iter()
                .all(|c| sub.value(r, c).map(|v| !v.is_missing()).unwrap_or(false))
        })
        .collect();
    sub.mask(&mask)
}

/// A figure's data split into grid cells.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetFrame {
    data: Dataset,
    shape: GridShape,
    groups: FacetGroups,
    transforms: TransformPlan,
    cells: Vec<Dataset>,
}

impl FacetFrame {
    pub fn new(data: Dataset, shape: GridShape, groups: FacetGroups, transforms: TransformPlan) -> Self {
        let cells = shape
            .cells()
            .map(|(ir, ic)| {
                let sub = cell_subset(&data, &shape, &groups, ir, ic);
                if sub.is_empty() {
                    debug!(row = ir, col = ic, "blank cell");
                    sub
                } else {
                    apply_transforms(&sub, &transforms)
                }
            })
            .collect();

        Self {
            data,
            shape,
            groups,
            transforms,
            cells,
        }
    }

    /// Apply a per-kind adjustment to every non-empty cell.
    pub fn map_cells<F: Fn(&Dataset) -> Dataset>(mut self, f: F) -> Self {
        for cell in self.cells.iter_mut() {
            if !cell.is_empty() {
                *cell = f(cell);
            }
        }
        self
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn shape(&self) -> &GridShape {
        &self.shape
    }

    pub fn groups(&self) -> &FacetGroups {
        &self.groups
    }

    /// Cached subset of cell `(ir, ic)`, or `None` outside the grid.
    pub fn cell(&self, ir: usize, ic: usize) -> Option<&Dataset> {
        if ir >= self.shape.nrow || ic >= self.shape.ncol {
            return None;
        }
        self.cells.get(self.shape.linear_index(ir, ic))
    }

    /// Transformed data a range in `scope` is measured over.
    pub fn scope_data(&self, scope: Scope) -> Dataset {
        let raw = match scope {
            Scope::Figure => self.data.clone(),
            Scope::Row(ir) => row_slice(&self.data, &self.shape, &self.groups, ir),
            Scope::Col(ic) => col_slice(&self.data, &self.shape, &self.groups, ic),
            Scope::Cell(ir, ic) => {
                return self
                    .cell(ir, ic)
                    .cloned()
                    .unwrap_or_else(|| self.data.empty_like())
            }
        };
        apply_transforms(&raw, &self.transforms)
    }

    /// Cells `scope` covers, row-major.
    pub fn scope_cells(&self, scope: Scope) -> Vec<(usize, usize)> {
        self.shape
            .cells()
            .filter(|&(ir, ic)| match scope {
                Scope::Figure => true,
                Scope::Row(r) => ir == r,
                Scope::Col(c) => ic == c,
                Scope::Cell(r, c) => (ir, ic) == (r, c),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::plan_grid;
    use crate::group::{resolve_group, GroupRole};

    fn make_data() -> Dataset {
        Dataset::from_csv_str(
            "Lot,Die,x,y\n\
             1,A,1,10\n\
             1,B,2,20\n\
             2,A,3,30\n\
             2,B,4,\n\
             3,A,5,50\n",
        )
        .unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn group(data: &Dataset, role: GroupRole, names: &[&str]) -> Option<GroupValues> {
        resolve_group(data, role, Some(cols(names).as_slice())).unwrap()
    }

    #[test]
    fn test_row_col_cells() {
        let data = make_data();
        let groups = FacetGroups {
            row: group(&data, GroupRole::Row, &["Lot"]),
            col: group(&data, GroupRole::Col, &["Die"]),
            wrap: None,
        };
        let shape = plan_grid(None, groups.row.as_ref(), groups.col.as_ref()).unwrap();
        let frame = FacetFrame::new(data, shape, groups, Vec::new());
        assert_eq!(frame.cell(1, 0).unwrap().numeric_values("x"), vec![3.0]);
        assert_eq!(frame.cell(2, 1).unwrap().n_rows(), 0);
        assert_eq!(frame.scope_data(Scope::Row(0)).n_rows(), 2);
        assert_eq!(frame.scope_data(Scope::Col(0)).n_rows(), 3);
    }

    #[test]
    fn test_cell_outside_grid() {
        let data = make_data();
        let groups = FacetGroups {
            col: group(&data, GroupRole::Col, &["Die"]),
            ..FacetGroups::default()
        };
        let shape = plan_grid(None, None, groups.col.as_ref()).unwrap();
        let frame = FacetFrame::new(data, shape, groups, Vec::new());
        assert!(frame.cell(0, 1).is_some());
        // (0, 2) would alias (1, 0) under a plain linear index
        assert!(frame.cell(0, 2).is_none());
        assert!(frame.cell(1, 0).is_none());
        assert!(frame.scope_data(Scope::Cell(3, 3)).is_empty());
    }

    #[test]
    fn test_wrap_trailing_cell_is_empty() {
        let data = Dataset::from_csv_str("w,v\na,1\nb,2\nc,3\nd,4\ne,5\n").unwrap();
        let groups = FacetGroups {
            wrap: group(&data, GroupRole::Wrap, &["w"]),
            ..FacetGroups::default()
        };
        let shape = plan_grid(groups.wrap.as_ref(), None, None).unwrap();
        let frame = FacetFrame::new(data.clone(), shape, groups, Vec::new());
        assert_eq!((shape.nrow, shape.ncol), (2, 3));
        assert!(frame.cell(1, 2).unwrap().is_empty());
        assert_eq!(frame.cell(1, 2).unwrap().headers(), data.headers());
        assert_eq!(frame.cell(1, 1).unwrap().numeric_values("v"), vec![5.0]);
        assert_eq!(frame.scope_data(Scope::Row(1)).numeric_values("v"), vec![4.0, 5.0]);
    }

    #[test]
    fn test_transforms_copy() {
        let data = make_data();
        let plan = vec![
            ("x".to_string(), AxisTransform::Negate),
            ("y".to_string(), AxisTransform::Flip),
        ];
        let frame = FacetFrame::new(data.clone(), plan_grid(None, None, None).unwrap(), FacetGroups::default(), plan);
        assert_eq!(frame.cell(0, 0).unwrap().numeric_values("x"), vec![-1.0, -2.0, -3.0, -4.0, -5.0]);
        assert_eq!(frame.cell(0, 0).unwrap().numeric_values("y"), vec![40.0, 30.0, 20.0, 0.0]);
        assert_eq!(frame.scope_data(Scope::Figure).numeric_values("x")[0], -1.0);
        // the figure data itself is untouched
        assert_eq!(frame.data().numeric_values("x")[0], 1.0);
    }

    #[test]
    fn test_transform_kinds() {
        let values = vec![Value::Number(-2.0), Value::Missing, Value::Number(4.0)];
        assert_eq!(
            transform_column(&values, AxisTransform::Abs),
            vec![Value::Number(2.0), Value::Missing, Value::Number(4.0)]
        );
        assert_eq!(
            transform_column(&values, AxisTransform::Inverse),
            vec![Value::Number(-0.5), Value::Missing, Value::Number(0.25)]
        );
        assert_eq!(
            transform_column(&[Value::Number(0.0)], AxisTransform::Inverse),
            vec![Value::Missing]
        );
        assert_eq!(
            transform_column(&values, AxisTransform::Pow(2.0)),
            vec![Value::Number(4.0), Value::Missing, Value::Number(16.0)]
        );
    }

    #[test]
    fn test_curve_subset_drops_missing() {
        let data = make_data();
        let entry = LegendEntry {
            value: Some(Value::Text("B".into())),
            x: Some("x".into()),
            y: Some("y".into()),
            name: Some("B".into()),
            twin: false,
        };
        let curve = curve_subset(&data, Some("Die"), &entry);
        assert_eq!(curve.numeric_values("x"), vec![2.0]);
    }
}
