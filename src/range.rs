//! Range Calculator.
//!
//! Each logical axis of each grid cell gets a `(min, max)` pair. A bound is resolved
//! independently for each end with this precedence: user fixed value, quantile,
//! IQR multiple, auto padding, unbounded. Sharing policies decide which slice of the
//! figure data a cell's range is computed from and which cells copy it.

use crate::config::AxisBound;
use crate::data::Dataset;
use crate::grid::GridShape;
use crate::group::group_indices;
use crate::stat::{quantile, reduce, Reduction};
use std::fmt;
use std::ops::{Index, IndexMut};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    X2,
    Y,
    Y2,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 5] = [Axis::X, Axis::X2, Axis::Y, Axis::Y2, Axis::Z];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::X2 => "x2",
            Axis::Y => "y",
            Axis::Y2 => "y2",
            Axis::Z => "z",
        }
    }

    /// Axis family letter used by log-scale options.
    pub fn letter(&self) -> char {
        match self {
            Axis::X | Axis::X2 => 'x',
            Axis::Y | Axis::Y2 => 'y',
            Axis::Z => 'z',
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Axis::ALL.into_iter().find(|a| a.name() == name)
    }

    fn slot(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::X2 => 1,
            Axis::Y => 2,
            Axis::Y2 => 3,
            Axis::Z => 4,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved bounds. `None` leaves that end to the renderer's auto-scaling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AxisRange {
    pub const UNBOUNDED: AxisRange = AxisRange {
        min: None,
        max: None,
    };

    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

/// Per-cell ranges. An axis slot is `None` until it has been computed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellRanges {
    slots: [Option<AxisRange>; 5],
}

impl CellRanges {
    pub fn get(&self, axis: Axis) -> Option<AxisRange> {
        self.slots[axis.slot()]
    }

    pub fn set(&mut self, axis: Axis, range: AxisRange) {
        self.slots[axis.slot()] = Some(range);
    }

    pub fn is_computed(&self, axis: Axis) -> bool {
        self.slots[axis.slot()].is_some()
    }

    /// Look a bound up by its `{axis}{min|max}` key, e.g. `"xmin"` or `"y2max"`.
    pub fn bound(&self, key: &str) -> Option<f64> {
        let (axis, is_min) = match (key.strip_suffix("min"), key.strip_suffix("max")) {
            (Some(a), _) => (a, true),
            (_, Some(a)) => (a, false),
            _ => return None,
        };
        let range = self.get(Axis::from_name(axis)?)?;
        if is_min {
            range.min
        } else {
            range.max
        }
    }
}

/// `nrow x ncol` grid of [`CellRanges`], addressed by `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTable {
    nrow: usize,
    ncol: usize,
    cells: Vec<CellRanges>,
}

impl RangeTable {
    pub fn new(shape: &GridShape) -> Self {
        Self {
            nrow: shape.nrow,
            ncol: shape.ncol,
            cells: vec![CellRanges::default(); shape.nrow * shape.ncol],
        }
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn get(&self, ir: usize, ic: usize) -> Option<&CellRanges> {
        if ir < self.nrow && ic < self.ncol {
            self.cells.get(ir * self.ncol + ic)
        } else {
            None
        }
    }
}

impl Index<(usize, usize)> for RangeTable {
    type Output = CellRanges;

    fn index(&self, (ir, ic): (usize, usize)) -> &CellRanges {
        &self.cells[ir * self.ncol + ic]
    }
}

impl IndexMut<(usize, usize)> for RangeTable {
    fn index_mut(&mut self, (ir, ic): (usize, usize)) -> &mut CellRanges {
        &mut self.cells[ir * self.ncol + ic]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharePolicy {
    /// One range for the whole figure.
    All,
    /// One range per grid row.
    Row,
    /// One range per grid column.
    Col,
    Independent,
}

impl SharePolicy {
    pub fn resolve(share_axis: bool, share_row: bool, share_col: bool) -> Self {
        if share_axis {
            SharePolicy::All
        } else if share_row {
            SharePolicy::Row
        } else if share_col {
            SharePolicy::Col
        } else {
            SharePolicy::Independent
        }
    }
}

/// The slice of figure data a range is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Figure,
    Row(usize),
    Col(usize),
    Cell(usize, usize),
}

/// Walk the grid row-major and fill `axis` for every cell under `policy`.
///
/// Shared cells copy the bound of the cell that computed it, so later cells read
/// ranges resolved earlier in the walk.
pub fn fill_axis<F>(table: &mut RangeTable, axis: Axis, policy: SharePolicy, mut compute: F)
where
    F: FnMut(Scope) -> AxisRange,
{
    for ir in 0..table.nrow {
        for ic in 0..table.ncol {
            let shared = match policy {
                SharePolicy::All if (ir, ic) != (0, 0) => table[(0, 0)].get(axis),
                SharePolicy::Row if ic != 0 => table[(ir, 0)].get(axis),
                SharePolicy::Col if ir != 0 => table[(0, ic)].get(axis),
                _ => None,
            };
            let range = match shared {
                Some(r) => r,
                None => {
                    let scope = match policy {
                        SharePolicy::All => Scope::Figure,
                        SharePolicy::Row => Scope::Row(ir),
                        SharePolicy::Col => Scope::Col(ic),
                        SharePolicy::Independent => Scope::Cell(ir, ic),
                    };
                    let r = compute(scope);
                    trace!(axis = axis.name(), ?scope, ?r, "resolved axis range");
                    r
                }
            };
            table[(ir, ic)].set(axis, range);
        }
    }
}

/// Everything needed to turn a slice of data into one axis range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeSpec {
    pub columns: Vec<String>,
    pub min: AxisBound,
    pub max: AxisBound,
    pub log: bool,
    pub padding: Option<f64>,
    /// Stat-only reduction applied before measuring: method and group-by columns.
    pub reduction: Option<(Reduction, Vec<String>)>,
    /// Category columns for per-group quantile and IQR bounds.
    pub box_groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Lower,
    Upper,
}

/// Per-column (or per-group) value sets the quantile rules reduce over.
fn value_sets(data: &Dataset, spec: &RangeSpec) -> Vec<Vec<f64>> {
    match &spec.box_groups {
        Some(groups) if !groups.is_empty() && data.has_columns(groups) => {
            let mut sets = Vec::new();
            for (_, rows) in group_indices(data, groups) {
                let sub = data.take(&rows);
                for col in &spec.columns {
                    sets.push(sub.numeric_values(col));
                }
            }
            sets
        }
        _ => spec.columns.iter().map(|c| data.numeric_values(c)).collect(),
    }
}

fn pick(values: impl Iterator<Item = f64>, end: End) -> Option<f64> {
    match end {
        End::Lower => values.reduce(f64::min),
        End::Upper => values.reduce(f64::max),
    }
}

fn quantile_bound(sets: &[Vec<f64>], q: f64, end: End) -> Option<f64> {
    pick(sets.iter().filter_map(|s| quantile(s, q)), end)
}

fn iqr_bound(sets: &[Vec<f64>], factor: f64, grouped: bool, end: End) -> Option<f64> {
    if grouped {
        let fences = sets.iter().filter_map(|s| {
            let (q1, q3) = (quantile(s, 0.25)?, quantile(s, 0.75)?);
            let iqr = factor * (q3 - q1);
            Some(match end {
                End::Lower => q1 - iqr,
                End::Upper => q3 + iqr,
            })
        });
        return pick(fences, end);
    }

    let q1 = pick(sets.iter().filter_map(|s| quantile(s, 0.25)), End::Lower)?;
    let q3 = pick(sets.iter().filter_map(|s| quantile(s, 0.75)), End::Upper)?;
    let iqr = factor * (q3 - q1);
    Some(match end {
        End::Lower => q1 - iqr,
        End::Upper => q3 + iqr,
    })
}

/// Pad the observed `[min, max]` so the data fills `1 - 2p` of the final range.
pub fn pad_linear(min: f64, max: f64, p: f64) -> (f64, f64) {
    let delta = max - min;
    let pad = p * delta / (1.0 - 2.0 * p);
    (min - pad, max + pad)
}

/// Log-space padding: the data fills `1 - 2p` of the range in decades, so each end
/// moves by `p * decades / (1 - 2p)`. Non-finite results fall back to `v`.
pub fn pad_log(min: f64, max: f64, p: f64) -> (f64, f64) {
    let (lmin, lmax) = (min.log10(), max.log10());
    let shift = (p * (lmax - lmin) / (1.0 - 2.0 * p)).max(0.0);
    let lo = 10f64.powf(lmin - shift);
    let hi = 10f64.powf(lmax + shift);
    (
        if lo.is_finite() { lo.min(min) } else { min },
        if hi.is_finite() { hi.max(max) } else { max },
    )
}

fn fixed_only(spec: &RangeSpec) -> AxisRange {
    let fixed = |b: AxisBound| match b {
        AxisBound::Fixed(v) => Some(v),
        _ => None,
    };
    AxisRange {
        min: fixed(spec.min),
        max: fixed(spec.max),
    }
}

/// Resolve one axis range over `data`.
pub fn data_range(data: &Dataset, spec: &RangeSpec) -> AxisRange {
    if spec.columns.is_empty() || data.is_empty() || !data.has_columns(&spec.columns) {
        return fixed_only(spec);
    }

    let reduced;
    let data = match &spec.reduction {
        Some((method, groups)) => {
            reduced = reduce(data, groups, *method);
            &reduced
        }
        None => data,
    };

    let all: Vec<f64> = spec
        .columns
        .iter()
        .flat_map(|c| data.numeric_values(c))
        .collect();
    let observed_min = if spec.log {
        all.iter().copied().filter(|v| *v > 0.0).reduce(f64::min)
    } else {
        all.iter().copied().reduce(f64::min)
    };
    let (Some(mut min), Some(mut max)) = (observed_min, all.iter().copied().reduce(f64::max)) else {
        return fixed_only(spec);
    };

    if max - min <= 0.0 {
        if min == 0.0 {
            min = -0.1;
            max = 0.1;
        } else {
            min -= 0.1 * min.abs();
            max += 0.1 * max.abs();
        }
    }

    let padded = spec.padding.map(|p| {
        if spec.log {
            pad_log(min, max, p)
        } else {
            pad_linear(min, max, p)
        }
    });

    let sets = value_sets(data, spec);
    let grouped = matches!(&spec.box_groups, Some(g) if !g.is_empty() && data.has_columns(g));
    let resolve = |bound: AxisBound, end: End| -> Option<f64> {
        match bound {
            AxisBound::Fixed(v) => Some(v),
            AxisBound::Quantile(q) => quantile_bound(&sets, q, end),
            AxisBound::IqrMultiple(f) => iqr_bound(&sets, f, grouped, end),
            AxisBound::Auto => padded.map(|(lo, hi)| match end {
                End::Lower => lo,
                End::Upper => hi,
            }),
        }
    };

    AxisRange {
        min: resolve(spec.min, End::Lower),
        max: resolve(spec.max, End::Upper),
    }
}
