//! Per-kind behavior: which axes a chart needs, how its cell data is adjusted, and
//! how its axis ranges are computed.

use crate::config::{AxisBound, PlotConfig};
use crate::data::{Dataset, Value};
use crate::group::{distinct_keys, group_indices, GroupKey};
use crate::natsort::key_cmp;
use crate::range::{data_range, fill_axis, Axis, AxisRange, RangeSpec, RangeTable, SharePolicy};
use crate::stat::{histogram, normal_quantiles, Reduction};
use crate::subset::FacetFrame;
use serde::Deserialize;
use std::collections::HashMap;

/// Column the normal-quantile table stores sigma values in.
pub const SIGMA_COLUMN: &str = "Sigma";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Xy,
    #[serde(alias = "boxplot")]
    Box,
    #[serde(alias = "histogram")]
    Hist,
    Heatmap,
    Imshow,
    Pie,
    Contour,
    Gantt,
    Nq,
}

impl ChartKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Xy => "xy",
            ChartKind::Box => "box",
            ChartKind::Hist => "hist",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Imshow => "imshow",
            ChartKind::Pie => "pie",
            ChartKind::Contour => "contour",
            ChartKind::Gantt => "gantt",
            ChartKind::Nq => "nq",
        }
    }

    /// Axis bindings the kind cannot be built without.
    pub fn required_axes(&self) -> &'static [&'static str] {
        match self {
            ChartKind::Xy | ChartKind::Pie | ChartKind::Gantt => &["x", "y"],
            ChartKind::Box => &["y"],
            ChartKind::Hist | ChartKind::Nq => &["x"],
            ChartKind::Heatmap | ChartKind::Imshow | ChartKind::Contour => &["x", "y", "z"],
        }
    }

    /// Axis bindings whose columns must convert to numbers or dates.
    pub fn numeric_axes(&self) -> &'static [&'static str] {
        match self {
            ChartKind::Xy => &["x", "y"],
            ChartKind::Box | ChartKind::Pie => &["y"],
            ChartKind::Hist | ChartKind::Nq | ChartKind::Gantt => &["x"],
            ChartKind::Heatmap => &["z"],
            ChartKind::Imshow | ChartKind::Contour => &["x", "y", "z"],
        }
    }

    /// Pie charts label their wedges by the x column.
    pub fn legend_from_x(&self) -> bool {
        matches!(self, ChartKind::Pie)
    }
}

/// Columns bound to each logical axis once twinning is applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisColumns {
    pub x: Vec<String>,
    pub x2: Vec<String>,
    pub y: Vec<String>,
    pub y2: Vec<String>,
    pub z: Vec<String>,
}

impl AxisColumns {
    pub fn route(config: &PlotConfig) -> Self {
        let mut axes = AxisColumns {
            x: config.x.clone(),
            y: config.y.clone(),
            z: config.z.clone(),
            ..AxisColumns::default()
        };

        match config.kind {
            ChartKind::Box => axes.x.clear(),
            ChartKind::Hist => axes.y.clear(),
            ChartKind::Nq => axes.y = vec![SIGMA_COLUMN.to_string()],
            _ => {}
        }

        if config.twin_x && axes.y.len() == 2 {
            axes.y2 = axes.y.split_off(1);
        }
        if config.twin_y && axes.x.len() == 2 {
            axes.x2 = axes.x.split_off(1);
        }
        axes
    }

    pub fn get(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::X => &self.x,
            Axis::X2 => &self.x2,
            Axis::Y => &self.y,
            Axis::Y2 => &self.y2,
            Axis::Z => &self.z,
        }
    }

    /// Columns the legend crosses with legend values: primary plus twinned.
    pub fn legend_x(&self) -> Vec<String> {
        self.x.iter().chain(&self.x2).cloned().collect()
    }

    pub fn legend_y(&self) -> Vec<String> {
        self.y.iter().chain(&self.y2).cloned().collect()
    }
}

// =============================================================================
// Figure and subset preparation
// =============================================================================

fn nq_table(data: &Dataset, keys: &[String], x: &[String], config: &PlotConfig) -> Dataset {
    let mut names: Vec<String> = keys.to_vec();
    names.push(SIGMA_COLUMN.to_string());
    names.extend(x.iter().cloned());
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

    let groups = if keys.is_empty() {
        vec![(GroupKey(Vec::new()), (0..data.n_rows()).collect::<Vec<_>>())]
    } else {
        group_indices(data, keys)
    };

    for (key, rows) in groups {
        let sub = data.take(&rows);
        for (ix, column) in x.iter().enumerate() {
            for (sigma, value) in normal_quantiles(&sub.numeric_values(column), &config.nq) {
                for (i, v) in key.values().iter().enumerate() {
                    columns[i].push(v.clone());
                }
                columns[keys.len()].push(Value::Number(sigma));
                for (j, col) in columns[keys.len() + 1..].iter_mut().enumerate() {
                    col.push(if j == ix { Value::Number(value) } else { Value::Missing });
                }
            }
        }
    }

    Dataset::from_columns(names.into_iter().zip(columns).collect()).unwrap_or_else(|_| data.empty_like())
}

impl ChartKind {
    /// Replace the figure data before any subsetting. Only `nq` does this, building
    /// one quantile table per group of `keys`.
    pub fn prepare_figure(
        &self,
        data: &Dataset,
        config: &PlotConfig,
        axes: &AxisColumns,
        keys: &[String],
    ) -> Dataset {
        match self {
            ChartKind::Nq => {
                let mut present: Vec<String> = Vec::new();
                for c in keys {
                    if data.has_column(c) && !present.contains(c) {
                        present.push(c.clone());
                    }
                }
                nq_table(data, &present, &axes.x, config)
            }
            _ => data.clone(),
        }
    }

    /// Adjust a non-empty cell subset.
    pub fn modify_subset(&self, cell: &Dataset, axes: &AxisColumns) -> Dataset {
        match self {
            ChartKind::Heatmap => match (axes.x.first(), axes.y.first()) {
                (Some(x), Some(y)) => sort_rows(cell, &[y.clone(), x.clone()]),
                _ => cell.clone(),
            },
            _ => cell.clone(),
        }
    }
}

/// Naturally sort rows by the given key columns.
fn sort_rows(data: &Dataset, keys: &[String]) -> Dataset {
    let key_of = |r: usize| -> Vec<Value> {
        keys.iter()
            .map(|k| data.value(r, k).cloned().unwrap_or(Value::Missing))
            .collect()
    };
    let mut order: Vec<usize> = (0..data.n_rows()).collect();
    order.sort_by(|&a, &b| key_cmp(&key_of(a), &key_of(b)));
    data.take(&order)
}

// =============================================================================
// Range computation
// =============================================================================

/// Everything the per-kind range rules read.
pub struct RangeContext<'a> {
    pub config: &'a PlotConfig,
    pub axes: &'a AxisColumns,
    pub frame: &'a FacetFrame,
    pub policies: &'a HashMap<Axis, SharePolicy>,
    pub legend_column: Option<&'a str>,
    /// Stat-only reduction and the columns it groups by.
    pub stat: Option<(Reduction, Vec<String>)>,
}

impl RangeContext<'_> {
    fn policy(&self, axis: Axis) -> SharePolicy {
        self.policies.get(&axis).copied().unwrap_or(SharePolicy::Independent)
    }

    fn bounds(&self, axis: Axis) -> (AxisBound, AxisBound) {
        let c = self.config;
        match axis {
            Axis::X => (c.xmin, c.xmax),
            Axis::X2 => (c.x2min, c.x2max),
            Axis::Y => (c.ymin, c.ymax),
            Axis::Y2 => (c.y2min, c.y2max),
            Axis::Z => (c.zmin, c.zmax),
        }
    }

    fn spec(&self, axis: Axis) -> RangeSpec {
        let (min, max) = self.bounds(axis);
        let box_groups = match (self.config.kind, axis) {
            (ChartKind::Box, Axis::Y | Axis::Y2) => self.config.groups.clone(),
            _ => None,
        };
        RangeSpec {
            columns: self.axes.get(axis).to_vec(),
            min,
            max,
            log: axis != Axis::Z && self.config.is_log(axis.letter()),
            padding: self.config.ax_limit_padding,
            reduction: self.stat.clone(),
            box_groups,
        }
    }

    fn default_axis(&self, table: &mut RangeTable, axis: Axis) {
        let spec = self.spec(axis);
        fill_axis(table, axis, self.policy(axis), |scope| {
            data_range(&self.frame.scope_data(scope), &spec)
        });
    }

    /// Observed range with no padding. Quantile and IQR bounds still apply.
    fn observed_axis(&self, table: &mut RangeTable, axis: Axis) {
        let spec = RangeSpec {
            padding: Some(0.0),
            ..self.spec(axis)
        };
        fill_axis(table, axis, self.policy(axis), |scope| {
            data_range(&self.frame.scope_data(scope), &spec)
        });
    }

    /// Fixed range built from the number of distinct values in the scope.
    fn count_axis<F>(&self, table: &mut RangeTable, axis: Axis, columns: &[String], to_range: F)
    where
        F: Fn(usize) -> (f64, f64),
    {
        let (min, max) = self.bounds(axis);
        fill_axis(table, axis, self.policy(axis), |scope| {
            let data = self.frame.scope_data(scope);
            if columns.is_empty() || data.is_empty() || !data.has_columns(columns) {
                return fixed_or(min, max, None);
            }
            let (lo, hi) = to_range(distinct_keys(&data, columns).len());
            fixed_or(min, max, Some((lo, hi)))
        });
    }

    fn unbounded_axis(&self, table: &mut RangeTable, axis: Axis) {
        let (min, max) = self.bounds(axis);
        fill_axis(table, axis, SharePolicy::All, |_| fixed_or(min, max, None));
    }

    /// Largest histogram count over every curve of one cell.
    fn max_hist_count(&self, ir: usize, ic: usize) -> Option<f64> {
        let cell = self.frame.cell(ir, ic).filter(|c| !c.is_empty())?;
        let legend_groups: Vec<Dataset> = match self.legend_column {
            Some(col) if cell.has_column(col) => group_indices(cell, &[col.to_string()])
                .into_iter()
                .map(|(_, rows)| cell.take(&rows))
                .collect(),
            _ => vec![cell.clone()],
        };
        legend_groups
            .iter()
            .flat_map(|sub| self.axes.x.iter().map(move |c| sub.numeric_values(c)))
            .filter(|values| !values.is_empty())
            .filter_map(|values| histogram(&values, self.config.bins, self.config.hist_normalize).max_count())
            .reduce(f64::max)
    }

    fn hist_count_axis(&self, table: &mut RangeTable) {
        let (min, max) = self.bounds(Axis::Y);
        fill_axis(table, Axis::Y, self.policy(Axis::Y), |scope| {
            let top = self
                .frame
                .scope_cells(scope)
                .into_iter()
                .filter_map(|(ir, ic)| self.max_hist_count(ir, ic))
                .reduce(f64::max);
            let Some(top) = top else {
                return fixed_or(min, max, None);
            };
            AxisRange {
                min: Some(fixed(min).unwrap_or(0.0)),
                max: fixed(max).or_else(|| {
                    self.config
                        .ax_limit_padding
                        .map(|p| top + p * top / (1.0 - 2.0 * p))
                }),
            }
        });
    }
}

fn fixed(bound: AxisBound) -> Option<f64> {
    match bound {
        AxisBound::Fixed(v) => Some(v),
        _ => None,
    }
}

/// User-fixed ends win; other ends take `fallback` or stay unbounded.
fn fixed_or(min: AxisBound, max: AxisBound, fallback: Option<(f64, f64)>) -> AxisRange {
    AxisRange {
        min: fixed(min).or(fallback.map(|f| f.0)),
        max: fixed(max).or(fallback.map(|f| f.1)),
    }
}

impl ChartKind {
    /// Fill every axis of every cell of `table`.
    pub fn compute_ranges(&self, ctx: &RangeContext<'_>, table: &mut RangeTable) {
        match self {
            ChartKind::Box => {
                match &ctx.config.groups {
                    Some(groups) => ctx.count_axis(table, Axis::X, groups, |n| (-0.5, n as f64 + 0.5)),
                    None => {
                        // one box per y column
                        let (min, max) = ctx.bounds(Axis::X);
                        let n = ctx.axes.y.len().max(1) as f64;
                        fill_axis(table, Axis::X, SharePolicy::All, |_| fixed_or(min, max, Some((-0.5, n + 0.5))));
                    }
                }
                ctx.default_axis(table, Axis::Y);
                ctx.default_axis(table, Axis::Y2);
                ctx.unbounded_axis(table, Axis::X2);
                ctx.unbounded_axis(table, Axis::Z);
            }
            ChartKind::Hist => {
                ctx.default_axis(table, Axis::X);
                ctx.default_axis(table, Axis::X2);
                ctx.hist_count_axis(table);
                ctx.unbounded_axis(table, Axis::Y2);
                ctx.unbounded_axis(table, Axis::Z);
            }
            ChartKind::Heatmap => {
                ctx.count_axis(table, Axis::X, &ctx.axes.x, |n| (-0.5, n as f64 - 0.5));
                ctx.count_axis(table, Axis::Y, &ctx.axes.y, |n| (n as f64 - 0.5, -0.5));
                ctx.observed_axis(table, Axis::Z);
                ctx.unbounded_axis(table, Axis::X2);
                ctx.unbounded_axis(table, Axis::Y2);
            }
            ChartKind::Imshow => {
                ctx.count_axis(table, Axis::X, &ctx.axes.x, |n| (0.0, n as f64));
                ctx.count_axis(table, Axis::Y, &ctx.axes.y, |n| (n as f64, 0.0));
                ctx.observed_axis(table, Axis::Z);
                ctx.unbounded_axis(table, Axis::X2);
                ctx.unbounded_axis(table, Axis::Y2);
            }
            ChartKind::Pie => {
                for axis in [Axis::X, Axis::Y] {
                    fill_axis(table, axis, SharePolicy::All, |_| AxisRange::new(-1.0, 1.0));
                }
                for axis in [Axis::X2, Axis::Y2, Axis::Z] {
                    fill_axis(table, axis, SharePolicy::All, |_| AxisRange::UNBOUNDED);
                }
            }
            ChartKind::Xy | ChartKind::Contour | ChartKind::Gantt | ChartKind::Nq => {
                for axis in Axis::ALL {
                    ctx.default_axis(table, axis);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::plan_grid;
    use crate::group::{resolve_group, GroupRole};
    use crate::subset::FacetGroups;

    fn policies(policy: SharePolicy) -> HashMap<Axis, SharePolicy> {
        Axis::ALL.into_iter().map(|a| (a, policy)).collect()
    }

    fn frame(data: &Dataset, wrap: Option<&str>) -> FacetFrame {
        let wrap = wrap.and_then(|w| {
            resolve_group(data, GroupRole::Wrap, Some(&[w.to_string()][..])).unwrap()
        });
        let shape = plan_grid(wrap.as_ref(), None, None).unwrap();
        let groups = FacetGroups {
            wrap,
            ..FacetGroups::default()
        };
        FacetFrame::new(data.clone(), shape, groups, Vec::new())
    }

    fn ranges(config: &PlotConfig, frame: &FacetFrame, policy: SharePolicy) -> RangeTable {
        let axes = AxisColumns::route(config);
        let policies = policies(policy);
        let ctx = RangeContext {
            config,
            axes: &axes,
            frame,
            policies: &policies,
            legend_column: None,
            stat: None,
        };
        let mut table = RangeTable::new(frame.shape());
        config.kind.compute_ranges(&ctx, &mut table);
        table
    }

    #[test]
    fn test_kind_from_json_aliases() {
        let cfg = PlotConfig::from_json(r#"{"kind": "boxplot", "y": "v"}"#).unwrap();
        assert_eq!(cfg.kind, ChartKind::Box);
        let cfg = PlotConfig::from_json(r#"{"kind": "histogram", "x": "v"}"#).unwrap();
        assert_eq!(cfg.kind, ChartKind::Hist);
        assert!(PlotConfig::from_json(r#"{"kind": "radar"}"#).is_err());
    }

    #[test]
    fn test_twin_routing() {
        let mut cfg = PlotConfig::xy(&["t"], &["a", "b"]);
        cfg.twin_x = true;
        let axes = AxisColumns::route(&cfg);
        assert_eq!(axes.y, vec!["a"]);
        assert_eq!(axes.y2, vec!["b"]);
        assert_eq!(axes.legend_y(), vec!["a", "b"]);

        let cfg = PlotConfig::xy(&["t"], &["a", "b"]);
        assert!(AxisColumns::route(&cfg).y2.is_empty());
    }

    #[test]
    fn test_every_axis_computed() {
        let data = Dataset::from_csv_str("x,y\n1,2\n3,4\n").unwrap();
        let cfg = PlotConfig::xy(&["x"], &["y"]);
        let table = ranges(&cfg, &frame(&data, None), SharePolicy::All);
        for axis in Axis::ALL {
            assert!(table[(0, 0)].is_computed(axis));
        }
        assert_eq!(table[(0, 0)].get(Axis::Y2), Some(AxisRange::UNBOUNDED));
    }

    #[test]
    fn test_box_x_range() {
        let data = Dataset::from_csv_str("g,v\nA,1\nB,2\nC,3\n").unwrap();
        let mut cfg = PlotConfig::xy(&[], &["v"]).with_kind(ChartKind::Box);
        cfg.groups = Some(vec!["g".to_string()]);
        let table = ranges(&cfg, &frame(&data, None), SharePolicy::All);
        assert_eq!(table[(0, 0)].get(Axis::X), Some(AxisRange::new(-0.5, 3.5)));
    }

    #[test]
    fn test_hist_count_axis() {
        let data = Dataset::from_csv_str("w,v\nA,1\nA,1\nA,1\nA,2\nB,1\nB,2\n").unwrap();
        let mut cfg = PlotConfig::xy(&["v"], &[]).with_kind(ChartKind::Hist);
        cfg.bins = 2;
        cfg.ax_limit_padding = Some(0.0);
        let table = ranges(&cfg, &frame(&data, Some("w")), SharePolicy::All);
        assert_eq!(table[(0, 1)].get(Axis::Y), Some(AxisRange::new(0.0, 3.0)));

        let table = ranges(&cfg, &frame(&data, Some("w")), SharePolicy::Independent);
        assert_eq!(table[(0, 1)].get(Axis::Y), Some(AxisRange::new(0.0, 1.0)));
    }

    #[test]
    fn test_heatmap_ranges_and_sort() {
        let data = Dataset::from_csv_str("c,r,v\nb,2,1\na,1,2\nb,1,3\na,2,4\nc,1,5\n").unwrap();
        let cfg = PlotConfig {
            z: vec!["v".to_string()],
            ..PlotConfig::xy(&["c"], &["r"]).with_kind(ChartKind::Heatmap)
        };
        let table = ranges(&cfg, &frame(&data, None), SharePolicy::All);
        assert_eq!(table[(0, 0)].get(Axis::X), Some(AxisRange::new(-0.5, 2.5)));
        assert_eq!(table[(0, 0)].get(Axis::Y), Some(AxisRange::new(1.5, -0.5)));
        assert_eq!(table[(0, 0)].get(Axis::Z), Some(AxisRange::new(1.0, 5.0)));

        let axes = AxisColumns::route(&cfg);
        let sorted = ChartKind::Heatmap.modify_subset(&data, &axes);
        assert_eq!(sorted.numeric_values("v"), vec![2.0, 3.0, 5.0, 4.0, 1.0]);
    }

    #[test]
    fn test_pie_ranges() {
        let data = Dataset::from_csv_str("name,v\na,1\nb,2\n").unwrap();
        let cfg = PlotConfig::xy(&["name"], &["v"]).with_kind(ChartKind::Pie);
        let table = ranges(&cfg, &frame(&data, None), SharePolicy::All);
        assert_eq!(table[(0, 0)].get(Axis::X), Some(AxisRange::new(-1.0, 1.0)));
        assert_eq!(table[(0, 0)].get(Axis::Z), Some(AxisRange::UNBOUNDED));
        assert!(ChartKind::Pie.legend_from_x());
    }

    #[test]
    fn test_nq_table() {
        let csv: String = std::iter::once("g,v".to_string())
            .chain((0..100).map(|i| format!("{},{}", if i % 2 == 0 { "A" } else { "B" }, i)))
            .collect::<Vec<_>>()
            .join("\n");
        let data = Dataset::from_csv_str(&csv).unwrap();
        let cfg = PlotConfig::xy(&["v"], &[]).with_kind(ChartKind::Nq).with_legend(&["g"]);
        let axes = AxisColumns::route(&cfg);
        assert_eq!(axes.y, vec![SIGMA_COLUMN]);

        let table = ChartKind::Nq.prepare_figure(&data, &cfg, &axes, &cfg.grouping_columns());
        assert_eq!(table.headers(), &["g", "Sigma", "v"]);
        let sigmas = table.numeric_values(SIGMA_COLUMN);
        assert!(sigmas.iter().any(|s| s.abs() < 1e-9));
        assert!(table.column("g").unwrap().iter().any(|g| g == &Value::Text("B".into())));
        let values = table.numeric_values("v");
        assert!(values.windows(2).take(10).all(|w| w[0] <= w[1]));
    }
}
