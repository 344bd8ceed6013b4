//! The facet engine: validates a dataset against a [`PlotConfig`] and yields the
//! figures, cells and curves a renderer draws, each with its resolved axis ranges.

use crate::config::PlotConfig;
use crate::data::Dataset;
use crate::error::{FacetError, Result};
use crate::filter::filter;
use crate::grid::{plan_grid, GridShape};
use crate::group::{combine_columns, filter_group, resolve_group, GroupKey, GroupRole, GroupValues};
use crate::kind::{AxisColumns, RangeContext};
use crate::legend::{resolve_legend, LegendTable};
use crate::range::{Axis, RangeTable, SharePolicy};
use crate::stat::reduce;
use crate::subset::{curve_subset, FacetFrame, FacetGroups, TransformPlan};
use std::collections::HashMap;
use tracing::debug;

/// Prepared plot data. Every fatal configuration and grouping error has already
/// been raised by [`FacetData::new`].
#[derive(Debug, Clone)]
pub struct FacetData {
    config: PlotConfig,
    data: Dataset,
    axes: AxisColumns,
    legend_column: Option<String>,
    fig: Option<GroupValues>,
    policies: HashMap<Axis, SharePolicy>,
}

fn axis_columns<'c>(config: &'c PlotConfig, axis: &str) -> &'c [String] {
    match axis {
        "x" => &config.x,
        "y" => &config.y,
        "z" => &config.z,
        _ => &[],
    }
}

fn check_twin_axes(config: &PlotConfig) -> Result<()> {
    let (nx, ny) = (config.x.len(), config.y.len());
    if config.twin_x && ny != 2 {
        return Err(FacetError::TwinAxis(format!(
            "twin_x error! {} y values were specified but two are required",
            ny
        )));
    }
    if config.twin_x && nx > 1 {
        return Err(FacetError::TwinAxis(
            "twin_x error! only one x value can be specified".to_string(),
        ));
    }
    if config.twin_y && nx != 2 {
        return Err(FacetError::TwinAxis(format!(
            "twin_y error! {} x values were specified but two are required",
            nx
        )));
    }
    if config.twin_y && ny > 1 {
        return Err(FacetError::TwinAxis(
            "twin_y error! only one y value can be specified".to_string(),
        ));
    }
    Ok(())
}

/// Effective share policy per axis.
///
/// Wrap grids always share x and y across the figure and ignore row/column sharing.
/// Otherwise row or column sharing replaces figure-wide sharing of x and y.
pub fn share_policies(config: &PlotConfig) -> HashMap<Axis, SharePolicy> {
    let wrap = config.wrap.is_some();
    let (share_row, share_col) = if wrap {
        (false, false)
    } else {
        (config.share_row, config.share_col)
    };

    Axis::ALL
        .into_iter()
        .map(|axis| {
            let flag = match axis {
                Axis::X => config.share_x,
                Axis::X2 => config.share_x2,
                Axis::Y => config.share_y,
                Axis::Y2 => config.share_y2,
                Axis::Z => config.share_z,
            };
            let flag = match axis {
                Axis::X | Axis::Y if wrap => true,
                Axis::X | Axis::Y if share_row || share_col => false,
                _ => flag,
            };
            (axis, SharePolicy::resolve(flag, share_row, share_col))
        })
        .collect()
}

impl FacetData {
    pub fn new(dataset: Dataset, config: PlotConfig) -> Result<Self> {
        config.validate()?;
        if dataset.is_empty() {
            return Err(FacetError::EmptyData);
        }

        let kind = config.kind;
        for &axis in kind.required_axes() {
            if axis_columns(&config, axis).is_empty() {
                return Err(FacetError::MissingAxis(axis));
            }
        }

        let mut data = dataset;
        for axis in ["x", "y", "z"] {
            for column in axis_columns(&config, axis) {
                if !data.has_column(column) {
                    return Err(FacetError::AxisColumnNotFound {
                        axis,
                        column: column.clone(),
                    });
                }
            }
        }
        for &axis in kind.numeric_axes() {
            for column in axis_columns(&config, axis) {
                data = data
                    .coerce_numeric_or_date(column)
                    .ok_or_else(|| FacetError::AxisConversion {
                        axis,
                        column: column.clone(),
                    })?;
            }
        }
        check_twin_axes(&config)?;

        if let Some(expression) = &config.filter {
            data = filter(&data, expression);
            if data.is_empty() {
                return Err(FacetError::EmptyData);
            }
        }

        // Grouping errors must surface before any figure or range table exists.
        let fig = resolve_group(&data, GroupRole::Fig, config.fig.as_deref())?;
        resolve_group(&data, GroupRole::Row, config.row.as_deref())?;
        resolve_group(&data, GroupRole::Col, config.col.as_deref())?;
        resolve_group(&data, GroupRole::Wrap, config.wrap.as_deref())?;
        resolve_group(&data, GroupRole::Legend, config.legend.as_deref())?;

        let legend_column = match &config.legend {
            Some(columns) => {
                let (name, combined) = combine_columns(&data, columns);
                data = combined;
                Some(name)
            }
            None if kind.legend_from_x() => config.x.first().cloned(),
            None => None,
        };

        let axes = AxisColumns::route(&config);
        let policies = share_policies(&config);
        debug!(
            kind = kind.name(),
            rows = data.n_rows(),
            figures = fig.as_ref().map(|f| f.len()).unwrap_or(1),
            legend = ?legend_column,
            "prepared facet data"
        );

        Ok(Self {
            config,
            data,
            axes,
            legend_column,
            fig,
            policies,
        })
    }

    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    /// Filtered and type-checked data for all figures.
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn axes(&self) -> &AxisColumns {
        &self.axes
    }

    pub fn legend_column(&self) -> Option<&str> {
        self.legend_column.as_deref()
    }

    pub fn share_policy(&self, axis: Axis) -> SharePolicy {
        self.policies.get(&axis).copied().unwrap_or(SharePolicy::Independent)
    }

    pub fn n_figures(&self) -> usize {
        self.fig.as_ref().map(|f| f.len()).unwrap_or(1)
    }

    /// Legend, column, row and wrap columns, as the data now names them.
    fn grouping_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.legend_column.iter().cloned().collect();
        for group in [&self.config.col, &self.config.row, &self.config.wrap].into_iter().flatten() {
            columns.extend(group.iter().cloned());
        }
        columns
    }

    /// Column stat reductions group a single curve by.
    fn stat_column(&self) -> Option<String> {
        self.config
            .stat_val
            .clone()
            .or_else(|| self.axes.x.first().cloned())
    }

    fn transform_plan(&self) -> TransformPlan {
        let c = &self.config;
        let mut plan = Vec::new();
        for (axis, transform) in [
            (Axis::X, c.xtrans),
            (Axis::X2, c.x2trans),
            (Axis::Y, c.ytrans),
            (Axis::Y2, c.y2trans),
            (Axis::Z, c.ztrans),
        ] {
            if let Some(t) = transform {
                plan.extend(self.axes.get(axis).iter().map(|col| (col.clone(), t)));
            }
        }
        plan
    }

    /// One figure per figure grouping value, in natural order.
    pub fn figures(&self) -> impl Iterator<Item = Result<Figure<'_>>> + '_ {
        let values: Vec<Option<GroupKey>> = match &self.fig {
            Some(fig) => fig.keys.iter().cloned().map(Some).collect(),
            None => vec![None],
        };
        values.into_iter().enumerate().map(move |(index, value)| {
            let data = match (&self.fig, &value) {
                (Some(fig), Some(key)) => filter_group(&self.data, &fig.columns, key),
                _ => self.data.clone(),
            };
            self.build_figure(index, value, data)
        })
    }

    fn build_figure(&self, index: usize, value: Option<GroupKey>, data: Dataset) -> Result<Figure<'_>> {
        let config = &self.config;
        let kind = config.kind;
        let data = kind.prepare_figure(&data, config, &self.axes, &self.grouping_columns());

        let groups = match resolve_group(&data, GroupRole::Wrap, config.wrap.as_deref())? {
            Some(wrap) => FacetGroups {
                wrap: Some(wrap),
                ..FacetGroups::default()
            },
            None => FacetGroups {
                row: resolve_group(&data, GroupRole::Row, config.row.as_deref())?,
                col: resolve_group(&data, GroupRole::Col, config.col.as_deref())?,
                wrap: None,
            },
        };
        let grid = plan_grid(groups.wrap.as_ref(), groups.row.as_ref(), groups.col.as_ref())?;
        debug!(
            figure = index,
            nrow = grid.nrow,
            ncol = grid.ncol,
            nwrap = grid.nwrap,
            "planned grid"
        );

        let legend = resolve_legend(
            &data,
            self.legend_column.as_deref(),
            &self.axes.legend_x(),
            &self.axes.legend_y(),
            config.twin_x,
            config.twin_y,
        )?;

        let frame = FacetFrame::new(data, grid, groups, self.transform_plan())
            .map_cells(|cell| kind.modify_subset(cell, &self.axes));

        let stat = config.stat.filter(|s| s.is_only()).map(|s| {
            let mut by: Vec<String> = self.stat_column().into_iter().collect();
            by.extend(self.grouping_columns());
            (s.reduction(), by)
        });
        let ctx = RangeContext {
            config,
            axes: &self.axes,
            frame: &frame,
            policies: &self.policies,
            legend_column: self.legend_column.as_deref(),
            stat,
        };
        let mut ranges = RangeTable::new(&grid);
        kind.compute_ranges(&ctx, &mut ranges);

        Ok(Figure {
            index,
            value,
            grid,
            legend,
            ranges,
            frame,
            owner: self,
        })
    }
}

/// One figure: its grid, legend, per-cell ranges and cell data.
#[derive(Debug, Clone)]
pub struct Figure<'a> {
    pub index: usize,
    /// Figure grouping value, `None` when figures are not split.
    pub value: Option<GroupKey>,
    pub grid: GridShape,
    pub legend: LegendTable,
    pub ranges: RangeTable,
    frame: FacetFrame,
    owner: &'a FacetData,
}

/// One grid cell. `data` is empty for blank cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell<'f> {
    pub row: usize,
    pub col: usize,
    pub data: &'f Dataset,
}

/// One curve of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub index: usize,
    pub data: Dataset,
    pub x: Option<String>,
    pub y: Option<String>,
    pub name: Option<String>,
    pub twin: bool,
    /// Reduced line drawn over the raw points (`mean` / `median` modes).
    pub stat_line: Option<Dataset>,
}

impl<'a> Figure<'a> {
    pub fn data(&self) -> &Dataset {
        self.frame.data()
    }

    pub fn frame(&self) -> &FacetFrame {
        &self.frame
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell<'_>> + '_ {
        self.grid.cells().filter_map(move |(row, col)| {
            Some(Cell {
                row,
                col,
                data: self.frame.cell(row, col)?,
            })
        })
    }

    /// Curves of cell `(ir, ic)` in legend order. Curves with no plottable rows
    /// are skipped, and a cell outside the grid has none.
    pub fn curves(&self, ir: usize, ic: usize) -> impl Iterator<Item = Curve> + '_ {
        let cell = self.frame.cell(ir, ic).filter(|c| !c.is_empty());
        let stat = self.owner.config.stat;
        let stat_by: Vec<String> = self
            .owner
            .stat_column()
            .filter(|c| cell.is_some_and(|cell| cell.has_column(c)))
            .into_iter()
            .collect();

        self.legend
            .iter()
            .enumerate()
            .filter_map(move |(index, entry)| {
                let cell = cell?;
                let raw = curve_subset(cell, self.legend.column.as_deref(), entry);
                if raw.is_empty() {
                    return None;
                }
                let (data, stat_line) = match stat {
                    Some(mode) if !stat_by.is_empty() => {
                        let reduced = reduce(&raw, &stat_by, mode.reduction());
                        if mode.is_only() {
                            (reduced, None)
                        } else {
                            (raw, Some(reduced))
                        }
                    }
                    _ => (raw, None),
                };
                Some(Curve {
                    index,
                    data,
                    x: entry.x.clone(),
                    y: entry.y.clone(),
                    name: entry.name.clone(),
                    twin: entry.twin,
                    stat_line,
                })
            })
    }
}
