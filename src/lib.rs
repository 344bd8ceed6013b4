// Library exports for facetframe

pub mod config;
pub mod data;
pub mod error;
pub mod natsort;
pub mod parser;
pub mod preprocessor;

// Facet pipeline
pub mod filter;
pub mod group;
pub mod grid;
pub mod legend;
pub mod subset;
pub mod stat;
pub mod range;
pub mod kind;
pub mod pipeline;

pub use config::{AxisBound, AxisScale, AxisTransform, NqOptions, PlotConfig, StatMode};
pub use data::{Dataset, Value};
pub use error::{FacetError, Result};
pub use kind::ChartKind;
pub use pipeline::{Cell, Curve, FacetData, Figure};
pub use range::{Axis, AxisRange, CellRanges, RangeTable, SharePolicy};
