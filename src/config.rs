//! Closed, typed configuration record for a plot build.

use crate::error::{FacetError, Result};
use crate::kind::ChartKind;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::str::FromStr;

/// One end of an axis range as requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AxisBound {
    #[default]
    Auto,
    Fixed(f64),
    /// Quantile as a fraction in `[0, 1]` (`"Q95"` is `0.95`).
    Quantile(f64),
    /// Multiple of the interquartile range (`"1.5*IQR"` is `1.5`).
    IqrMultiple(f64),
}

impl AxisBound {
    pub fn is_auto(&self) -> bool {
        matches!(self, AxisBound::Auto)
    }
}

impl FromStr for AxisBound {
    type Err = FacetError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let lower = text.to_ascii_lowercase();
        let invalid = || FacetError::Config(format!("invalid axis bound \"{}\"", s));

        if lower.is_empty() || lower == "auto" || lower == "none" {
            return Ok(AxisBound::Auto);
        }
        if let Ok(v) = text.parse::<f64>() {
            return Ok(AxisBound::Fixed(v));
        }
        if let Some(factor) = lower.strip_suffix("iqr") {
            let factor = factor.trim().trim_end_matches('*').trim();
            if factor.is_empty() {
                return Ok(AxisBound::IqrMultiple(1.0));
            }
            return factor
                .parse::<f64>()
                .map(AxisBound::IqrMultiple)
                .map_err(|_| invalid());
        }
        if let Some(pct) = lower.strip_prefix('q') {
            let pct: f64 = pct.trim().parse().map_err(|_| invalid())?;
            if !(0.0..=100.0).contains(&pct) {
                return Err(invalid());
            }
            return Ok(AxisBound::Quantile(pct / 100.0));
        }
        Err(invalid())
    }
}

impl<'de> Deserialize<'de> for AxisBound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(AxisBound::Auto),
            Some(Raw::Number(v)) => Ok(AxisBound::Fixed(v)),
            Some(Raw::Text(s)) => s.parse().map_err(de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    Linear,
    Logx,
    Logy,
    Loglog,
    Semilogx,
    Semilogy,
}

impl AxisScale {
    /// Whether this scale puts the axis family of `letter` (`'x'` or `'y'`) on a log scale.
    pub fn is_log(&self, letter: char) -> bool {
        match self {
            AxisScale::Linear => false,
            AxisScale::Loglog => true,
            AxisScale::Logx | AxisScale::Semilogx => letter == 'x',
            AxisScale::Logy | AxisScale::Semilogy => letter == 'y',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StatMode {
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "median")]
    Median,
    #[serde(rename = "mean-only")]
    MeanOnly,
    #[serde(rename = "median-only")]
    MedianOnly,
}

impl StatMode {
    /// "Only" modes replace raw points with the reduced rows.
    pub fn is_only(&self) -> bool {
        matches!(self, StatMode::MeanOnly | StatMode::MedianOnly)
    }

    pub fn reduction(&self) -> crate::stat::Reduction {
        match self {
            StatMode::Mean | StatMode::MeanOnly => crate::stat::Reduction::Mean,
            StatMode::Median | StatMode::MedianOnly => crate::stat::Reduction::Median,
        }
    }
}

/// Element-wise transform applied to an axis' columns inside each subset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisTransform {
    Abs,
    Negate,
    Inverse,
    Pow(f64),
    /// `max - value`, computed over the subset being transformed.
    Flip,
}

impl AxisTransform {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(AxisTransform::Abs),
            "neg" | "negative" => Some(AxisTransform::Negate),
            "inv" | "inverse" => Some(AxisTransform::Inverse),
            "flip" => Some(AxisTransform::Flip),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for AxisTransform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Pow(String, f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Name(name) => AxisTransform::from_name(&name)
                .ok_or_else(|| de::Error::custom(format!("unknown axis transform \"{}\"", name))),
            Raw::Pow(name, k) if name == "pow" => Ok(AxisTransform::Pow(k)),
            Raw::Pow(name, _) => Err(de::Error::custom(format!(
                "unknown axis transform \"{}\"",
                name
            ))),
        }
    }
}

/// Normal-quantile plot options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NqOptions {
    /// Largest sigma on the grid. Derived from the sample size when unset.
    #[serde(default)]
    pub sigma: Option<f64>,
    #[serde(default = "default_tail")]
    pub tail: f64,
    #[serde(default = "default_step")]
    pub step: f64,
}

/// Upper limits that keep histogram and normal-quantile grids bounded.
pub const MAX_BINS: usize = 100_000;
pub const MAX_NQ_SIGMA: f64 = 20.0;
pub const MIN_NQ_STEP: f64 = 1e-3;

fn default_tail() -> f64 { 3.0 }
fn default_step() -> f64 { 0.2 }

impl Default for NqOptions {
    fn default() -> Self {
        Self {
            sigma: None,
            tail: default_tail(),
            step: default_step(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(v: OneOrMany) -> Self {
        match v {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

fn columns<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(Option::<OneOrMany>::deserialize(deserializer)?
        .map(Vec::from)
        .unwrap_or_default())
}

fn optional_columns<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<OneOrMany>::deserialize(deserializer)?
        .map(Vec::from)
        .filter(|v| !v.is_empty()))
}

fn default_true() -> bool { true }
fn default_padding() -> Option<f64> { Some(0.05) }
fn default_bins() -> usize { 20 }

/// Every option the engine recognizes. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotConfig {
    #[serde(default)]
    pub kind: ChartKind,

    #[serde(default, deserialize_with = "columns")]
    pub x: Vec<String>,
    #[serde(default, deserialize_with = "columns")]
    pub y: Vec<String>,
    #[serde(default, deserialize_with = "columns")]
    pub z: Vec<String>,

    #[serde(default, deserialize_with = "optional_columns")]
    pub row: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_columns")]
    pub col: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_columns")]
    pub wrap: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_columns")]
    pub legend: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_columns")]
    pub fig: Option<Vec<String>>,
    /// Box-plot grouping columns.
    #[serde(default, deserialize_with = "optional_columns")]
    pub groups: Option<Vec<String>>,

    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub stat: Option<StatMode>,
    #[serde(default)]
    pub stat_val: Option<String>,

    #[serde(default = "default_true")]
    pub share_x: bool,
    #[serde(default = "default_true")]
    pub share_x2: bool,
    #[serde(default = "default_true")]
    pub share_y: bool,
    #[serde(default = "default_true")]
    pub share_y2: bool,
    #[serde(default = "default_true")]
    pub share_z: bool,
    #[serde(default)]
    pub share_row: bool,
    #[serde(default)]
    pub share_col: bool,

    #[serde(default = "default_padding")]
    pub ax_limit_padding: Option<f64>,
    #[serde(default)]
    pub ax_scale: Option<AxisScale>,

    #[serde(default)]
    pub xmin: AxisBound,
    #[serde(default)]
    pub xmax: AxisBound,
    #[serde(default)]
    pub x2min: AxisBound,
    #[serde(default)]
    pub x2max: AxisBound,
    #[serde(default)]
    pub ymin: AxisBound,
    #[serde(default)]
    pub ymax: AxisBound,
    #[serde(default)]
    pub y2min: AxisBound,
    #[serde(default)]
    pub y2max: AxisBound,
    #[serde(default)]
    pub zmin: AxisBound,
    #[serde(default)]
    pub zmax: AxisBound,

    #[serde(default, alias = "twinx")]
    pub twin_x: bool,
    #[serde(default, alias = "twiny")]
    pub twin_y: bool,

    #[serde(default)]
    pub xtrans: Option<AxisTransform>,
    #[serde(default)]
    pub x2trans: Option<AxisTransform>,
    #[serde(default)]
    pub ytrans: Option<AxisTransform>,
    #[serde(default)]
    pub y2trans: Option<AxisTransform>,
    #[serde(default)]
    pub ztrans: Option<AxisTransform>,

    #[serde(default = "default_bins")]
    pub bins: usize,
    #[serde(default)]
    pub hist_normalize: bool,
    #[serde(default)]
    pub nq: NqOptions,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            kind: ChartKind::default(),
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            row: None,
            col: None,
            wrap: None,
            legend: None,
            fig: None,
            groups: None,
            filter: None,
            stat: None,
            stat_val: None,
            share_x: true,
            share_x2: true,
            share_y: true,
            share_y2: true,
            share_z: true,
            share_row: false,
            share_col: false,
            ax_limit_padding: default_padding(),
            ax_scale: None,
            xmin: AxisBound::Auto,
            xmax: AxisBound::Auto,
            x2min: AxisBound::Auto,
            x2max: AxisBound::Auto,
            ymin: AxisBound::Auto,
            ymax: AxisBound::Auto,
            y2min: AxisBound::Auto,
            y2max: AxisBound::Auto,
            zmin: AxisBound::Auto,
            zmax: AxisBound::Auto,
            twin_x: false,
            twin_y: false,
            xtrans: None,
            x2trans: None,
            ytrans: None,
            y2trans: None,
            ztrans: None,
            bins: default_bins(),
            hist_normalize: false,
            nq: NqOptions::default(),
        }
    }
}

fn names(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

impl PlotConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: PlotConfig =
            serde_json::from_str(text).map_err(|e| FacetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn xy(x: &[&str], y: &[&str]) -> Self {
        Self {
            x: names(x),
            y: names(y),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_row(mut self, cols: &[&str]) -> Self {
        self.row = Some(names(cols));
        self
    }

    pub fn with_col(mut self, cols: &[&str]) -> Self {
        self.col = Some(names(cols));
        self
    }

    pub fn with_wrap(mut self, cols: &[&str]) -> Self {
        self.wrap = Some(names(cols));
        self
    }

    pub fn with_legend(mut self, cols: &[&str]) -> Self {
        self.legend = Some(names(cols));
        self
    }

    pub fn with_fig(mut self, cols: &[&str]) -> Self {
        self.fig = Some(names(cols));
        self
    }

    pub fn with_filter(mut self, expression: &str) -> Self {
        self.filter = Some(expression.to_string());
        self
    }

    /// Reject option combinations that no plot build could honor.
    pub fn validate(&self) -> Result<()> {
        if let Some(p) = self.ax_limit_padding {
            if !(0.0..0.5).contains(&p) {
                return Err(FacetError::Config(format!(
                    "ax_limit_padding must be in [0, 0.5), got {}",
                    p
                )));
            }
        }
        if self.bins == 0 || self.bins > MAX_BINS {
            return Err(FacetError::Config(format!(
                "bins must be in [1, {}], got {}",
                MAX_BINS, self.bins
            )));
        }
        if self.twin_x && self.twin_y {
            return Err(FacetError::DoubleTwin);
        }
        if !(MIN_NQ_STEP..=f64::MAX).contains(&self.nq.step) {
            return Err(FacetError::Config(format!(
                "nq.step must be at least {}, got {}",
                MIN_NQ_STEP, self.nq.step
            )));
        }
        if !(0.0..=MAX_NQ_SIGMA).contains(&self.nq.tail) {
            return Err(FacetError::Config(format!(
                "nq.tail must be in [0, {}], got {}",
                MAX_NQ_SIGMA, self.nq.tail
            )));
        }
        if let Some(sigma) = self.nq.sigma {
            if !(f64::MIN_POSITIVE..=MAX_NQ_SIGMA).contains(&sigma) {
                return Err(FacetError::Config(format!(
                    "nq.sigma must be in (0, {}], got {}",
                    MAX_NQ_SIGMA, sigma
                )));
            }
        }
        Ok(())
    }

    /// Whether a log scale applies to the axis family of `letter`.
    pub fn is_log(&self, letter: char) -> bool {
        self.ax_scale.map(|s| s.is_log(letter)).unwrap_or(false)
    }

    /// Columns that define grouping roles active for this config, in role order.
    pub fn grouping_columns(&self) -> Vec<String> {
        [&self.legend, &self.col, &self.row, &self.wrap]
            .into_iter()
            .flatten()
            .flat_map(|cols| cols.iter().cloned())
            .collect()
    }
}
