//! Legend Resolver: the ordered curves a cell draws and their display names.

use crate::data::{Dataset, Value};
use crate::error::Result;
use crate::group::{resolve_group, GroupRole, COMBINE_SEPARATOR};

/// One curve: a legend value crossed with one x and one y column.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    /// `None` when no legend grouping is active.
    pub value: Option<Value>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub name: Option<String>,
    /// Route this curve to the secondary axes.
    pub twin: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegendTable {
    /// Column holding the legend values (combined if several were requested).
    pub column: Option<String>,
    pub entries: Vec<LegendEntry>,
}

impl LegendTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LegendEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<Option<&str>> {
        self.entries.iter().map(|e| e.name.as_deref()).collect()
    }

    /// Distinct legend values, in legend order.
    pub fn values(&self) -> Vec<&Value> {
        let mut out: Vec<&Value> = Vec::new();
        for v in self.entries.iter().filter_map(|e| e.value.as_ref()) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
        out
    }
}

fn options(cols: &[String]) -> Vec<Option<String>> {
    if cols.is_empty() {
        vec![None]
    } else {
        cols.iter().cloned().map(Some).collect()
    }
}

fn n_unique(cols: &[String]) -> usize {
    let mut seen: Vec<&String> = Vec::new();
    for c in cols {
        if !seen.contains(&c) {
            seen.push(c);
        }
    }
    seen.len()
}

fn label(col: &Option<String>) -> &str {
    col.as_deref().unwrap_or("")
}

fn legend_name(value: &Value, x: &Option<String>, y: &Option<String>, nx: usize, ny: usize, twin_x: bool) -> String {
    let mut name = value.to_string();
    if ny > 1 && nx == 1 {
        name = format!("{}{}{}", name, COMBINE_SEPARATOR, label(y));
    }
    if nx > 1 && !twin_x {
        name = format!("{}{}{} / {}", name, COMBINE_SEPARATOR, label(y), label(x));
    }
    name
}

fn plain_name(x: &Option<String>, y: &Option<String>, nx: usize, ny: usize) -> Option<String> {
    match (nx > 1, ny > 1) {
        (false, false) => None,
        (false, true) => y.clone(),
        (true, false) => x.clone(),
        (true, true) => Some(format!("{} / {}", label(y), label(x))),
    }
}

/// Build the legend table for one figure's data.
///
/// Rows are ordered legend value (natural order), then x column, then y column.
pub fn resolve_legend(
    data: &Dataset,
    legend: Option<&str>,
    x: &[String],
    y: &[String],
    twin_x: bool,
    twin_y: bool,
) -> Result<LegendTable> {
    let legend_values: Vec<Option<Value>> = match legend {
        Some(col) => {
            let cols = [col.to_string()];
            resolve_group(data, GroupRole::Legend, Some(&cols[..]))?
                .map(|gv| gv.keys.into_iter().filter_map(|k| k.single().cloned()).map(Some).collect())
                .unwrap_or_default()
        }
        None => vec![None],
    };

    let (nx, ny) = (n_unique(x), n_unique(y));
    let xs = options(x);
    let ys = options(y);

    let mut entries = Vec::with_capacity(legend_values.len() * xs.len() * ys.len());
    for value in &legend_values {
        for xx in &xs {
            for yy in &ys {
                let name = match value {
                    Some(v) => Some(legend_name(v, xx, yy, nx, ny, twin_x)),
                    None => plain_name(xx, yy, nx, ny),
                };
                entries.push(LegendEntry {
                    value: value.clone(),
                    x: xx.clone(),
                    y: yy.clone(),
                    name,
                    twin: false,
                });
            }
        }
    }

    if let Some((first_x, first_y)) = entries.first().map(|e| (e.x.clone(), e.y.clone())) {
        for e in entries.iter_mut() {
            e.twin = (e.x != first_x && twin_y) || (e.y != first_y && twin_x);
        }
    }

    Ok(LegendTable {
        column: legend.map(str::to_string),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn make_data() -> Dataset {
        Dataset::from_csv_str(
            "Die,x1,x2,y1,y2\n\
             B,1,2,3,4\n\
             A,5,6,7,8\n",
        )
        .unwrap()
    }

    #[test]
    fn test_legend_multi_x_multi_y() {
        let table = resolve_legend(
            &make_data(),
            Some("Die"),
            &cols(&["x1", "x2"]),
            &cols(&["y1", "y2"]),
            false,
            false,
        )
        .unwrap();
        assert_eq!(table.len(), 8);
        let names: Vec<&str> = table.iter().filter_map(|e| e.name.as_deref()).collect();
        assert_eq!(names[0], "A | y1 / x1");
        assert_eq!(names[1], "A | y2 / x1");
        assert_eq!(names[2], "A | y1 / x2");
        assert_eq!(names[7], "B | y2 / x2");
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn test_legend_multi_y_single_x() {
        let table = resolve_legend(
            &make_data(),
            Some("Die"),
            &cols(&["x1"]),
            &cols(&["y1", "y2"]),
            false,
            false,
        )
        .unwrap();
        assert_eq!(table.names(), vec![Some("A | y1"), Some("A | y2"), Some("B | y1"), Some("B | y2")]);
    }

    #[test]
    fn test_legend_single_pair() {
        let table =
            resolve_legend(&make_data(), Some("Die"), &cols(&["x1"]), &cols(&["y1"]), false, false)
                .unwrap();
        assert_eq!(table.names(), vec![Some("A"), Some("B")]);
        assert_eq!(table.values().len(), 2);
    }

    #[test]
    fn test_no_legend_names() {
        let table =
            resolve_legend(&make_data(), None, &cols(&["x1"]), &cols(&["y1"]), false, false).unwrap();
        assert_eq!(table.names(), vec![None]);

        let table =
            resolve_legend(&make_data(), None, &cols(&["x1"]), &cols(&["y1", "y2"]), false, false)
                .unwrap();
        assert_eq!(table.names(), vec![Some("y1"), Some("y2")]);

        let table =
            resolve_legend(&make_data(), None, &cols(&["x1", "x2"]), &cols(&["y1"]), false, false)
                .unwrap();
        assert_eq!(table.names(), vec![Some("x1"), Some("x2")]);
    }

    #[test]
    fn test_twin_tagging() {
        let table =
            resolve_legend(&make_data(), None, &cols(&["x1"]), &cols(&["y1", "y2"]), true, false)
                .unwrap();
        let twins: Vec<bool> = table.iter().map(|e| e.twin).collect();
        assert_eq!(twins, vec![false, true]);

        let table = resolve_legend(
            &make_data(),
            Some("Die"),
            &cols(&["x1", "x2"]),
            &cols(&["y1"]),
            false,
            true,
        )
        .unwrap();
        let twins: Vec<bool> = table.iter().map(|e| e.twin).collect();
        assert_eq!(twins, vec![false, true, false, true]);
    }

    #[test]
    fn test_missing_legend_column() {
        let err = resolve_legend(&make_data(), Some("Nope"), &cols(&["x1"]), &cols(&["y1"]), false, false)
            .unwrap_err();
        assert!(err.is_grouping_error());
    }
}
