//! Grouping Resolver: distinct, naturally ordered group keys per grouping role.

use crate::data::{Dataset, Value};
use crate::error::{FacetError, Result};
use crate::natsort::{key_cmp, value_cmp};
use std::cmp::Ordering;
use std::fmt;

/// Separator used when several legend columns are folded into one.
pub const COMBINE_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupRole {
    Row,
    Col,
    Wrap,
    Legend,
    Fig,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Row => "row",
            GroupRole::Col => "col",
            GroupRole::Wrap => "wrap",
            GroupRole::Legend => "legend",
            GroupRole::Fig => "fig",
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One distinct tuple of grouping values.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey(pub Vec<Value>);

impl GroupKey {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// The key's value when it groups on a single column.
    pub fn single(&self) -> Option<&Value> {
        match self.0.as_slice() {
            [v] => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join(COMBINE_SEPARATOR))
    }
}

/// Sorted, de-duplicated keys for one grouping role.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupValues {
    pub role: GroupRole,
    pub columns: Vec<String>,
    pub keys: Vec<GroupKey>,
}

impl GroupValues {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GroupKey> {
        self.keys.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupKey> {
        self.keys.iter()
    }

    /// Rows of `data` belonging to the key at `index`. Out-of-range indices give an empty table.
    pub fn subset(&self, data: &Dataset, index: usize) -> Dataset {
        match self.keys.get(index) {
            Some(key) => filter_group(data, &self.columns, key),
            None => data.empty_like(),
        }
    }
}

/// Grouping key of one row, or `None` if any grouping column is missing in that row.
fn row_key(data: &Dataset, row: usize, columns: &[String]) -> Option<Vec<Value>> {
    columns
        .iter()
        .map(|c| match data.value(row, c) {
            Some(Value::Missing) | None => None,
            Some(v) => Some(v.clone()),
        })
        .collect()
}

/// Row indices per distinct key, keys in natural order. Rows with a missing key are dropped.
pub fn group_indices(data: &Dataset, columns: &[String]) -> Vec<(GroupKey, Vec<usize>)> {
    let mut keyed: Vec<(Vec<Value>, usize)> = (0..data.n_rows())
        .filter_map(|r| row_key(data, r, columns).map(|k| (k, r)))
        .collect();
    keyed.sort_by(|a, b| key_cmp(&a.0, &b.0));

    let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
    for (key, row) in keyed {
        match groups.last_mut() {
            Some((last, rows)) if key_cmp(&last.0, &key) == Ordering::Equal => rows.push(row),
            _ => groups.push((GroupKey(key), vec![row])),
        }
    }
    groups
}

pub fn distinct_keys(data: &Dataset, columns: &[String]) -> Vec<GroupKey> {
    group_indices(data, columns)
        .into_iter()
        .map(|(k, _)| k)
        .collect()
}

/// Validate a grouping role and compute its distinct keys.
///
/// `None` (or an empty list) disables the role.
pub fn resolve_group(
    data: &Dataset,
    role: GroupRole,
    columns: Option<&[String]>,
) -> Result<Option<GroupValues>> {
    let columns = match columns {
        Some(cols) if !cols.is_empty() => cols,
        _ => return Ok(None),
    };

    if let Some(missing) = columns.iter().find(|c| !data.has_column(c)) {
        return Err(FacetError::GroupingColumnNotFound {
            role,
            column: missing.clone(),
        });
    }

    let keys = distinct_keys(data, columns);
    if keys.is_empty() {
        return Err(FacetError::NoGroups {
            role,
            columns: columns.join(", "),
        });
    }

    Ok(Some(GroupValues {
        role,
        columns: columns.to_vec(),
        keys,
    }))
}

/// Row mask for rows whose grouping columns equal `key`.
pub fn equals_mask(data: &Dataset, columns: &[String], key: &GroupKey) -> Vec<bool> {
    (0..data.n_rows())
        .map(|r| match row_key(data, r, columns) {
            Some(k) => key_cmp(&k, key.values()) == Ordering::Equal,
            None => false,
        })
        .collect()
}

pub fn filter_group(data: &Dataset, columns: &[String], key: &GroupKey) -> Dataset {
    data.mask(&equals_mask(data, columns, key))
}

/// Rows where `column` equals `value`.
pub fn filter_value(data: &Dataset, column: &str, value: &Value) -> Dataset {
    let mask: Vec<bool> = match data.column(column) {
        Some(values) => values
            .iter()
            .map(|v| !v.is_missing() && value_cmp(v, value) == Ordering::Equal)
            .collect(),
        None => vec![false; data.n_rows()],
    };
    data.mask(&mask)
}

/// Fold several columns into a synthetic `"A | B"` column holding `"a | b"` values.
///
/// A single column is returned unchanged. Rows missing any part become missing.
pub fn combine_columns(data: &Dataset, columns: &[String]) -> (String, Dataset) {
    if columns.len() == 1 {
        return (columns[0].clone(), data.clone());
    }
    let name = columns.join(COMBINE_SEPARATOR);
    let values = (0..data.n_rows())
        .map(|r| match row_key(data, r, columns) {
            Some(parts) => Value::Text(GroupKey(parts).to_string()),
            None => Value::Missing,
        })
        .collect();
    (name.clone(), data.with_column(&name, values))
}
