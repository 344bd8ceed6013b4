//! Filter Evaluator: query strings over arbitrary column names.
//!
//! Column names may hold spaces, brackets and other symbols, so every header is
//! first rewritten to a safe alias (`"Voltage [V]"` becomes `fCpVoltage_V`) and the
//! expression is rewritten to match before it is parsed. Evaluation yields a row
//! mask that is applied to the original table, so the result keeps the original
//! headers.

use crate::data::{parse_date, Dataset, Value};
use crate::error::{FacetError, Result};
use crate::parser::{parse_filter, CmpOp, Expr, Operand};
use crate::preprocessor::substitute_current_values;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

pub const ALIAS_PREFIX: &str = "fCp";

const SPECIAL_CHARS: &[(&str, &str)] = &[
    (" ", "_"),
    (".", "dot"),
    ("[", ""),
    ("]", ""),
    ("(", ""),
    (")", ""),
    ("-", "_"),
    ("^", ""),
    (">", ""),
    ("<", ""),
    ("/", "_"),
    ("@", "at"),
    ("%", "percent"),
    ("*", "_"),
    (":", "sc"),
];

// Two-character operators first so `<=` is not read as `<`.
const OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "<", ">"];

fn special_chars(text: &str) -> String {
    SPECIAL_CHARS
        .iter()
        .fold(text.trim().to_string(), |acc, (from, to)| acc.replace(from, to))
        .trim()
        .to_string()
}

/// Deterministic identifier-safe alias for a column name.
pub fn safe_alias(name: &str) -> String {
    special_chars(&format!("{}{}", ALIAS_PREFIX, name.trim()))
}

fn split_leading_parens(text: &str) -> (&str, &str) {
    let body = text.trim_start_matches('(');
    (&text[..text.len() - body.len()], body)
}

/// Peel unbalanced closing parentheses off the end of a clause.
fn split_trailing_parens(text: &str) -> (&str, &str) {
    let mut body = text.trim_end();
    while body.ends_with(')') && body.matches(')').count() > body.matches('(').count() {
        body = body[..body.len() - 1].trim_end();
    }
    let closes = text.trim_end()[body.len()..].trim();
    (body, closes)
}

fn find_operator(text: &str) -> Option<(usize, &'static str)> {
    text.char_indices().find_map(|(i, _)| {
        OPERATORS
            .iter()
            .find(|op| text[i..].starts_with(*op))
            .map(|op| (i, *op))
    })
}

fn rewrite_comparison(part: &str, headers: &[String]) -> String {
    let (opens, rest) = split_leading_parens(part.trim());
    let (body, closes) = split_trailing_parens(rest);

    let Some((pos, op)) = find_operator(body) else {
        return part.trim().to_string();
    };
    let lhs = body[..pos].trim();
    let rhs = body[pos + op.len()..].trim();
    let rhs = if headers.iter().any(|h| h == rhs) {
        safe_alias(rhs)
    } else {
        rhs.to_string()
    };

    format!("{}{} {} {}{}", opens, safe_alias(lhs), op, rhs, closes)
}

fn rewrite_membership(clause: &str, pos: usize, keyword: &str) -> String {
    let (opens, key) = split_leading_parens(&clause[..pos]);
    format!(
        "{}{} {}{}",
        opens,
        safe_alias(key.trim()),
        keyword,
        &clause[pos + keyword.len()..]
    )
}

fn rewrite_and_clause(clause: &str, headers: &[String]) -> String {
    if let Some(pos) = clause.find(" not in [") {
        return rewrite_membership(clause, pos + 1, "not in");
    }
    if let Some(pos) = clause.find(" in [") {
        return rewrite_membership(clause, pos + 1, "in");
    }
    clause
        .split('|')
        .map(|part| rewrite_comparison(part, headers))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Rewrite column references in `expression` to their safe aliases.
///
/// `headers` decides whether a bare right-hand side is a column or a literal.
pub fn rewrite_expression(expression: &str, headers: &[String]) -> String {
    expression
        .split('&')
        .map(|clause| rewrite_and_clause(clause.trim(), headers))
        .collect::<Vec<_>>()
        .join(" & ")
}

fn operand_value(operand: &Operand) -> Value {
    match operand {
        Operand::Number(v) => Value::Number(*v),
        Operand::Text(s) => Value::Text(s.clone()),
        Operand::Column(name) => Value::Text(name.clone()),
    }
}

fn compare(a: &Value, op: CmpOp, b: &Value) -> Result<bool> {
    let ordering = match (a, b) {
        (Value::Missing, _) | (_, Value::Missing) => return Ok(op == CmpOp::Ne),
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Text(s)) => parse_date(s).map(|d| x.cmp(&d)),
        (Value::Text(s), Value::Date(y)) => parse_date(s).map(|d| d.cmp(y)),
        _ => None,
    };

    match (ordering, op) {
        (Some(o), CmpOp::Eq) => Ok(o == Ordering::Equal),
        (Some(o), CmpOp::Ne) => Ok(o != Ordering::Equal),
        (Some(o), CmpOp::Lt) => Ok(o == Ordering::Less),
        (Some(o), CmpOp::Le) => Ok(o != Ordering::Greater),
        (Some(o), CmpOp::Gt) => Ok(o == Ordering::Greater),
        (Some(o), CmpOp::Ge) => Ok(o != Ordering::Less),
        (None, CmpOp::Eq) => Ok(false),
        (None, CmpOp::Ne) => Ok(true),
        (None, _) => Err(FacetError::FilterEval(format!(
            "cannot order {} against {}",
            a, b
        ))),
    }
}

fn lookup<'a>(data: &'a Dataset, column: &str) -> Result<&'a [Value]> {
    data.column(column)
        .ok_or_else(|| FacetError::FilterEval(format!("unknown column \"{}\"", column)))
}

/// Evaluate a parsed expression to a row mask. Column names must already be aliases.
pub fn evaluate(expr: &Expr, data: &Dataset) -> Result<Vec<bool>> {
    match expr {
        Expr::And(a, b) => {
            let (a, b) = (evaluate(a, data)?, evaluate(b, data)?);
            Ok(a.iter().zip(&b).map(|(x, y)| *x && *y).collect())
        }
        Expr::Or(a, b) => {
            let (a, b) = (evaluate(a, data)?, evaluate(b, data)?);
            Ok(a.iter().zip(&b).map(|(x, y)| *x || *y).collect())
        }
        Expr::Compare {
            column,
            op,
            operand,
        } => {
            let left = lookup(data, column)?;
            match operand {
                Operand::Column(other) => {
                    let right = lookup(data, other)?;
                    left.iter()
                        .zip(right)
                        .map(|(a, b)| compare(a, *op, b))
                        .collect()
                }
                literal => {
                    let right = operand_value(literal);
                    left.iter().map(|a| compare(a, *op, &right)).collect()
                }
            }
        }
        Expr::Membership {
            column,
            values,
            negated,
        } => {
            let left = lookup(data, column)?;
            let items: Vec<Value> = values.iter().map(operand_value).collect();
            left.iter()
                .map(|a| {
                    let mut found = false;
                    for item in &items {
                        found |= compare(a, CmpOp::Eq, item)?;
                    }
                    Ok(found != *negated)
                })
                .collect()
        }
    }
}

/// Filter `data` by `expression`, reporting parse or evaluation failures.
pub fn try_filter(data: &Dataset, expression: &str) -> Result<Dataset> {
    let substituted = substitute_current_values(data, expression);
    let rewritten = rewrite_expression(&substituted, data.headers());

    let (_, expr) = parse_filter(&rewritten).map_err(|e| FacetError::FilterParse {
        expression: rewritten.clone(),
        reason: e.to_string(),
    })?;

    let aliases: Vec<String> = data.headers().iter().map(|h| safe_alias(h)).collect();
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for (alias, header) in aliases.iter().zip(data.headers()) {
        if let Some(first) = owners.insert(alias, header) {
            warn!(alias = %alias, first, second = %header, "columns share a filter alias");
            if expr.columns().contains(&alias.as_str()) {
                return Err(FacetError::FilterEval(format!(
                    "\"{}\" and \"{}\" are indistinguishable in a filter",
                    first, header
                )));
            }
        }
    }
    let mask = evaluate(&expr, &data.with_headers(aliases))?;
    Ok(data.mask(&mask))
}

/// Filter `data` by `expression`. A failing expression is logged and the input is
/// returned unfiltered. An empty result is not an error here.
pub fn filter(data: &Dataset, expression: &str) -> Dataset {
    match try_filter(data, expression) {
        Ok(filtered) => filtered,
        Err(e) => {
            let rewritten =
                rewrite_expression(&substitute_current_values(data, expression), data.headers());
            warn!(
                original = expression,
                rewritten = %rewritten,
                error = %e,
                "could not apply filter, using unfiltered data"
            );
            data.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data() -> Dataset {
        Dataset::from_csv_str(
            "Die,Voltage [V],Current (A),Temp-C,Limit\n\
             Die 1,1.0,0.5,25,0.6\n\
             Die 2,2.0,0.7,25,0.6\n\
             Die 10,3.0,0.9,85,0.6\n\
             Die 2,,0.4,85,0.6\n",
        )
        .unwrap()
    }

    #[test]
    fn test_safe_alias() {
        assert_eq!(safe_alias("Voltage [V]"), "fCpVoltage_V");
        assert_eq!(safe_alias("Current (A)"), "fCpCurrent_A");
        assert_eq!(safe_alias("a.b-c/d"), "fCpadotb_c_d");
        assert_eq!(safe_alias("50% @max"), "fCp50percent_atmax");
    }

    #[test]
    fn test_alias_collision() {
        let data = Dataset::from_csv_str("a b,a_b,c\n1,2,x\n3,4,y\n").unwrap();
        assert!(matches!(
            try_filter(&data, "a b > 1"),
            Err(FacetError::FilterEval(_))
        ));
        // falls back to the unfiltered rows
        assert_eq!(filter(&data, "a_b > 2").n_rows(), 2);
        assert_eq!(try_filter(&data, "c == 'y'").unwrap().n_rows(), 1);
    }

    #[test]
    fn test_rewrite() {
        let headers = make_data().headers().to_vec();
        assert_eq!(
            rewrite_expression("Voltage [V] > 1 & Die in ['Die 1']", &headers),
            "fCpVoltage_V > 1 & fCpDie in ['Die 1']"
        );
        assert_eq!(
            rewrite_expression("(Current (A) < Limit)", &headers),
            "(fCpCurrent_A < fCpLimit)"
        );
    }

    #[test]
    fn test_filter_special_names() {
        let data = make_data();
        let out = filter(&data, "Voltage [V] >= 2 & Temp-C == 25");
        assert_eq!(out.n_rows(), 1);
        assert_eq!(out.value(0, "Die"), Some(&Value::Text("Die 2".into())));
        assert_eq!(out.headers(), data.headers());
    }

    #[test]
    fn test_membership() {
        let data = make_data();
        assert_eq!(filter(&data, "Die in ['Die 1', 'Die 10']").n_rows(), 2);
        assert_eq!(filter(&data, "Die not in [Die 2]").n_rows(), 2);
    }

    #[test]
    fn test_or_and_parentheses() {
        let data = make_data();
        let out = filter(&data, "(Die == 'Die 1' | Die == 'Die 10') & Temp-C > 30");
        assert_eq!(out.n_rows(), 1);
        assert_eq!(out.numeric_values("Voltage [V]"), vec![3.0]);
    }

    #[test]
    fn test_column_to_column() {
        let data = make_data();
        let out = filter(&data, "Current (A) > Limit");
        assert_eq!(out.numeric_values("Current (A)"), vec![0.7, 0.9]);
    }

    #[test]
    fn test_missing_values_never_match() {
        let data = make_data();
        assert_eq!(filter(&data, "Voltage [V] > 0").n_rows(), 3);
        assert_eq!(filter(&data, "Voltage [V] != 1").n_rows(), 3);
    }

    #[test]
    fn test_current_value_substitution() {
        let data = make_data();
        let out = filter(&data, "Current (A) > @Current (A)@");
        assert_eq!(out.n_rows(), 2);
    }

    #[test]
    fn test_bad_expression_falls_back() {
        let data = make_data();
        assert!(try_filter(&data, "Voltage [V] >>> 2").is_err());
        let out = filter(&data, "Voltage [V] >>> 2");
        assert_eq!(out, data);

        let err = try_filter(&data, "Nope == 1").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let data = make_data();
        let out = try_filter(&data, "Temp-C > 1000").unwrap();
        assert!(out.is_empty());
        assert_eq!(out.headers(), data.headers());
    }

    #[test]
    fn test_date_comparison() {
        let data = Dataset::from_csv_str("t,v\n2024-01-01,1\n2024-02-01,2\n").unwrap();
        let data = data.coerce_numeric_or_date("t").unwrap();
        let out = filter(&data, "t >= '2024-01-15'");
        assert_eq!(out.numeric_values("v"), vec![2.0]);
    }

    #[test]
    fn test_idempotent() {
        let data = make_data();
        let once = filter(&data, "Temp-C == 85");
        let twice = filter(&once, "Temp-C == 85");
        assert_eq!(once, twice);
    }
}
