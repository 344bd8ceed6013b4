//! Numeric-aware ("natural") ordering: `"Die 2"` sorts before `"Die 10"`.

use crate::data::Value;
use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;

    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                out.push(make_chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(prev) = in_digits {
        out.push(make_chunk(&s[start..], prev));
    }
    out
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(s)
    } else {
        Chunk::Text(s)
    }
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Compare two strings treating runs of ASCII digits as integers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);

    for (x, y) in ca.iter().zip(cb.iter()) {
        let ord = match (x, y) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len())
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::Date(_) => 1,
        Value::Text(_) => 2,
        Value::Missing => 3,
    }
}

/// Total order over cell values: numbers, then dates, then text (natural), then missing.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => natural_cmp(x, y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Lexicographic comparison of value tuples.
pub fn key_cmp(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = value_cmp(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Sort strings in natural order.
pub fn natsorted<S: AsRef<str> + Clone>(items: &[S]) -> Vec<S> {
    let mut out = items.to_vec();
    out.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_die_order() {
        let sorted = natsorted(&["Die 10", "Die 2", "Die 1"]);
        assert_eq!(sorted, vec!["Die 1", "Die 2", "Die 10"]);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Greater);
        assert_eq!(natural_cmp("a007", "a8"), Ordering::Less);
        assert_eq!(natural_cmp("x", "x"), Ordering::Equal);
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(natural_cmp("Die", "Die 1"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_value_ranks() {
        let mut vals = vec![
            Value::Missing,
            Value::Text("b".into()),
            Value::Number(3.0),
            Value::Number(-1.0),
        ];
        vals.sort_by(value_cmp);
        assert_eq!(
            vals,
            vec![
                Value::Number(-1.0),
                Value::Number(3.0),
                Value::Text("b".into()),
                Value::Missing
            ]
        );
    }

    #[test]
    fn test_key_cmp_tuples() {
        let a = [Value::Text("Die 2".into()), Value::Number(10.0)];
        let b = [Value::Text("Die 10".into()), Value::Number(1.0)];
        assert_eq!(key_cmp(&a, &b), Ordering::Less);
    }
}
