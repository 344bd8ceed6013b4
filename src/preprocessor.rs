use crate::data::Dataset;
use std::iter::Peekable;
use std::str::Chars;

const KEY: char = '@';

/// Replace every `@column@` span in `text` with that column's value in the first row.
///
/// Unknown columns (and columns of an empty dataset) substitute as the empty string.
/// A lone `@` with no closing partner is kept literally.
pub fn substitute_current_values(data: &Dataset, text: &str) -> String {
    if !text.contains(KEY) {
        return text.to_string();
    }

    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != KEY {
            output.push(c);
            continue;
        }
        match consume_until_key(&mut chars) {
            Some(name) => output.push_str(&current_value(data, &name)),
            None => {
                // no closing key, so the remainder is literal
                output.push(KEY);
                output.push_str(&chars.by_ref().collect::<String>());
            }
        }
    }

    output
}

/// Consume characters up to (and including) the next key. Returns `None`, leaving the
/// iterator untouched, if no closing key exists.
fn consume_until_key(chars: &mut Peekable<Chars>) -> Option<String> {
    let rest: String = chars.clone().collect();
    let end = rest.find(KEY)?;
    let name = rest[..end].to_string();
    for _ in 0..=name.chars().count() {
        chars.next();
    }
    Some(name)
}

fn current_value(data: &Dataset, column: &str) -> String {
    data.value(0, column)
        .map(|v| v.to_string())
        .unwrap_or_default()
}
