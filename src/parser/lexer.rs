// Token-level parsers shared by the filter grammar

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair, terminated},
    IResult,
};

/// Wrap a parser so it skips leading whitespace.
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Column alias or bare word: letters, digits and underscores, not starting with a digit.
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            many0(satisfy(is_ident_char)),
        )),
        |s: &str| s.to_string(),
    )(input)
}

fn escaped_body<'a>(stop: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    map(
        opt(escaped_transform(
            is_not(stop),
            '\\',
            alt((
                value("\\", tag("\\")),
                value("\"", tag("\"")),
                value("'", tag("'")),
            )),
        )),
        Option::unwrap_or_default,
    )
}

fn double_quoted(input: &str) -> IResult<&str, String> {
    delimited(char('"'), escaped_body("\"\\"), char('"'))(input)
}

fn single_quoted(input: &str) -> IResult<&str, String> {
    delimited(char('\''), escaped_body("'\\"), char('\''))(input)
}

/// Single- or double-quoted string with backslash escapes.
pub fn string_literal(input: &str) -> IResult<&str, String> {
    alt((double_quoted, single_quoted))(input)
}

/// Match a keyword that is not the prefix of a longer word.
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(kw), not(peek(satisfy(is_ident_char))))
}

/// Floating point literal that is not the prefix of a word (`2nd` is not a number).
pub fn number_literal(input: &str) -> IResult<&str, f64> {
    terminated(double, not(peek(satisfy(is_ident_char))))(input)
}
