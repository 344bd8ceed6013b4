// Boolean filter expression grammar
//
//   expr       := and_expr ( '|' and_expr )*
//   and_expr   := unary ( '&' unary )*
//   unary      := '(' expr ')' | membership | comparison
//   membership := ident [ 'not' ] 'in' '[' item ( ',' item )* ']'
//   comparison := ident op operand

use super::ast::{CmpOp, Expr, Operand};
use super::lexer::{identifier, keyword, number_literal, string_literal, ws};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::char,
    combinator::{eof, map, opt, value},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded},
    IResult,
};

fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    alt((
        value(CmpOp::Le, tag("<=")),
        value(CmpOp::Ge, tag(">=")),
        value(CmpOp::Eq, tag("==")),
        value(CmpOp::Ne, tag("!=")),
        value(CmpOp::Lt, tag("<")),
        value(CmpOp::Gt, tag(">")),
    ))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(number_literal, Operand::Number),
        map(string_literal, Operand::Text),
        map(identifier, Operand::Column),
    ))(input)
}

/// List entries: numbers, quoted strings, or bare words (taken as text).
fn list_item(input: &str) -> IResult<&str, Operand> {
    alt((
        map(number_literal, Operand::Number),
        map(string_literal, Operand::Text),
        map(is_not(",]"), |s: &str| Operand::Text(s.trim().to_string())),
    ))(input)
}

fn membership(input: &str) -> IResult<&str, Expr> {
    let (input, column) = ws(identifier)(input)?;
    let (input, negated) = map(opt(ws(keyword("not"))), |n| n.is_some())(input)?;
    let (input, _) = ws(keyword("in"))(input)?;
    let (input, values) = delimited(
        ws(char('[')),
        separated_list0(ws(char(',')), ws(list_item)),
        ws(char(']')),
    )(input)?;

    Ok((
        input,
        Expr::Membership {
            column,
            values,
            negated,
        },
    ))
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, column) = ws(identifier)(input)?;
    let (input, op) = ws(cmp_op)(input)?;
    let (input, operand) = ws(operand)(input)?;
    Ok((input, Expr::Compare { column, op, operand }))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        membership,
        comparison,
    ))(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(ws(char('&')), unary))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, e| Expr::And(Box::new(acc), Box::new(e)));
    Ok((input, expr))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(char('|')), and_expr))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, e| Expr::Or(Box::new(acc), Box::new(e)));
    Ok((input, expr))
}

/// Parse a complete filter expression; trailing input is an error.
pub fn parse_filter(input: &str) -> IResult<&str, Expr> {
    let (input, expr) = or_expr(input)?;
    let (input, _) = ws(eof)(input)?;
    Ok((input, expr))
}
