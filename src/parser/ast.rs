// Abstract syntax tree for filter expressions

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Right-hand side of a comparison, or one entry of an `in [...]` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Text(String),
    /// Another column, by (aliased) name.
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        column: String,
        op: CmpOp,
        operand: Operand,
    },
    Membership {
        column: String,
        values: Vec<Operand>,
        negated: bool,
    },
}

impl Expr {
    /// Every column name the expression reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Expr::And(a, b) | Expr::Or(a, b) => {
                let mut out = a.columns();
                out.extend(b.columns());
                out
            }
            Expr::Compare { column, operand, .. } => match operand {
                Operand::Column(other) => vec![column.as_str(), other.as_str()],
                _ => vec![column.as_str()],
            },
            Expr::Membership { column, .. } => vec![column.as_str()],
        }
    }
}
