use super::Value;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,

    // Comparison
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,

    // Logical, short-circuiting
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Binding power used by the parser and by `Display` to place parentheses.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal | BinaryOp::NotEqual => 3,
            BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual => 4,
            BinaryOp::Add | BinaryOp::Subtract => 5,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => 6,
        }
    }
}

/// Parsed form of a component's expression property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    // Leaf nodes
    Literal(Value),
    Variable(String),

    // Access
    Member(Box<Expression>, String),
    Index(Box<Expression>, Box<Expression>),

    // Operators
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Conditional(Box<Expression>, Box<Expression>, Box<Expression>),

    Array(Vec<Expression>),
}

impl Expression {
    /// An expression can be assigned to when it is a variable or a path rooted at one.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expression::Variable(_) => true,
            Expression::Member(base, _) | Expression::Index(base, _) => base.is_assignable(),
            _ => false,
        }
    }

    /// Name of the variable an assignable path is rooted at.
    pub fn root_variable(&self) -> Option<&str> {
        match self {
            Expression::Variable(name) => Some(name),
            Expression::Member(base, _) | Expression::Index(base, _) => base.root_variable(),
            _ => None,
        }
    }

    /// Gathers every variable referenced by the expression.
    pub fn collect_variables(&self, variables: &mut BTreeSet<String>) {
        match self {
            Expression::Variable(name) => {
                variables.insert(name.clone());
            }
            Expression::Member(base, _) => base.collect_variables(variables),
            Expression::Index(base, index) => {
                base.collect_variables(variables);
                index.collect_variables(variables);
            }
            Expression::Unary(_, operand) => operand.collect_variables(variables),
            Expression::Binary(_, l, r) => {
                l.collect_variables(variables);
                r.collect_variables(variables);
            }
            Expression::Conditional(c, t, e) => {
                c.collect_variables(variables);
                t.collect_variables(variables);
                e.collect_variables(variables);
            }
            Expression::Array(items) => items.iter().for_each(|i| i.collect_variables(variables)),
            Expression::Literal(_) => {}
        }
    }

    /// True when the expression references no variables at all.
    pub fn is_constant(&self) -> bool {
        let mut variables = BTreeSet::new();
        self.collect_variables(&mut variables);
        variables.is_empty()
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Conditional(..) => 0,
            Expression::Binary(op, ..) => op.precedence(),
            Expression::Unary(..) => 7,
            _ => 8,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => write!(f, "\"{}\"", s.escape_default()),
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Member(base, field) => {
                base.fmt_operand(f, 8)?;
                write!(f, ".{}", field)
            }
            Expression::Index(base, index) => {
                base.fmt_operand(f, 8)?;
                write!(f, "[{}]", index)
            }
            Expression::Unary(op, operand) => {
                write!(f, "{}", if *op == UnaryOp::Not { "!" } else { "-" })?;
                operand.fmt_operand(f, 7)
            }
            Expression::Binary(op, l, r) => {
                let p = op.precedence();
                l.fmt_operand(f, p)?;
                write!(f, " {} ", op.symbol())?;
                r.fmt_operand(f, p + 1)
            }
            Expression::Conditional(c, t, e) => {
                c.fmt_operand(f, 1)?;
                write!(f, " ? {} : {}", t, e)
            }
            Expression::Array(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}
