//! Arithmetic expression trees.
//!
//! An expression is parsed once into an [`ExpressionNode`] tree and then only
//! read: the orchestrator walks it to emit one task per operator node.
//!
//! # Invariants
//! - Every `Binary` node owns exactly two children
//! - A tree without `Binary` nodes is a single literal

mod parser;

pub use parser::{parse, ParseError, MAX_NESTING, MAX_OPERATORS};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    /// All operators, in symbol order `+ - * /`.
    pub const ALL: [Operator; 4] = [
        Operator::Add,
        Operator::Subtract,
        Operator::Multiply,
        Operator::Divide,
    ];

    /// Map a symbol character to an operator.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    /// Apply the operator with IEEE-754 semantics.
    ///
    /// Division by zero is not special-cased: it yields `inf`, `-inf` or `NaN`.
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Subtract => lhs - rhs,
            Operator::Multiply => lhs * rhs,
            Operator::Divide => lhs / rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A node of a parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// A numeric literal.
    Literal(f64),
    /// An operator applied to two sub-expressions.
    Binary {
        op: Operator,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
}

impl ExpressionNode {
    pub fn binary(op: Operator, left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate the tree directly, in-process.
    ///
    /// This is the reference value the distributed path must agree with.
    pub fn evaluate(&self) -> f64 {
        match self {
            ExpressionNode::Literal(value) => *value,
            ExpressionNode::Binary { op, left, right } => op.apply(left.evaluate(), right.evaluate()),
        }
    }

    /// Number of operator nodes, i.e. the number of tasks the tree produces.
    pub fn operator_count(&self) -> usize {
        match self {
            ExpressionNode::Literal(_) => 0,
            ExpressionNode::Binary { left, right, .. } => {
                1 + left.operator_count() + right.operator_count()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_symbols_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(Operator::from_symbol('^'), None);
    }

    #[test]
    fn operator_serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&Operator::Multiply).unwrap(), "\"*\"");
        let op: Operator = serde_json::from_str("\"/\"").unwrap();
        assert_eq!(op, Operator::Divide);
        assert!(serde_json::from_str::<Operator>("\"^\"").is_err());
    }

    #[test]
    fn division_by_zero_is_not_finite() {
        assert!(Operator::Divide.apply(1.0, 0.0).is_infinite());
        assert!(Operator::Divide.apply(0.0, 0.0).is_nan());
    }

    #[test]
    fn counts_operator_nodes() {
        let tree = ExpressionNode::binary(
            Operator::Multiply,
            ExpressionNode::binary(
                Operator::Add,
                ExpressionNode::Literal(2.0),
                ExpressionNode::Literal(3.0),
            ),
            ExpressionNode::Literal(4.0),
        );
        assert_eq!(tree.operator_count(), 2);
        assert_eq!(tree.evaluate(), 20.0);
        assert_eq!(ExpressionNode::Literal(7.0).operator_count(), 0);
    }
}
