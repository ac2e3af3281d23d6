//! Recursive-descent parser for `+ - * /` expressions with parentheses.

use thiserror::Error;

use super::{ExpressionNode, Operator};

/// Deepest parenthesis nesting accepted.
pub const MAX_NESTING: usize = 64;

/// Most operators accepted in one expression.
///
/// Operator chains build a left-leaning tree, so this also bounds the tree
/// depth every recursive walk has to go through.
pub const MAX_OPERATORS: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Expression is empty")]
    Empty,

    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Malformed number '{text}' at position {pos}")]
    MalformedNumber { text: String, pos: usize },

    #[error("Expected a number or '(' at position {pos}")]
    ExpectedOperand { pos: usize },

    #[error("Missing closing parenthesis for '(' at position {pos}")]
    UnclosedParen { pos: usize },

    #[error("Unexpected trailing input at position {pos}")]
    TrailingInput { pos: usize },

    #[error("Parentheses nested deeper than {limit} at position {pos}")]
    TooDeep { limit: usize, pos: usize },

    #[error("More than {limit} operators (at position {pos})")]
    TooManyOperators { limit: usize, pos: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(Operator),
    LParen,
    RParen,
}

/// Parse an expression string into a tree.
///
/// Whitespace is ignored. `*` and `/` bind tighter than `+` and `-`; all
/// operators are left-associative. Unary minus is not accepted.
pub fn parse(text: &str) -> Result<ExpressionNode, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
        operators: 0,
    };
    let node = parser.expr()?;
    if let Some((_, pos)) = parser.peek() {
        return Err(ParseError::TrailingInput { pos });
    }
    Ok(node)
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        if ch.is_ascii_digit() || ch == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse::<f64>()
                .map_err(|_| ParseError::MalformedNumber {
                    text: literal.clone(),
                    pos: start,
                })?;
            tokens.push((Token::Number(value), start));
            continue;
        }
        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => match Operator::from_symbol(ch) {
                Some(op) => Token::Op(op),
                None => return Err(ParseError::UnexpectedChar { ch, pos: i }),
            },
        };
        tokens.push((token, i));
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
    /// Currently open parentheses
    depth: usize,
    /// Operators consumed so far
    operators: usize,
}

impl Parser {
    fn peek(&self) -> Option<(Token, usize)> {
        self.tokens.get(self.index).copied()
    }

    /// Position reported when input runs out.
    fn end_pos(&self) -> usize {
        self.tokens.last().map(|(_, pos)| pos + 1).unwrap_or(0)
    }

    fn peek_op(&self, accepted: &[Operator]) -> Option<Operator> {
        match self.peek() {
            Some((Token::Op(op), _)) if accepted.contains(&op) => Some(op),
            _ => None,
        }
    }

    /// Consume the operator token under the cursor.
    fn take_op(&mut self) -> Result<(), ParseError> {
        let pos = self.peek().map(|(_, pos)| pos).unwrap_or(0);
        self.index += 1;
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(ParseError::TooManyOperators {
                limit: MAX_OPERATORS,
                pos,
            });
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<ExpressionNode, ParseError> {
        let mut node = self.term()?;
        while let Some(op) = self.peek_op(&[Operator::Add, Operator::Subtract]) {
            self.take_op()?;
            let rhs = self.term()?;
            node = ExpressionNode::binary(op, node, rhs);
        }
        Ok(node)
    }

    fn term(&mut self) -> Result<ExpressionNode, ParseError> {
        let mut node = self.factor()?;
        while let Some(op) = self.peek_op(&[Operator::Multiply, Operator::Divide]) {
            self.take_op()?;
            let rhs = self.factor()?;
            node = ExpressionNode::binary(op, node, rhs);
        }
        Ok(node)
    }

    fn factor(&mut self) -> Result<ExpressionNode, ParseError> {
        match self.peek() {
            Some((Token::Number(value), _)) => {
                self.index += 1;
                Ok(ExpressionNode::Literal(value))
            }
            Some((Token::LParen, open_pos)) => {
                if self.depth == MAX_NESTING {
                    return Err(ParseError::TooDeep {
                        limit: MAX_NESTING,
                        pos: open_pos,
                    });
                }
                self.index += 1;
                self.depth += 1;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.peek() {
                    Some((Token::RParen, _)) => {
                        self.index += 1;
                        Ok(inner)
                    }
                    _ => Err(ParseError::UnclosedParen { pos: open_pos }),
                }
            }
            Some((_, pos)) => Err(ParseError::ExpectedOperand { pos }),
            None => Err(ParseError::ExpectedOperand { pos: self.end_pos() }),
        }
    }
}
