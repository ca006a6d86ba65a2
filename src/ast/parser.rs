//! Parser for the expression language used by component properties.
//!
//! The grammar is a small script-like subset: literals, variables, member and
//! index access, unary `!`/`-`, arithmetic, comparison, `&&`/`||` and `?:`.

use super::{BinaryOp, Expression, UnaryOp, Value};
use crate::error::EvaluationError;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Value),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "<>", "&&", "||", "<", ">", "+", "-", "*", "/", "%",
    "!", "?", ":", "(", ")", "[", "]", ".", ",",
];

/// Parses an expression string into an `Expression`.
pub fn parse(source: &str) -> Result<Expression, EvaluationError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expression = parser.parse_conditional()?;
    match parser.peek() {
        Token::Eof => Ok(expression),
        other => Err(parser.error(format!("unexpected token {:?}", other))),
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, EvaluationError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch.is_ascii_digit() {
            tokens.push((start, lex_number(source, &mut chars)?));
        } else if ch == '"' || ch == '\'' {
            tokens.push((start, lex_string(source, &mut chars, ch)?));
        } else if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' || c == '$' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((start, Token::Ident(source[start..end].to_string())));
        } else {
            let rest = &source[start..];
            let punct = PUNCTUATION
                .iter()
                .find(|p| rest.starts_with(**p))
                .ok_or_else(|| EvaluationError::Parse {
                    expression: source.to_string(),
                    position: start,
                    message: format!("unexpected character '{}'", ch),
                })?;
            for _ in 0..punct.len() {
                chars.next();
            }
            tokens.push((start, Token::Punct(punct)));
        }
    }

    tokens.push((source.len(), Token::Eof));
    Ok(tokens)
}

fn lex_number(
    source: &str,
    chars: &mut Peekable<CharIndices<'_>>,
) -> Result<Token, EvaluationError> {
    let start = chars.peek().map(|&(i, _)| i).unwrap_or(source.len());
    let mut end = start;
    let mut is_double = false;
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() || (c == '.' && !is_double) {
            is_double |= c == '.';
            end = i + 1;
            chars.next();
        } else {
            break;
        }
    }
    let text = &source[start..end];
    let invalid = |_| EvaluationError::Parse {
        expression: source.to_string(),
        position: start,
        message: format!("invalid number literal '{}'", text),
    };
    if is_double {
        text.parse::<f64>()
            .map(|d| Token::Number(Value::Double(d)))
            .map_err(|e| invalid(e.to_string()))
    } else {
        text.parse::<i64>()
            .map(|i| Token::Number(Value::Integer(i)))
            .map_err(|e| invalid(e.to_string()))
    }
}

fn lex_string(
    source: &str,
    chars: &mut Peekable<CharIndices<'_>>,
    quote: char,
) -> Result<Token, EvaluationError> {
    let (start, _) = chars.next().unwrap_or((source.len(), quote));
    let mut text = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, escaped)) => text.push(escaped),
                None => break,
            },
            c if c == quote => return Ok(Token::Str(text)),
            c => text.push(c),
        }
    }
    Err(EvaluationError::Parse {
        expression: source.to_string(),
        position: start,
        message: "unterminated string literal".to_string(),
    })
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|(_, t)| t)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), EvaluationError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", punct)))
        }
    }

    fn error(&self, message: String) -> EvaluationError {
        let position = self
            .tokens
            .get(self.pos)
            .map(|(p, _)| *p)
            .unwrap_or(self.source.len());
        EvaluationError::Parse {
            expression: self.source.to_string(),
            position,
            message,
        }
    }

    fn parse_conditional(&mut self) -> Result<Expression, EvaluationError> {
        let condition = self.parse_binary(1)?;
        if !self.eat("?") {
            return Ok(condition);
        }
        let then = self.parse_conditional()?;
        self.expect(":")?;
        let otherwise = self.parse_conditional()?;
        Ok(Expression::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn peek_binary(&self) -> Option<BinaryOp> {
        let Token::Punct(p) = self.peek() else {
            return None;
        };
        Some(match *p {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Remainder,
            "==" | "===" => BinaryOp::Equal,
            "!=" | "!==" | "<>" => BinaryOp::NotEqual,
            "<" => BinaryOp::Less,
            "<=" => BinaryOp::LessOrEqual,
            ">" => BinaryOp::Greater,
            ">=" => BinaryOp::GreaterOrEqual,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expression, EvaluationError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek_binary() {
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(op.precedence() + 1)?;
            left = Expression::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, EvaluationError> {
        if self.eat("!") {
            return Ok(Expression::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat("-") {
            return Ok(match self.parse_unary()? {
                Expression::Literal(Value::Integer(i)) => Expression::Literal(Value::Integer(-i)),
                Expression::Literal(Value::Double(d)) => Expression::Literal(Value::Double(-d)),
                operand => Expression::Unary(UnaryOp::Negate, Box::new(operand)),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, EvaluationError> {
        let mut expression = self.parse_primary()?;
        loop {
            if self.eat(".") {
                match self.advance() {
                    Token::Ident(field) => {
                        expression = Expression::Member(Box::new(expression), field);
                    }
                    _ => return Err(self.error("expected a field name after '.'".to_string())),
                }
            } else if self.eat("[") {
                let index = self.parse_conditional()?;
                self.expect("]")?;
                expression = Expression::Index(Box::new(expression), Box::new(index));
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, EvaluationError> {
        match self.advance() {
            Token::Number(v) => Ok(Expression::Literal(v)),
            Token::Str(s) => Ok(Expression::Literal(Value::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expression::Literal(Value::Boolean(true)),
                "false" => Expression::Literal(Value::Boolean(false)),
                "null" => Expression::Literal(Value::Null),
                "undefined" => Expression::Literal(Value::Undefined),
                _ => Expression::Variable(name),
            }),
            Token::Punct("(") => {
                let inner = self.parse_conditional()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => {
                let mut items = Vec::new();
                if !self.eat("]") {
                    loop {
                        items.push(self.parse_conditional()?);
                        if self.eat("]") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Expression::Array(items))
            }
            Token::Eof => {
                self.pos -= 1;
                Err(self.error("unexpected end of expression".to_string()))
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected token {:?}", other)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_operator_precedence() {
        let expr = parse("1 + 2 * 3 > 6 && !done").unwrap();
        assert_eq!(expr.to_string(), "1 + 2 * 3 > 6 && !done");
        let Expression::Binary(BinaryOp::And, left, _) = expr else {
            panic!("expected && at the root");
        };
        assert!(matches!(*left, Expression::Binary(BinaryOp::Greater, ..)));
    }

    #[test]
    fn parses_member_and_index_paths() {
        let expr = parse("settings.channels[2].voltage").unwrap();
        assert!(expr.is_assignable());
        assert_eq!(expr.root_variable(), Some("settings"));
    }

    #[test]
    fn parses_strings_and_conditionals() {
        let expr = parse("ok ? 'yes' : \"no\"").unwrap();
        assert!(matches!(expr, Expression::Conditional(..)));
        assert!(!expr.is_assignable());
    }

    #[test]
    fn reports_error_position() {
        let err = parse("a + * b").unwrap_err();
        match err {
            EvaluationError::Parse { position, .. } => assert_eq!(position, 4),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(parse("'open").is_err());
        assert!(parse("a b").is_err());
    }
}
