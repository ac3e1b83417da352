//! Message selector evaluation for the in-memory broker.
//!
//! Supports conjunctions of property comparisons:
//! `HEADER_KEY <= 2 AND region = 'emea'`. Operators are `=`, `<>`, `<`,
//! `<=`, `>` and `>=`; literals are integers, floats, single-quoted strings
//! (with `''` as an escaped quote), and `TRUE`/`FALSE`. A comparison against
//! a missing property is false.

use crate::endpoint::{
    domain::{Message, PropertyValue},
    ports::{BrokerError, BrokerResult},
};
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// A parsed selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    clauses: Vec<Comparison>,
}

#[derive(Debug, Clone, PartialEq)]
struct Comparison {
    property: String,
    operator: Operator,
    literal: Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Ge => !matches!(ordering, Ordering::Less),
        }
    }

    const fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Operator(Operator),
    Literal(Literal),
    And,
}

impl Selector {
    /// Parses a selector expression.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidSelector`] for empty or malformed
    /// expressions.
    pub fn parse(expression: &str) -> BrokerResult<Self> {
        let tokens = tokenize(expression)
            .map_err(|reason| BrokerError::invalid_selector(expression, reason))?;
        let clauses = parse_clauses(tokens)
            .map_err(|reason| BrokerError::invalid_selector(expression, reason))?;
        Ok(Self {
            source: expression.to_owned(),
            clauses,
        })
    }

    /// Returns the selector text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` when every comparison holds for `message`.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        self.clauses.iter().all(|clause| clause.holds(message))
    }
}

impl Comparison {
    fn holds(&self, message: &Message) -> bool {
        let Some(value) = message.property(&self.property) else {
            return false;
        };
        compare(value, &self.literal)
            .filter(|_| self.operator.is_equality() || is_ordered(&self.literal))
            .is_some_and(|ordering| self.operator.accepts(ordering))
    }
}

const fn is_ordered(literal: &Literal) -> bool {
    matches!(literal, Literal::Int(_) | Literal::Float(_))
}

#[expect(
    clippy::cast_precision_loss,
    reason = "selector comparisons between integer and float operands are approximate"
)]
fn compare(value: &PropertyValue, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (PropertyValue::Int(lhs), Literal::Int(rhs)) => Some(lhs.cmp(rhs)),
        (PropertyValue::Int(lhs), Literal::Float(rhs)) => (*lhs as f64).partial_cmp(rhs),
        (PropertyValue::Float(lhs), Literal::Int(rhs)) => lhs.partial_cmp(&(*rhs as f64)),
        (PropertyValue::Float(lhs), Literal::Float(rhs)) => lhs.partial_cmp(rhs),
        (PropertyValue::String(lhs), Literal::String(rhs)) => Some(lhs.as_str().cmp(rhs.as_str())),
        (PropertyValue::Bool(lhs), Literal::Bool(rhs)) => Some(lhs.cmp(rhs)),
        _ => None,
    }
}

fn parse_clauses(tokens: Vec<Token>) -> Result<Vec<Comparison>, String> {
    let mut clauses = Vec::new();
    let mut tokens = tokens.into_iter();
    loop {
        let property = match tokens.next() {
            Some(Token::Identifier(name)) => name,
            Some(other) => return Err(format!("expected property name, found {other:?}")),
            None => return Err("expected property name".to_owned()),
        };
        let operator = match tokens.next() {
            Some(Token::Operator(operator)) => operator,
            _ => return Err(format!("expected comparison operator after '{property}'")),
        };
        let literal = match tokens.next() {
            Some(Token::Literal(literal)) => literal,
            _ => return Err(format!("expected literal after '{property}'")),
        };
        clauses.push(Comparison {
            property,
            operator,
            literal,
        });

        match tokens.next() {
            None => return Ok(clauses),
            Some(Token::And) => {}
            Some(other) => return Err(format!("expected AND, found {other:?}")),
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();
    while let Some(&next) = chars.peek() {
        match next {
            c if c.is_whitespace() => {
                chars.next();
            }
            '\'' => {
                chars.next();
                tokens.push(Token::Literal(Literal::String(read_string(&mut chars)?)));
            }
            '=' | '<' | '>' => tokens.push(Token::Operator(read_operator(&mut chars))),
            c if c.is_ascii_digit() || c == '-' => {
                tokens.push(Token::Literal(read_number(&mut chars)?));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let word = read_word(&mut chars);
                tokens.push(match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "TRUE" => Token::Literal(Literal::Bool(true)),
                    "FALSE" => Token::Literal(Literal::Bool(false)),
                    _ => Token::Identifier(word),
                });
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    if tokens.is_empty() {
        return Err("selector is empty".to_owned());
    }
    Ok(tokens)
}

fn read_string(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    let mut text = String::new();
    while let Some(c) = chars.next() {
        if c != '\'' {
            text.push(c);
            continue;
        }
        if chars.peek() == Some(&'\'') {
            chars.next();
            text.push('\'');
        } else {
            return Ok(text);
        }
    }
    Err("unterminated string literal".to_owned())
}

fn read_operator(chars: &mut Peekable<Chars<'_>>) -> Operator {
    let first = chars.next();
    let second = chars.peek().copied();
    let (operator, consumed) = match (first, second) {
        (Some('<'), Some('>')) => (Operator::Ne, true),
        (Some('<'), Some('=')) => (Operator::Le, true),
        (Some('>'), Some('=')) => (Operator::Ge, true),
        (Some('<'), _) => (Operator::Lt, false),
        (Some('>'), _) => (Operator::Gt, false),
        _ => (Operator::Eq, false),
    };
    if consumed {
        chars.next();
    }
    operator
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> Result<Literal, String> {
    let mut text = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' || (c == '-' && text.is_empty()) {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if text.contains('.') {
        text.parse()
            .map(Literal::Float)
            .map_err(|err| format!("invalid number '{text}': {err}"))
    } else {
        text.parse()
            .map(Literal::Int)
            .map_err(|err| format!("invalid number '{text}': {err}"))
    }
}

fn read_word(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || matches!(c, '_' | '$' | '.') {
            word.push(c);
            chars.next();
        } else {
            break;
        }
    }
    word
}
