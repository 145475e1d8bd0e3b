//! Safe evaluation of constant expressions.
//!
//! Only the subset of PHP that can appear in a constant initializer is
//! understood: literals, arrays, operators, casts and references to other
//! constants. Anything else (calls, class constants, interpolation) is an
//! [`EvalError`] rather than a guess.

use smol_str::SmolStr;
use thiserror::Error;

use super::value::{ArrayKey, Number, Value};
use crate::syntax::{Token, TokenKind, tokenize_code};

/// Why a constant expression could not be evaluated.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected `{0}`")]
    Unexpected(SmolStr),

    #[error("undefined constant `{0}`")]
    UndefinedConstant(SmolStr),

    #[error("unsupported operand types: {left} {op} {right}")]
    UnsupportedOperands {
        left: &'static str,
        op: &'static str,
        right: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0} cannot be evaluated in a constant expression")]
    Unsupported(SmolStr),
}

/// Evaluate a token run. `lookup` resolves references to other constants.
pub fn evaluate<F>(tokens: &[Token], lookup: F) -> Result<Value, EvalError>
where
    F: Fn(&str) -> Option<Value>,
{
    let mut parser = Parser {
        tokens: tokens.iter().filter(|t| !t.is_trivia()).collect(),
        pos: 0,
        lookup,
    };
    let value = parser.expression(0)?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(EvalError::Unexpected(token.text.clone())),
    }
}

/// Evaluate standalone expression text such as a constant's raw source.
pub fn evaluate_source(source: &str) -> Result<Value, EvalError> {
    evaluate(&tokenize_code(source), |_| None)
}

// ============================================================================
// OPERATORS
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BinaryOp {
    LogicalOr,
    LogicalXor,
    LogicalAnd,
    Ternary,
    Coalesce,
    BooleanOr,
    BooleanAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Spaceship,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Concat,
    ShiftLeft,
    ShiftRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// Operand binding power of prefix operators: tighter than `*`, looser
/// than `**`.
const PREFIX_BP: u8 = 33;

impl BinaryOp {
    fn from_token(token: &Token) -> Option<Self> {
        let op = match token.kind {
            TokenKind::Question => Self::Ternary,
            TokenKind::Coalesce => Self::Coalesce,
            TokenKind::BooleanOr => Self::BooleanOr,
            TokenKind::BooleanAnd => Self::BooleanAnd,
            TokenKind::Pipe => Self::BitOr,
            TokenKind::Caret => Self::BitXor,
            TokenKind::Ampersand => Self::BitAnd,
            TokenKind::Equal => Self::Equal,
            TokenKind::NotEqual => Self::NotEqual,
            TokenKind::Identical => Self::Identical,
            TokenKind::NotIdentical => Self::NotIdentical,
            TokenKind::Spaceship => Self::Spaceship,
            TokenKind::Less => Self::Less,
            TokenKind::LessEqual => Self::LessEqual,
            TokenKind::Greater => Self::Greater,
            TokenKind::GreaterEqual => Self::GreaterEqual,
            TokenKind::Dot => Self::Concat,
            TokenKind::ShiftLeft => Self::ShiftLeft,
            TokenKind::ShiftRight => Self::ShiftRight,
            TokenKind::Plus => Self::Add,
            TokenKind::Minus => Self::Sub,
            TokenKind::Star => Self::Mul,
            TokenKind::Slash => Self::Div,
            TokenKind::Percent => Self::Mod,
            TokenKind::Pow => Self::Pow,
            TokenKind::Identifier if token.is_word("or") => Self::LogicalOr,
            TokenKind::Identifier if token.is_word("xor") => Self::LogicalXor,
            TokenKind::Identifier if token.is_word("and") => Self::LogicalAnd,
            _ => return None,
        };
        Some(op)
    }

    /// (left, right) binding power; right < left means right-associative.
    fn binding_power(self) -> (u8, u8) {
        match self {
            Self::LogicalOr => (1, 2),
            Self::LogicalXor => (3, 4),
            Self::LogicalAnd => (5, 6),
            Self::Ternary => (8, 7),
            Self::Coalesce => (10, 9),
            Self::BooleanOr => (11, 12),
            Self::BooleanAnd => (13, 14),
            Self::BitOr => (15, 16),
            Self::BitXor => (17, 18),
            Self::BitAnd => (19, 20),
            Self::Equal
            | Self::NotEqual
            | Self::Identical
            | Self::NotIdentical
            | Self::Spaceship => (21, 22),
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => (23, 24),
            Self::Concat => (25, 26),
            Self::ShiftLeft | Self::ShiftRight => (27, 28),
            Self::Add | Self::Sub => (29, 30),
            Self::Mul | Self::Div | Self::Mod => (31, 32),
            Self::Pow => (36, 35),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::LogicalOr => "or",
            Self::LogicalXor => "xor",
            Self::LogicalAnd => "and",
            Self::Ternary => "?:",
            Self::Coalesce => "??",
            Self::BooleanOr => "||",
            Self::BooleanAnd => "&&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Identical => "===",
            Self::NotIdentical => "!==",
            Self::Spaceship => "<=>",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Concat => ".",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }

    fn apply(self, left: Value, right: Value) -> Result<Value, EvalError> {
        let unsupported = |left: &Value, right: &Value| EvalError::UnsupportedOperands {
            left: left.type_name(),
            op: self.symbol(),
            right: right.type_name(),
        };
        let value = match self {
            Self::LogicalOr | Self::BooleanOr => Value::Bool(left.to_bool() || right.to_bool()),
            Self::LogicalAnd | Self::BooleanAnd => Value::Bool(left.to_bool() && right.to_bool()),
            Self::LogicalXor => Value::Bool(left.to_bool() ^ right.to_bool()),
            Self::Equal => Value::Bool(loose_equals(&left, &right)),
            Self::NotEqual => Value::Bool(!loose_equals(&left, &right)),
            Self::Identical => Value::Bool(left == right),
            Self::NotIdentical => Value::Bool(left != right),
            Self::Spaceship | Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => {
                let ordering = compare(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                match self {
                    Self::Spaceship => Value::Int(ordering as i64),
                    Self::Less => Value::Bool(ordering.is_lt()),
                    Self::LessEqual => Value::Bool(ordering.is_le()),
                    Self::Greater => Value::Bool(ordering.is_gt()),
                    _ => Value::Bool(ordering.is_ge()),
                }
            }
            Self::Concat => {
                let (Some(l), Some(r)) = (left.to_php_string(), right.to_php_string()) else {
                    return Err(unsupported(&left, &right));
                };
                Value::String(SmolStr::new(format!("{l}{r}")))
            }
            Self::Add => {
                if let (Value::Array(l), Value::Array(r)) = (&left, &right) {
                    let mut union = l.clone();
                    for (key, value) in r {
                        if !union.iter().any(|(k, _)| k == key) {
                            union.push((key.clone(), value.clone()));
                        }
                    }
                    return Ok(Value::Array(union));
                }
                let (a, b) = numbers(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                int_or_float(a, b, i64::checked_add, |x, y| x + y)
            }
            Self::Sub => {
                let (a, b) = numbers(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                int_or_float(a, b, i64::checked_sub, |x, y| x - y)
            }
            Self::Mul => {
                let (a, b) = numbers(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                int_or_float(a, b, i64::checked_mul, |x, y| x * y)
            }
            Self::Div => {
                let (a, b) = numbers(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                if b.as_f64() == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                match (a, b) {
                    (Number::Int(x), Number::Int(y)) if x.checked_rem(y) == Some(0) => {
                        Value::Int(x / y)
                    }
                    _ => Value::Float(a.as_f64() / b.as_f64()),
                }
            }
            Self::Mod => {
                let (a, b) = integers(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                Value::Int(a.checked_rem(b).unwrap_or(0))
            }
            Self::Pow => {
                let (a, b) = numbers(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                match (a, b) {
                    (Number::Int(x), Number::Int(y)) if y >= 0 => u32::try_from(y)
                        .ok()
                        .and_then(|y| x.checked_pow(y))
                        .map(Value::Int)
                        .unwrap_or_else(|| Value::Float((x as f64).powf(y as f64))),
                    _ => Value::Float(a.as_f64().powf(b.as_f64())),
                }
            }
            Self::BitOr | Self::BitXor | Self::BitAnd | Self::ShiftLeft | Self::ShiftRight => {
                let (a, b) = integers(&left, &right).ok_or_else(|| unsupported(&left, &right))?;
                match self {
                    Self::BitOr => Value::Int(a | b),
                    Self::BitXor => Value::Int(a ^ b),
                    Self::BitAnd => Value::Int(a & b),
                    _ if b < 0 => {
                        return Err(EvalError::Unsupported(SmolStr::new("bit shift by negative number")));
                    }
                    Self::ShiftLeft if b >= 64 => Value::Int(0),
                    Self::ShiftLeft => Value::Int(a.wrapping_shl(b as u32)),
                    _ if b >= 64 => Value::Int(if a < 0 { -1 } else { 0 }),
                    _ => Value::Int(a >> b),
                }
            }
            // short-circuiting operators are evaluated by the parser
            Self::Ternary | Self::Coalesce => {
                return Err(EvalError::Unexpected(SmolStr::new(self.symbol())));
            }
        };
        Ok(value)
    }
}

fn numbers(left: &Value, right: &Value) -> Option<(Number, Number)> {
    Some((left.to_number()?, right.to_number()?))
}

fn integers(left: &Value, right: &Value) -> Option<(i64, i64)> {
    let truncate = |n: Number| match n {
        Number::Int(i) => i,
        Number::Float(f) => f.trunc() as i64,
    };
    let (a, b) = numbers(left, right)?;
    Some((truncate(a), truncate(b)))
}

/// Integer arithmetic that overflows into floats, as PHP does.
fn int_or_float(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(x, y)
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(float_op(x as f64, y as f64))),
        _ => Value::Float(float_op(a.as_f64(), b.as_f64())),
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null | Value::Bool(_), _) | (_, Value::Null | Value::Bool(_)) => {
            left.to_bool() == right.to_bool()
        }
        (Value::String(a), Value::String(b)) => match (left.to_number(), right.to_number()) {
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        },
        (Value::Array(_), _) | (_, Value::Array(_)) => left == right,
        _ => compare(left, right).is_some_and(|o| o.is_eq()),
    }
}

/// Ordering used by `<`, `<=>` and friends; `None` for arrays.
fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if matches!(left, Value::Array(_)) || matches!(right, Value::Array(_)) {
        return None;
    }
    match (left.to_number(), right.to_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
        (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        _ => Some(left.to_php_string()?.cmp(&right.to_php_string()?)),
    }
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser<'t, F> {
    tokens: Vec<&'t Token>,
    pos: usize,
    lookup: F,
}

impl<'t, F> Parser<'t, F>
where
    F: Fn(&str) -> Option<Value>,
{
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn bump(&mut self) -> Result<&'t Token, EvalError> {
        let token = self.peek().ok_or(EvalError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), EvalError> {
        let token = self.bump()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(EvalError::Unexpected(token.text.clone()))
        }
    }

    fn expression(&mut self, min_bp: u8) -> Result<Value, EvalError> {
        let mut lhs = self.prefix()?;
        while let Some(token) = self.peek() {
            let Some(op) = BinaryOp::from_token(token) else {
                break;
            };
            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;
            lhs = match op {
                BinaryOp::Ternary if self.peek_kind(0) == Some(TokenKind::Colon) => {
                    self.pos += 1;
                    let otherwise = self.expression(r_bp)?;
                    if lhs.to_bool() { lhs } else { otherwise }
                }
                BinaryOp::Ternary => {
                    let then = self.expression(0)?;
                    self.expect(TokenKind::Colon)?;
                    let otherwise = self.expression(r_bp)?;
                    if lhs.to_bool() { then } else { otherwise }
                }
                BinaryOp::Coalesce => {
                    let rhs = self.expression(r_bp)?;
                    if lhs == Value::Null { rhs } else { lhs }
                }
                _ => {
                    let rhs = self.expression(r_bp)?;
                    op.apply(lhs, rhs)?
                }
            };
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Value, EvalError> {
        let token = self.bump()?;
        match token.kind {
            TokenKind::Integer => parse_integer(token.text()),
            TokenKind::Float => token
                .text()
                .replace('_', "")
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| EvalError::Unexpected(token.text.clone())),
            TokenKind::ConstantString => Ok(Value::String(unquote_single(token.text()))),
            TokenKind::InterpolatedString => {
                let body = strip_quotes(token.text(), '"');
                if interpolates(body) {
                    return Err(EvalError::Unsupported(SmolStr::new("string interpolation")));
                }
                Ok(Value::String(unescape_double(body)))
            }
            TokenKind::Heredoc => heredoc(token.text()),
            TokenKind::Minus => {
                let operand = self.expression(PREFIX_BP)?;
                match operand.to_number() {
                    Some(Number::Int(i)) => Ok(i
                        .checked_neg()
                        .map(Value::Int)
                        .unwrap_or(Value::Float(-(i as f64)))),
                    Some(Number::Float(f)) => Ok(Value::Float(-f)),
                    None => Err(EvalError::UnsupportedOperands {
                        left: "int",
                        op: "*",
                        right: operand.type_name(),
                    }),
                }
            }
            TokenKind::Plus => {
                let operand = self.expression(PREFIX_BP)?;
                operand
                    .to_number()
                    .map(Number::into_value)
                    .ok_or(EvalError::UnsupportedOperands {
                        left: "int",
                        op: "*",
                        right: operand.type_name(),
                    })
            }
            TokenKind::Bang => Ok(Value::Bool(!self.expression(PREFIX_BP)?.to_bool())),
            TokenKind::Tilde => match self.expression(PREFIX_BP)? {
                Value::Int(i) => Ok(Value::Int(!i)),
                Value::Float(f) => Ok(Value::Int(!(f.trunc() as i64))),
                other => Err(EvalError::Unsupported(SmolStr::new(format!(
                    "~ on {}",
                    other.type_name()
                )))),
            },
            TokenKind::LeftParen => {
                if let Some(cast) = self.cast() {
                    let operand = self.expression(PREFIX_BP)?;
                    return cast.apply(operand);
                }
                let value = self.expression(0)?;
                self.expect(TokenKind::RightParen)?;
                Ok(value)
            }
            TokenKind::LeftBracket => self.array(TokenKind::RightBracket),
            TokenKind::Identifier
                if token.is_word("array") && self.peek_kind(0) == Some(TokenKind::LeftParen) =>
            {
                self.pos += 1;
                self.array(TokenKind::RightParen)
            }
            kind if kind.is_name() => self.constant(token),
            _ => Err(EvalError::Unexpected(token.text.clone())),
        }
    }

    /// `(int)`-style cast after an opening parenthesis.
    fn cast(&mut self) -> Option<Cast> {
        let name = self.peek().filter(|t| t.is(TokenKind::Identifier))?;
        if self.peek_kind(1) != Some(TokenKind::RightParen) {
            return None;
        }
        let cast = match name.text.to_ascii_lowercase().as_str() {
            "int" | "integer" => Cast::Int,
            "float" | "double" => Cast::Float,
            "string" => Cast::String,
            "bool" | "boolean" => Cast::Bool,
            "array" => Cast::Array,
            _ => return None,
        };
        self.pos += 2;
        Some(cast)
    }

    fn constant(&mut self, token: &Token) -> Result<Value, EvalError> {
        match self.peek_kind(0) {
            Some(TokenKind::LeftParen) => {
                return Err(EvalError::Unsupported(SmolStr::new(format!(
                    "call to `{}`",
                    token.text
                ))));
            }
            Some(TokenKind::DoubleColon) => {
                return Err(EvalError::Unsupported(SmolStr::new(format!(
                    "class constant on `{}`",
                    token.text
                ))));
            }
            _ => {}
        }
        let name = token.text().trim_start_matches('\\');
        match name.to_ascii_lowercase().as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }
        (self.lookup)(token.text()).ok_or_else(|| EvalError::UndefinedConstant(SmolStr::new(name)))
    }

    /// Array literal body up to `close`. Keys follow PHP's auto-indexing.
    fn array(&mut self, close: TokenKind) -> Result<Value, EvalError> {
        let mut items: Vec<(ArrayKey, Value)> = Vec::new();
        let mut next_index: i64 = 0;
        loop {
            if self.peek_kind(0) == Some(close) {
                self.pos += 1;
                break;
            }
            if self.peek_kind(0) == Some(TokenKind::Ellipsis) {
                return Err(EvalError::Unsupported(SmolStr::new("array unpacking")));
            }
            let first = self.expression(0)?;
            let (key, value) = if self.peek_kind(0) == Some(TokenKind::DoubleArrow) {
                self.pos += 1;
                let key = first.to_array_key().ok_or(EvalError::Unsupported(SmolStr::new(
                    "array as array key",
                )))?;
                (key, self.expression(0)?)
            } else {
                (ArrayKey::Int(next_index), first)
            };
            if let ArrayKey::Int(i) = key {
                next_index = next_index.max(i.saturating_add(1));
            }
            match items.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => items.push((key, value)),
            }
            match self.bump()?.kind {
                TokenKind::Comma => {}
                kind if kind == close => break,
                _ => return Err(EvalError::Unexpected(self.tokens[self.pos - 1].text.clone())),
            }
        }
        Ok(Value::Array(items))
    }
}

#[derive(Copy, Clone, Debug)]
enum Cast {
    Int,
    Float,
    String,
    Bool,
    Array,
}

impl Cast {
    fn apply(self, value: Value) -> Result<Value, EvalError> {
        let converted = match self {
            Cast::Int => match value.to_number() {
                Some(Number::Int(i)) => Value::Int(i),
                Some(Number::Float(f)) => Value::Int(f.trunc() as i64),
                None if matches!(value, Value::Array(ref a) if a.is_empty()) => Value::Int(0),
                None if matches!(value, Value::Array(_)) => Value::Int(1),
                None => Value::Int(0),
            },
            Cast::Float => Value::Float(value.to_number().map(Number::as_f64).unwrap_or(0.0)),
            Cast::String => Value::String(
                value
                    .to_php_string()
                    .ok_or(EvalError::Unsupported(SmolStr::new("array to string conversion")))?,
            ),
            Cast::Bool => Value::Bool(value.to_bool()),
            Cast::Array => match value {
                Value::Array(_) => value,
                Value::Null => Value::Array(Vec::new()),
                other => Value::Array(vec![(ArrayKey::Int(0), other)]),
            },
        };
        Ok(converted)
    }
}

// ============================================================================
// LITERALS
// ============================================================================

/// Decimal, hex, octal and binary integers; overflow becomes a float.
fn parse_integer(text: &str) -> Result<Value, EvalError> {
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    if let Ok(i) = i64::from_str_radix(body, radix) {
        return Ok(Value::Int(i));
    }
    let mut total = 0.0f64;
    for c in body.chars() {
        let digit = c
            .to_digit(radix)
            .ok_or_else(|| EvalError::Unexpected(SmolStr::new(text)))?;
        total = total * f64::from(radix) + f64::from(digit);
    }
    Ok(Value::Float(total))
}

fn strip_quotes(text: &str, quote: char) -> &str {
    let inner = text.strip_prefix(quote).unwrap_or(text);
    inner.strip_suffix(quote).unwrap_or(inner)
}

/// Single quotes only escape `\'` and `\\`.
fn unquote_single(text: &str) -> SmolStr {
    let body = strip_quotes(text, '\'');
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some('\'') | Some('\\')) {
            out.extend(chars.next());
        } else {
            out.push(c);
        }
    }
    SmolStr::new(out)
}

/// `$name`, `{$` or `${` outside an escape.
fn interpolates(body: &str) -> bool {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'$' => {
                let next = bytes.get(i + 1).copied();
                if next.is_some_and(|b| b == b'{' || b == b'_' || b.is_ascii_alphabetic() || b >= 0x80)
                {
                    return true;
                }
            }
            b'{' if bytes.get(i + 1) == Some(&b'$') => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

fn unescape_double(body: &str) -> SmolStr {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('v') => out.push('\x0B'),
            Some('e') => out.push('\x1B'),
            Some('f') => out.push('\x0C'),
            Some('\\') => out.push('\\'),
            Some('$') => out.push('$'),
            Some('"') => out.push('"'),
            Some(d @ '0'..='7') => {
                chars.next();
                let mut code = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code & 0xFF));
                continue;
            }
            Some('x') => {
                chars.next();
                let mut code = 0;
                let mut seen = 0;
                while seen < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(digit) => {
                            code = code * 16 + digit;
                            chars.next();
                            seen += 1;
                        }
                        None => break,
                    }
                }
                if seen == 0 {
                    out.push_str("\\x");
                } else {
                    out.extend(char::from_u32(code));
                }
                continue;
            }
            Some('u') => {
                chars.next();
                if chars.peek() != Some(&'{') {
                    out.push_str("\\u");
                    continue;
                }
                chars.next();
                let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u{");
                        out.push_str(&hex);
                        out.push('}');
                    }
                }
                continue;
            }
            _ => {
                out.push('\\');
                continue;
            }
        }
        chars.next();
    }
    SmolStr::new(out)
}

/// Heredoc and nowdoc bodies, with the closing marker's indentation
/// removed from every line.
fn heredoc(text: &str) -> Result<Value, EvalError> {
    let after = text.strip_prefix("<<<").unwrap_or(text);
    let Some((header, rest)) = after.split_once('\n') else {
        return Err(EvalError::Unexpected(SmolStr::new(text)));
    };
    let nowdoc = header.trim().starts_with('\'');
    let (body, closing) = match rest.rfind('\n') {
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => ("", rest),
    };
    let indent = closing.len() - closing.trim_start_matches([' ', '\t']).len();
    let lines: Vec<&str> = body
        .split('\n')
        .map(|line| {
            let blank = line.len() - line.trim_start_matches([' ', '\t']).len();
            &line[blank.min(indent)..]
        })
        .collect();
    let joined = lines.join("\n");
    if nowdoc {
        return Ok(Value::String(SmolStr::new(joined)));
    }
    if interpolates(&joined) {
        return Err(EvalError::Unsupported(SmolStr::new("string interpolation")));
    }
    Ok(Value::String(unescape_double(&joined)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn eval(source: &str) -> Value {
        evaluate_source(source).unwrap()
    }

    fn s(text: &str) -> Value {
        Value::String(SmolStr::new(text))
    }

    #[rstest]
    #[case("3", Value::Int(3))]
    #[case("1_000_000", Value::Int(1_000_000))]
    #[case("0x1F", Value::Int(31))]
    #[case("0b101", Value::Int(5))]
    #[case("0755", Value::Int(493))]
    #[case("0o17", Value::Int(15))]
    #[case("1.5", Value::Float(1.5))]
    #[case("1e3", Value::Float(1000.0))]
    #[case("TRUE", Value::Bool(true))]
    #[case("\\null", Value::Null)]
    fn test_literals(#[case] source: &str, #[case] expected: Value) {
        assert_eq!(eval(source), expected);
    }

    #[rstest]
    #[case("1 + 2 * 3", Value::Int(7))]
    #[case("(1 + 2) * 3", Value::Int(9))]
    #[case("7 / 2", Value::Float(3.5))]
    #[case("6 / 2", Value::Int(3))]
    #[case("7 % 3", Value::Int(1))]
    #[case("-2 ** 2", Value::Int(-4))]
    #[case("2 ** 3 ** 2", Value::Int(512))]
    #[case("2 ** -1", Value::Float(0.5))]
    #[case("1 << 4 | 1", Value::Int(17))]
    #[case("9223372036854775807 + 1", Value::Float(9223372036854775808.0))]
    #[case("'1' + 1", Value::Int(2))]
    fn test_arithmetic(#[case] source: &str, #[case] expected: Value) {
        assert_eq!(eval(source), expected);
    }

    #[rstest]
    #[case("'a' . 'b' . 1", s("ab1"))]
    #[case("'n: ' . 1 + 2", s("n: 3"))]
    #[case(r#""tab\there""#, s("tab\there"))]
    #[case(r#""\x41\101\u{1F600}""#, s("AA\u{1F600}"))]
    #[case(r"'it\'s \n'", s("it's \\n"))]
    #[case(r#""cost: \$5""#, s("cost: $5"))]
    fn test_strings(#[case] source: &str, #[case] expected: Value) {
        assert_eq!(eval(source), expected);
    }

    #[rstest]
    #[case("1 < 2", Value::Bool(true))]
    #[case("'abc' == 0", Value::Bool(false))]
    #[case("'1e1' == '10'", Value::Bool(true))]
    #[case("1 === 1.0", Value::Bool(false))]
    #[case("2 <=> 1", Value::Int(1))]
    #[case("null ?? 'x'", s("x"))]
    #[case("0 ?: 5", Value::Int(5))]
    #[case("true ? 'y' : 'n'", s("y"))]
    #[case("true and false", Value::Bool(false))]
    #[case("!0", Value::Bool(true))]
    #[case("(int) '42'", Value::Int(42))]
    #[case("(string) 1.5", s("1.5"))]
    fn test_logic_and_casts(#[case] source: &str, #[case] expected: Value) {
        assert_eq!(eval(source), expected);
    }

    #[test]
    fn test_arrays() {
        assert_eq!(
            eval("[1, 'k' => 2, 3, 5 => 4, 5,]"),
            Value::Array(vec![
                (ArrayKey::Int(0), Value::Int(1)),
                (ArrayKey::String(SmolStr::new("k")), Value::Int(2)),
                (ArrayKey::Int(1), Value::Int(3)),
                (ArrayKey::Int(5), Value::Int(4)),
                (ArrayKey::Int(6), Value::Int(5)),
            ])
        );
        assert_eq!(
            eval("array('a' => 1, 'a' => 2)"),
            Value::Array(vec![(ArrayKey::String(SmolStr::new("a")), Value::Int(2))])
        );
        assert_eq!(
            eval("[1] + [5, 6]"),
            Value::Array(vec![
                (ArrayKey::Int(0), Value::Int(1)),
                (ArrayKey::Int(1), Value::Int(6)),
            ])
        );
    }

    #[test]
    fn test_heredoc_strips_closing_indentation() {
        let source = "<<<EOT\n    a\n      b\n    EOT";
        assert_eq!(eval(source), s("a\n  b"));

        let source = "<<<'RAW'\n  \\n\n  RAW";
        assert_eq!(eval(source), s("\\n"));
    }

    #[test]
    fn test_constant_lookup() {
        let tokens = tokenize_code("BASE * 2");
        let value = evaluate(&tokens, |name| (name == "BASE").then_some(Value::Int(21))).unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[rstest]
    #[case("UNKNOWN", EvalError::UndefinedConstant(SmolStr::new("UNKNOWN")))]
    #[case("1 / 0", EvalError::DivisionByZero)]
    #[case("1 +", EvalError::UnexpectedEnd)]
    #[case("1 2", EvalError::Unexpected(SmolStr::new("2")))]
    #[case(
        "'a' * 2",
        EvalError::UnsupportedOperands { left: "string", op: "*", right: "int" }
    )]
    fn test_errors(#[case] source: &str, #[case] expected: EvalError) {
        assert_eq!(evaluate_source(source), Err(expected));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            evaluate_source("strlen('a')"),
            Err(EvalError::Unsupported(_))
        ));
        assert!(matches!(
            evaluate_source("Foo::BAR"),
            Err(EvalError::Unsupported(_))
        ));
        assert!(matches!(
            evaluate_source(r#""hi $name""#),
            Err(EvalError::Unsupported(_))
        ));
    }
}
