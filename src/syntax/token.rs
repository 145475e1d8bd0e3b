//! PHP token kinds and the token record handed to the scanners.

use std::fmt;

use logos::{Lexer, Logos};
use smol_str::SmolStr;

use crate::base::TextRange;

/// A single lexical token.
///
/// Tokens are produced once by [`tokenize`](super::tokenize) and never
/// mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Position in the token stream.
    pub index: usize,
    pub kind: TokenKind,
    /// The literal source text of the token.
    pub text: SmolStr,
    /// Byte range in the source.
    pub range: TextRange,
    /// 1-indexed line where the token starts.
    pub line: u32,
}

impl Token {
    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    #[inline]
    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case-insensitive comparison against an identifier, the way PHP
    /// compares keywords and contextual words like `enum`.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {:?}({:?} @ line {})",
            self.index, self.kind, self.text, self.line
        )
    }
}

/// Index of the first non-trivia token at or after `from`.
pub fn next_significant(tokens: &[Token], from: usize) -> Option<usize> {
    tokens
        .get(from..)?
        .iter()
        .position(|t| !t.is_trivia())
        .map(|offset| from + offset)
}

/// Index of the last non-trivia token strictly before `before`.
pub fn prev_significant(tokens: &[Token], before: usize) -> Option<usize> {
    tokens
        .get(..before.min(tokens.len()))?
        .iter()
        .rposition(|t| !t.is_trivia())
}

/// Every kind of token the lexer produces.
///
/// Only the keywords the scope scanner and the constant evaluator care about
/// get their own kinds; every other word is an [`Identifier`](Self::Identifier).
/// `InlineHtml`, the open tags, `DocComment` and `Unknown` are produced by the
/// lexer driver rather than by the logos automaton.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // =========================================
    // Mode switches
    // =========================================
    /// Text outside of PHP tags.
    InlineHtml,
    /// `<?php`
    OpenTag,
    /// `<?=`
    OpenTagWithEcho,
    /// `?>`, including one trailing newline
    #[token("?>")]
    CloseTag,

    // =========================================
    // Trivia
    // =========================================
    #[regex(r"[ \t\r\n\x0C]+")]
    Whitespace,
    /// `// ...`, `# ...` and `/* ... */`
    #[token("//", line_comment)]
    #[token("#", line_comment)]
    #[token("/*", block_comment)]
    Comment,
    /// `/** ... */`
    DocComment,

    // =========================================
    // Literals
    // =========================================
    #[regex(r"[0-9]+(_[0-9]+)*")]
    #[regex(r"0[xX][0-9a-fA-F]+(_[0-9a-fA-F]+)*")]
    #[regex(r"0[oO][0-7]+(_[0-7]+)*")]
    #[regex(r"0[bB][01]+(_[01]+)*")]
    Integer,
    #[regex(r"[0-9]+(_[0-9]+)*\.([0-9]+(_[0-9]+)*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+(_[0-9]+)*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+(_[0-9]+)*[eE][+-]?[0-9]+")]
    Float,
    /// `'...'`
    #[token("'", single_quoted)]
    ConstantString,
    /// `"..."`, kept whole even when it interpolates
    #[token("\"", double_quoted)]
    InterpolatedString,
    /// `<<<LABEL ... LABEL` (heredoc and nowdoc)
    #[token("<<<", heredoc)]
    Heredoc,
    /// `` `...` ``
    #[token("`", backtick)]
    Backtick,

    // =========================================
    // Names
    // =========================================
    #[regex(r"\$[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*")]
    Variable,
    #[regex(r"[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*")]
    Identifier,
    /// `Foo\Bar`
    #[regex(r"[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*(\\[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*)+")]
    QualifiedName,
    /// `\Foo\Bar`
    #[regex(r"(\\[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*)+")]
    FullyQualifiedName,

    // =========================================
    // Keywords (case-insensitive)
    // =========================================
    #[token("namespace", ignore(ascii_case))]
    Namespace,
    #[token("use", ignore(ascii_case))]
    Use,
    #[token("const", ignore(ascii_case))]
    Const,
    #[token("function", ignore(ascii_case))]
    Function,
    #[token("interface", ignore(ascii_case))]
    Interface,
    #[token("trait", ignore(ascii_case))]
    Trait,
    #[token("class", ignore(ascii_case))]
    Class,
    #[token("extends", ignore(ascii_case))]
    Extends,
    #[token("implements", ignore(ascii_case))]
    Implements,
    #[token("abstract", ignore(ascii_case))]
    Abstract,
    #[token("final", ignore(ascii_case))]
    Final,
    #[token("readonly", ignore(ascii_case))]
    Readonly,
    #[token("new", ignore(ascii_case))]
    New,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("insteadof", ignore(ascii_case))]
    Insteadof,

    // =========================================
    // Punctuation
    // =========================================
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    /// `#[`
    #[token("#[")]
    AttributeStart,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("=>")]
    DoubleArrow,
    #[token("::")]
    DoubleColon,
    #[token("->")]
    ObjectOperator,
    #[token("?->")]
    NullsafeObjectOperator,
    #[token("\\")]
    NsSeparator,
    #[token("...")]
    Ellipsis,
    #[token("?")]
    Question,
    #[token("??")]
    Coalesce,
    #[token(":")]
    Colon,
    #[token("@")]
    At,
    #[token("$")]
    Dollar,

    // =========================================
    // Operators
    // =========================================
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    Pow,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token(".")]
    Dot,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("&&")]
    BooleanAnd,
    #[token("||")]
    BooleanOr,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("==")]
    Equal,
    #[token("!=")]
    #[token("<>")]
    NotEqual,
    #[token("===")]
    Identical,
    #[token("!==")]
    NotIdentical,
    #[token("<=>")]
    Spaceship,
    #[token("++")]
    #[token("--")]
    IncDec,
    /// `+=`, `.=`, `??=` and friends
    #[regex(r"(\*\*|\?\?|<<|>>|[-+*/%.&|^])=")]
    AssignOp,

    /// A byte sequence the lexer does not recognise.
    Unknown,
}

impl TokenKind {
    /// Whitespace and comments.
    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::DocComment
        )
    }

    /// Plain, qualified or fully qualified names.
    #[inline]
    pub fn is_name(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::QualifiedName | TokenKind::FullyQualifiedName
        )
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Namespace
                | TokenKind::Use
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::Interface
                | TokenKind::Trait
                | TokenKind::Class
                | TokenKind::Extends
                | TokenKind::Implements
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Readonly
                | TokenKind::New
                | TokenKind::As
                | TokenKind::Insteadof
        )
    }

    /// Tokens that would glue together if printed without a separator.
    pub fn is_word_like(self) -> bool {
        self.is_name()
            || self.is_keyword()
            || matches!(
                self,
                TokenKind::Integer | TokenKind::Float | TokenKind::Variable
            )
    }
}

// ============================================================================
// CALLBACKS
// ============================================================================

/// Line comments stop before the newline or before a closing tag.
fn line_comment(lex: &mut Lexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    let mut end = rest.len();
    if let Some(pos) = rest.find('\n') {
        end = pos;
    }
    if let Some(pos) = rest[..end].find("?>") {
        end = pos;
    }
    lex.bump(end);
    true
}

fn block_comment(lex: &mut Lexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    let end = rest.find("*/").map(|pos| pos + 2).unwrap_or(rest.len());
    lex.bump(end);
    true
}

/// Consumes up to and including the unescaped `quote`, or to end of input.
fn quoted(lex: &mut Lexer<TokenKind>, quote: char) -> bool {
    let rest = lex.remainder();
    let mut chars = rest.char_indices();
    let mut end = rest.len();
    while let Some((pos, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            end = pos + c.len_utf8();
            break;
        }
    }
    lex.bump(end);
    true
}

fn single_quoted(lex: &mut Lexer<TokenKind>) -> bool {
    quoted(lex, '\'')
}

fn double_quoted(lex: &mut Lexer<TokenKind>) -> bool {
    quoted(lex, '"')
}

fn backtick(lex: &mut Lexer<TokenKind>) -> bool {
    quoted(lex, '`')
}

/// `<<<LABEL`, `<<<"LABEL"` or `<<<'LABEL'`, then everything up to a line
/// whose first non-blank text is the label.
fn heredoc(lex: &mut Lexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    let header = rest.trim_start_matches([' ', '\t']);
    let mut pos = rest.len() - header.len();

    let quote = header.chars().next().filter(|c| *c == '"' || *c == '\'');
    if quote.is_some() {
        pos += 1;
    }
    let label_len = rest[pos..]
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len() - pos);
    if label_len == 0 {
        return false;
    }
    let label = &rest[pos..pos + label_len];
    pos += label_len;
    if let Some(q) = quote {
        if !rest[pos..].starts_with(q) {
            return false;
        }
        pos += 1;
    }
    match rest[pos..].find('\n') {
        Some(newline) if rest[pos..pos + newline].trim().is_empty() => pos += newline + 1,
        _ => return false,
    }

    let mut line_start = pos;
    loop {
        let body = &rest[line_start..];
        let trimmed = body.trim_start_matches([' ', '\t']);
        if let Some(after) = trimmed.strip_prefix(label) {
            let boundary = after
                .chars()
                .next()
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
            if boundary {
                let end = line_start + (body.len() - trimmed.len()) + label.len();
                lex.bump(end);
                return true;
            }
        }
        match body.find('\n') {
            Some(newline) => line_start += newline + 1,
            None => {
                lex.bump(rest.len());
                return true;
            }
        }
    }
}
