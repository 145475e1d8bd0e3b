//! Lexer driver: switches between inline HTML and PHP code.
//!
//! The logos automaton in [`TokenKind`] only understands PHP code. This
//! driver finds the open tags, runs the automaton until a closing tag, and
//! stamps every token with its stream index and line number.

use logos::Logos;
use smol_str::SmolStr;

use super::token::{Token, TokenKind};
use crate::base::{LineIndex, TextRange, offset_size};

/// Tokenize a PHP file. Text before the first `<?php` is inline HTML.
///
/// Tokenizing never fails: unrecognised input becomes
/// [`TokenKind::Unknown`] tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = LexerDriver::new(source);
    lexer.run(Mode::Inline);
    lexer.tokens
}

/// Tokenize a fragment of PHP code that has no open tag, such as a
/// constant expression.
pub fn tokenize_code(source: &str) -> Vec<Token> {
    let mut lexer = LexerDriver::new(source);
    lexer.run(Mode::Code);
    lexer.tokens
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Inline,
    Code,
}

struct LexerDriver<'s> {
    source: &'s str,
    lines: LineIndex,
    tokens: Vec<Token>,
    offset: usize,
}

impl<'s> LexerDriver<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            lines: LineIndex::new(source),
            tokens: Vec::new(),
            offset: 0,
        }
    }

    fn run(&mut self, mut mode: Mode) {
        while self.offset < self.source.len() {
            mode = match mode {
                Mode::Inline => self.inline(),
                Mode::Code => self.code(),
            };
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        let text = &self.source[start..end];
        let kind = match kind {
            TokenKind::Comment if is_doc_comment(text) => TokenKind::DocComment,
            other => other,
        };
        let range = TextRange::new(offset_size(start), offset_size(end));
        self.tokens.push(Token {
            index: self.tokens.len(),
            kind,
            text: SmolStr::new(text),
            range,
            line: self.lines.line(range.start()),
        });
    }

    /// Emit inline HTML up to the next open tag, then the tag itself.
    fn inline(&mut self) -> Mode {
        let rest = &self.source[self.offset..];
        let Some((tag_start, tag_len, kind)) = find_open_tag(rest) else {
            self.push(TokenKind::InlineHtml, self.offset, self.source.len());
            self.offset = self.source.len();
            return Mode::Inline;
        };
        if tag_start > 0 {
            self.push(TokenKind::InlineHtml, self.offset, self.offset + tag_start);
        }
        let start = self.offset + tag_start;
        self.push(kind, start, start + tag_len);
        self.offset = start + tag_len;
        Mode::Code
    }

    /// Run the automaton until end of input or a closing tag.
    fn code(&mut self) -> Mode {
        let base = self.offset;
        let mut lex = TokenKind::lexer(&self.source[base..]);
        while let Some(result) = lex.next() {
            let span = lex.span();
            let (start, mut end) = (base + span.start, base + span.end);
            let kind = result.unwrap_or(TokenKind::Unknown);
            if kind == TokenKind::CloseTag {
                let after = &self.source[end..];
                if after.starts_with("\r\n") {
                    end += 2;
                } else if after.starts_with('\n') {
                    end += 1;
                }
                self.push(kind, start, end);
                self.offset = end;
                return Mode::Inline;
            }
            self.push(kind, start, end);
        }
        self.offset = self.source.len();
        Mode::Code
    }
}

/// `/**` followed by whitespace; `/**/` is an ordinary comment.
fn is_doc_comment(text: &str) -> bool {
    text.strip_prefix("/**")
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_whitespace)
}

/// Locate `<?php` (followed by whitespace or end of input) or `<?=`.
///
/// Returns the tag offset, its length including one trailing whitespace
/// character for `<?php`, and its kind.
fn find_open_tag(text: &str) -> Option<(usize, usize, TokenKind)> {
    let mut from = 0;
    while let Some(pos) = text[from..].find("<?") {
        let start = from + pos;
        let after = &text[start + 2..];
        if after.starts_with('=') {
            return Some((start, 3, TokenKind::OpenTagWithEcho));
        }
        if after.len() >= 3 && after[..3].eq_ignore_ascii_case("php") {
            let tail = &after[3..];
            match tail.chars().next() {
                None => return Some((start, 5, TokenKind::OpenTag)),
                Some('\r') if tail.starts_with("\r\n") => {
                    return Some((start, 7, TokenKind::OpenTag));
                }
                Some(c) if c.is_ascii_whitespace() => {
                    return Some((start, 6, TokenKind::OpenTag));
                }
                _ => {}
            }
        }
        from = start + 2;
    }
    None
}
