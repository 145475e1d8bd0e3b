//! Member and inheritance details of a single declaration.
//!
//! Details are read straight off the tokens between the declaration keyword
//! and the end of its scope. Only the declaration's own body is scanned:
//! nested function bodies are skipped.

use smol_str::SmolStr;

use super::declaration::{Declaration, DeclarationKind, DeclarationKinds, Details, Modifiers};
use super::indexer::DeclarationIndex;
use super::resolve::Resolver;
use crate::syntax::{Token, TokenKind, next_significant, prev_significant};

pub(crate) fn inspect(tokens: &[Token], declaration: &Declaration, index: &DeclarationIndex) -> Details {
    let resolver = Resolver::new(index).with_kinds(DeclarationKinds::CLASS_LIKE);
    let inspector = Inspector {
        tokens,
        declaration,
        resolver,
    };
    let mut details = Details::default();
    match declaration.kind {
        DeclarationKind::Function => {
            details.parameters = inspector.parameters(declaration.token);
        }
        DeclarationKind::Class
        | DeclarationKind::Interface
        | DeclarationKind::Trait
        | DeclarationKind::Enum => {
            details.modifiers = inspector.modifiers();
            inspector.header(&mut details);
            inspector.body(&mut details);
        }
        DeclarationKind::Namespace | DeclarationKind::Use | DeclarationKind::Constant => {}
    }
    tracing::trace!(
        name = %declaration.name,
        methods = details.methods.len(),
        properties = details.properties.len(),
        "details computed"
    );
    details
}

struct Inspector<'a> {
    tokens: &'a [Token],
    declaration: &'a Declaration,
    resolver: Resolver<'a>,
}

impl Inspector<'_> {
    fn modifiers(&self) -> Modifiers {
        let mut modifiers = Modifiers::empty();
        let mut cursor = self.declaration.token;
        while let Some(prev) = prev_significant(self.tokens, cursor) {
            let flag = match self.tokens[prev].kind {
                TokenKind::Abstract => Modifiers::ABSTRACT,
                TokenKind::Final => Modifiers::FINAL,
                TokenKind::Readonly => Modifiers::READONLY,
                _ => break,
            };
            modifiers |= flag;
            cursor = prev;
        }
        modifiers
    }

    /// `extends` and `implements` lists between the name and the body.
    fn header(&self, details: &mut Details) {
        #[derive(PartialEq)]
        enum List {
            None,
            Extends,
            Implements,
        }

        let mut list = List::None;
        let body = self.declaration.scope.start;
        for token in &self.tokens[self.declaration.token + 1..body.min(self.tokens.len())] {
            match token.kind {
                TokenKind::Extends => list = List::Extends,
                TokenKind::Implements => list = List::Implements,
                kind if kind.is_name() => {
                    let target = match list {
                        List::None => continue,
                        List::Extends => &mut details.extends,
                        List::Implements => &mut details.implements,
                    };
                    target.push(self.qualify(token.text()));
                }
                _ => {}
            }
        }
    }

    fn body(&self, details: &mut Details) {
        let tokens = self.tokens;
        let start = self.declaration.scope.start + 1;
        let end = self
            .declaration
            .scope
            .end
            .unwrap_or(tokens.len())
            .min(tokens.len());

        let mut braces = 0usize;
        let mut parens = 0usize;
        let mut cursor = start;
        while cursor < end {
            let token = &tokens[cursor];
            match token.kind {
                TokenKind::LeftBrace => braces += 1,
                TokenKind::RightBrace => braces = braces.saturating_sub(1),
                TokenKind::LeftParen | TokenKind::LeftBracket => parens += 1,
                TokenKind::RightParen | TokenKind::RightBracket => {
                    parens = parens.saturating_sub(1)
                }
                _ if braces > 0 || parens > 0 => {}
                TokenKind::Function => {
                    if let Some(name) = self.member_name(cursor) {
                        details.methods.push(name);
                    }
                }
                TokenKind::Const => {
                    cursor = self.class_constants(cursor, end, &mut details.constants);
                    continue;
                }
                TokenKind::Identifier if token.is_word("case") => {
                    if let Some(name) = next_significant(tokens, cursor + 1)
                        .filter(|&n| tokens[n].is(TokenKind::Identifier))
                    {
                        details.constants.push(tokens[name].text.clone());
                    }
                }
                TokenKind::Use => {
                    cursor = self.trait_uses(cursor, end, &mut details.traits);
                    continue;
                }
                TokenKind::Variable => {
                    details
                        .properties
                        .push(SmolStr::new(token.text.trim_start_matches('$')));
                }
                _ => {}
            }
            cursor += 1;
        }
    }

    /// Method name after `function`, allowing `&` and reserved words.
    fn member_name(&self, keyword: usize) -> Option<SmolStr> {
        let mut next = next_significant(self.tokens, keyword + 1)?;
        if self.tokens[next].is(TokenKind::Ampersand) {
            next = next_significant(self.tokens, next + 1)?;
        }
        let token = &self.tokens[next];
        (token.kind.is_name() || token.kind.is_keyword()).then(|| token.text.clone())
    }

    /// `const [type] A = 1, B = 2;`: each name is the word before a
    /// top-level `=`. Returns the index after the statement.
    fn class_constants(&self, keyword: usize, end: usize, out: &mut Vec<SmolStr>) -> usize {
        let mut depth = 0usize;
        let mut cursor = keyword + 1;
        while cursor < end {
            let token = &self.tokens[cursor];
            match token.kind {
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Semicolon if depth == 0 => return cursor + 1,
                TokenKind::Equals if depth == 0 => {
                    if let Some(name) = prev_significant(self.tokens, cursor) {
                        out.push(self.tokens[name].text.clone());
                    }
                }
                _ => {}
            }
            cursor += 1;
        }
        end
    }

    /// `use A, B;` or `use A, B { ... }` inside a class body.
    fn trait_uses(&self, keyword: usize, end: usize, out: &mut Vec<SmolStr>) -> usize {
        let mut cursor = keyword + 1;
        while cursor < end {
            let token = &self.tokens[cursor];
            match token.kind {
                TokenKind::Semicolon | TokenKind::LeftBrace => return cursor,
                kind if kind.is_name() => out.push(self.qualify(token.text())),
                _ => {}
            }
            cursor += 1;
        }
        end
    }

    fn parameters(&self, keyword: usize) -> Vec<SmolStr> {
        let tokens = self.tokens;
        let Some(open) = tokens[keyword..]
            .iter()
            .position(|t| t.is(TokenKind::LeftParen))
            .map(|offset| keyword + offset)
        else {
            return Vec::new();
        };

        let mut parameters = Vec::new();
        let mut depth = 0usize;
        for token in &tokens[open..] {
            match token.kind {
                TokenKind::LeftParen | TokenKind::LeftBracket => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Variable if depth == 1 => {
                    parameters.push(SmolStr::new(token.text.trim_start_matches('$')));
                }
                _ => {}
            }
        }
        parameters
    }

    /// Qualified name of a referenced type: through the resolver, else
    /// relative to the declaration's namespace.
    fn qualify(&self, name: &str) -> SmolStr {
        if let Some(resolved) = self.resolver.resolve(name) {
            return resolved;
        }
        match &self.declaration.namespace {
            Some(namespace) => SmolStr::new(format!("{namespace}\\{name}")),
            None => SmolStr::new(name),
        }
    }
}
