//! The declaration indexer.
//!
//! One pass of the [`ScopeVisitor`] collects every scope that was opened by
//! a declaration. `use` and `const` statements are picked up during the same
//! pass, but only at file level or directly inside a namespace, where PHP
//! gives them file-wide meaning.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use smol_str::SmolStr;

use super::declaration::{
    Constant, ConstantValue, Declaration, DeclarationKind, DeclarationKinds,
};
use super::eval::evaluate;
use super::value::Value;
use crate::error::{ReflectionError, Result};
use crate::scope::{
    Entity, EntityKind, Scope, ScopeEvent, ScopeListener, ScopeVisitor, VisitorView,
};
use crate::syntax::{Token, TokenKind, next_significant, prev_significant};

/// Options controlling how the index is built.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Evaluate constant initializers instead of keeping their source text.
    pub evaluate_constants: bool,
}

// ============================================================================
// INDEX
// ============================================================================

/// Every top-level declaration of one file, keyed by qualified name.
///
/// Maps keep insertion order, which is token order. Redeclaring a name
/// replaces the earlier entry.
#[derive(Clone, Debug, Default)]
pub struct DeclarationIndex {
    pub(crate) namespaces: IndexMap<SmolStr, Declaration>,
    /// Class imports: alias → qualified name.
    pub(crate) uses: IndexMap<SmolStr, SmolStr>,
    /// `use function` imports.
    pub(crate) function_uses: IndexMap<SmolStr, SmolStr>,
    /// `use const` imports.
    pub(crate) constant_uses: IndexMap<SmolStr, SmolStr>,
    pub(crate) constants: IndexMap<SmolStr, Constant>,
    pub(crate) functions: IndexMap<SmolStr, Declaration>,
    pub(crate) interfaces: IndexMap<SmolStr, Declaration>,
    pub(crate) traits: IndexMap<SmolStr, Declaration>,
    pub(crate) classes: IndexMap<SmolStr, Declaration>,
    pub(crate) enums: IndexMap<SmolStr, Declaration>,
}

impl DeclarationIndex {
    pub fn namespaces(&self) -> &IndexMap<SmolStr, Declaration> {
        &self.namespaces
    }

    pub fn uses(&self) -> &IndexMap<SmolStr, SmolStr> {
        &self.uses
    }

    pub fn function_uses(&self) -> &IndexMap<SmolStr, SmolStr> {
        &self.function_uses
    }

    pub fn constant_uses(&self) -> &IndexMap<SmolStr, SmolStr> {
        &self.constant_uses
    }

    pub fn constants(&self) -> &IndexMap<SmolStr, Constant> {
        &self.constants
    }

    /// Declarations of a scope-opening kind. `Use` and `Constant` have
    /// their own maps and return `None`.
    pub fn declarations(&self, kind: DeclarationKind) -> Option<&IndexMap<SmolStr, Declaration>> {
        match kind {
            DeclarationKind::Namespace => Some(&self.namespaces),
            DeclarationKind::Function => Some(&self.functions),
            DeclarationKind::Interface => Some(&self.interfaces),
            DeclarationKind::Trait => Some(&self.traits),
            DeclarationKind::Class => Some(&self.classes),
            DeclarationKind::Enum => Some(&self.enums),
            DeclarationKind::Use | DeclarationKind::Constant => None,
        }
    }

    pub fn find(&self, kind: DeclarationKind, name: &str) -> Option<&Declaration> {
        self.declarations(kind)?.get(name)
    }

    /// Whether `name` is declared as any of `kinds`.
    pub fn contains(&self, kinds: DeclarationKinds, name: &str) -> bool {
        if kinds.contains(DeclarationKinds::CONSTANT) && self.constants.contains_key(name) {
            return true;
        }
        [
            (DeclarationKinds::FUNCTION, &self.functions),
            (DeclarationKinds::INTERFACE, &self.interfaces),
            (DeclarationKinds::TRAIT, &self.traits),
            (DeclarationKinds::CLASS, &self.classes),
            (DeclarationKinds::ENUM, &self.enums),
        ]
        .into_iter()
        .any(|(kind, map)| kinds.contains(kind) && map.contains_key(name))
    }

    /// Import tables consulted for `kinds`, class imports first.
    pub(crate) fn alias_tables(
        &self,
        kinds: DeclarationKinds,
    ) -> impl Iterator<Item = &IndexMap<SmolStr, SmolStr>> {
        [
            (kinds.intersects(DeclarationKinds::CLASS_LIKE), &self.uses),
            (kinds.contains(DeclarationKinds::FUNCTION), &self.function_uses),
            (kinds.contains(DeclarationKinds::CONSTANT), &self.constant_uses),
        ]
        .into_iter()
        .filter_map(|(wanted, table)| wanted.then_some(table))
    }

    /// Every class-like, function and namespace declaration.
    pub(crate) fn all_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.namespaces
            .values()
            .chain(self.functions.values())
            .chain(self.interfaces.values())
            .chain(self.traits.values())
            .chain(self.classes.values())
            .chain(self.enums.values())
    }

    fn declarations_mut(&mut self, kind: DeclarationKind) -> Option<&mut IndexMap<SmolStr, Declaration>> {
        match kind {
            DeclarationKind::Namespace => Some(&mut self.namespaces),
            DeclarationKind::Function => Some(&mut self.functions),
            DeclarationKind::Interface => Some(&mut self.interfaces),
            DeclarationKind::Trait => Some(&mut self.traits),
            DeclarationKind::Class => Some(&mut self.classes),
            DeclarationKind::Enum => Some(&mut self.enums),
            DeclarationKind::Use | DeclarationKind::Constant => None,
        }
    }
}

// ============================================================================
// SCOPE COLLECTION
// ============================================================================

/// A closed scope opened by a declaration keyword.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    entity: Entity,
    scope: Scope,
    /// Keyword token of the enclosing namespace.
    namespace: Option<usize>,
}

#[derive(Default)]
struct Collector {
    candidates: Vec<Candidate>,
}

impl ScopeListener for Collector {
    fn on_scope(&mut self, event: ScopeEvent, scope: &Scope, view: &VisitorView<'_>) {
        if event != ScopeEvent::End {
            return;
        }
        let Some(entity) = scope.entity.filter(|e| e.kind != EntityKind::File) else {
            return;
        };
        self.candidates.push(Candidate {
            entity,
            scope: *scope,
            namespace: enclosing_namespace(view.scopes()),
        });
    }
}

/// A `use` or `const` keyword at declaration level.
#[derive(Clone, Copy, Debug)]
struct Statement {
    token: usize,
    namespace: Option<usize>,
}

fn enclosing_namespace(scopes: &[Scope]) -> Option<usize> {
    scopes
        .iter()
        .rev()
        .find_map(|s| s.entity.filter(|e| e.kind == EntityKind::Namespace))
        .map(|e| e.token)
}

/// File level, or directly inside a namespace.
fn at_declaration_level(scope: Option<&Scope>) -> bool {
    scope.is_none_or(|s| s.level == 0 || s.entity_kind() == Some(EntityKind::Namespace))
}

/// Name following a `namespace` keyword; `None` for the global namespace.
pub(crate) fn namespace_name(tokens: &[Token], keyword: usize) -> Option<SmolStr> {
    let next = next_significant(tokens, keyword + 1)?;
    matches!(
        tokens[next].kind,
        TokenKind::Identifier | TokenKind::QualifiedName
    )
    .then(|| tokens[next].text.clone())
}

fn qualify(namespace: Option<&str>, name: &str) -> SmolStr {
    match namespace {
        Some(ns) => SmolStr::new(format!("{ns}\\{name}")),
        None => SmolStr::new(name),
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

// ============================================================================
// INDEXER
// ============================================================================

/// Builds a [`DeclarationIndex`] from a token stream.
pub struct Indexer<'t> {
    tokens: &'t [Token],
    options: IndexOptions,
    index: DeclarationIndex,
}

impl<'t> Indexer<'t> {
    pub fn build(tokens: &'t [Token], options: IndexOptions) -> Result<DeclarationIndex> {
        let mut indexer = Self {
            tokens,
            options,
            index: DeclarationIndex::default(),
        };

        let mut visitor = ScopeVisitor::with_listener(tokens, Collector::default());
        let mut statements = Vec::new();
        while let Some(token) = visitor.current() {
            if matches!(token.kind, TokenKind::Use | TokenKind::Const)
                && at_declaration_level(visitor.current_scope())
            {
                statements.push(Statement {
                    token: token.index,
                    namespace: enclosing_namespace(visitor.stack()),
                });
            }
            visitor.advance();
        }
        let mut candidates = visitor.into_listener().candidates;
        candidates.sort_by_key(|c| c.entity.token);

        for statement in statements {
            match tokens[statement.token].kind {
                TokenKind::Use => indexer.use_statement(statement),
                _ => indexer.const_statement(statement)?,
            }
        }
        for candidate in candidates {
            indexer.declaration(candidate);
        }

        let index = indexer.index;
        tracing::debug!(
            namespaces = index.namespaces.len(),
            uses = index.uses.len() + index.function_uses.len() + index.constant_uses.len(),
            constants = index.constants.len(),
            functions = index.functions.len(),
            interfaces = index.interfaces.len(),
            traits = index.traits.len(),
            classes = index.classes.len(),
            enums = index.enums.len(),
            "declaration index built"
        );
        Ok(index)
    }

    fn namespace_of(&self, keyword: Option<usize>) -> Option<SmolStr> {
        keyword.and_then(|k| namespace_name(self.tokens, k))
    }

    fn significant_after(&self, index: usize) -> Option<usize> {
        next_significant(self.tokens, index + 1)
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn declaration(&mut self, candidate: Candidate) {
        let Candidate { entity, scope, namespace } = candidate;
        let Some(kind) = DeclarationKind::from_entity(entity.kind) else {
            return;
        };
        let tokens = self.tokens;
        let keyword = &tokens[entity.token];

        if kind == DeclarationKind::Namespace {
            let Some(name) = namespace_name(tokens, entity.token) else {
                return;
            };
            let declaration = Declaration {
                kind,
                name: name.clone(),
                short_name: SmolStr::new(last_segment(&name)),
                namespace: None,
                token: entity.token,
                line: keyword.line,
                scope,
                details: OnceCell::new(),
            };
            self.index.namespaces.insert(name, declaration);
            return;
        }

        if kind == DeclarationKind::Function
            && !scope.parent_kind().is_none_or(EntityKind::is_top_level)
        {
            return;
        }
        let Some(short_name) = self.declared_name(entity) else {
            tracing::trace!(token = entity.token, %kind, "anonymous declaration skipped");
            return;
        };
        let namespace = self.namespace_of(namespace);
        let name = qualify(namespace.as_deref(), &short_name);
        let declaration = Declaration {
            kind,
            name: name.clone(),
            short_name,
            namespace,
            token: entity.token,
            line: keyword.line,
            scope,
            details: OnceCell::new(),
        };
        if let Some(map) = self.index.declarations_mut(kind) {
            map.insert(name, declaration);
        }
    }

    /// Name after the keyword, `None` for closures and anonymous classes.
    fn declared_name(&self, entity: Entity) -> Option<SmolStr> {
        let tokens = self.tokens;
        if entity.kind == EntityKind::Class {
            let after_new = prev_significant(tokens, entity.token)
                .is_some_and(|p| tokens[p].is(TokenKind::New));
            if after_new {
                return None;
            }
        }
        let mut next = self.significant_after(entity.token)?;
        if entity.kind == EntityKind::Function && tokens[next].is(TokenKind::Ampersand) {
            next = self.significant_after(next)?;
        }
        let token = &tokens[next];
        token.is(TokenKind::Identifier).then(|| token.text.clone())
    }

    // ------------------------------------------------------------------------
    // use
    // ------------------------------------------------------------------------

    fn use_statement(&mut self, statement: Statement) {
        let tokens = self.tokens;
        let Some(mut cursor) = self.significant_after(statement.token) else {
            return;
        };
        let kind = match tokens[cursor].kind {
            // closure `use (...)`
            TokenKind::LeftParen => return,
            TokenKind::Function => DeclarationKind::Function,
            TokenKind::Const => DeclarationKind::Constant,
            _ => DeclarationKind::Use,
        };
        if kind != DeclarationKind::Use {
            match self.significant_after(cursor) {
                Some(next) => cursor = next,
                None => return,
            }
        }

        loop {
            let token = &tokens[cursor];
            if !token.kind.is_name() {
                tracing::debug!(line = token.line, found = %token.text, "malformed use statement");
                return;
            }
            let target = token.text.trim_start_matches('\\');
            let Some(next) = self.significant_after(cursor) else {
                self.import(kind, target, None);
                return;
            };

            let group_brace = tokens[next]
                .is(TokenKind::NsSeparator)
                .then(|| self.significant_after(next))
                .flatten()
                .filter(|&b| tokens[b].is(TokenKind::LeftBrace));
            let after = match group_brace {
                Some(brace) => match self.use_group(kind, target, brace) {
                    Some(close) => self.significant_after(close),
                    None => return,
                },
                None => {
                    let (alias, after) = self.alias(next);
                    self.import(kind, target, alias.as_deref());
                    after
                }
            };

            match after {
                Some(comma) if tokens[comma].is(TokenKind::Comma) => {
                    match self.significant_after(comma) {
                        Some(next) => cursor = next,
                        None => return,
                    }
                }
                _ => return,
            }
        }
    }

    /// `as Alias` at `at`; returns the alias and the token after the clause.
    fn alias(&self, at: usize) -> (Option<SmolStr>, Option<usize>) {
        let tokens = self.tokens;
        if !tokens[at].is(TokenKind::As) {
            return (None, Some(at));
        }
        match self.significant_after(at) {
            Some(name) if tokens[name].kind.is_name() || tokens[name].kind.is_keyword() => {
                (Some(tokens[name].text.clone()), self.significant_after(name))
            }
            other => (None, other),
        }
    }

    /// Items of `Prefix\{A, function b, C as D}`; returns the closing brace.
    fn use_group(&mut self, kind: DeclarationKind, prefix: &str, brace: usize) -> Option<usize> {
        let tokens = self.tokens;
        let mut cursor = self.significant_after(brace)?;
        loop {
            match tokens[cursor].kind {
                TokenKind::RightBrace => return Some(cursor),
                TokenKind::Comma => {
                    cursor = self.significant_after(cursor)?;
                    continue;
                }
                _ => {}
            }
            let item_kind = match tokens[cursor].kind {
                TokenKind::Function => DeclarationKind::Function,
                TokenKind::Const => DeclarationKind::Constant,
                _ => kind,
            };
            if matches!(tokens[cursor].kind, TokenKind::Function | TokenKind::Const) {
                cursor = self.significant_after(cursor)?;
            }
            let token = &tokens[cursor];
            if !token.kind.is_name() {
                tracing::debug!(line = token.line, found = %token.text, "malformed group use");
                return None;
            }
            let target = format!("{prefix}\\{}", token.text.trim_start_matches('\\'));
            let (alias, after) = self.alias(self.significant_after(cursor)?);
            self.import(item_kind, &target, alias.as_deref());
            cursor = after?;
        }
    }

    fn import(&mut self, kind: DeclarationKind, target: &str, alias: Option<&str>) {
        let alias = SmolStr::new(alias.unwrap_or_else(|| last_segment(target)));
        tracing::trace!(%alias, target, %kind, "use alias");
        let table = match kind {
            DeclarationKind::Function => &mut self.index.function_uses,
            DeclarationKind::Constant => &mut self.index.constant_uses,
            _ => &mut self.index.uses,
        };
        table.insert(alias, SmolStr::new(target));
    }

    // ------------------------------------------------------------------------
    // const
    // ------------------------------------------------------------------------

    fn const_statement(&mut self, statement: Statement) -> Result<()> {
        let tokens = self.tokens;
        let keyword = &tokens[statement.token];
        if prev_significant(tokens, statement.token).is_some_and(|p| tokens[p].is(TokenKind::Use)) {
            return Ok(());
        }
        let namespace = self.namespace_of(statement.namespace);

        let mut cursor = statement.token;
        loop {
            let Some(name_at) = self.significant_after(cursor) else {
                return Err(ReflectionError::MalformedConstant {
                    name: SmolStr::default(),
                    line: keyword.line,
                    expected: "a constant name",
                });
            };
            let name_token = &tokens[name_at];
            if !(name_token.kind.is_name() || name_token.kind.is_keyword()) {
                return Err(ReflectionError::MalformedConstant {
                    name: name_token.text.clone(),
                    line: name_token.line,
                    expected: "a constant name",
                });
            }
            let equals = self
                .significant_after(name_at)
                .filter(|&e| tokens[e].is(TokenKind::Equals));
            let Some(equals) = equals else {
                return Err(ReflectionError::MalformedConstant {
                    name: name_token.text.clone(),
                    line: name_token.line,
                    expected: "`=`",
                });
            };

            let end = value_end(tokens, equals + 1);
            let value_tokens = &tokens[equals + 1..end];
            let source = join_source(value_tokens);
            if source.is_empty() {
                return Err(ReflectionError::MalformedConstant {
                    name: name_token.text.clone(),
                    line: name_token.line,
                    expected: "a value",
                });
            }

            let name = qualify(namespace.as_deref(), &name_token.text);
            let value = if self.options.evaluate_constants {
                let evaluated = evaluate(value_tokens, |reference| {
                    self.constant_value(namespace.as_deref(), reference)
                })
                .map_err(|source| ReflectionError::Evaluation {
                    name: name.clone(),
                    line: name_token.line,
                    source,
                })?;
                ConstantValue::Evaluated(evaluated)
            } else {
                ConstantValue::Raw(source.clone())
            };
            tracing::trace!(%name, %source, "constant");
            self.index.constants.insert(
                name.clone(),
                Constant {
                    name,
                    short_name: name_token.text.clone(),
                    namespace: namespace.clone(),
                    token: name_at,
                    line: name_token.line,
                    source,
                    value,
                },
            );

            match tokens.get(end).map(|t| t.kind) {
                Some(TokenKind::Comma) => cursor = end,
                _ => return Ok(()),
            }
        }
    }

    /// Value of a constant referenced from an initializer, looked up the way
    /// PHP resolves unqualified constant names.
    fn constant_value(&self, namespace: Option<&str>, reference: &str) -> Option<Value> {
        let constants = &self.index.constants;
        let evaluated = |name: &str| constants.get(name).and_then(|c| c.value.as_value()).cloned();

        if let Some(absolute) = reference.strip_prefix('\\') {
            return evaluated(absolute);
        }
        if !reference.contains('\\') {
            if let Some(target) = self.index.constant_uses.get(reference) {
                return evaluated(target);
            }
        }
        evaluated(&qualify(namespace, reference)).or_else(|| evaluated(reference))
    }
}

/// End (exclusive) of a constant's value: the first `,` or `;` outside of
/// brackets, or the end of the stream.
fn value_end(tokens: &[Token], from: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[from..].iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                if depth == 0 {
                    return from + offset;
                }
                depth -= 1;
            }
            TokenKind::Comma | TokenKind::Semicolon if depth == 0 => return from + offset,
            TokenKind::CloseTag => return from + offset,
            _ => {}
        }
    }
    tokens.len()
}

/// Significant tokens of `run`; tokens that trivia separated are joined by
/// one space.
fn join_source(run: &[Token]) -> SmolStr {
    let mut out = String::new();
    let mut gap = false;
    for token in run {
        if token.is_trivia() {
            gap = true;
            continue;
        }
        if gap && !out.is_empty() {
            out.push(' ');
        }
        gap = false;
        out.push_str(&token.text);
    }
    SmolStr::new(out)
}
