//! The scope-tracking cursor.

use crate::syntax::{Token, TokenKind, next_significant, prev_significant};

use super::scope::{Delimiter, Entity, EntityKind, Scope};

/// Scope transition reported to a [`ScopeListener`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeEvent {
    Start,
    End,
}

/// Receives scope events synchronously, in line with traversal.
pub trait ScopeListener {
    fn on_scope(&mut self, event: ScopeEvent, scope: &Scope, view: &VisitorView<'_>);
}

/// A listener that ignores every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct Silent;

impl ScopeListener for Silent {
    fn on_scope(&mut self, _: ScopeEvent, _: &Scope, _: &VisitorView<'_>) {}
}

/// Read-only view of the visitor handed to listeners.
///
/// On [`ScopeEvent::End`] the closed scope has already been popped, so
/// [`current_scope`](Self::current_scope) is its parent.
#[derive(Clone, Copy, Debug)]
pub struct VisitorView<'v> {
    tokens: &'v [Token],
    stack: &'v [Scope],
    position: usize,
}

impl<'v> VisitorView<'v> {
    pub fn tokens(&self) -> &'v [Token] {
        self.tokens
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current_scope(&self) -> Option<&'v Scope> {
        self.stack.last()
    }

    /// Open scopes, outermost first.
    pub fn scopes(&self) -> &'v [Scope] {
        self.stack
    }

    /// Number of scopes currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Where a pending entity's scope will open.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Opener {
    /// At the next `{`.
    Brace,
    /// At the `;` with this token index (brace-less namespace).
    Terminator(usize),
}

#[derive(Copy, Clone, Debug)]
struct Pending {
    entity: Entity,
    opener: Opener,
}

/// Single-pass cursor over a token stream that maintains the stack of open
/// scopes.
///
/// The token under the cursor has already been processed: scopes it opens
/// or closes are reflected by [`current_scope`](Self::current_scope).
pub struct ScopeVisitor<'t, L = Silent> {
    tokens: &'t [Token],
    position: usize,
    stack: Vec<Scope>,
    pending: Option<Pending>,
    /// The most recently closed file scope.
    root: Option<Scope>,
    listener: L,
}

impl<'t> ScopeVisitor<'t, Silent> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self::with_listener(tokens, Silent)
    }
}

impl<'t, L: ScopeListener> ScopeVisitor<'t, L> {
    /// Create a visitor positioned on the first token.
    pub fn with_listener(tokens: &'t [Token], listener: L) -> Self {
        let mut visitor = Self {
            tokens,
            position: 0,
            stack: Vec::new(),
            pending: None,
            root: None,
            listener,
        };
        if tokens.is_empty() {
            visitor.close_all();
        } else {
            visitor.visit(0);
        }
        visitor
    }

    /// Token under the cursor, `None` once the stream is exhausted.
    pub fn current(&self) -> Option<&'t Token> {
        self.tokens.get(self.position)
    }

    pub fn valid(&self) -> bool {
        self.position < self.tokens.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Move to the next token and process the scope transitions it implies.
    ///
    /// Stepping past the last token closes every scope still open.
    pub fn advance(&mut self) {
        if !self.valid() {
            return;
        }
        self.position += 1;
        if self.valid() {
            self.visit(self.position);
        } else {
            self.close_all();
        }
    }

    /// Walk to the end of the stream.
    pub fn run(&mut self) {
        while self.valid() {
            self.advance();
        }
    }

    /// Innermost open scope. After traversal this is the file scope.
    pub fn current_scope(&self) -> Option<&Scope> {
        self.stack.last().or(self.root.as_ref())
    }

    /// Open scopes, outermost first.
    pub fn stack(&self) -> &[Scope] {
        &self.stack
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    fn visit(&mut self, index: usize) {
        let tokens = self.tokens;
        let token = &tokens[index];
        match token.kind {
            TokenKind::OpenTag | TokenKind::OpenTagWithEcho => {
                if self.stack.is_empty() {
                    let entity = Entity { token: index, kind: EntityKind::File };
                    self.open(index, Some(entity), Delimiter::File);
                }
            }
            TokenKind::Namespace => self.namespace(index),
            TokenKind::Class if !self.is_member_name(index) => {
                self.mark(index, EntityKind::Class);
            }
            TokenKind::Interface if !self.is_member_name(index) => {
                self.mark(index, EntityKind::Interface);
            }
            TokenKind::Trait if !self.is_member_name(index) => {
                self.mark(index, EntityKind::Trait);
            }
            TokenKind::Identifier if token.is_word("enum") => {
                let names_a_type = next_significant(tokens, index + 1)
                    .is_some_and(|n| tokens[n].is(TokenKind::Identifier));
                let is_method_name = prev_significant(tokens, index)
                    .is_some_and(|p| tokens[p].is(TokenKind::Function));
                if names_a_type && !self.is_member_name(index) && !is_method_name {
                    self.mark(index, EntityKind::Enum);
                }
            }
            TokenKind::Function => {
                let hosts = self
                    .context()
                    .is_none_or(|entity| entity.kind.hosts_functions());
                let is_import = prev_significant(tokens, index)
                    .is_some_and(|p| tokens[p].is(TokenKind::Use));
                if hosts && !is_import {
                    self.mark(index, EntityKind::Function);
                }
            }
            TokenKind::LeftBrace => {
                let entity = match self.pending.take() {
                    Some(Pending { entity, opener: Opener::Brace }) => Some(entity),
                    _ => None,
                };
                self.open(index, entity, Delimiter::Brace);
            }
            TokenKind::RightBrace => {
                self.pending = None;
                let in_brace = self
                    .stack
                    .last()
                    .is_some_and(|scope| scope.delimiter == Delimiter::Brace);
                if in_brace {
                    self.close(index);
                } else {
                    tracing::debug!(index, "unbalanced closing brace ignored");
                }
            }
            TokenKind::Semicolon => match self.pending.take() {
                Some(Pending { entity, opener: Opener::Terminator(at) }) if at == index => {
                    self.open(index, Some(entity), Delimiter::Terminator);
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// Entity governing the innermost open scope.
    fn context(&self) -> Option<Entity> {
        self.stack.last().and_then(Scope::context)
    }

    /// Whether the keyword at `index` follows `::`, `->` or `?->`, as in
    /// `Foo::class` or `$node->trait`.
    fn is_member_name(&self, index: usize) -> bool {
        prev_significant(self.tokens, index).is_some_and(|p| {
            matches!(
                self.tokens[p].kind,
                TokenKind::DoubleColon
                    | TokenKind::ObjectOperator
                    | TokenKind::NullsafeObjectOperator
            )
        })
    }

    fn mark(&mut self, index: usize, kind: EntityKind) {
        self.pending = Some(Pending {
            entity: Entity { token: index, kind },
            opener: Opener::Brace,
        });
    }

    /// A namespace declaration is `namespace [Name] {` or `namespace Name;`,
    /// and only at file level or replacing a brace-less namespace.
    fn namespace(&mut self, index: usize) {
        let top = self.stack.last();
        let in_terminated_namespace = top.is_some_and(|s| {
            s.delimiter == Delimiter::Terminator && s.entity_kind() == Some(EntityKind::Namespace)
        });
        let at_file_level = top.is_none_or(|s| s.delimiter == Delimiter::File);
        if !(at_file_level || in_terminated_namespace) {
            return;
        }

        let Some(mut next) = next_significant(self.tokens, index + 1) else {
            return;
        };
        let named = matches!(
            self.tokens[next].kind,
            TokenKind::Identifier | TokenKind::QualifiedName
        );
        if named {
            match next_significant(self.tokens, next + 1) {
                Some(after) => next = after,
                None => return,
            }
        }
        let opener = match self.tokens[next].kind {
            TokenKind::LeftBrace => Opener::Brace,
            TokenKind::Semicolon if named => Opener::Terminator(next),
            _ => return,
        };

        if in_terminated_namespace {
            self.close(index.saturating_sub(1));
        }
        self.pending = Some(Pending {
            entity: Entity { token: index, kind: EntityKind::Namespace },
            opener,
        });
    }

    fn open(&mut self, index: usize, entity: Option<Entity>, delimiter: Delimiter) {
        let scope = Scope {
            level: self.stack.len() as u32,
            start: index,
            end: None,
            entity,
            parent_entity: self.context(),
            delimiter,
        };
        tracing::trace!(
            level = scope.level,
            start = index,
            entity = ?scope.entity_kind(),
            "scope start"
        );
        self.stack.push(scope);
        self.fire(ScopeEvent::Start, &scope);
    }

    fn close(&mut self, index: usize) {
        let Some(mut scope) = self.stack.pop() else {
            return;
        };
        scope.end = Some(index);
        if scope.delimiter == Delimiter::File {
            self.root = Some(scope);
        }
        tracing::trace!(
            level = scope.level,
            start = scope.start,
            end = index,
            entity = ?scope.entity_kind(),
            "scope end"
        );
        self.fire(ScopeEvent::End, &scope);
    }

    /// Force-close everything left open at end of stream.
    fn close_all(&mut self) {
        self.pending = None;
        let last = self.tokens.len().saturating_sub(1);
        let open = self
            .stack
            .iter()
            .filter(|s| s.delimiter == Delimiter::Brace)
            .count();
        if open > 0 {
            tracing::debug!(open, "closing unbalanced scopes at end of stream");
        }
        while !self.stack.is_empty() {
            self.close(last);
        }
    }

    fn fire(&mut self, event: ScopeEvent, scope: &Scope) {
        let view = VisitorView {
            tokens: self.tokens,
            stack: &self.stack,
            position: self.position,
        };
        self.listener.on_scope(event, scope, &view);
    }
}

impl<'t, L: ScopeListener> Iterator for ScopeVisitor<'t, L> {
    type Item = &'t Token;

    /// Yields the current token, then advances.
    fn next(&mut self) -> Option<&'t Token> {
        let token = self.current()?;
        self.advance();
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tokenize;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(ScopeEvent, Scope)>,
    }

    impl ScopeListener for Recorder {
        fn on_scope(&mut self, event: ScopeEvent, scope: &Scope, _: &VisitorView<'_>) {
            self.seen.push((event, *scope));
        }
    }

    fn record(tokens: &[Token]) -> Vec<(ScopeEvent, Scope)> {
        let mut visitor = ScopeVisitor::with_listener(tokens, Recorder::default());
        visitor.run();
        visitor.into_listener().seen
    }

    /// (event, entity kind, level) in firing order.
    fn events(source: &str) -> Vec<(ScopeEvent, Option<EntityKind>, u32)> {
        let tokens = tokenize(source);
        record(&tokens)
            .into_iter()
            .map(|(event, scope)| (event, scope.entity_kind(), scope.level))
            .collect()
    }

    fn closed(source: &str) -> Vec<Option<EntityKind>> {
        events(source)
            .into_iter()
            .filter(|(event, _, _)| *event == ScopeEvent::End)
            .map(|(_, kind, _)| kind)
            .collect()
    }

    #[test]
    fn test_open_tag_opens_file_scope() {
        let seen = events("<?php echo 1;");
        assert_eq!(
            seen,
            vec![
                (ScopeEvent::Start, Some(EntityKind::File), 0),
                (ScopeEvent::End, Some(EntityKind::File), 0),
            ]
        );
    }

    #[test]
    fn test_braced_namespace_and_class() {
        let seen = events("<?php namespace A { class B { function c() { if (1) {} } } }");
        let kinds: Vec<_> = seen
            .iter()
            .filter(|(e, _, _)| *e == ScopeEvent::Start)
            .map(|(_, k, l)| (*k, *l))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (Some(EntityKind::File), 0),
                (Some(EntityKind::Namespace), 1),
                (Some(EntityKind::Class), 2),
                (Some(EntityKind::Function), 3),
                (None, 4),
            ]
        );
    }

    #[test]
    fn test_braceless_namespaces_close_each_other() {
        let source = "<?php namespace A; class X {} namespace B; class Y {}";
        assert_eq!(
            closed(source),
            vec![
                Some(EntityKind::Class),
                Some(EntityKind::Namespace),
                Some(EntityKind::Class),
                Some(EntityKind::Namespace),
                Some(EntityKind::File),
            ]
        );
    }

    #[test]
    fn test_class_constant_does_not_open_scope() {
        let source = "<?php $a = Foo::class; if ($a) { echo 1; }";
        assert_eq!(closed(source), vec![None, Some(EntityKind::File)]);
    }

    #[test]
    fn test_keyword_property_access_does_not_open_scope() {
        let source = "<?php if ($node->trait) { } if ($n?->interface) { } $c->class;";
        assert_eq!(closed(source), vec![None, None, Some(EntityKind::File)]);
    }

    #[test]
    fn test_extra_closing_brace_keeps_file_scope() {
        let seen = events("<?php } class C { }");
        assert_eq!(
            seen,
            vec![
                (ScopeEvent::Start, Some(EntityKind::File), 0),
                (ScopeEvent::Start, Some(EntityKind::Class), 1),
                (ScopeEvent::End, Some(EntityKind::Class), 1),
                (ScopeEvent::End, Some(EntityKind::File), 0),
            ]
        );
    }

    #[test]
    fn test_closing_brace_does_not_end_braceless_namespace() {
        let source = "<?php namespace A; } class B {}";
        assert_eq!(
            closed(source),
            vec![
                Some(EntityKind::Class),
                Some(EntityKind::Namespace),
                Some(EntityKind::File),
            ]
        );
    }

    #[test]
    fn test_use_function_does_not_leak_onto_block() {
        let source = "<?php use function Foo\\bar; if (true) { bar(); }";
        assert_eq!(closed(source), vec![None, Some(EntityKind::File)]);
    }

    #[test]
    fn test_group_use_function_is_not_a_declaration() {
        let source = "<?php use function Foo\\{bar, baz};";
        assert_eq!(closed(source), vec![None, Some(EntityKind::File)]);
    }

    #[test]
    fn test_closure_inside_function_is_not_tracked() {
        let source = "<?php function f() { return function () { return 1; }; }";
        assert_eq!(
            closed(source),
            vec![None, Some(EntityKind::Function), Some(EntityKind::File)]
        );
    }

    #[test]
    fn test_enum_is_contextual() {
        let source = "<?php enum Suit: string { case Hearts = 'H'; } $enum = 1;";
        assert_eq!(closed(source), vec![Some(EntityKind::Enum), Some(EntityKind::File)]);
    }

    #[test]
    fn test_namespace_relative_name_is_not_a_declaration() {
        let source = "<?php namespace\\foo(); { }";
        assert_eq!(closed(source), vec![None, Some(EntityKind::File)]);
    }

    #[test]
    fn test_unclosed_brace_is_forced_closed() {
        let seen = events("<?php class A { function b() {");
        let starts = seen.iter().filter(|(e, _, _)| *e == ScopeEvent::Start).count();
        let ends = seen.iter().filter(|(e, _, _)| *e == ScopeEvent::End).count();
        assert_eq!(starts, 3);
        assert_eq!(starts, ends);
    }

    #[test]
    fn test_current_scope_after_traversal_is_file_scope() {
        let tokens = tokenize("<?php class A {}");
        let mut visitor = ScopeVisitor::new(&tokens);
        visitor.run();
        let scope = visitor.current_scope().copied().unwrap();
        assert_eq!(scope.level, 0);
        assert_eq!(scope.entity_kind(), Some(EntityKind::File));
        assert_eq!(scope.end, Some(tokens.len() - 1));
        assert!(visitor.stack().is_empty());
    }

    #[test]
    fn test_parent_entity_is_cached() {
        let tokens = tokenize("<?php namespace N; function f() {}");
        let functions: Vec<Scope> = record(&tokens)
            .into_iter()
            .filter(|(event, scope)| {
                *event == ScopeEvent::End && scope.entity_kind() == Some(EntityKind::Function)
            })
            .map(|(_, scope)| scope)
            .collect();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].parent_kind(), Some(EntityKind::Namespace));
    }

    #[test]
    fn test_listener_sees_parent_on_end() {
        struct Depths(Vec<usize>);
        impl ScopeListener for Depths {
            fn on_scope(&mut self, event: ScopeEvent, _: &Scope, view: &VisitorView<'_>) {
                if event == ScopeEvent::End {
                    self.0.push(view.depth());
                }
            }
        }
        let tokens = tokenize("<?php { { } }");
        let mut visitor = ScopeVisitor::with_listener(&tokens, Depths(Vec::new()));
        visitor.run();
        assert_eq!(visitor.into_listener().0, vec![2, 1, 0]);
    }

    #[test]
    fn test_iterator_yields_every_token() {
        let tokens = tokenize("<?php { }");
        let visited: Vec<usize> = ScopeVisitor::new(&tokens).map(|t| t.index).collect();
        assert_eq!(visited, (0..tokens.len()).collect::<Vec<_>>());
    }
}
