//! End-to-end behaviour of `ReflectionFile` on small PHP files.

use phpscope::scope::{Scope, ScopeEvent, ScopeListener, ScopeVisitor, VisitorView};
use phpscope::syntax::tokenize;
use phpscope::{
    ConstantValue, DeclarationKind, DeclarationKinds, Reflected, ReflectionError, ReflectionFile,
    ReflectionFlags, Value,
};
use rstest::rstest;

fn file(source: &str) -> ReflectionFile {
    ReflectionFile::from_source(source, ReflectionFlags::empty())
}

fn names(reflected: Vec<Reflected<'_>>) -> Vec<&str> {
    reflected.iter().map(Reflected::name).collect()
}

#[derive(Default)]
struct Balance {
    starts: usize,
    ends: usize,
}

impl ScopeListener for Balance {
    fn on_scope(&mut self, event: ScopeEvent, _: &Scope, _: &VisitorView<'_>) {
        match event {
            ScopeEvent::Start => self.starts += 1,
            ScopeEvent::End => self.ends += 1,
        }
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_single_brace_less_namespace() {
    let file = file("<?php\nnamespace Food\\Fruit;\n\nclass Apple {}\ninterface Fallable {}\n");

    assert_eq!(file.namespaces().unwrap(), ["Food\\Fruit"]);
    assert_eq!(names(file.classes().unwrap()), ["Food\\Fruit\\Apple"]);
    assert_eq!(names(file.interfaces().unwrap()), ["Food\\Fruit\\Fallable"]);
}

#[test]
fn test_two_braced_namespaces() {
    let file = file(
        r#"<?php
namespace Food\Fruit {
    class Apple {}
    class Pear {}
}

namespace Food\Fish {
    interface AggressiveInterface {}
    trait AggressiveTrait {}
    class Shark {}
    class Cat {}
    class Babel {}
}
"#,
    );

    assert_eq!(file.namespaces().unwrap(), ["Food\\Fruit", "Food\\Fish"]);
    assert_eq!(
        names(file.classes().unwrap()),
        [
            "Food\\Fruit\\Apple",
            "Food\\Fruit\\Pear",
            "Food\\Fish\\Shark",
            "Food\\Fish\\Cat",
            "Food\\Fish\\Babel",
        ]
    );
    assert_eq!(names(file.traits().unwrap()), ["Food\\Fish\\AggressiveTrait"]);
    assert_eq!(
        names(file.interfaces().unwrap()),
        ["Food\\Fish\\AggressiveInterface"]
    );
}

#[test]
fn test_use_alias_resolves() {
    let file = file("<?php\nuse Foo\\Bar\\Baz as Qux;\n\n$x = new Qux();\n");

    assert_eq!(
        file.qualified_name("Qux", DeclarationKinds::all()).unwrap(),
        "Foo\\Bar\\Baz"
    );
    assert_eq!(file.uses().unwrap()["Qux"], "Foo\\Bar\\Baz");
}

#[test]
fn test_constant_safe_and_raw() {
    let source = "<?php\nconst PI_LIKE = 3;\n";

    let safe = ReflectionFile::from_source(source, ReflectionFlags::SAFE);
    assert_eq!(
        safe.constant("PI_LIKE").unwrap().value,
        ConstantValue::Evaluated(Value::Int(3))
    );

    let raw = file(source);
    assert_eq!(
        raw.constant("PI_LIKE").unwrap().value.as_raw().map(str::trim),
        Some("3")
    );
}

#[test]
fn test_free_function_versus_method() {
    let file = file(
        r#"<?php
function freeHello() { return "hi"; }

class Greeter {
    public function methodHello() { return "hello"; }
}
"#,
    );

    assert!(file.has_function("freeHello").unwrap());
    assert!(!file.has_function("methodHello").unwrap());
    assert_eq!(names(file.functions().unwrap()), ["freeHello"]);
}

#[test]
fn test_method_is_visible_through_class_details() {
    let file = ReflectionFile::from_source(
        "<?php class Greeter { public function methodHello() {} }",
        ReflectionFlags::AUTOLOADABLE,
    );
    let handle = file.class("Greeter").unwrap().into_handle().unwrap();
    assert!(handle.has_method("methodHello"));
    assert!(!file.has_function("methodHello").unwrap());
}

#[rstest]
#[case("<?php class Open { function f() { if (true) {")]
#[case("<?php namespace A; class B {")]
#[case("<?php }}} class C {} {")]
#[case("<?php namespace A { namespace B;")]
#[case("")]
fn test_unclosed_braces_stay_balanced(#[case] source: &str) {
    let tokens = tokenize(source);
    let mut visitor = ScopeVisitor::with_listener(&tokens, Balance::default());
    visitor.run();
    let balance = visitor.into_listener();
    assert_eq!(balance.starts, balance.ends);

    // and the index still builds
    assert!(file(source).build().is_ok());
}

#[test]
fn test_stray_closing_brace_keeps_class_members_out_of_file_index() {
    let file = file("<?php } class C { const X = 1; use SomeTrait; }");

    assert!(file.constants().unwrap().is_empty());
    assert!(file.uses().unwrap().is_empty());
    assert!(file.has_class("C").unwrap());
}

#[test]
fn test_keyword_named_properties_do_not_hide_functions() {
    let file = file(
        "<?php if ($node->trait) { function helper() {} } if ($n->interface) { function other() {} }",
    );

    assert!(file.has_function("helper").unwrap());
    assert!(file.has_function("other").unwrap());
    assert!(file.traits().unwrap().is_empty());
    assert!(file.interfaces().unwrap().is_empty());
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[test]
fn test_queries_are_idempotent() {
    let file = file("<?php namespace N; class A {} function f() {}");
    let first = file.class("A").unwrap();
    let second = file.class("A").unwrap();
    assert_eq!(first, second);
    assert!(std::ptr::eq(first.name(), second.name()));
    assert_eq!(file.functions().unwrap(), file.functions().unwrap());
}

#[test]
fn test_alias_precedes_namespace_fallback() {
    let file = file("<?php namespace App; use Vendor\\Logger; class Logger {}");
    assert_eq!(
        file.qualified_name("Logger", DeclarationKinds::CLASS).unwrap(),
        "Vendor\\Logger"
    );
    // the local class is still reachable by its qualified name
    assert_eq!(file.class("App\\Logger").unwrap().name(), "App\\Logger");
}

#[rstest]
#[case("42", Value::Int(42))]
#[case("-1.5", Value::Float(-1.5))]
#[case("'text'", Value::String("text".into()))]
#[case("\"line\\n\"", Value::String("line\n".into()))]
#[case("true", Value::Bool(true))]
#[case("NULL", Value::Null)]
#[case("0x10", Value::Int(16))]
fn test_constant_round_trip(#[case] literal: &str, #[case] expected: Value) {
    let source = format!("<?php const NAME = {literal};");

    let safe = ReflectionFile::from_source(source.as_str(), ReflectionFlags::SAFE);
    let evaluated = safe.constant("NAME").unwrap().value.as_value().cloned();
    assert_eq!(evaluated, Some(expected.clone()));

    let raw = ReflectionFile::from_source(source.as_str(), ReflectionFlags::empty());
    let text = raw.constant("NAME").unwrap().value.as_raw().unwrap().to_owned();
    assert_eq!(phpscope::index::evaluate_source(&text).unwrap(), expected);
}

#[test]
fn test_namespace_prefixing_of_every_kind() {
    let file = file(
        "<?php namespace Shop;
        const RATE = 2;
        function total() {}
        interface Priced {}
        trait Discounted {}
        class Cart {}
        enum Status { case Open; }",
    );
    let index = file.build().unwrap();
    for kind in [
        DeclarationKind::Function,
        DeclarationKind::Interface,
        DeclarationKind::Trait,
        DeclarationKind::Class,
        DeclarationKind::Enum,
    ] {
        for declaration in index.declarations(kind).unwrap().values() {
            assert_eq!(declaration.name, format!("Shop\\{}", declaration.short_name));
        }
    }
    assert!(file.has_constant("Shop\\RATE").unwrap());
    assert!(file.has_constant("RATE").unwrap());
    assert!(file.has_enum("Status").unwrap());
}

#[test]
fn test_malformed_constant_is_a_hard_error() {
    let file = file("<?php namespace N; const BROKEN 1;");
    let err = file.namespaces().unwrap_err();
    assert!(matches!(err, ReflectionError::MalformedConstant { .. }));
    assert!(err.to_string().contains("BROKEN"));
}

#[test]
fn test_inline_html_and_multiple_php_blocks() {
    let file = file("<html><?php class A {} ?>\n<p>text</p>\n<?php class B {} ?>");
    assert_eq!(names(file.classes().unwrap()), ["A", "B"]);
    assert_eq!(file.class("B").unwrap().name(), "B");
}
