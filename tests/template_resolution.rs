//! Integration tests for binding and rendering templates

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use infotpl::{
    render_once, Display, Engine, Indices, Kind, Mapping, Parameter, QualifiedName, Registries,
    RenderConfig, RenderError, Value,
};

fn suffix(name: &str, source: &str, target: &str, suffix: &'static str) -> Mapping {
    Mapping::new(QualifiedName::parse(name), source, target, move |v, _| {
        Some(Value::String(format!("{}{}", v.as_str()?, suffix)))
    })
}

fn display(kind: &'static str) -> Display {
    Display::new(kind, move |v, _| format!("{}@{}", v.as_str().unwrap_or("?"), kind))
}

/// Kinds foo, qux and corge lead to the displayable kinds bar and grault
fn setup_indices() -> Indices {
    let indices = Indices::for_test();
    let r = indices.registries();

    r.register_display(display("bar"));
    r.register_mapping(suffix("root:mod1:dupTest", "foo", "bar", "+mod1"))
        .unwrap();
    r.register_mapping(suffix("root:mod2:dupTest", "foo", "bar", "+mod2"))
        .unwrap();
    r.register_mapping(Mapping::new(
        QualifiedName::parse("root:mod1:toNull"),
        "foo",
        "bar",
        |_, _| None,
    ))
    .unwrap();
    r.register_mapping(suffix("root:mod1:toQux", "foo", "qux", "+toQux").implicit())
        .unwrap();
    r.register_mapping(suffix("root:mod1:toCorge", "qux", "corge", "+toCorge"))
        .unwrap();
    r.register_display(display("grault"));
    r.register_mapping(suffix("root:mod1:toGrault", "corge", "grault", "+toGrault").implicit())
        .unwrap();
    r.register_mapping(
        suffix("root:mod1:maybeImplicit", "qux", "grault", "+throughQux").implicit(),
    )
    .unwrap();
    r.register_mapping(suffix("root:mod1:maybeImplicit", "foo", "bar", "+direct").implicit())
        .unwrap();
    r.register_mapping(
        suffix("root:mod1:graultGrault", "grault", "grault", "+graultGrault").implicit(),
    )
    .unwrap();
    r.register_mapping(
        Mapping::new(QualifiedName::parse("root:mod1:join"), "foo", "bar", |v, args| {
            let sep = args
                .first()
                .and_then(Option::as_ref)
                .and_then(Value::as_str)
                .unwrap_or("-");
            Some(Value::String(format!("{}|{}", v.as_str()?, sep)))
        })
        .with_parameter(Parameter::new("sep", "bar").optional()),
    )
    .unwrap();

    indices
}

fn render(template: &str) -> String {
    render_once(
        template,
        &setup_indices(),
        &Value::from("init"),
        &Kind::new("foo"),
        None,
    )
    .expect("Should render")
}

#[test]
fn test_dup() {
    insta::assert_snapshot!(render("lorem {mod1:dupTest} ipsum"), @"lorem init+mod1@bar ipsum");
}

#[test]
fn test_fallback() {
    insta::assert_snapshot!(
        render("lorem {toNull | mod2:dupTest} ipsum"),
        @"lorem init+mod2@bar ipsum"
    );
}

#[test]
fn test_implicit() {
    insta::assert_snapshot!(
        render("lorem {toCorge} ipsum"),
        @"lorem init+toQux+toCorge+toGrault@grault ipsum"
    );
}

#[test]
fn test_prefer_short() {
    insta::assert_snapshot!(render("lorem {maybeImplicit} ipsum"), @"lorem init+direct@bar ipsum");
}

#[test]
fn test_longer_path() {
    insta::assert_snapshot!(
        render("lorem {maybeImplicit graultGrault} ipsum"),
        @"lorem init+toQux+throughQux+graultGrault@grault ipsum"
    );
}

#[test]
fn test_unresolved_and_null_markers() {
    assert_eq!(render("{nothing here}"), "{unknownPath:nothing here}");
    assert_eq!(render("{toNull}"), "{null:toNull}");
    assert_eq!(render("{toNull | nothing}"), "{null:toNull}");
}

#[test]
fn test_custom_markers() {
    let engine = Engine::new(setup_indices()).with_config(
        RenderConfig::default()
            .with_unresolved_marker("?{raw}?")
            .with_null_marker(""),
    );
    let text = engine
        .render_once("[{nothing}][{toNull}]", &Value::from("init"), &Kind::new("foo"), None)
        .unwrap();
    assert_eq!(text, "[?nothing?][]");
}

#[test]
fn test_escapes() {
    assert_eq!(render("a{{b}}c {mod1:dupTest}"), "a{b}c init+mod1@bar");
}

#[test]
fn test_omitted_optional_argument_is_no_value() {
    assert_eq!(render("{join}"), "init|-@bar");
    assert_eq!(render("{join(sep = nothing)}"), "init|-@bar");
    assert_eq!(render("{join(sep = toNull)}"), "init|-@bar");
}

#[test]
fn test_nested_argument_expressions() {
    assert_eq!(render("{join(mod1:dupTest)}"), "init|init+mod1@bar");
    assert_eq!(
        render("{join(sep = toNull | mod2:dupTest)}"),
        "init|init+mod2@bar"
    );
    assert_eq!(render(r#"{join("/")}"#), "init|/@bar");
}

#[test]
fn test_argument_of_skipped_mapping_is_not_evaluated() {
    let indices = setup_indices();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let r = indices.registries();
    r.register_mapping(Mapping::new(
        QualifiedName::parse("root:mod1:nul"),
        "foo",
        "foo",
        |_, _| None,
    ))
    .unwrap();
    r.register_mapping(Mapping::new(
        QualifiedName::parse("root:mod1:side"),
        "foo",
        "bar",
        move |v, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(v.clone())
        },
    ))
    .unwrap();

    let ctx = Value::from("init");
    let foo = Kind::new("foo");
    let text = render_once("{nul join(side)}", &indices, &ctx, &foo, None).unwrap();
    assert_eq!(text, "{null:nul join}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let text = render_once("{join(side)}", &indices, &ctx, &foo, None).unwrap();
    assert_eq!(text, "init|init@bar");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_surplus_arguments_are_dropped() {
    assert_eq!(render(r#"{join("/", "x", unknown = 1)}"#), "init|/@bar");
}

#[test]
fn test_later_registrations_are_visible() {
    let indices = setup_indices();
    let ctx = Value::from("init");
    let foo = Kind::new("foo");

    let before = render_once("{late}", &indices, &ctx, &foo, None).unwrap();
    assert_eq!(before, "{unknownPath:late}");

    indices
        .registries()
        .register_mapping(suffix("root:mod3:late", "foo", "bar", "+late"))
        .unwrap();
    let after = render_once("{late}", &indices, &ctx, &foo, None).unwrap();
    assert_eq!(after, "init+late@bar");
}

#[test]
fn test_parse_error_is_reported() {
    let err = render_once("{a", &setup_indices(), &Value::from("init"), &Kind::new("foo"), None)
        .unwrap_err();
    assert!(matches!(err, RenderError::Parse(_)));
}

#[test]
fn test_named_context_with_defaults() {
    let engine = Engine::new(Indices::with_defaults(Registries::new()).unwrap());
    let text = engine
        .render_named(
            "{name upper} has {hp add(5) max(10)} hp, alive: {hp greater(0) | nothing}",
            &[("name", Value::from("steve")), ("hp", Value::from(3.0))],
            None,
        )
        .unwrap();
    assert_eq!(text, "STEVE has 10 hp, alive: 3");
}

#[test]
fn test_named_context_extension_registry() {
    let extension = Registries::new();
    extension
        .register_mapping(Mapping::new(
            QualifiedName::parse("ex:string:shout"),
            "infoapi/string",
            "infoapi/string",
            |v, _| Some(Value::String(format!("{}!", v.as_str()?))),
        ))
        .unwrap();
    let engine = Engine::new(Indices::with_defaults(extension).unwrap());
    let text = engine
        .render_named("{who string:shout lower}", &[("who", Value::from("HEY"))], None)
        .unwrap();
    assert_eq!(text, "hey!");
}
