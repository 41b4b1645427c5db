//! Standard catalogue: strings, numbers and booleans
//!
//! Every alias of a mapping is registered as its own mapping under the
//! `infoapi` namespace; aliases after the first carry an `alias_of` metadata
//! entry naming the first.

use serde_json::json;

use crate::registry::{
    Display, KindHelp, Mapping, Parameter, QualifiedName, Registries, RegistryError, TypeHint,
    Value, ValueMarker, INVALID,
};

pub const NAMESPACE: &str = "infoapi";

pub const STRING: &str = "infoapi/string";
pub const NUMBER: &str = "infoapi/number";
pub const BOOL: &str = "infoapi/bool";

/// Metadata key on alias mappings
pub const ALIAS_OF: &str = "alias_of";

/// Register the whole catalogue into `registries`
pub fn register(registries: &Registries) -> Result<(), RegistryError> {
    register_strings(registries)?;
    register_numbers(registries)?;
    register_bools(registries)?;
    Ok(())
}

fn register_aliases(
    registries: &Registries,
    aliases: &[&str],
    mapping: Mapping,
) -> Result<(), RegistryError> {
    let Some((first, rest)) = aliases.split_first() else {
        return Ok(());
    };
    let canonical = QualifiedName::new([NAMESPACE, *first]);

    for alias in rest {
        let mut alias_mapping = mapping
            .clone()
            .with_metadata(ALIAS_OF, json!(canonical.to_string()));
        alias_mapping.qualified_name = QualifiedName::new([NAMESPACE, *alias]);
        registries.register_mapping(alias_mapping)?;
    }

    registries.register_mapping(Mapping {
        qualified_name: canonical,
        ..mapping
    })
}

/// A mapping whose name is filled in by `register_aliases`
fn unnamed(
    source: &str,
    target: &str,
    map: impl Fn(&Value, &[Option<Value>]) -> Option<Value> + Send + Sync + 'static,
) -> Mapping {
    Mapping::new(QualifiedName::new([NAMESPACE]), source, target, map)
}

fn arg(args: &[Option<Value>], index: usize) -> Option<&Value> {
    args.get(index)?.as_ref()
}

fn register_strings(registries: &Registries) -> Result<(), RegistryError> {
    registries.register_kind_help(
        KindHelp::new(STRING)
            .with_short_name("Text")
            .with_help("A string of characters"),
    );
    registries.register_display(Display::new(STRING, |value, _| match value.as_str() {
        Some(text) => text.to_string(),
        None => INVALID.to_string(),
    }));
    registries.register_type_hint(TypeHint::new(ValueMarker::String, STRING));

    register_aliases(
        registries,
        &["upper", "uppercase"],
        unnamed(STRING, STRING, |v, _| Some(Value::String(v.as_str()?.to_uppercase())))
            .with_help("Converts the entire string to uppercase."),
    )?;
    register_aliases(
        registries,
        &["lower", "lowercase"],
        unnamed(STRING, STRING, |v, _| Some(Value::String(v.as_str()?.to_lowercase())))
            .with_help("Converts the entire string to lowercase."),
    )?;
    Ok(())
}

/// Non-finite results have no value
fn finite(n: f64) -> Option<Value> {
    n.is_finite().then_some(Value::Number(n))
}

fn unary_number(help: &str, f: fn(f64) -> f64) -> Mapping {
    unnamed(NUMBER, NUMBER, move |v, _| finite(f(v.as_f64()?))).with_help(help)
}

fn binary_number(param: &str, help: &str, f: fn(f64, f64) -> f64) -> Mapping {
    unnamed(NUMBER, NUMBER, move |v, args| {
        finite(f(v.as_f64()?, arg(args, 0)?.as_f64()?))
    })
    .with_parameter(Parameter::new(param, NUMBER))
    .with_help(help)
}

fn register_numbers(registries: &Registries) -> Result<(), RegistryError> {
    registries.register_kind_help(
        KindHelp::new(NUMBER)
            .with_short_name("Number")
            .with_help("A real number"),
    );
    registries.register_display(Display::new(NUMBER, |value, _| match value.as_f64() {
        Some(n) => n.to_string(),
        None => INVALID.to_string(),
    }));
    registries.register_type_hint(TypeHint::new(ValueMarker::Number, NUMBER));

    let unary: [(&[&str], &str, fn(f64) -> f64); 6] = [
        (&["abs", "absolute"], "Take the absolute value.", f64::abs),
        (&["neg", "negate"], "Flip the positive/negative sign.", |v| -v),
        (&["floor"], "Round down the number.", f64::floor),
        (&["ceil", "ceiling"], "Round up the number.", f64::ceil),
        (&["round"], "Round the number to the nearest integer.", f64::round),
        (
            &["rec", "reciprocal", "inv", "inverse"],
            "Take the reciprocal of a number, i.e. 1 divided by the number.",
            |v| 1.0 / v,
        ),
    ];
    for (aliases, help, f) in unary {
        register_aliases(registries, aliases, unary_number(help, f))?;
    }

    let binary: [(&[&str], &str, &str, fn(f64, f64) -> f64); 9] = [
        (&["add", "plus", "sum"], "other", "Add two numbers.", |a, b| a + b),
        (&["sub", "subtract", "minus"], "other", "Subtract two numbers.", |a, b| a - b),
        (
            &["mul", "mult", "multiply", "times", "prod", "product"],
            "other",
            "Multiply two numbers.",
            |a, b| a * b,
        ),
        (&["div", "divide"], "other", "Divide two numbers.", |a, b| a / b),
        (
            &["quotient"],
            "other",
            "Divide two numbers and take the integer quotient.",
            |a, b| (a / b).trunc(),
        ),
        (
            &["remainder", "rem", "modulus", "mod"],
            "other",
            "Divide two numbers and take the remainder.",
            |a, b| a % b,
        ),
        (
            &["greater", "max", "maximum"],
            "other",
            "Take the greater of two numbers.",
            f64::max,
        ),
        (
            &["less", "min", "minimum"],
            "other",
            "Take the less of two numbers.",
            f64::min,
        ),
        (
            &["pow", "power"],
            "exp",
            "Raise the number to the power \"exp\".",
            f64::powf,
        ),
    ];
    for (aliases, param, help, f) in binary {
        register_aliases(registries, aliases, binary_number(param, help, f))?;
    }

    Ok(())
}

fn binary_bool(help: &str, f: fn(bool, bool) -> bool) -> Mapping {
    unnamed(BOOL, BOOL, move |v, args| {
        Some(Value::Bool(f(v.as_bool()?, arg(args, 0)?.as_bool()?)))
    })
    .with_parameter(Parameter::new("other", BOOL))
    .with_help(help)
}

fn register_bools(registries: &Registries) -> Result<(), RegistryError> {
    registries.register_kind_help(
        KindHelp::new(BOOL)
            .with_short_name("Boolean")
            .with_help("A condition that is either true or false"),
    );
    registries.register_display(Display::new(BOOL, |value, _| match value.as_bool() {
        Some(b) => b.to_string(),
        None => INVALID.to_string(),
    }));
    registries.register_type_hint(TypeHint::new(ValueMarker::Bool, BOOL));

    register_aliases(
        registries,
        &["if"],
        unnamed(BOOL, STRING, |v, args| {
            let branch = if v.as_bool()? { 0 } else { 1 };
            arg(args, branch).cloned()
        })
        .with_parameter(Parameter::new("then", STRING))
        .with_parameter(Parameter::new("else", STRING))
        .with_help(
            "Resolve to the first argument (\"then\") if the condition is true, \
             otherwise to the second argument (\"else\").",
        ),
    )?;
    register_aliases(
        registries,
        &["and"],
        binary_bool("Check if both conditions are true", |a, b| a && b),
    )?;
    register_aliases(
        registries,
        &["or"],
        binary_bool("Check if either condition is true", |a, b| a || b),
    )?;
    register_aliases(
        registries,
        &["xor"],
        binary_bool("Check if exactly one of the conditions is true", |a, b| a != b),
    )?;
    register_aliases(
        registries,
        &["not"],
        unnamed(BOOL, BOOL, |v, _| Some(Value::Bool(!v.as_bool()?)))
            .with_help("Negate the condition"),
    )?;
    Ok(())
}
