//! Descriptors stored in registries: kinds, values, mappings and displays

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::eval::ChangeStream;
use crate::parser::lexer;

use super::name::{self, QualifiedName};
use super::RegistryError;

/// Conventional output of a display that cannot render its value
pub const INVALID: &str = "{invalid value}";

/// A semantic type label
///
/// Kinds carry no structure; two kinds are the same iff their labels are.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kind(Arc<str>);

impl Kind {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(Arc::from(label.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self.0)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Kind {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<&Kind> for Kind {
    fn from(kind: &Kind) -> Self {
        kind.clone()
    }
}

/// A runtime value flowing through mappings
///
/// Values carry no kind; the kind is implied by the mapping that produced them.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    /// Host-defined data
    Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The representation marker used for type hint lookups
    pub fn marker(&self) -> ValueMarker {
        match self {
            Value::Bool(_) => ValueMarker::Bool,
            Value::Number(_) => ValueMarker::Number,
            Value::String(_) => ValueMarker::String,
            Value::List(_) => ValueMarker::List,
            Value::Object(obj) => ValueMarker::Object((**obj).type_id()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(_) => write!(f, "Object(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// The concrete representation of an untagged value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueMarker {
    Bool,
    Number,
    String,
    List,
    Object(TypeId),
}

impl ValueMarker {
    /// Marker for host objects of type `T` wrapped with [`Value::object`]
    pub fn of<T: Any>() -> Self {
        ValueMarker::Object(TypeId::of::<T>())
    }
}

/// Free-form annotations on descriptors
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Converts a source value with its arguments; None means "no value"
pub type MapFn = Arc<dyn Fn(&Value, &[Option<Value>]) -> Option<Value> + Send + Sync>;

/// Starts watching the inputs of a mapping for changes
pub type SubscribeFn = Arc<dyn Fn(&Value, &[Option<Value>]) -> ChangeStream + Send + Sync>;

/// Renders a value, optionally for a specific viewer
pub type RenderFn = Arc<dyn Fn(&Value, Option<&Value>) -> String + Send + Sync>;

/// A parameter accepted by a mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: Kind,
    /// Collects every remaining positional argument into a list
    pub variadic: bool,
    pub optional: bool,
    pub metadata: Metadata,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: impl Into<Kind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            variadic: false,
            optional: false,
            metadata: Metadata::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// A named conversion from one kind to another
#[derive(Clone)]
pub struct Mapping {
    /// Unique among mappings with the same source kind
    pub qualified_name: QualifiedName,
    pub source_kind: Kind,
    pub target_kind: Kind,
    /// Whether the pathfinder may insert this mapping without it being named
    pub is_implicit: bool,
    pub parameters: Vec<Parameter>,
    pub map: MapFn,
    pub subscribe: Option<SubscribeFn>,
    pub help: String,
    pub metadata: Metadata,
}

impl Mapping {
    pub fn new(
        qualified_name: QualifiedName,
        source_kind: impl Into<Kind>,
        target_kind: impl Into<Kind>,
        map: impl Fn(&Value, &[Option<Value>]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            qualified_name,
            source_kind: source_kind.into(),
            target_kind: target_kind.into(),
            is_implicit: false,
            parameters: Vec::new(),
            map: Arc::new(map),
            subscribe: None,
            help: String::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn implicit(mut self) -> Self {
        self.is_implicit = true;
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_subscribe(
        mut self,
        subscribe: impl Fn(&Value, &[Option<Value>]) -> ChangeStream + Send + Sync + 'static,
    ) -> Self {
        self.subscribe = Some(Arc::new(subscribe));
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether the mapped value can change over time
    pub fn is_mutable(&self) -> bool {
        self.subscribe.is_some()
    }

    /// Check the structural rules every registered mapping must follow
    pub fn validate(&self) -> Result<(), RegistryError> {
        let tokens = self.qualified_name.tokens();
        if tokens.is_empty() {
            return Err(RegistryError::EmptyName {
                source_kind: self.source_kind.to_string(),
            });
        }
        for token in tokens {
            if !name::is_valid_token(token) {
                return Err(RegistryError::InvalidToken {
                    name: self.qualified_name.to_string(),
                    token: token.clone(),
                });
            }
            if !lexer::is_ident(token) {
                return Err(RegistryError::ReservedToken {
                    name: self.qualified_name.to_string(),
                    token: token.clone(),
                });
            }
        }
        if self.is_implicit && !self.parameters.is_empty() {
            return Err(RegistryError::ImplicitWithParameters {
                name: self.qualified_name.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("qualified_name", &self.qualified_name.to_string())
            .field("source_kind", &self.source_kind)
            .field("target_kind", &self.target_kind)
            .field("is_implicit", &self.is_implicit)
            .field("parameters", &self.parameters)
            .field("mutable", &self.is_mutable())
            .finish()
    }
}

/// How values of a kind are turned into text
#[derive(Clone)]
pub struct Display {
    pub kind: Kind,
    pub render: RenderFn,
}

impl Display {
    pub fn new(
        kind: impl Into<Kind>,
        render: impl Fn(&Value, Option<&Value>) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: kind.into(),
            render: Arc::new(render),
        }
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display").field("kind", &self.kind).finish()
    }
}

/// Declares that values with a given representation belong to a kind
#[derive(Debug, Clone, PartialEq)]
pub struct TypeHint {
    pub marker: ValueMarker,
    pub kind: Kind,
}

impl TypeHint {
    pub fn new(marker: ValueMarker, kind: impl Into<Kind>) -> Self {
        Self {
            marker,
            kind: kind.into(),
        }
    }
}

/// Human-readable documentation for a kind
#[derive(Debug, Clone, PartialEq)]
pub struct KindHelp {
    pub kind: Kind,
    pub short_name: Option<String>,
    pub help: Option<String>,
}

impl KindHelp {
    pub fn new(kind: impl Into<Kind>) -> Self {
        Self {
            kind: kind.into(),
            short_name: None,
            help: None,
        }
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Player;

    fn identity() -> impl Fn(&Value, &[Option<Value>]) -> Option<Value> + Send + Sync {
        |v, _| Some(v.clone())
    }

    #[test]
    fn test_value_markers() {
        assert_eq!(Value::from("a").marker(), ValueMarker::String);
        assert_eq!(Value::from(1.0).marker(), ValueMarker::Number);
        assert_eq!(Value::object(Player).marker(), ValueMarker::of::<Player>());
        assert_ne!(Value::object(1u8).marker(), ValueMarker::of::<Player>());
    }

    #[test]
    fn test_value_object_equality_is_identity() {
        let a = Value::object(Player);
        let b = Value::object(Player);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.downcast_ref::<Player>().is_some());
    }

    #[test]
    fn test_validate_accepts_plain_mapping() {
        let m = Mapping::new(QualifiedName::parse("ns:name"), "a", "b", identity());
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_implicit_with_parameters() {
        let m = Mapping::new(QualifiedName::parse("ns:name"), "a", "b", identity())
            .implicit()
            .with_parameter(Parameter::new("x", "a"));
        assert!(matches!(
            m.validate(),
            Err(RegistryError::ImplicitWithParameters { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_tokens() {
        let m = Mapping::new(QualifiedName::new(["ns", "a b"]), "a", "b", identity());
        assert!(matches!(m.validate(), Err(RegistryError::InvalidToken { .. })));

        let m = Mapping::new(QualifiedName::new(["true"]), "a", "b", identity());
        assert!(matches!(m.validate(), Err(RegistryError::ReservedToken { .. })));

        // Tokens that read back as number literals cannot be called
        for token in ["2", "1e5", "-3"] {
            let m = Mapping::new(QualifiedName::new(["ns", token]), "a", "b", identity());
            assert!(matches!(m.validate(), Err(RegistryError::ReservedToken { .. })));
        }
        let m = Mapping::new(QualifiedName::new(["ns", "mod2"]), "a", "b", identity());
        assert!(m.validate().is_ok());

        let m = Mapping::new(QualifiedName::new(Vec::<String>::new()), "a", "b", identity());
        assert!(matches!(m.validate(), Err(RegistryError::EmptyName { .. })));
    }
}
