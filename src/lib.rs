//! infotpl - type-directed template resolution
//!
//! Templates are strings with `{...}` placeholders naming a chain of
//! conversions, e.g. `{player position world name}`. Each name refers to a
//! registered mapping; the chain is resolved by searching the mapping graph
//! from the kind of the context value to a kind that can be displayed,
//! inserting implicit mappings where needed. A template renders once to a
//! string, or continuously as a stream of strings that is recomputed when a
//! mutable mapping signals a change.
//!
//! # Example
//!
//! ```rust
//! use infotpl::{Engine, Indices, Registries, Value};
//!
//! let engine = Engine::new(Indices::with_defaults(Registries::new()).unwrap());
//! let text = engine
//!     .render_named("{name upper}!", &[("name", Value::from("steve"))], None)
//!     .unwrap();
//! assert_eq!(text, "STEVE!");
//! ```

pub mod config;
pub mod defaults;
pub mod doc;
pub mod error;
pub mod eval;
pub mod parser;
pub mod pathfind;
pub mod registry;
pub mod template;

pub use config::{ConfigError, RenderConfig};
pub use error::ParseError;
pub use eval::{ChangeStream, EvalError, RenderStream};
pub use parser::{parse, Template};
pub use registry::{
    Display, Indices, Kind, KindHelp, Mapping, Parameter, QualifiedName, Registries,
    RegistryError, TypeHint, Value, ValueMarker, INVALID,
};
pub use template::BoundTemplate;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

/// Kind of the context passed to [`Engine::render_named`]
pub const ANONYMOUS_KIND: &str = "infotpl/anonymous";

/// Errors that can occur before a template is evaluated
#[derive(Debug, Error)]
pub enum RenderError {
    /// Error during parsing
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A context key is not a valid mapping name
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// No type hint matches a named context value
    #[error("cannot determine the kind of context value {key:?}")]
    UnknownContextKind { key: String },
}

/// Values passed by name to [`Engine::render_named`]
#[derive(Debug)]
struct NamedContext(BTreeMap<String, Value>);

/// Parses, binds and renders templates against a set of indices
pub struct Engine {
    indices: Indices,
    config: RenderConfig,
    templates: Mutex<HashMap<String, Arc<Template>>>,
}

impl Engine {
    pub fn new(indices: Indices) -> Self {
        Self {
            indices,
            config: RenderConfig::default(),
            templates: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Parse a template, reusing an earlier result for the same text when caching is on
    pub fn parse(&self, text: &str) -> Result<Arc<Template>, ParseError> {
        if !self.config.cache_templates {
            return parse(text).map(Arc::new);
        }

        if let Some(template) = self.templates.lock().get(text) {
            return Ok(Arc::clone(template));
        }
        let template = Arc::new(parse(text)?);
        self.templates
            .lock()
            .insert(text.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Resolve every placeholder of a template from the `start` kind
    pub fn bind(&self, text: &str, start: &Kind) -> Result<BoundTemplate, RenderError> {
        let template = self.parse(text)?;
        Ok(template::bind(&template, &self.indices, start))
    }

    /// Render a template once with `context` of kind `start`
    pub fn render_once(
        &self,
        text: &str,
        context: &Value,
        start: &Kind,
        viewer: Option<&Value>,
    ) -> Result<String, RenderError> {
        let bound = self.bind(text, start)?;
        Ok(eval::render_once(&bound, context, viewer, &self.config))
    }

    /// Render a template as a stream of updated outputs
    pub fn render_continuous(
        &self,
        text: &str,
        context: &Value,
        start: &Kind,
        viewer: Option<&Value>,
    ) -> Result<RenderStream, RenderError> {
        let bound = self.bind(text, start)?;
        Ok(eval::render_continuous(&bound, context, viewer, &self.config))
    }

    /// Render a template once against named values
    ///
    /// Each key becomes a mapping from the anonymous context kind to the kind
    /// of its value, as given by the type hints.
    pub fn render_named(
        &self,
        text: &str,
        context: &[(&str, Value)],
        viewer: Option<&Value>,
    ) -> Result<String, RenderError> {
        let (bound, context) = self.bind_named(text, context)?;
        Ok(eval::render_once(&bound, &context, viewer, &self.config))
    }

    /// Render a template continuously against named values
    pub fn render_named_continuous(
        &self,
        text: &str,
        context: &[(&str, Value)],
        viewer: Option<&Value>,
    ) -> Result<RenderStream, RenderError> {
        let (bound, context) = self.bind_named(text, context)?;
        Ok(eval::render_continuous(&bound, &context, viewer, &self.config))
    }

    fn bind_named(
        &self,
        text: &str,
        context: &[(&str, Value)],
    ) -> Result<(BoundTemplate, Value), RenderError> {
        let template = self.parse(text)?;

        let local = Registries::new();
        {
            let hints = self.indices.type_hints.read();
            for (key, value) in context {
                let kind = hints
                    .get(value.marker())
                    .ok_or_else(|| RenderError::UnknownContextKind {
                        key: key.to_string(),
                    })?;
                let name = key.to_string();
                local.register_mapping(Mapping::new(
                    QualifiedName::new([*key]),
                    ANONYMOUS_KIND,
                    kind.clone(),
                    move |ctx, _| ctx.downcast_ref::<NamedContext>()?.0.get(&name).cloned(),
                ))?;
            }
        }
        debug!("binding with {} named context values", context.len());

        let mut indices = self.indices.clone();
        indices.named_mappings.add_registry(0, local.mappings.clone());
        let bound = template::bind(&template, &indices, &Kind::new(ANONYMOUS_KIND));

        let values = context
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        Ok((bound, Value::object(NamedContext(values))))
    }
}

/// Render a template once with the default configuration
pub fn render_once(
    text: &str,
    indices: &Indices,
    context: &Value,
    start: &Kind,
    viewer: Option<&Value>,
) -> Result<String, RenderError> {
    let template = parse(text)?;
    let bound = template::bind(&template, indices, start);
    Ok(eval::render_once(
        &bound,
        context,
        viewer,
        &RenderConfig::default(),
    ))
}

/// Render a template continuously with the default configuration
pub fn render_continuous(
    text: &str,
    indices: &Indices,
    context: &Value,
    start: &Kind,
    viewer: Option<&Value>,
) -> Result<RenderStream, RenderError> {
    let template = parse(text)?;
    let bound = template::bind(&template, indices, start);
    Ok(eval::render_continuous(
        &bound,
        context,
        viewer,
        &RenderConfig::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(Indices::with_defaults(Registries::new()).unwrap())
    }

    #[test]
    fn test_render_named_arithmetic() {
        let text = engine()
            .render_named("{n add(2) mul(3)}", &[("n", Value::from(1.0))], None)
            .unwrap();
        assert_eq!(text, "9");
    }

    #[test]
    fn test_render_named_unknown_kind() {
        let err = engine()
            .render_named("{x}", &[("x", Value::List(vec![]))], None)
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownContextKind { key } if key == "x"));
    }

    #[test]
    fn test_named_context_does_not_leak() {
        let engine = engine();
        engine
            .render_named("{a}", &[("a", Value::from("x"))], None)
            .unwrap();
        let text = engine.render_named("{a}", &[], None).unwrap();
        assert_eq!(text, "{unknownPath:a}");
    }

    #[test]
    fn test_parse_cache() {
        let engine = engine();
        let a = engine.parse("{x}").unwrap();
        let b = engine.parse("{x}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let engine = engine.with_config(RenderConfig::default().with_cache_templates(false));
        let a = engine.parse("{x}").unwrap();
        let b = engine.parse("{x}").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(
            engine().render_named("oops }", &[], None),
            Err(RenderError::Parse(_))
        ));
    }

    #[test]
    fn test_bool_if_with_literals() {
        let text = engine()
            .render_named(
                r#"{flag if("on", "off")} / {flag not if(then = "on", else = "off")}"#,
                &[("flag", Value::from(true))],
                None,
            )
            .unwrap();
        assert_eq!(text, "on / off");
    }
}
