//! Documentation export of registered kinds and mappings

use std::collections::BTreeMap;

use serde::Serialize;

use crate::registry::{Metadata, Registries};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Documentation {
    /// Kinds with help or a display, by label
    pub kinds: BTreeMap<String, KindDoc>,
    pub mappings: Vec<MappingDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub can_display: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDoc {
    pub name: String,
    pub source_kind: String,
    pub target_kind: String,
    pub is_implicit: bool,
    pub parameters: Vec<ParameterDoc>,
    /// Whether the mapping can signal changes
    pub mutable: bool,
    pub help: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDoc {
    pub name: String,
    pub kind: String,
    pub variadic: bool,
    pub optional: bool,
}

/// Export one registry set
pub fn export(registries: &Registries) -> Documentation {
    export_layers(std::slice::from_ref(registries))
}

/// Export several registry sets, in order
pub fn export_layers(layers: &[Registries]) -> Documentation {
    let mut doc = Documentation::default();

    for registries in layers {
        for help in registries.kind_helps.snapshot().1 {
            let kind = doc.kinds.entry(help.kind.to_string()).or_default();
            if help.short_name.is_some() {
                kind.short_name = help.short_name.clone();
            }
            if help.help.is_some() {
                kind.help = help.help.clone();
            }
        }

        for display in registries.displays.snapshot().1 {
            doc.kinds
                .entry(display.kind.to_string())
                .or_default()
                .can_display = true;
        }

        for mapping in registries.mappings.snapshot().1 {
            doc.mappings.push(MappingDoc {
                name: mapping.qualified_name.to_string(),
                source_kind: mapping.source_kind.to_string(),
                target_kind: mapping.target_kind.to_string(),
                is_implicit: mapping.is_implicit,
                parameters: mapping
                    .parameters
                    .iter()
                    .map(|param| ParameterDoc {
                        name: param.name.clone(),
                        kind: param.kind.to_string(),
                        variadic: param.variadic,
                        optional: param.optional,
                    })
                    .collect(),
                mutable: mapping.is_mutable(),
                help: mapping.help.clone(),
                metadata: mapping.metadata.clone(),
            });
        }
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::ChangeStream;
    use crate::registry::{Display, KindHelp, Mapping, Parameter, QualifiedName};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_export_kinds_and_mappings() {
        let registries = Registries::new();
        registries.register_kind_help(KindHelp::new("ex/player").with_help("A player"));
        registries.register_display(Display::new("ex/name", |_, _| String::new()));
        registries
            .register_mapping(
                Mapping::new(QualifiedName::parse("ex:name"), "ex/player", "ex/name", |v, _| {
                    Some(v.clone())
                })
                .with_parameter(Parameter::new("style", "ex/name").optional())
                .with_subscribe(|_, _| ChangeStream::never())
                .with_help("The player name"),
            )
            .unwrap();

        let doc = export(&registries);
        assert_eq!(
            doc.kinds.get("ex/player"),
            Some(&KindDoc {
                short_name: None,
                help: Some("A player".to_string()),
                can_display: false,
            })
        );
        assert!(doc.kinds["ex/name"].can_display);
        assert_eq!(
            doc.mappings,
            vec![MappingDoc {
                name: "ex:name".to_string(),
                source_kind: "ex/player".to_string(),
                target_kind: "ex/name".to_string(),
                is_implicit: false,
                parameters: vec![ParameterDoc {
                    name: "style".to_string(),
                    kind: "ex/name".to_string(),
                    variadic: false,
                    optional: true,
                }],
                mutable: true,
                help: "The player name".to_string(),
                metadata: Metadata::new(),
            }]
        );
    }

    #[test]
    fn test_json_uses_camel_case() {
        let registries = Registries::new();
        registries
            .register_mapping(
                Mapping::new(QualifiedName::parse("ex:a"), "x", "y", |v, _| Some(v.clone()))
                    .implicit(),
            )
            .unwrap();
        let json = serde_json::to_value(export(&registries)).unwrap();
        assert_eq!(json["mappings"][0]["sourceKind"], "x");
        assert_eq!(json["mappings"][0]["isImplicit"], true);
        assert!(json["mappings"][0].get("metadata").is_none());
    }
}
