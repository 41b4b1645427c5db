//! Concrete indices over mappings, displays, type hints and kind help

use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::{Display, Kind, KindHelp, Mapping, TypeHint, ValueMarker};
use super::name::QualifiedRef;
use super::IndexBuilder;

/// A named mapping together with how well it matched a reference
#[derive(Debug, Clone)]
pub struct ScoredMapping {
    pub mapping: Arc<Mapping>,
    /// Number of canonical name tokens the reference skipped
    pub score: u32,
}

/// Named mappings keyed by source kind, then short name
#[derive(Debug, Clone, Default)]
pub struct NamedMappingIndex {
    by_source: HashMap<Kind, HashMap<String, Vec<Arc<Mapping>>>>,
}

impl IndexBuilder for NamedMappingIndex {
    type Item = Mapping;

    fn index(&mut self, mapping: &Arc<Mapping>) {
        self.by_source
            .entry(mapping.source_kind.clone())
            .or_default()
            .entry(mapping.qualified_name.short_name().to_string())
            .or_default()
            .push(Arc::clone(mapping));
    }
}

impl NamedMappingIndex {
    /// Every mapping from `source` whose name matches `reference`, in registration order
    pub fn find(&self, source: &Kind, reference: &QualifiedRef) -> Vec<ScoredMapping> {
        let Some(candidates) = self
            .by_source
            .get(source)
            .and_then(|by_name| by_name.get(reference.short_name()))
        else {
            return Vec::new();
        };

        candidates
            .iter()
            .filter_map(|mapping| {
                let score = mapping.qualified_name.matches(reference)?;
                Some(ScoredMapping {
                    mapping: Arc::clone(mapping),
                    score,
                })
            })
            .collect()
    }
}

/// Implicit mappings keyed by source kind, most recently registered first
#[derive(Debug, Clone, Default)]
pub struct ImplicitMappingIndex {
    by_source: HashMap<Kind, Vec<Arc<Mapping>>>,
}

impl IndexBuilder for ImplicitMappingIndex {
    type Item = Mapping;

    fn index(&mut self, mapping: &Arc<Mapping>) {
        if !mapping.is_implicit {
            return;
        }
        self.by_source
            .entry(mapping.source_kind.clone())
            .or_default()
            .insert(0, Arc::clone(mapping));
    }
}

impl ImplicitMappingIndex {
    pub fn get(&self, source: &Kind) -> &[Arc<Mapping>] {
        self.by_source
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// One display per kind; the last registered wins
#[derive(Debug, Clone, Default)]
pub struct DisplayIndex {
    by_kind: HashMap<Kind, Arc<Display>>,
}

impl IndexBuilder for DisplayIndex {
    type Item = Display;

    fn index(&mut self, display: &Arc<Display>) {
        self.by_kind.insert(display.kind.clone(), Arc::clone(display));
    }
}

impl DisplayIndex {
    pub fn get(&self, kind: &Kind) -> Option<&Arc<Display>> {
        self.by_kind.get(kind)
    }

    pub fn can_display(&self, kind: &Kind) -> bool {
        self.by_kind.contains_key(kind)
    }
}

/// Infers the kind of an untagged value from its representation
#[derive(Debug, Clone, Default)]
pub struct TypeHintIndex {
    by_marker: HashMap<ValueMarker, Kind>,
}

impl IndexBuilder for TypeHintIndex {
    type Item = TypeHint;

    fn index(&mut self, hint: &Arc<TypeHint>) {
        self.by_marker.insert(hint.marker, hint.kind.clone());
    }
}

impl TypeHintIndex {
    pub fn get(&self, marker: ValueMarker) -> Option<&Kind> {
        self.by_marker.get(&marker)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KindHelpIndex {
    by_kind: HashMap<Kind, Arc<KindHelp>>,
}

impl IndexBuilder for KindHelpIndex {
    type Item = KindHelp;

    fn index(&mut self, help: &Arc<KindHelp>) {
        self.by_kind.insert(help.kind.clone(), Arc::clone(help));
    }
}

impl KindHelpIndex {
    pub fn get(&self, kind: &Kind) -> Option<&Arc<KindHelp>> {
        self.by_kind.get(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<KindHelp>> {
        self.by_kind.values()
    }
}
