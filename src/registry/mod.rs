//! Append-only registries of descriptors and the indices derived from them
//!
//! A [`Registry`] only ever grows. Every append bumps its generation; an
//! [`Index`] remembers the generations it was built from and rebuilds itself
//! from scratch the next time it is read after any of them changed.

mod descriptor;
mod index;
mod name;

pub use descriptor::{
    Display, Kind, KindHelp, MapFn, Mapping, Metadata, Parameter, RenderFn, SubscribeFn, TypeHint,
    Value, ValueMarker, INVALID,
};
pub use index::{
    DisplayIndex, ImplicitMappingIndex, KindHelpIndex, NamedMappingIndex, ScoredMapping,
    TypeHintIndex,
};
pub use name::{is_valid_token, QualifiedName, QualifiedRef, SEPARATOR};

use std::sync::Arc;

use log::debug;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use thiserror::Error;

/// Errors raised when registering a descriptor
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// Mapping registered without any name token
    #[error("mapping from {source_kind} has an empty name")]
    EmptyName { source_kind: String },

    /// Name token outside `[A-Za-z0-9_-]`
    #[error("invalid token {token:?} in mapping name {name}")]
    InvalidToken { name: String, token: String },

    /// Tokens like `true` or `2` are read as literals in templates
    #[error("reserved token {token:?} in mapping name {name}")]
    ReservedToken { name: String, token: String },

    /// Implicit mappings are inserted without arguments
    #[error("implicit mapping {name} must not declare parameters")]
    ImplicitWithParameters { name: String },

    /// Two mappings with the same name from the same kind
    #[error("duplicate mapping {name} from {source_kind}")]
    Duplicate { name: String, source_kind: String },
}

struct RegistryInner<T> {
    items: Vec<Arc<T>>,
    generation: u64,
}

/// A shared, append-only list of descriptors
///
/// Cloning yields another handle to the same list.
pub struct Registry<T> {
    inner: Arc<RwLock<RegistryInner<T>>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                items: Vec::new(),
                generation: 0,
            })),
        }
    }

    pub fn register(&self, item: T) {
        let mut inner = self.inner.write();
        inner.items.push(Arc::new(item));
        inner.generation += 1;
    }

    /// Append `item` unless `check` rejects it given the current contents
    pub fn register_checked<E>(
        &self,
        item: T,
        check: impl FnOnce(&[Arc<T>], &T) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut inner = self.inner.write();
        check(&inner.items, &item)?;
        inner.items.push(Arc::new(item));
        inner.generation += 1;
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current generation together with the items it covers
    pub fn snapshot(&self) -> (u64, Vec<Arc<T>>) {
        let inner = self.inner.read();
        (inner.generation, inner.items.clone())
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A structure derived from the items of some registries
pub trait IndexBuilder: Default {
    type Item;

    /// Forget everything indexed so far
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Absorb one item; called in registry order, then item order
    fn index(&mut self, item: &Arc<Self::Item>);
}

struct IndexState<B> {
    last_sync: Option<Vec<u64>>,
    builder: B,
}

/// A lazily rebuilt index over an ordered list of registries
pub struct Index<B: IndexBuilder> {
    registries: Vec<Registry<B::Item>>,
    state: RwLock<IndexState<B>>,
}

impl<B: IndexBuilder> Index<B> {
    pub fn new(registries: Vec<Registry<B::Item>>) -> Self {
        Self {
            registries,
            state: RwLock::new(IndexState {
                last_sync: None,
                builder: B::default(),
            }),
        }
    }

    /// Insert a registry at `position`; the next read rebuilds
    pub fn add_registry(&mut self, position: usize, registry: Registry<B::Item>) {
        let position = position.min(self.registries.len());
        self.registries.insert(position, registry);
        self.state.get_mut().last_sync = None;
    }

    fn generations(&self) -> Vec<u64> {
        self.registries.iter().map(Registry::generation).collect()
    }

    /// Rebuild if any registry changed since the last sync
    pub fn sync(&self) {
        if self.state.read().last_sync.as_ref() == Some(&self.generations()) {
            return;
        }

        let mut state = self.state.write();
        // Another reader may have rebuilt while we waited for the lock
        if state.last_sync.as_ref() == Some(&self.generations()) {
            return;
        }

        state.builder.reset();
        let mut generations = Vec::with_capacity(self.registries.len());
        for registry in &self.registries {
            let (generation, items) = registry.snapshot();
            for item in &items {
                state.builder.index(item);
            }
            generations.push(generation);
        }
        debug!(
            "rebuilt {} over generations {:?}",
            std::any::type_name::<B>(),
            generations
        );
        state.last_sync = Some(generations);
    }

    /// Sync, then borrow the index
    pub fn read(&self) -> MappedRwLockReadGuard<'_, B> {
        self.sync();
        RwLockReadGuard::map(self.state.read(), |state| &state.builder)
    }
}

impl<B: IndexBuilder + Clone> Clone for Index<B> {
    fn clone(&self) -> Self {
        let state = self.state.read();
        Self {
            registries: self.registries.clone(),
            state: RwLock::new(IndexState {
                last_sync: state.last_sync.clone(),
                builder: state.builder.clone(),
            }),
        }
    }
}

/// One set of registries, one per descriptor type
#[derive(Clone, Default)]
pub struct Registries {
    pub kind_helps: Registry<KindHelp>,
    pub displays: Registry<Display>,
    pub mappings: Registry<Mapping>,
    pub type_hints: Registry<TypeHint>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_mapping(&self, mapping: Mapping) -> Result<(), RegistryError> {
        mapping.validate()?;
        self.mappings.register_checked(mapping, |existing, mapping| {
            let duplicate = existing.iter().any(|m| {
                m.source_kind == mapping.source_kind && m.qualified_name == mapping.qualified_name
            });
            if duplicate {
                return Err(RegistryError::Duplicate {
                    name: mapping.qualified_name.to_string(),
                    source_kind: mapping.source_kind.to_string(),
                });
            }
            Ok(())
        })
    }

    pub fn register_display(&self, display: Display) {
        self.displays.register(display);
    }

    pub fn register_type_hint(&self, hint: TypeHint) {
        self.type_hints.register(hint);
    }

    pub fn register_kind_help(&self, help: KindHelp) {
        self.kind_helps.register(help);
    }
}

/// The indices a template is resolved against
///
/// Built over an ordered list of registry sets; later sets override earlier
/// ones where an index keeps a single entry per kind.
#[derive(Clone)]
pub struct Indices {
    layers: Vec<Registries>,
    pub displays: Index<DisplayIndex>,
    pub named_mappings: Index<NamedMappingIndex>,
    pub implicit_mappings: Index<ImplicitMappingIndex>,
    pub type_hints: Index<TypeHintIndex>,
    pub kind_helps: Index<KindHelpIndex>,
}

impl Indices {
    /// Indices over the given registry sets, in order
    ///
    /// An empty list gets one fresh set.
    pub fn new(mut layers: Vec<Registries>) -> Self {
        if layers.is_empty() {
            layers.push(Registries::new());
        }

        fn collect<T>(
            layers: &[Registries],
            f: impl Fn(&Registries) -> &Registry<T>,
        ) -> Vec<Registry<T>> {
            layers.iter().map(|layer| f(layer).clone()).collect()
        }

        Self {
            displays: Index::new(collect(&layers, |r| &r.displays)),
            named_mappings: Index::new(collect(&layers, |r| &r.mappings)),
            implicit_mappings: Index::new(collect(&layers, |r| &r.mappings)),
            type_hints: Index::new(collect(&layers, |r| &r.type_hints)),
            kind_helps: Index::new(collect(&layers, |r| &r.kind_helps)),
            layers,
        }
    }

    /// Indices over one fresh, empty registry set
    pub fn for_test() -> Self {
        Self::new(vec![Registries::new()])
    }

    /// The standard catalogue followed by `extension`
    pub fn with_defaults(extension: Registries) -> Result<Self, RegistryError> {
        let defaults = Registries::new();
        crate::defaults::register(&defaults)?;
        Ok(Self::new(vec![defaults, extension]))
    }

    /// Every registry set, in index order
    pub fn layers(&self) -> &[Registries] {
        &self.layers
    }

    /// The last registry set, where new descriptors are usually added
    pub fn registries(&self) -> &Registries {
        &self.layers[self.layers.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        seen: Vec<u32>,
    }

    impl IndexBuilder for Counter {
        type Item = u32;

        fn index(&mut self, item: &Arc<u32>) {
            self.seen.push(**item);
        }
    }

    #[test]
    fn test_generation_bumps_on_append() {
        let registry = Registry::new();
        assert_eq!(registry.generation(), 0);
        registry.register(1u32);
        registry.register(2u32);
        assert_eq!(registry.generation(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_index_rebuilds_after_append() {
        let a = Registry::new();
        let b = Registry::new();
        a.register(1u32);
        b.register(10u32);
        let index: Index<Counter> = Index::new(vec![a.clone(), b.clone()]);
        assert_eq!(index.read().seen, vec![1, 10]);

        a.register(2);
        assert_eq!(index.read().seen, vec![1, 2, 10]);
    }

    #[test]
    fn test_add_registry_forces_rebuild() {
        let a = Registry::new();
        a.register(1u32);
        let mut index: Index<Counter> = Index::new(vec![a]);
        assert_eq!(index.read().seen, vec![1]);

        let local = Registry::new();
        local.register(0u32);
        index.add_registry(0, local);
        assert_eq!(index.read().seen, vec![0, 1]);
    }

    #[test]
    fn test_duplicate_mapping_rejected() {
        let registries = Registries::new();
        let mapping = Mapping::new(QualifiedName::parse("ns:a"), "x", "y", |v, _| Some(v.clone()));
        assert!(registries.register_mapping(mapping.clone()).is_ok());
        assert!(matches!(
            registries.register_mapping(mapping),
            Err(RegistryError::Duplicate { .. })
        ));

        // Same name from another kind is fine
        let other = Mapping::new(QualifiedName::parse("ns:a"), "z", "y", |v, _| Some(v.clone()));
        assert!(registries.register_mapping(other).is_ok());
    }
}
