// SPDX-License-Identifier: MIT

//! Pluggable class (de)serialization hooks (SPEC_FULL.md §10, "Dynamic
//! dispatch over serialization callbacks").
//!
//! The wire format is JSON, but task payloads are opaque bytes chosen by
//! the caller; a caller that wants a custom in-process type to cross the
//! wire transparently registers a [`ClassExtension`] rather than the
//! framing layer growing bespoke knowledge of that type.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Encodes a boxed `Any` payload of a registered class into wire bytes.
pub type EncodeFn = Arc<dyn Fn(&(dyn std::any::Any + Send + Sync)) -> Bytes + Send + Sync>;

/// Decodes wire bytes back into a boxed `Any` payload of a registered class.
pub type DecodeFn =
    Arc<dyn Fn(&Bytes) -> Box<dyn std::any::Any + Send + Sync> + Send + Sync>;

/// One registered class's encode/decode pair.
///
/// `vectorized` mirrors the upstream notion that some classes serialize a
/// whole batch of values more efficiently than one-at-a-time; callers that
/// set it are promising `encode`/`decode` accept/produce a batch-shaped
/// payload rather than a single value.
#[derive(Clone)]
pub struct ClassExtension {
    pub class_tag: String,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
    pub vectorized: bool,
}

impl std::fmt::Debug for ClassExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassExtension")
            .field("class_tag", &self.class_tag)
            .field("vectorized", &self.vectorized)
            .finish_non_exhaustive()
    }
}

/// A registry of [`ClassExtension`]s keyed by class tag.
///
/// Lookups are by tag string rather than `TypeId` because the tag travels
/// on the wire (a peer process registering the same tag need not share a
/// Rust type).
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, ClassExtension>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: ClassExtension) {
        self.extensions.insert(extension.class_tag.clone(), extension);
    }

    pub fn get(&self, class_tag: &str) -> Option<&ClassExtension> {
        self.extensions.get(class_tag)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_by_tag() {
        let mut registry = ExtensionRegistry::new();
        registry.register(ClassExtension {
            class_tag: "custom".into(),
            encode: Arc::new(|_| Bytes::new()),
            decode: Arc::new(|_| Box::new(())),
            vectorized: false,
        });
        assert!(registry.get("custom").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_registry_has_no_extensions() {
        let registry = ExtensionRegistry::new();
        assert!(registry.is_empty());
    }
}
