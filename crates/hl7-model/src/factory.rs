//! Resolution of structure and datatype names to shared schemas

use crate::{Error, Result};
use hl7_schema::{DatatypeDef, SchemaId, SchemaRegistry, SchemaSet, StructureSchema};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves type names to schema definitions for lazily created children.
///
/// Implementations must be deterministic: the same name always yields the
/// same definition for the lifetime of the factory.
pub trait ModelFactory: Send + Sync {
    /// Protocol and version this factory builds models for
    fn schema_id(&self) -> &SchemaId;

    /// Look up a segment, group, or message schema by name
    fn structure(&self, name: &str) -> Result<Arc<StructureSchema>>;

    /// Look up a field datatype by name
    fn datatype(&self, name: &str) -> Result<Arc<DatatypeDef>>;
}

/// Factory backed by a single validated [`SchemaSet`]
#[derive(Debug, Clone)]
pub struct SchemaSetFactory {
    set: Arc<SchemaSet>,
}

impl SchemaSetFactory {
    pub fn new(set: Arc<SchemaSet>) -> Self {
        Self { set }
    }

    /// Wrap a schema set as a shareable trait object
    pub fn shared(set: Arc<SchemaSet>) -> Arc<dyn ModelFactory> {
        Arc::new(Self::new(set))
    }

    pub fn set(&self) -> &Arc<SchemaSet> {
        &self.set
    }
}

impl ModelFactory for SchemaSetFactory {
    fn schema_id(&self) -> &SchemaId {
        self.set.id()
    }

    fn structure(&self, name: &str) -> Result<Arc<StructureSchema>> {
        self.set
            .structure(name)
            .cloned()
            .ok_or_else(|| Error::unknown_type(self.set.id().to_string(), "structure", name))
    }

    fn datatype(&self, name: &str) -> Result<Arc<DatatypeDef>> {
        self.set
            .datatype(name)
            .cloned()
            .ok_or_else(|| Error::unknown_type(self.set.id().to_string(), "datatype", name))
    }
}

/// Factories keyed by protocol and version
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<SchemaId, Arc<dyn ModelFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a factory for every set held by a schema registry
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        let mut factories = Self::new();
        for set in registry.sets() {
            factories.register(SchemaSetFactory::shared(set));
        }
        factories
    }

    /// Register a factory, replacing any factory for the same id
    pub fn register(&mut self, factory: Arc<dyn ModelFactory>) {
        let id = factory.schema_id().clone();
        debug!(schema = %id, "Registered model factory");
        self.factories.insert(id, factory);
    }

    pub fn get(&self, id: &SchemaId) -> Option<Arc<dyn ModelFactory>> {
        self.factories.get(id).cloned()
    }

    pub fn for_version(&self, protocol: &str, version: &str) -> Option<Arc<dyn ModelFactory>> {
        self.get(&SchemaId::new(protocol, version))
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<SchemaId> {
        let mut ids: Vec<SchemaId> = self.factories.keys().cloned().collect();
        ids.sort_by_key(SchemaId::qualified_name);
        ids
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::testing::sample_set;

    #[test]
    fn test_schema_set_factory_resolves_names() {
        let factory = SchemaSetFactory::new(sample_set());

        let hdr = factory.structure("HDR").unwrap();
        assert_eq!(hdr.name(), "HDR");
        let again = factory.structure("HDR").unwrap();
        assert!(Arc::ptr_eq(&hdr, &again));

        let ts = factory.datatype("TS").unwrap();
        assert_eq!(ts.arity(), 2);
    }

    #[test]
    fn test_unknown_names_are_configuration_errors() {
        let factory = SchemaSetFactory::new(sample_set());

        let err = factory.structure("ZZZ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
        assert!(err.to_string().contains("ZZZ"));

        let err = factory.datatype("XYZ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn test_registry_selects_by_version() {
        let schemas = SchemaRegistry::new();
        schemas.register_shared(sample_set());

        let registry = FactoryRegistry::from_registry(&schemas);
        assert_eq!(registry.len(), 1);
        assert!(registry.for_version("TEST", "1.0").is_some());
        assert!(registry.for_version("TEST", "2.0").is_none());
        assert_eq!(registry.ids(), vec![SchemaId::new("TEST", "1.0")]);
    }
}
