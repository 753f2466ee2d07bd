//! Concurrent registry of loaded schema sets

use crate::builder::SchemaSet;
use crate::model::SchemaId;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe cache of schema sets keyed by `SchemaId::qualified_name`
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    sets: DashMap<String, Arc<SchemaSet>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema set, replacing any set with the same id
    pub fn register(&self, set: SchemaSet) -> Arc<SchemaSet> {
        let set = Arc::new(set);
        self.sets
            .insert(set.id().qualified_name(), Arc::clone(&set));
        set
    }

    /// Register an already shared schema set
    pub fn register_shared(&self, set: Arc<SchemaSet>) {
        self.sets.insert(set.id().qualified_name(), set);
    }

    pub fn get(&self, id: &SchemaId) -> Option<Arc<SchemaSet>> {
        self.get_qualified(&id.qualified_name())
    }

    pub fn get_qualified(&self, qualified_name: &str) -> Option<Arc<SchemaSet>> {
        self.sets.get(qualified_name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &SchemaId) -> bool {
        self.sets.contains_key(&id.qualified_name())
    }

    /// Ids of every registered set, sorted
    pub fn ids(&self) -> Vec<SchemaId> {
        let mut ids: Vec<SchemaId> = self.sets.iter().map(|entry| entry.id().clone()).collect();
        ids.sort_by_key(SchemaId::qualified_name);
        ids
    }

    /// Every registered set, sorted by id
    pub fn sets(&self) -> Vec<Arc<SchemaSet>> {
        let mut sets: Vec<Arc<SchemaSet>> =
            self.sets.iter().map(|entry| Arc::clone(entry.value())).collect();
        sets.sort_by_key(|set| set.id().qualified_name());
        sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SchemaSetBuilder;
    use crate::model::{DatatypeDef, PrimitiveKind};
    use std::thread;

    fn make_set(version: &str) -> SchemaSet {
        SchemaSetBuilder::new("HL7", version)
            .datatype(DatatypeDef::primitive("ST", PrimitiveKind::String))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());

        let registered = registry.register(make_set("2.5.1"));
        let id = SchemaId::new("HL7", "2.5.1");

        assert!(registry.contains(&id));
        let fetched = registry.get(&id).unwrap();
        assert!(Arc::ptr_eq(&registered, &fetched));
        assert!(registry.get_qualified("HL7: 2.5.1").is_some());
        assert!(registry.get(&SchemaId::new("HL7", "2.3")).is_none());
    }

    #[test]
    fn test_ids_sorted() {
        let registry = SchemaRegistry::new();
        registry.register(make_set("2.5.1"));
        registry.register(make_set("2.3.1"));

        let ids = registry.ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].version, "2.3.1");
        assert_eq!(ids[1].version, "2.5.1");
        assert_eq!(registry.sets().len(), 2);
    }

    #[test]
    fn test_concurrent_reads() {
        let registry = Arc::new(SchemaRegistry::new());
        registry.register(make_set("2.5.1"));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let set = registry.get(&SchemaId::new("HL7", "2.5.1")).unwrap();
                    set.datatype("ST").is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
