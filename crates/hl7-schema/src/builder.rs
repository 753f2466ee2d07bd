//! Schema-set registration and validation

use crate::graph::TypeGraph;
use crate::model::{ChildKind, DatatypeDef, SchemaId, StructureKind, StructureSchema};
use crate::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Validated, immutable collection of structures and datatypes for one version
#[derive(Debug)]
pub struct SchemaSet {
    id: SchemaId,
    structures: HashMap<String, Arc<StructureSchema>>,
    datatypes: HashMap<String, Arc<DatatypeDef>>,
}

impl SchemaSet {
    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    pub fn structure(&self, name: &str) -> Option<&Arc<StructureSchema>> {
        self.structures.get(name)
    }

    pub fn datatype(&self, name: &str) -> Option<&Arc<DatatypeDef>> {
        self.datatypes.get(name)
    }

    /// All structures, sorted by name
    pub fn structures(&self) -> Vec<&Arc<StructureSchema>> {
        let mut all: Vec<_> = self.structures.values().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// All datatypes, sorted by name
    pub fn datatypes(&self) -> Vec<&Arc<DatatypeDef>> {
        let mut all: Vec<_> = self.datatypes.values().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Message structures, sorted by name
    pub fn messages(&self) -> Vec<&Arc<StructureSchema>> {
        self.structures()
            .into_iter()
            .filter(|s| s.kind() == StructureKind::Message)
            .collect()
    }
}

/// Collects definitions and validates them as one unit
#[derive(Debug)]
pub struct SchemaSetBuilder {
    id: SchemaId,
    structures: Vec<StructureSchema>,
    datatypes: Vec<DatatypeDef>,
}

impl SchemaSetBuilder {
    pub fn new(protocol: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_id(SchemaId::new(protocol, version))
    }

    pub fn with_id(id: SchemaId) -> Self {
        Self {
            id,
            structures: Vec::new(),
            datatypes: Vec::new(),
        }
    }

    pub fn structure(mut self, structure: StructureSchema) -> Self {
        self.structures.push(structure);
        self
    }

    pub fn datatype(mut self, datatype: DatatypeDef) -> Self {
        self.datatypes.push(datatype);
        self
    }

    pub fn add_structure(&mut self, structure: StructureSchema) -> &mut Self {
        self.structures.push(structure);
        self
    }

    pub fn add_datatype(&mut self, datatype: DatatypeDef) -> &mut Self {
        self.datatypes.push(datatype);
        self
    }

    /// Validate every definition and freeze the set
    pub fn build(self) -> Result<SchemaSet> {
        let mut datatypes = HashMap::with_capacity(self.datatypes.len());
        for datatype in self.datatypes {
            check_identifier(datatype.name())?;
            if datatype.is_composite() && datatype.components().is_empty() {
                return Err(Error::invalid_definition(
                    datatype.name(),
                    "composite datatype declares no components",
                ));
            }
            let name = datatype.name().to_string();
            if datatypes.insert(name.clone(), Arc::new(datatype)).is_some() {
                return Err(Error::DuplicateDefinition(format!("datatype {}", name)));
            }
        }

        let mut structures = HashMap::with_capacity(self.structures.len());
        for structure in self.structures {
            check_identifier(structure.name())?;
            let name = structure.name().to_string();
            if structures.insert(name.clone(), Arc::new(structure)).is_some() {
                return Err(Error::DuplicateDefinition(format!("structure {}", name)));
            }
        }

        // Datatypes and structures are separate namespaces
        let mut datatype_graph = TypeGraph::new();
        let mut structure_graph = TypeGraph::new();

        for datatype in datatypes.values() {
            for component in datatype.components() {
                if !datatypes.contains_key(&component.type_ref) {
                    return Err(Error::unknown_type(
                        format!("{}.{}", datatype.name(), component.name),
                        &component.type_ref,
                    ));
                }
                datatype_graph.add_edge(datatype.name(), &component.type_ref);
            }
        }

        for structure in structures.values() {
            for spec in structure.children() {
                let referrer = format!("{}.{}", structure.name(), spec.name);
                check_container(structure, spec.kind)?;

                match spec.kind {
                    ChildKind::Field => {
                        if !datatypes.contains_key(&spec.type_ref) {
                            return Err(Error::unknown_type(referrer, &spec.type_ref));
                        }
                    }
                    ChildKind::Segment | ChildKind::Group => {
                        let target = structures
                            .get(&spec.type_ref)
                            .ok_or_else(|| Error::unknown_type(&referrer, &spec.type_ref))?;
                        if target.kind().as_child_kind() != Some(spec.kind) {
                            return Err(Error::kind_mismatch(
                                structure.name(),
                                format!(
                                    "child '{}' is declared as a {} but {} is a {}",
                                    spec.name,
                                    spec.kind,
                                    target.name(),
                                    target.kind()
                                ),
                            ));
                        }
                        structure_graph.add_edge(structure.name(), &spec.type_ref);
                    }
                }
            }
        }

        if let Some(cycle) = datatype_graph
            .find_cycle()
            .or_else(|| structure_graph.find_cycle())
        {
            return Err(Error::Cycle(cycle.join(" -> ")));
        }

        debug!(
            "Registered schema set {} ({} structures, {} datatypes)",
            self.id,
            structures.len(),
            datatypes.len()
        );

        Ok(SchemaSet {
            id: self.id,
            structures,
            datatypes,
        })
    }
}

fn check_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(Error::invalid_definition(name, "not a valid identifier"))
    }
}

/// Segments hold only fields; messages and groups hold only segments and groups
fn check_container(structure: &StructureSchema, kind: ChildKind) -> Result<()> {
    let allowed = match structure.kind() {
        StructureKind::Segment => kind == ChildKind::Field,
        StructureKind::Message | StructureKind::Group => kind != ChildKind::Field,
    };
    if allowed {
        Ok(())
    } else {
        Err(Error::kind_mismatch(
            structure.name(),
            format!("a {} cannot contain a {}", structure.kind(), kind),
        ))
    }
}
