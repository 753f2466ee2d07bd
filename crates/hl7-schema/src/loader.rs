//! Schema-set loader for JSON and YAML configuration files

use crate::builder::{SchemaSet, SchemaSetBuilder};
use crate::model::{
    ChildKind, ChildSpec, ComponentSpec, DatatypeDef, PrimitiveKind, SchemaId, StructureKind,
    StructureSchema,
};
use crate::registry::SchemaRegistry;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Serializable schema-set format for loading from files
#[derive(Debug, Deserialize)]
struct SchemaSetFile {
    protocol: String,
    version: String,
    #[serde(default)]
    datatypes: Vec<DatatypeFile>,
    #[serde(default)]
    structures: Vec<StructureFile>,
}

#[derive(Debug, Deserialize)]
struct DatatypeFile {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    primitive: Option<PrimitiveKind>,
    #[serde(default)]
    components: Vec<ComponentFile>,
}

#[derive(Debug, Deserialize)]
struct ComponentFile {
    name: String,
    #[serde(rename = "type")]
    type_ref: String,
}

#[derive(Debug, Deserialize)]
struct StructureFile {
    name: String,
    kind: StructureKind,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    children: Vec<ChildFile>,
}

#[derive(Debug, Deserialize)]
struct ChildFile {
    name: String,
    kind: ChildKind,
    /// Defaults to the child name (the usual case for segments)
    #[serde(rename = "type", default)]
    type_ref: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    repeating: bool,
}

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Loads schema sets from search paths and caches them in a registry
pub struct SchemaLoader {
    registry: Arc<SchemaRegistry>,
    schema_paths: Vec<PathBuf>,
}

impl SchemaLoader {
    /// Create a new schema loader with the given search paths
    pub fn new(schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry: Arc::new(SchemaRegistry::new()),
            schema_paths,
        }
    }

    /// Create a new schema loader with a pre-configured registry
    pub fn with_registry(registry: Arc<SchemaRegistry>, schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry,
            schema_paths,
        }
    }

    /// Load a schema set by protocol and version.
    /// First checks the cache, then loads from disk
    pub fn load(&self, protocol: &str, version: &str) -> Result<Arc<SchemaSet>> {
        let id = SchemaId::new(protocol, version);

        if let Some(cached) = self.registry.get(&id) {
            debug!("Cache hit for schema set: {}", id.qualified_name());
            return Ok(cached);
        }

        trace!("Cache miss for schema set: {}", id.qualified_name());

        let set = self.load_from_disk(&id)?;
        Ok(self.registry.register(set))
    }

    /// Load and register every schema file found in the search paths
    pub fn load_all(&self) -> Result<Vec<Arc<SchemaSet>>> {
        let mut loaded = Vec::new();

        for dir in &self.schema_paths {
            if !dir.is_dir() {
                warn!("Schema path is not a directory: {:?}", dir);
                continue;
            }

            let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| has_schema_extension(path))
                .collect();
            files.sort();

            for file in files {
                let set = self.load_from_file(&file)?;
                if let Some(cached) = self.registry.get(set.id()) {
                    debug!("Schema set {} already registered", set.id());
                    loaded.push(cached);
                } else {
                    loaded.push(self.registry.register(set));
                }
            }
        }

        info!("Loaded {} schema set(s)", loaded.len());
        Ok(loaded)
    }

    /// Load a schema set from a specific file path
    pub fn load_from_file(&self, path: &Path) -> Result<SchemaSet> {
        trace!("Loading schema set from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    /// Load a schema set from a JSON string
    pub fn load_from_json(&self, json: &str) -> Result<SchemaSet> {
        let file: SchemaSetFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {}", e)))?;

        convert_schema_file(file)
    }

    /// Load a schema set from a YAML string
    pub fn load_from_yaml(&self, yaml: &str) -> Result<SchemaSet> {
        let file: SchemaSetFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {}", e)))?;

        convert_schema_file(file)
    }

    fn load_from_disk(&self, id: &SchemaId) -> Result<SchemaSet> {
        let stem = format!("{}_{}", id.protocol.to_lowercase(), id.version);

        for dir in &self.schema_paths {
            for extension in EXTENSIONS {
                let file_path = dir.join(format!("{}.{}", stem, extension));
                if file_path.exists() {
                    trace!("Found schema file: {:?}", file_path);
                    let set = self.load_from_file(&file_path)?;
                    if set.id() != id {
                        return Err(Error::InvalidFormat(format!(
                            "{:?} declares {} but was loaded as {}",
                            file_path,
                            set.id(),
                            id
                        )));
                    }
                    return Ok(set);
                }
            }
        }

        Err(Error::NotFound(format!(
            "Schema set {} not found in search paths: {:?}",
            id, self.schema_paths
        )))
    }

    /// Add a search path for schema files
    pub fn add_path(&mut self, path: PathBuf) {
        self.schema_paths.push(path);
    }

    /// Get the registry backing the cache
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}

fn has_schema_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

fn convert_schema_file(file: SchemaSetFile) -> Result<SchemaSet> {
    let mut builder = SchemaSetBuilder::new(file.protocol, file.version);

    for datatype in file.datatypes {
        builder.add_datatype(convert_datatype(datatype)?);
    }

    for structure in file.structures {
        let children = structure
            .children
            .into_iter()
            .map(|child| {
                let type_ref = child.type_ref.unwrap_or_else(|| child.name.clone());
                ChildSpec::new(child.name, child.kind, type_ref)
                    .required(child.required)
                    .repeating(child.repeating)
            })
            .collect();

        let mut schema = StructureSchema::new(structure.name, structure.kind, children)?;
        if let Some(description) = structure.description {
            schema = schema.with_description(description);
        }
        builder.add_structure(schema);
    }

    builder.build()
}

fn convert_datatype(file: DatatypeFile) -> Result<DatatypeDef> {
    let datatype = match (file.primitive, file.components.is_empty()) {
        (Some(kind), true) => DatatypeDef::primitive(file.name, kind),
        (None, false) => DatatypeDef::composite(
            file.name,
            file.components
                .into_iter()
                .map(|c| ComponentSpec::new(c.name, c.type_ref))
                .collect(),
        ),
        (Some(_), false) => {
            return Err(Error::invalid_definition(
                file.name,
                "declares both a primitive kind and components",
            ));
        }
        (None, true) => {
            return Err(Error::invalid_definition(
                file.name,
                "declares neither a primitive kind nor components",
            ));
        }
    };

    Ok(match file.description {
        Some(description) => datatype.with_description(description),
        None => datatype,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_json() {
        let loader = SchemaLoader::default();
        let json = r#"
        {
            "protocol": "HL7",
            "version": "2.5.1",
            "datatypes": [
                { "name": "ST", "primitive": "string" },
                { "name": "CE", "components": [
                    { "name": "Identifier", "type": "ST" },
                    { "name": "Text", "type": "ST" }
                ]}
            ],
            "structures": [
                {
                    "name": "NTE",
                    "kind": "segment",
                    "children": [
                        { "name": "Comment", "kind": "field", "type": "ST", "repeating": true }
                    ]
                },
                {
                    "name": "NOTE_ONLY",
                    "kind": "message",
                    "children": [
                        { "name": "NTE", "kind": "segment", "required": true }
                    ]
                }
            ]
        }
        "#;

        let set = loader.load_from_json(json).unwrap();
        assert_eq!(set.id(), &SchemaId::new("HL7", "2.5.1"));
        let message = set.structure("NOTE_ONLY").unwrap();
        let nte = message.find_child("NTE").unwrap();
        assert_eq!(nte.type_ref, "NTE");
        assert!(nte.required);
        assert!(!nte.repeating);
        assert_eq!(set.datatype("CE").unwrap().arity(), 2);
    }

    #[test]
    fn test_load_from_yaml() {
        let loader = SchemaLoader::default();
        let yaml = r#"
protocol: HL7
version: "2.3.1"
datatypes:
  - { name: ST, primitive: string }
structures:
  - name: ERR
    kind: segment
    description: Error
    children:
      - { name: Error Code and Location, kind: field, type: ST, repeating: true }
"#;
        let set = loader.load_from_yaml(yaml).unwrap();
        let err = set.structure("ERR").unwrap();
        assert_eq!(err.kind(), StructureKind::Segment);
        assert_eq!(err.description(), Some("Error"));
        assert!(err.children()[0].repeating);
    }

    #[test]
    fn test_load_from_json_invalid() {
        let loader = SchemaLoader::default();
        let result = loader.load_from_json("not valid json");
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        let loader = SchemaLoader::default();
        let result = loader.load_from_yaml("protocol: HL7\nversion: [");
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_datatype_requires_exactly_one_shape() {
        let loader = SchemaLoader::default();
        let neither = r#"{"protocol": "HL7", "version": "2.5", "datatypes": [{"name": "XX"}]}"#;
        assert!(matches!(
            loader.load_from_json(neither),
            Err(Error::InvalidDefinition { .. })
        ));

        let both = r#"{"protocol": "HL7", "version": "2.5", "datatypes": [
            {"name": "ST", "primitive": "string"},
            {"name": "XX", "primitive": "string", "components": [{"name": "a", "type": "ST"}]}
        ]}"#;
        assert!(matches!(
            loader.load_from_json(both),
            Err(Error::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_duplicate_child_in_file_rejected() {
        let loader = SchemaLoader::default();
        let yaml = r#"
protocol: HL7
version: "2.5.1"
datatypes:
  - { name: ST, primitive: string }
structures:
  - name: ROL
    kind: segment
    children:
      - { name: Role Instance ID, kind: field, type: ST }
  - name: DFT_P03
    kind: message
    children:
      - { name: ROL, kind: segment, repeating: true }
      - { name: ROL, kind: segment, repeating: true }
"#;
        assert!(matches!(
            loader.load_from_yaml(yaml),
            Err(Error::DuplicateChild { .. })
        ));
    }

    #[test]
    fn test_load_schema_not_found() {
        let loader = SchemaLoader::new(vec![PathBuf::from("does/not/exist")]);
        let result = loader.load("HL7", "9.9");
        match result {
            Err(Error::NotFound(message)) => assert!(message.contains("HL7 9.9")),
            other => panic!("Expected NotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_caches_in_registry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hl7_2.4.yaml"),
            "protocol: HL7\nversion: \"2.4\"\ndatatypes:\n  - { name: ST, primitive: string }\n",
        )
        .unwrap();

        let loader = SchemaLoader::new(vec![dir.path().to_path_buf()]);
        let first = loader.load("HL7", "2.4").unwrap();
        let second = loader.load("HL7", "2.4").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.registry().len(), 1);
    }

    #[test]
    fn test_load_rejects_mismatched_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hl7_2.4.json"),
            r#"{"protocol": "HL7", "version": "2.5"}"#,
        )
        .unwrap();

        let loader = SchemaLoader::new(vec![dir.path().to_path_buf()]);
        assert!(matches!(
            loader.load("HL7", "2.4"),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_load_all_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"protocol": "HL7", "version": "2.3.1"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "protocol: HL7\nversion: \"2.5.1\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.txt"), "not a schema").unwrap();

        let mut loader = SchemaLoader::new(vec![]);
        loader.add_path(dir.path().to_path_buf());
        let sets = loader.load_all().unwrap();

        assert_eq!(sets.len(), 2);
        assert!(loader.registry().contains(&SchemaId::new("HL7", "2.3.1")));
        assert!(loader.registry().contains(&SchemaId::new("HL7", "2.5.1")));
    }
}
