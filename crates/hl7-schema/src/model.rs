//! Schema model definitions

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies a schema set: protocol name plus version (e.g. `HL7` / `2.5.1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaId {
    pub protocol: String,
    pub version: String,
}

impl SchemaId {
    pub fn new(protocol: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            version: version.into(),
        }
    }

    /// Key used by registries and caches
    pub fn qualified_name(&self) -> String {
        format!("{}: {}", self.protocol, self.version)
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.version)
    }
}

/// Kind of a child declared inside a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildKind {
    Segment,
    Group,
    Field,
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChildKind::Segment => "segment",
            ChildKind::Group => "group",
            ChildKind::Field => "field",
        };
        f.write_str(label)
    }
}

/// Kind of a structure schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    Message,
    Group,
    Segment,
}

impl StructureKind {
    /// The child kind a reference to this structure must declare
    pub fn as_child_kind(self) -> Option<ChildKind> {
        match self {
            StructureKind::Message => None,
            StructureKind::Group => Some(ChildKind::Group),
            StructureKind::Segment => Some(ChildKind::Segment),
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StructureKind::Message => "message",
            StructureKind::Group => "group",
            StructureKind::Segment => "segment",
        };
        f.write_str(label)
    }
}

/// Resolved position of a child within its owning schema.
///
/// Keys are only meaningful for the schema that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildKey(usize);

impl ChildKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Declaration of one child of a segment, group, or message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildSpec {
    /// Name the child is addressed by (unique within the schema)
    pub name: String,

    /// Segment, group, or field
    pub kind: ChildKind,

    /// Must be present at least once in a complete message
    pub required: bool,

    /// May occur more than once
    pub repeating: bool,

    /// Structure or datatype name used to instantiate the child
    #[serde(rename = "type")]
    pub type_ref: String,
}

impl ChildSpec {
    /// Create an optional, non-repeating child
    pub fn new(name: impl Into<String>, kind: ChildKind, type_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            repeating: false,
            type_ref: type_ref.into(),
        }
    }

    /// A segment child addressed by its own tag
    pub fn segment(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self::new(tag.clone(), ChildKind::Segment, tag)
    }

    /// A segment child addressed by an alias (e.g. a second `ROL` slot)
    pub fn segment_as(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::new(name, ChildKind::Segment, tag)
    }

    pub fn group(name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        Self::new(name, ChildKind::Group, type_ref)
    }

    pub fn field(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::new(name, ChildKind::Field, datatype)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn repeating(mut self, repeating: bool) -> Self {
        self.repeating = repeating;
        self
    }
}

/// Static description of a message, group, or segment
#[derive(Debug, Clone, Serialize)]
pub struct StructureSchema {
    name: String,
    kind: StructureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    children: Vec<ChildSpec>,
    #[serde(skip)]
    index: HashMap<String, ChildKey>,
}

impl StructureSchema {
    /// Create a schema, rejecting duplicate or empty child names
    pub fn new(
        name: impl Into<String>,
        kind: StructureKind,
        children: Vec<ChildSpec>,
    ) -> Result<Self> {
        let name = name.into();
        let mut index = HashMap::with_capacity(children.len());

        for (position, child) in children.iter().enumerate() {
            if child.name.trim().is_empty() {
                return Err(Error::invalid_definition(
                    &name,
                    format!("child {} has an empty name", position + 1),
                ));
            }
            if index.insert(child.name.clone(), ChildKey(position)).is_some() {
                return Err(Error::duplicate_child(&name, &child.name));
            }
        }

        Ok(Self {
            name,
            kind,
            description: None,
            children,
            index,
        })
    }

    pub fn message(name: impl Into<String>, children: Vec<ChildSpec>) -> Result<Self> {
        Self::new(name, StructureKind::Message, children)
    }

    pub fn group(name: impl Into<String>, children: Vec<ChildSpec>) -> Result<Self> {
        Self::new(name, StructureKind::Group, children)
    }

    pub fn segment(name: impl Into<String>, fields: Vec<ChildSpec>) -> Result<Self> {
        Self::new(name, StructureKind::Segment, fields)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Child declarations in wire order
    pub fn children(&self) -> &[ChildSpec] {
        &self.children
    }

    /// Child declarations paired with their resolved keys
    pub fn entries(&self) -> impl Iterator<Item = (ChildKey, &ChildSpec)> {
        self.children
            .iter()
            .enumerate()
            .map(|(position, spec)| (ChildKey(position), spec))
    }

    /// Resolve a child name to its key
    pub fn key(&self, name: &str) -> Option<ChildKey> {
        self.index.get(name).copied()
    }

    /// Key of the n-th declared child, 1-based as in HL7 field numbering
    pub fn key_for_position(&self, position: usize) -> Option<ChildKey> {
        (position >= 1 && position <= self.children.len()).then(|| ChildKey(position - 1))
    }

    pub fn child(&self, key: ChildKey) -> Option<&ChildSpec> {
        self.children.get(key.0)
    }

    pub fn find_child(&self, name: &str) -> Option<&ChildSpec> {
        self.key(name).and_then(|key| self.child(key))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl PartialEq for StructureSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.description == other.description
            && self.children == other.children
    }
}

impl Eq for StructureSchema {}

/// Semantic type of a primitive datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// Free text (ST, TX, FT)
    String,
    /// Coded value (ID, IS)
    Coded,
    /// Numeric value (NM, SI)
    Numeric,
    /// Date (DT)
    Date,
    /// Time (TM)
    Time,
    /// Date and time (DTM)
    DateTime,
}

/// One positional component of a composite datatype
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: String,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_ref: type_ref.into(),
        }
    }
}

/// Shape of a datatype: a scalar or a fixed list of components
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatatypeShape {
    Primitive(PrimitiveKind),
    Composite(Vec<ComponentSpec>),
}

/// Definition of a field datatype such as `ST`, `CE`, or `TS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatatypeDef {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    shape: DatatypeShape,
}

impl DatatypeDef {
    pub fn primitive(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            shape: DatatypeShape::Primitive(kind),
        }
    }

    pub fn composite(name: impl Into<String>, components: Vec<ComponentSpec>) -> Self {
        Self {
            name: name.into(),
            description: None,
            shape: DatatypeShape::Composite(components),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn shape(&self) -> &DatatypeShape {
        &self.shape
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.shape, DatatypeShape::Composite(_))
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.shape {
            DatatypeShape::Primitive(kind) => Some(kind),
            DatatypeShape::Composite(_) => None,
        }
    }

    /// Components of a composite; empty for primitives
    pub fn components(&self) -> &[ComponentSpec] {
        match &self.shape {
            DatatypeShape::Primitive(_) => &[],
            DatatypeShape::Composite(components) => components,
        }
    }

    /// Number of slots a value of this datatype holds
    pub fn arity(&self) -> usize {
        match &self.shape {
            DatatypeShape::Primitive(_) => 1,
            DatatypeShape::Composite(components) => components.len(),
        }
    }

    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.components().iter().position(|c| c.name == name)
    }
}
