//! Structure nodes: the single runtime type for messages, groups, and segments

use crate::factory::ModelFactory;
use crate::value::Value;
use crate::{Error, Result};
use hl7_schema::{ChildKey, ChildKind, ChildSpec, StructureKind, StructureSchema};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Identity of one node or value instance, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One repetition of a declared child
#[derive(Debug, PartialEq)]
pub enum Child {
    /// A segment or group
    Structure(StructureNode),
    /// A field occurrence
    Field(Value),
}

impl Child {
    pub fn id(&self) -> InstanceId {
        match self {
            Child::Structure(node) => node.id(),
            Child::Field(value) => value.id(),
        }
    }

    pub fn kind(&self) -> ChildKind {
        match self {
            Child::Structure(node) if node.kind() == StructureKind::Segment => ChildKind::Segment,
            Child::Structure(_) => ChildKind::Group,
            Child::Field(_) => ChildKind::Field,
        }
    }

    pub fn as_structure(&self) -> Option<&StructureNode> {
        match self {
            Child::Structure(node) => Some(node),
            Child::Field(_) => None,
        }
    }

    pub fn as_structure_mut(&mut self) -> Option<&mut StructureNode> {
        match self {
            Child::Structure(node) => Some(node),
            Child::Field(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<&Value> {
        match self {
            Child::Field(value) => Some(value),
            Child::Structure(_) => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut Value> {
        match self {
            Child::Field(value) => Some(value),
            Child::Structure(_) => None,
        }
    }

    pub fn into_structure(self) -> Option<StructureNode> {
        match self {
            Child::Structure(node) => Some(node),
            Child::Field(_) => None,
        }
    }

    pub fn into_field(self) -> Option<Value> {
        match self {
            Child::Field(value) => Some(value),
            Child::Structure(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Child::Structure(node) => node.is_empty(),
            Child::Field(value) => value.is_empty(),
        }
    }

    /// Produces no wire output: an empty field or a group without segments
    pub(crate) fn is_vacant(&self) -> bool {
        match self {
            Child::Structure(node) => node.is_vacant(),
            Child::Field(value) => value.is_empty(),
        }
    }
}

impl Serialize for Child {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Child::Structure(node) => node.serialize(serializer),
            Child::Field(value) => value.serialize(serializer),
        }
    }
}

/// A message, group, or segment instance.
///
/// Children are addressed by their declared name (or a resolved
/// [`ChildKey`]) and a zero-based repetition index. Repetitions of each
/// child are contiguous and kept in insertion order. Navigating to the next
/// free repetition creates it; navigating further is a [`Error::RepetitionGap`].
pub struct StructureNode {
    id: InstanceId,
    schema: Arc<StructureSchema>,
    factory: Arc<dyn ModelFactory>,
    children: Vec<Vec<Child>>,
}

impl StructureNode {
    pub fn new(schema: Arc<StructureSchema>, factory: Arc<dyn ModelFactory>) -> Self {
        let children = (0..schema.len()).map(|_| Vec::new()).collect();
        Self {
            id: InstanceId::next(),
            schema,
            factory,
            children,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn kind(&self) -> StructureKind {
        self.schema.kind()
    }

    pub fn schema(&self) -> &Arc<StructureSchema> {
        &self.schema
    }

    pub fn factory(&self) -> &Arc<dyn ModelFactory> {
        &self.factory
    }

    /// Resolve a declared child name
    pub fn key(&self, name: &str) -> Result<ChildKey> {
        self.schema
            .key(name)
            .ok_or_else(|| Error::undeclared(self.schema.name(), name))
    }

    /// Declaration of a child
    pub fn spec(&self, key: ChildKey) -> Result<&ChildSpec> {
        self.schema.child(key).ok_or_else(|| {
            Error::internal(
                self.schema.name(),
                format!("key {} does not belong to this schema", key.index()),
            )
        })
    }

    /// Get a repetition, creating it when `rep` is the next free index
    pub fn get(&mut self, name: &str, rep: usize) -> Result<&mut Child> {
        let key = self.key(name)?;
        self.get_at(key, rep)
    }

    pub fn get_at(&mut self, key: ChildKey, rep: usize) -> Result<&mut Child> {
        let schema = Arc::clone(&self.schema);
        let spec = schema.child(key).ok_or_else(|| {
            Error::internal(schema.name(), format!("key {} out of range", key.index()))
        })?;
        let slot = key.index();
        let count = self.children[slot].len();

        if rep < count {
            return Ok(&mut self.children[slot][rep]);
        }
        if rep > count {
            return Err(Error::RepetitionGap {
                name: spec.name.clone(),
                requested: rep,
                count,
            });
        }
        if count > 0 && !spec.repeating {
            return Err(Error::Cardinality {
                name: spec.name.clone(),
            });
        }

        let child = self.instantiate(spec)?;
        trace!(
            parent = %schema.name(),
            child = %spec.name,
            rep,
            "Created child repetition"
        );
        let reps = &mut self.children[slot];
        reps.push(child);
        let last = reps.len() - 1;
        Ok(&mut reps[last])
    }

    /// Read a repetition without creating anything
    pub fn peek(&self, name: &str, rep: usize) -> Result<Option<&Child>> {
        let key = self.key(name)?;
        Ok(self.peek_at(key, rep))
    }

    pub fn peek_at(&self, key: ChildKey, rep: usize) -> Option<&Child> {
        self.children.get(key.index())?.get(rep)
    }

    pub fn count_repetitions(&self, name: &str) -> Result<usize> {
        let key = self.key(name)?;
        Ok(self.count_at(key))
    }

    pub fn count_at(&self, key: ChildKey) -> usize {
        self.children.get(key.index()).map_or(0, Vec::len)
    }

    /// Existing repetitions in insertion order; creates nothing
    pub fn iter(&self, name: &str) -> Result<std::slice::Iter<'_, Child>> {
        let key = self.key(name)?;
        Ok(self.iter_at(key))
    }

    pub fn iter_at(&self, key: ChildKey) -> std::slice::Iter<'_, Child> {
        self.children
            .get(key.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
    }

    pub fn iter_mut(&mut self, name: &str) -> Result<std::slice::IterMut<'_, Child>> {
        let key = self.key(name)?;
        Ok(self.children[key.index()].iter_mut())
    }

    /// Append a repetition
    pub fn add(&mut self, name: &str) -> Result<&mut Child> {
        let key = self.key(name)?;
        self.add_at(key)
    }

    pub fn add_at(&mut self, key: ChildKey) -> Result<&mut Child> {
        let count = self.count_at(key);
        self.get_at(key, count)
    }

    /// Remove the repetition with the given identity, shifting later ones down
    pub fn remove(&mut self, name: &str, instance: InstanceId) -> Result<Child> {
        let key = self.key(name)?;
        let reps = &mut self.children[key.index()];
        match reps.iter().position(|child| child.id() == instance) {
            Some(index) => Ok(reps.remove(index)),
            None => Err(Error::MissingInstance {
                name: name.to_string(),
                id: instance,
            }),
        }
    }

    /// Remove the repetition at `index`, shifting later ones down
    pub fn remove_at(&mut self, name: &str, index: usize) -> Result<Child> {
        let key = self.key(name)?;
        self.remove_key_at(key, index)
    }

    pub fn remove_key_at(&mut self, key: ChildKey, index: usize) -> Result<Child> {
        let name = self.spec(key)?.name.clone();
        let reps = &mut self.children[key.index()];
        if index >= reps.len() {
            return Err(Error::MissingRepetition {
                name,
                index,
                count: reps.len(),
            });
        }
        Ok(reps.remove(index))
    }

    /// Drop every repetition of a child
    pub fn clear(&mut self, name: &str) -> Result<Vec<Child>> {
        let key = self.key(name)?;
        Ok(std::mem::take(&mut self.children[key.index()]))
    }

    /// Get a segment or group repetition
    pub fn structure(&mut self, name: &str, rep: usize) -> Result<&mut StructureNode> {
        let key = self.key(name)?;
        self.structure_at(key, rep)
    }

    pub fn structure_at(&mut self, key: ChildKey, rep: usize) -> Result<&mut StructureNode> {
        self.expect_structure(key)?;
        let context = self.schema.name().to_string();
        self.get_at(key, rep)?
            .as_structure_mut()
            .ok_or_else(|| Error::internal(context, "structure child holds a field"))
    }

    pub fn add_structure(&mut self, name: &str) -> Result<&mut StructureNode> {
        let key = self.key(name)?;
        let count = self.count_at(key);
        self.structure_at(key, count)
    }

    /// Get a field repetition
    pub fn field(&mut self, name: &str, rep: usize) -> Result<&mut Value> {
        let key = self.key(name)?;
        self.field_at(key, rep)
    }

    pub fn field_at(&mut self, key: ChildKey, rep: usize) -> Result<&mut Value> {
        self.expect_field(key)?;
        let context = self.schema.name().to_string();
        self.get_at(key, rep)?
            .as_field_mut()
            .ok_or_else(|| Error::internal(context, "field child holds a structure"))
    }

    pub fn add_field(&mut self, name: &str) -> Result<&mut Value> {
        let key = self.key(name)?;
        self.add_field_at(key)
    }

    pub fn add_field_at(&mut self, key: ChildKey) -> Result<&mut Value> {
        let count = self.count_at(key);
        self.field_at(key, count)
    }

    /// Address a segment field by its 1-based HL7 position
    pub fn field_number(&mut self, position: usize, rep: usize) -> Result<&mut Value> {
        let key = self
            .schema
            .key_for_position(position)
            .ok_or_else(|| Error::undeclared(self.schema.name(), format!("field {}", position)))?;
        self.field_at(key, rep)
    }

    /// Read a field repetition without creating it
    pub fn peek_field(&self, name: &str, rep: usize) -> Result<Option<&Value>> {
        Ok(self.peek(name, rep)?.and_then(Child::as_field))
    }

    /// Read a segment or group repetition without creating it
    pub fn peek_structure(&self, name: &str, rep: usize) -> Result<Option<&StructureNode>> {
        Ok(self.peek(name, rep)?.and_then(Child::as_structure))
    }

    /// Every populated child slot, in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&ChildSpec, &[Child])> {
        self.schema
            .children()
            .iter()
            .zip(self.children.iter().map(Vec::as_slice))
    }

    /// True when no field below this node holds a value
    pub fn is_empty(&self) -> bool {
        self.children.iter().flatten().all(Child::is_empty)
    }

    /// True for groups (and messages) that contain no segment at any depth
    pub(crate) fn is_vacant(&self) -> bool {
        self.kind() != StructureKind::Segment
            && self.children.iter().flatten().all(Child::is_vacant)
    }

    fn instantiate(&self, spec: &ChildSpec) -> Result<Child> {
        match spec.kind {
            ChildKind::Field => {
                let datatype = self.factory.datatype(&spec.type_ref)?;
                Ok(Child::Field(Value::with_factory(datatype, &self.factory)))
            }
            ChildKind::Segment | ChildKind::Group => {
                let schema = self.factory.structure(&spec.type_ref)?;
                if schema.kind().as_child_kind() != Some(spec.kind) {
                    return Err(Error::internal(
                        self.schema.name(),
                        format!(
                            "factory returned a {} for {} child '{}'",
                            schema.kind(),
                            spec.kind,
                            spec.name
                        ),
                    ));
                }
                Ok(Child::Structure(StructureNode::new(
                    schema,
                    Arc::clone(&self.factory),
                )))
            }
        }
    }

    fn expect_structure(&self, key: ChildKey) -> Result<()> {
        let spec = self.spec(key)?;
        if spec.kind == ChildKind::Field {
            return Err(Error::KindMismatch {
                name: spec.name.clone(),
                expected: "segment or group",
                found: spec.kind,
            });
        }
        Ok(())
    }

    fn expect_field(&self, key: ChildKey) -> Result<()> {
        let spec = self.spec(key)?;
        if spec.kind != ChildKind::Field {
            return Err(Error::KindMismatch {
                name: spec.name.clone(),
                expected: "field",
                found: spec.kind,
            });
        }
        Ok(())
    }
}

/// Repetitions without trailing vacant entries
fn significant(reps: &[Child]) -> &[Child] {
    let len = reps
        .iter()
        .rposition(|child| !child.is_vacant())
        .map_or(0, |last| last + 1);
    &reps[..len]
}

impl PartialEq for StructureNode {
    /// Structural equality: schema and content, ignoring instance identity
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.schema.kind() == other.schema.kind()
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| significant(a) == significant(b))
    }
}

impl fmt::Debug for StructureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.schema.name());
        debug.field("id", &self.id);
        for (spec, reps) in self.entries() {
            if !reps.is_empty() {
                debug.field(&spec.name, &reps);
            }
        }
        debug.finish()
    }
}

impl Serialize for StructureNode {
    /// Populated children as `name -> [repetitions]`
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let populated = self.children.iter().filter(|reps| !reps.is_empty()).count();
        let mut map = serializer.serialize_map(Some(populated))?;
        for (spec, reps) in self.entries() {
            if !reps.is_empty() {
                map.serialize_entry(&spec.name, reps)?;
            }
        }
        map.end()
    }
}
