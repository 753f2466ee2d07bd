//! Field values

use crate::composite::Composite;
use crate::factory::ModelFactory;
use crate::node::InstanceId;
use crate::primitive::Primitive;
use crate::Result;
use hl7_schema::{DatatypeDef, DatatypeShape};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::sync::Arc;

/// One occurrence of a field: a primitive leaf or a composite
#[derive(Debug, PartialEq)]
pub enum Value {
    Primitive(Primitive),
    Composite(Composite),
}

impl Value {
    /// Create an empty value shaped by its datatype
    pub fn new(datatype: Arc<DatatypeDef>, factory: Arc<dyn ModelFactory>) -> Self {
        Self::with_factory(datatype, &factory)
    }

    pub(crate) fn with_factory(datatype: Arc<DatatypeDef>, factory: &Arc<dyn ModelFactory>) -> Self {
        match datatype.shape() {
            DatatypeShape::Primitive(kind) => {
                let kind = *kind;
                Value::Primitive(Primitive::with_kind(datatype, kind))
            }
            DatatypeShape::Composite(_) => {
                Value::Composite(Composite::with_factory(datatype, Arc::clone(factory)))
            }
        }
    }

    pub fn id(&self) -> InstanceId {
        match self {
            Value::Primitive(p) => p.id(),
            Value::Composite(c) => c.id(),
        }
    }

    pub fn datatype(&self) -> &Arc<DatatypeDef> {
        match self {
            Value::Primitive(p) => p.datatype(),
            Value::Composite(c) => c.datatype(),
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            Value::Composite(_) => None,
        }
    }

    pub fn as_primitive_mut(&mut self) -> Option<&mut Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            Value::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Value::Composite(c) => Some(c),
            Value::Primitive(_) => None,
        }
    }

    pub fn as_composite_mut(&mut self) -> Option<&mut Composite> {
        match self {
            Value::Composite(c) => Some(c),
            Value::Primitive(_) => None,
        }
    }

    /// Text of the leading primitive (the first component, recursively)
    pub fn value(&self) -> Option<&str> {
        match self {
            Value::Primitive(p) => p.value(),
            Value::Composite(c) => c.slots().first()?.as_ref()?.value(),
        }
    }

    /// Set the leading primitive, creating components as needed
    pub fn set_value(&mut self, text: &str) -> Result<()> {
        match self {
            Value::Primitive(p) => {
                p.set(text);
                Ok(())
            }
            Value::Composite(c) => c.get(0)?.set_value(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Primitive(p) => p.is_empty(),
            Value::Composite(c) => c.is_empty(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Value::Primitive(p) => p.clear(),
            Value::Composite(c) => c.clear(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Primitive(p) => p.value().serialize(serializer),
            Value::Composite(c) => {
                let mut seq = serializer.serialize_seq(Some(c.size()))?;
                for slot in c.slots() {
                    seq.serialize_element(slot)?;
                }
                seq.end()
            }
        }
    }
}
