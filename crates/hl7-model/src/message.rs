//! Message roots

use crate::factory::ModelFactory;
use crate::node::StructureNode;
use crate::{Error, Result};
use hl7_schema::{SchemaId, StructureKind};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;

/// Root node of a message tree, tied to the factory that built it
#[derive(Debug, PartialEq)]
pub struct Message {
    root: StructureNode,
}

impl Message {
    /// Create an empty message of the named message structure
    pub fn new(factory: Arc<dyn ModelFactory>, structure: &str) -> Result<Self> {
        let schema = factory.structure(structure)?;
        if schema.kind() != StructureKind::Message {
            return Err(Error::NotAMessage {
                name: schema.name().to_string(),
                kind: schema.kind().to_string(),
            });
        }
        debug!(schema = %factory.schema_id(), structure, "Created message");
        Ok(Self {
            root: StructureNode::new(schema, factory),
        })
    }

    pub fn schema_id(&self) -> &SchemaId {
        self.root.factory().schema_id()
    }

    pub fn root(&self) -> &StructureNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut StructureNode {
        &mut self.root
    }

    pub fn into_root(self) -> StructureNode {
        self.root
    }
}

impl Deref for Message {
    type Target = StructureNode;

    fn deref(&self) -> &StructureNode {
        &self.root
    }
}

impl DerefMut for Message {
    fn deref_mut(&mut self) -> &mut StructureNode {
        &mut self.root
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let id = self.schema_id();
        let mut state = serializer.serialize_struct("Message", 4)?;
        state.serialize_field("protocol", &id.protocol)?;
        state.serialize_field("version", &id.version)?;
        state.serialize_field("structure", self.root.name())?;
        state.serialize_field("content", &self.root)?;
        state.end()
    }
}
