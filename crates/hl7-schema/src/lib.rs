//! # hl7-schema
//!
//! Structure schemas, datatype definitions, and schema-set loading for HL7 v2.
//!
//! A schema set holds every segment, group, message, and datatype definition
//! of one protocol version. Sets are validated once at registration and are
//! immutable afterwards, so they can be shared across threads behind an `Arc`.

pub mod builder;
pub mod graph;
pub mod loader;
pub mod model;
pub mod registry;

pub use builder::{SchemaSet, SchemaSetBuilder};
pub use loader::SchemaLoader;
pub use model::{
    ChildKey, ChildKind, ChildSpec, ComponentSpec, DatatypeDef, DatatypeShape, PrimitiveKind,
    SchemaId, StructureKind, StructureSchema,
};
pub use registry::SchemaRegistry;

use thiserror::Error;

/// Errors raised while registering or loading schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Duplicate child '{child}' in schema {schema}")]
    DuplicateChild { schema: String, child: String },

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("Unknown type '{type_ref}' referenced by {referrer}")]
    UnknownType { referrer: String, type_ref: String },

    #[error("Kind mismatch in {schema}: {message}")]
    KindMismatch { schema: String, message: String },

    #[error("Cycle in schema graph: {0}")]
    Cycle(String),

    #[error("Invalid definition {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a duplicate-child error for the given schema.
    pub fn duplicate_child(schema: impl Into<String>, child: impl Into<String>) -> Self {
        Self::DuplicateChild {
            schema: schema.into(),
            child: child.into(),
        }
    }

    /// Build an unknown-type error naming the definition holding the reference.
    pub fn unknown_type(referrer: impl Into<String>, type_ref: impl Into<String>) -> Self {
        Self::UnknownType {
            referrer: referrer.into(),
            type_ref: type_ref.into(),
        }
    }

    /// Build a kind-mismatch error.
    pub fn kind_mismatch(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::KindMismatch {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Build an invalid-definition error.
    pub fn invalid_definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
