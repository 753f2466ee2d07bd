#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # hl7-model
//!
//! Generic runtime model for HL7 v2 messages.
//!
//! A single [`StructureNode`] type represents every message, group, and
//! segment, driven by the [`hl7_schema::StructureSchema`] it was built from.
//! Field occurrences are [`Value`]s: either a [`Primitive`] leaf or a
//! fixed-arity [`Composite`]. Children are created lazily through a
//! [`ModelFactory`] the first time they are addressed.

/// Fixed-arity composite field values.
pub mod composite;
/// Factories resolving type names to schemas.
pub mod factory;
/// Message root wrapper.
pub mod message;
/// Structure nodes and the name/repetition navigator.
pub mod node;
/// Scalar leaf values and typed readers.
pub mod primitive;
/// Required-child checks run before serialization.
pub mod required;
/// Schema-order traversal and path navigation.
pub mod traversal;
/// Typed convenience views over well-known composites.
pub mod typed;
/// Field values (primitive or composite).
pub mod value;

pub use composite::{Component, Composite};
pub use factory::{FactoryRegistry, ModelFactory, SchemaSetFactory};
pub use message::Message;
pub use node::{Child, InstanceId, StructureNode};
pub use primitive::Primitive;
pub use required::{MissingRequired, missing_required};
pub use traversal::{Traversal, navigate, navigate_mut, walk};
pub use typed::{ActivationDate, CodedElement, TimeStamp};
pub use value::Value;

use hl7_schema::ChildKind;
use thiserror::Error;

/// Coarse classification of [`Error`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid schema configuration
    Schema,
    /// Child not declared, or removal target absent
    NotFound,
    /// Second occurrence of a non-repeating child
    Cardinality,
    /// Repetition index past the next contiguous slot
    RepetitionGap,
    /// Composite slot index out of bounds
    Index,
    /// No factory definition for a type name
    UnknownType,
    /// Addressed child or value is of a different kind than requested
    KindMismatch,
    /// Malformed path expression
    InvalidPath,
    /// Primitive text could not be read as the requested type
    Conversion,
    /// Schema or factory wiring violated a model invariant
    Internal,
}

/// Errors raised by the message model
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] hl7_schema::Error),

    #[error("{structure} declares no child named '{name}'")]
    UndeclaredChild { structure: String, name: String },

    #[error("No repetition {index} of '{name}' ({count} present)")]
    MissingRepetition {
        name: String,
        index: usize,
        count: usize,
    },

    #[error("Instance {id} is not a repetition of '{name}'")]
    MissingInstance { name: String, id: InstanceId },

    #[error("'{name}' does not repeat and already has an occurrence")]
    Cardinality { name: String },

    #[error("Cannot create repetition {requested} of '{name}': only {count} present")]
    RepetitionGap {
        name: String,
        requested: usize,
        count: usize,
    },

    #[error("Index {index} is out of range for {datatype} ({size} components)")]
    Index {
        datatype: String,
        index: usize,
        size: usize,
    },

    #[error("{schema} has no {category} named '{type_name}'")]
    UnknownType {
        schema: String,
        category: &'static str,
        type_name: String,
    },

    #[error("'{name}' is a {found}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: ChildKind,
    },

    #[error("Expected datatype {expected}, found {found}")]
    DatatypeMismatch { expected: String, found: String },

    #[error("{name} is a {kind} structure, not a message")]
    NotAMessage { name: String, kind: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Conversion error in {context}: {message}")]
    Conversion { context: String, message: String },

    #[error("Internal model error in {context}: {message}")]
    Internal { context: String, message: String },
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Schema(_) => ErrorKind::Schema,
            Error::UndeclaredChild { .. }
            | Error::MissingRepetition { .. }
            | Error::MissingInstance { .. } => ErrorKind::NotFound,
            Error::Cardinality { .. } => ErrorKind::Cardinality,
            Error::RepetitionGap { .. } => ErrorKind::RepetitionGap,
            Error::Index { .. } => ErrorKind::Index,
            Error::UnknownType { .. } => ErrorKind::UnknownType,
            Error::KindMismatch { .. }
            | Error::DatatypeMismatch { .. }
            | Error::NotAMessage { .. } => ErrorKind::KindMismatch,
            Error::InvalidPath { .. } => ErrorKind::InvalidPath,
            Error::Conversion { .. } => ErrorKind::Conversion,
            Error::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Build an undeclared-child error
    pub fn undeclared(structure: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UndeclaredChild {
            structure: structure.into(),
            name: name.into(),
        }
    }

    /// Build an unknown-type error
    pub fn unknown_type(
        schema: impl Into<String>,
        category: &'static str,
        type_name: impl Into<String>,
    ) -> Self {
        Self::UnknownType {
            schema: schema.into(),
            category,
            type_name: type_name.into(),
        }
    }

    /// Build an invalid-path error with the input path and parsing reason
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a conversion error with conversion context
    pub fn conversion(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Build an internal-invariant error
    pub fn internal(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
pub(crate) mod testing;
