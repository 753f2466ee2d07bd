//! # hl7-codec
//!
//! ER7 (pipe-delimited) encoding for HL7 v2 message models.
//!
//! [`Er7Parser`] reads a message into a [`hl7_model::Message`], taking the
//! version from MSH-12 and the message structure from MSH-9.
//! [`Er7Serializer`] writes a message back, one `\r`-terminated line per
//! segment, using the separators declared in its MSH segment.

pub mod parser;
pub mod serializer;
pub mod syntax;

pub use parser::{Er7Parser, ParserOptions, RawSegment, split_segments};
pub use serializer::{Er7Serializer, SerializerOptions};
pub use syntax::EncodingCharacters;

use hl7_model::ErrorKind;
use thiserror::Error;

/// Protocol name used to select schema sets
pub const HL7_PROTOCOL: &str = "HL7";

/// Errors raised while parsing or serializing ER7
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error at segment {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Segment {line}: {source}")]
    Model {
        line: usize,
        #[source]
        source: hl7_model::Error,
    },

    #[error(transparent)]
    Structure(#[from] hl7_model::Error),

    #[error("Missing required elements: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("No schema registered for {protocol} {version}")]
    UnknownVersion { protocol: String, version: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn model(line: usize, source: hl7_model::Error) -> Self {
        Self::Model { line, source }
    }

    /// Kind of the underlying model error, if there is one
    pub fn model_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Model { source, .. } | Self::Structure(source) => Some(source.kind()),
            _ => None,
        }
    }

    /// Segment number the error refers to, if known
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } | Self::Model { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
