//! ER7 serializer

use crate::syntax::{EncodingCharacters, SEGMENT_TERMINATOR};
use crate::{Error, Result};
use hl7_model::{Child, Message, StructureNode, Traversal, Value, missing_required, walk};
use tracing::debug;

/// Options for serialization
#[derive(Debug, Clone)]
pub struct SerializerOptions {
    /// Fail with [`Error::MissingRequired`] when required children are absent
    pub enforce_required: bool,

    /// Separators to write instead of the message's own MSH-1/MSH-2
    pub encoding: Option<EncodingCharacters>,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            enforce_required: true,
            encoding: None,
        }
    }
}

impl SerializerOptions {
    /// Options that write whatever is present, required or not
    pub fn lenient() -> Self {
        Self {
            enforce_required: false,
            ..Self::default()
        }
    }
}

/// Serializer for ER7 messages
#[derive(Debug, Clone, Default)]
pub struct Er7Serializer {
    options: SerializerOptions,
}

impl Er7Serializer {
    /// Create a new ER7 serializer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SerializerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    /// Serialize a message, one `\r`-terminated line per segment
    pub fn serialize(&self, message: &Message) -> Result<String> {
        if self.options.enforce_required {
            let missing: Vec<String> = missing_required(message)
                .into_iter()
                // MSH-1 and MSH-2 are always written from the encoding characters
                .filter(|m| !(m.parent == "MSH" && m.key.index() < 2))
                .map(|m| m.path())
                .collect();
            if !missing.is_empty() {
                return Err(Error::MissingRequired(missing));
            }
        }

        let encoding = self
            .options
            .encoding
            .unwrap_or_else(|| message_encoding(message));
        let mut writer = SegmentWriter {
            encoding,
            lines: Vec::new(),
        };
        walk(message, &mut writer);

        debug!(
            structure = %message.name(),
            segments = writer.lines.len(),
            "Serialized message"
        );

        let mut out = String::new();
        for line in writer.lines {
            out.push_str(&line);
            out.push(SEGMENT_TERMINATOR);
        }
        Ok(out)
    }

    /// Serialize one segment without a terminator
    pub fn serialize_segment(&self, segment: &StructureNode) -> String {
        let encoding = self.options.encoding.unwrap_or_default();
        write_segment(segment, &encoding)
    }
}

/// Separators declared by the message's MSH segment, or the defaults
fn message_encoding(message: &Message) -> EncodingCharacters {
    let Some(msh) = message.peek_structure("MSH", 0).ok().flatten() else {
        return EncodingCharacters::default();
    };
    let field_text = |position: usize| {
        msh.schema()
            .key_for_position(position)
            .and_then(|key| msh.peek_at(key, 0))
            .and_then(Child::as_field)
            .and_then(Value::value)
    };
    match (field_text(1), field_text(2)) {
        (Some(field), Some(encoding)) => {
            EncodingCharacters::from_fields(field, encoding).unwrap_or_default()
        }
        _ => EncodingCharacters::default(),
    }
}

struct SegmentWriter {
    encoding: EncodingCharacters,
    lines: Vec<String>,
}

impl Traversal for SegmentWriter {
    fn visit_segment(&mut self, segment: &StructureNode, _path: &str) {
        self.lines.push(write_segment(segment, &self.encoding));
    }
}

fn write_segment(segment: &StructureNode, enc: &EncodingCharacters) -> String {
    let is_header = segment.name() == "MSH";
    let mut fields: Vec<String> = segment
        .entries()
        .skip(if is_header { 2 } else { 0 })
        .map(|(_, reps)| write_field(reps, enc))
        .collect();
    trim_trailing_empty(&mut fields);

    let mut out = String::from(segment.name());
    out.push(enc.field);
    if is_header {
        out.push_str(&enc.to_msh_field2());
    } else if fields.is_empty() {
        out.pop();
    }
    for (i, field) in fields.iter().enumerate() {
        if i > 0 || is_header {
            out.push(enc.field);
        }
        out.push_str(field);
    }
    out
}

fn write_field(reps: &[Child], enc: &EncodingCharacters) -> String {
    let mut values: Vec<String> = reps
        .iter()
        .map(|child| match child {
            Child::Field(value) => write_value(value, enc),
            Child::Structure(_) => String::new(),
        })
        .collect();
    trim_trailing_empty(&mut values);
    join(&values, enc.repetition)
}

fn write_value(value: &Value, enc: &EncodingCharacters) -> String {
    match value {
        Value::Primitive(p) => p.value().map(|text| enc.escape(text)).unwrap_or_default(),
        Value::Composite(c) => {
            let mut components: Vec<String> = c
                .components()
                .map(|(_, slot)| match slot {
                    None => String::new(),
                    Some(Value::Primitive(p)) => {
                        p.value().map(|text| enc.escape(text)).unwrap_or_default()
                    }
                    Some(Value::Composite(inner)) => {
                        let mut subs: Vec<String> = inner
                            .components()
                            .map(|(_, sub)| {
                                sub.and_then(Value::value)
                                    .map(|text| enc.escape(text))
                                    .unwrap_or_default()
                            })
                            .collect();
                        trim_trailing_empty(&mut subs);
                        join(&subs, enc.subcomponent)
                    }
                })
                .collect();
            trim_trailing_empty(&mut components);
            join(&components, enc.component)
        }
    }
}

fn trim_trailing_empty(parts: &mut Vec<String>) {
    while parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
}

fn join(parts: &[String], separator: char) -> String {
    let mut buf = [0u8; 4];
    parts.join(&*separator.encode_utf8(&mut buf))
}
