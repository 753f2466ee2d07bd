//! ER7 parser
//!
//! Segments are matched against the message schema by recursive descent.
//! A group occurrence is opened only when the next segment tag is in the
//! group's first-set; an occurrence that ends up consuming nothing is
//! removed again.

use crate::syntax::EncodingCharacters;
use crate::{Error, HL7_PROTOCOL, Result};
use hl7_model::{
    Composite, FactoryRegistry, Message, ModelFactory, Primitive, StructureNode, Value,
};
use hl7_schema::{ChildKind, StructureSchema};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Options for parsing
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Reject unknown segments, extra fields, and extra components instead of
    /// skipping them
    pub strict: bool,
}

/// One raw segment line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment<'a> {
    /// 1-based segment number in the input
    pub line: usize,
    pub tag: &'a str,
    pub text: &'a str,
}

/// Split input into segments; `\r`, `\n`, and `\r\n` all terminate a segment
pub fn split_segments(text: &str, field: char) -> Vec<RawSegment<'_>> {
    text.split(['\r', '\n'])
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            let tag = line.split(field).next().unwrap_or(line);
            RawSegment {
                line: index + 1,
                tag,
                text: line,
            }
        })
        .collect()
}

/// Parser for ER7 messages
#[derive(Debug, Clone)]
pub struct Er7Parser {
    factories: FactoryRegistry,
    options: ParserOptions,
}

impl Er7Parser {
    pub fn new(factories: FactoryRegistry) -> Self {
        Self::with_options(factories, ParserOptions::default())
    }

    pub fn with_options(factories: FactoryRegistry, options: ParserOptions) -> Self {
        Self { factories, options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    /// Parse a message, choosing the version from MSH-12 and the structure from MSH-9
    pub fn parse(&self, text: &str) -> Result<Message> {
        let (encoding, header) = header(text)?;
        let fields: Vec<&str> = header.text.split(encoding.field).collect();

        let version = fields
            .get(11)
            .and_then(|vid| vid.split(encoding.component).next())
            .map(|v| encoding.unescape(v))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::parse(header.line, "MSH-12 (version ID) is empty"))?;
        let structure = structure_name(fields.get(8).copied().unwrap_or_default(), &encoding)
            .ok_or_else(|| Error::parse(header.line, "MSH-9 (message type) is incomplete"))?;

        let factory = self
            .factories
            .for_version(HL7_PROTOCOL, &version)
            .ok_or_else(|| Error::UnknownVersion {
                protocol: HL7_PROTOCOL.to_string(),
                version: version.clone(),
            })?;
        debug!(version = %version, structure = %structure, "Selected message schema");

        self.parse_with(text, factory, &structure)
    }

    /// Parse a message with an explicit factory and message structure
    pub fn parse_with(
        &self,
        text: &str,
        factory: Arc<dyn ModelFactory>,
        structure: &str,
    ) -> Result<Message> {
        let (encoding, _) = header(text)?;
        let mut message = Message::new(Arc::clone(&factory), structure)?;

        let mut grammar = Grammar::new(factory);
        let known = grammar.segment_tags(message.schema())?;
        let mut segments = Vec::new();
        for segment in split_segments(text, encoding.field) {
            if known.contains(segment.tag) {
                segments.push(segment);
            } else if self.options.strict {
                return Err(Error::parse(
                    segment.line,
                    format!("unknown segment '{}' for {}", segment.tag, structure),
                ));
            } else {
                warn!(line = segment.line, tag = %segment.tag, "Skipping unknown segment");
            }
        }

        let mut position = 0;
        self.fill_group(message.root_mut(), &segments, &mut position, &encoding, &mut grammar)?;

        if let Some(leftover) = segments.get(position) {
            return Err(self.leftover_error(message.root_mut(), leftover));
        }

        debug!(structure, segments = segments.len(), "Parsed message");
        Ok(message)
    }

    /// Explain why a segment could not be placed
    fn leftover_error(&self, root: &mut StructureNode, segment: &RawSegment<'_>) -> Error {
        let slot = root
            .schema()
            .entries()
            .find(|(_, spec)| spec.kind == ChildKind::Segment && spec.type_ref == segment.tag)
            .map(|(key, _)| key);
        if let Some(key) = slot {
            // Surfaces the cardinality error of a repeated non-repeating segment
            if let Err(source) = root.add_at(key) {
                return Error::Model {
                    line: segment.line,
                    source,
                };
            }
        }
        Error::parse(
            segment.line,
            format!(
                "segment '{}' is out of order for {}",
                segment.tag,
                root.name()
            ),
        )
    }

    fn fill_group(
        &self,
        node: &mut StructureNode,
        segments: &[RawSegment<'_>],
        position: &mut usize,
        encoding: &EncodingCharacters,
        grammar: &mut Grammar,
    ) -> Result<()> {
        let schema = Arc::clone(node.schema());
        for (key, spec) in schema.entries() {
            loop {
                let Some(segment) = segments.get(*position) else {
                    return Ok(());
                };
                let count = node.count_at(key);
                if count > 0 && !spec.repeating {
                    break;
                }

                match spec.kind {
                    ChildKind::Segment => {
                        if segment.tag != spec.type_ref {
                            break;
                        }
                        let child = node
                            .structure_at(key, count)
                            .map_err(|source| Error::model(segment.line, source))?;
                        self.fill_segment(child, segment, encoding)?;
                        *position += 1;
                    }
                    ChildKind::Group => {
                        if !grammar.first_set(&spec.type_ref)?.contains(segment.tag) {
                            break;
                        }
                        let start = *position;
                        let child = node
                            .structure_at(key, count)
                            .map_err(|source| Error::model(segment.line, source))?;
                        self.fill_group(child, segments, position, encoding, grammar)?;
                        if *position == start {
                            node.remove_key_at(key, count)?;
                            break;
                        }
                    }
                    ChildKind::Field => break,
                }
            }
        }
        Ok(())
    }

    fn fill_segment(
        &self,
        segment: &mut StructureNode,
        raw: &RawSegment<'_>,
        encoding: &EncodingCharacters,
    ) -> Result<()> {
        let mut parts = raw.text.split(encoding.field);
        parts.next();
        let is_header = raw.tag == "MSH";

        let mut field_buf = [0u8; 4];
        let mut fields: Vec<&str> = Vec::new();
        if is_header {
            fields.push(encoding.field.encode_utf8(&mut field_buf));
        }
        fields.extend(parts);

        trace!(line = raw.line, tag = %raw.tag, fields = fields.len(), "Filling segment");
        let schema = Arc::clone(segment.schema());
        for (index, text) in fields.iter().enumerate() {
            let Some(key) = schema.key_for_position(index + 1) else {
                let extra = fields[index..].iter().filter(|f| !f.is_empty()).count();
                if extra > 0 {
                    self.reject_extra(
                        raw.line,
                        format!(
                            "{} declares {} fields, found {}",
                            raw.tag,
                            schema.len(),
                            fields.len()
                        ),
                    )?;
                }
                break;
            };
            if text.is_empty() {
                continue;
            }

            // MSH-1 and MSH-2 are the separators themselves
            if is_header && index < 2 {
                segment
                    .add_field_at(key)
                    .and_then(|value| value.set_value(text))
                    .map_err(|source| Error::model(raw.line, source))?;
                continue;
            }

            for repetition in text.split(encoding.repetition) {
                let value = segment
                    .add_field_at(key)
                    .map_err(|source| Error::model(raw.line, source))?;
                self.fill_value(value, repetition, encoding, raw.line)?;
            }
        }
        Ok(())
    }

    fn fill_value(
        &self,
        value: &mut Value,
        text: &str,
        encoding: &EncodingCharacters,
        line: usize,
    ) -> Result<()> {
        match value {
            Value::Primitive(p) => {
                let mut components = text.split(encoding.component);
                let first = components.next().unwrap_or_default();
                if components.any(|c| !c.is_empty()) {
                    self.reject_extra(
                        line,
                        format!("{} is a primitive but has components", p.datatype().name()),
                    )?;
                }
                self.fill_primitive(p, first, encoding, line)
            }
            Value::Composite(c) => {
                self.fill_composite(c, text, encoding.component, encoding, line, true)
            }
        }
    }

    fn fill_composite(
        &self,
        composite: &mut Composite,
        text: &str,
        separator: char,
        encoding: &EncodingCharacters,
        line: usize,
        nested: bool,
    ) -> Result<()> {
        let parts: Vec<&str> = text.split(separator).collect();
        for (index, part) in parts.iter().enumerate() {
            if index >= composite.size() {
                if parts[index..].iter().any(|p| !p.is_empty()) {
                    self.reject_extra(
                        line,
                        format!(
                            "{} has {} components, found {}",
                            composite.datatype().name(),
                            composite.size(),
                            parts.len()
                        ),
                    )?;
                }
                break;
            }
            if part.is_empty() {
                continue;
            }

            let slot = composite
                .get(index)
                .map_err(|source| Error::model(line, source))?;
            match slot {
                Value::Composite(inner) if nested => self.fill_composite(
                    inner,
                    part,
                    encoding.subcomponent,
                    encoding,
                    line,
                    false,
                )?,
                Value::Primitive(p) if nested => self.fill_primitive(p, part, encoding, line)?,
                other => other
                    .set_value(&encoding.unescape(part))
                    .map_err(|source| Error::model(line, source))?,
            }
        }
        Ok(())
    }

    /// Store the first subcomponent of `text`; a primitive has no others
    fn fill_primitive(
        &self,
        primitive: &mut Primitive,
        text: &str,
        encoding: &EncodingCharacters,
        line: usize,
    ) -> Result<()> {
        let mut subcomponents = text.split(encoding.subcomponent);
        let first = subcomponents.next().unwrap_or_default();
        if subcomponents.any(|s| !s.is_empty()) {
            self.reject_extra(
                line,
                format!(
                    "{} is a primitive but has subcomponents",
                    primitive.datatype().name()
                ),
            )?;
        }
        primitive.set(encoding.unescape(first));
        Ok(())
    }

    fn reject_extra(&self, line: usize, message: String) -> Result<()> {
        if self.options.strict {
            Err(Error::parse(line, message))
        } else {
            warn!(line, "Ignoring extra content: {}", message);
            Ok(())
        }
    }
}

/// Locate the MSH segment and read its separators
fn header(text: &str) -> Result<(EncodingCharacters, RawSegment<'_>)> {
    let first = text
        .split(['\r', '\n'])
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| Error::parse(1, "input contains no segments"))?;
    if !first.starts_with("MSH") {
        return Err(Error::parse(1, "message must start with an MSH segment"));
    }
    let encoding = EncodingCharacters::from_msh(first)
        .ok_or_else(|| Error::parse(1, "MSH-1/MSH-2 do not declare valid encoding characters"))?;
    Ok((
        encoding,
        RawSegment {
            line: 1,
            tag: "MSH",
            text: first,
        },
    ))
}

/// Message structure from MSH-9: the third component, else `{code}_{event}`
fn structure_name(message_type: &str, encoding: &EncodingCharacters) -> Option<String> {
    let components: Vec<String> = message_type
        .split(encoding.component)
        .map(|c| encoding.unescape(c))
        .collect();
    if let Some(structure) = components.get(2).filter(|s| !s.is_empty()) {
        return Some(structure.clone());
    }
    match (components.first(), components.get(1)) {
        (Some(code), Some(event)) if !code.is_empty() && !event.is_empty() => {
            Some(format!("{}_{}", code, event))
        }
        _ => None,
    }
}

/// Cached segment-tag sets derived from group schemas
struct Grammar {
    factory: Arc<dyn ModelFactory>,
    first_sets: HashMap<String, Arc<HashSet<String>>>,
}

impl Grammar {
    fn new(factory: Arc<dyn ModelFactory>) -> Self {
        Self {
            factory,
            first_sets: HashMap::new(),
        }
    }

    /// Tags that can open an occurrence of the named group
    fn first_set(&mut self, group: &str) -> Result<Arc<HashSet<String>>> {
        if let Some(set) = self.first_sets.get(group) {
            return Ok(Arc::clone(set));
        }

        let schema = self.factory.structure(group)?;
        let mut tags = HashSet::new();
        for spec in schema.children() {
            match spec.kind {
                ChildKind::Segment => {
                    tags.insert(spec.type_ref.clone());
                }
                ChildKind::Group => {
                    tags.extend(self.first_set(&spec.type_ref)?.iter().cloned());
                }
                ChildKind::Field => {}
            }
            // A required child must open the occurrence if nothing before it did
            if spec.required {
                break;
            }
        }

        let tags = Arc::new(tags);
        self.first_sets.insert(group.to_string(), Arc::clone(&tags));
        Ok(tags)
    }

    /// Every segment tag reachable from a structure
    fn segment_tags(&self, schema: &StructureSchema) -> Result<HashSet<String>> {
        let mut tags = HashSet::new();
        self.collect_tags(schema, &mut tags)?;
        Ok(tags)
    }

    fn collect_tags(&self, schema: &StructureSchema, tags: &mut HashSet<String>) -> Result<()> {
        for spec in schema.children() {
            match spec.kind {
                ChildKind::Segment => {
                    tags.insert(spec.type_ref.clone());
                }
                ChildKind::Group => {
                    let group = self.factory.structure(&spec.type_ref)?;
                    self.collect_tags(&group, tags)?;
                }
                ChildKind::Field => {}
            }
        }
        Ok(())
    }
}
