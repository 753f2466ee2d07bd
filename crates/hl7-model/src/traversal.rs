//! Schema-order traversal and path navigation

use crate::node::{Child, StructureNode};
use crate::{Error, Result};
use hl7_schema::{ChildKey, StructureKind};

/// Trait for walking a structure tree in declared child order
pub trait Traversal {
    /// Visit a segment occurrence
    fn visit_segment(&mut self, segment: &StructureNode, path: &str);

    /// Called when entering a message or group occurrence
    fn enter(&mut self, _node: &StructureNode, _path: &str) {}

    /// Called when leaving a message or group occurrence
    fn leave(&mut self, _node: &StructureNode, _path: &str) {}

    /// Returns true if traversal should continue
    fn should_continue(&self) -> bool {
        true
    }
}

/// Walk `node` depth first, visiting existing repetitions in insertion order.
///
/// Paths are `/`-separated `NAME[rep]` steps relative to `node`; the start
/// node itself has the empty path. Fields are not visited.
pub fn walk<T: Traversal + ?Sized>(node: &StructureNode, visitor: &mut T) {
    walk_node(node, "", visitor);
}

fn walk_node<T: Traversal + ?Sized>(node: &StructureNode, path: &str, visitor: &mut T) {
    if node.kind() == StructureKind::Segment {
        visitor.visit_segment(node, path);
        return;
    }

    visitor.enter(node, path);
    for (spec, reps) in node.entries() {
        for (rep, child) in reps.iter().enumerate() {
            if !visitor.should_continue() {
                return;
            }
            if let Child::Structure(child) = child {
                let child_path = if path.is_empty() {
                    format!("{}[{}]", spec.name, rep)
                } else {
                    format!("{}/{}[{}]", path, spec.name, rep)
                };
                walk_node(child, &child_path, visitor);
            }
        }
    }
    visitor.leave(node, path);
}

/// One parsed path step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step<'a> {
    name: &'a str,
    rep: usize,
}

/// Parse `NAME[rep]/NAME/...`; a missing index means repetition 0.
///
/// A step made only of digits addresses a segment field by its 1-based
/// position, e.g. `PATIENT/PID/5[1]`.
fn parse_path(path: &str) -> Result<Vec<Step<'_>>> {
    let steps = path
        .split('/')
        .filter(|step| !step.is_empty())
        .map(|step| parse_step(path, step))
        .collect::<Result<Vec<_>>>()?;
    if steps.is_empty() {
        return Err(Error::invalid_path(path, "path is empty"));
    }
    Ok(steps)
}

fn parse_step<'a>(path: &str, step: &'a str) -> Result<Step<'a>> {
    let Some(open) = step.find('[') else {
        return Ok(Step { name: step, rep: 0 });
    };
    let close = step
        .strip_suffix(']')
        .ok_or_else(|| Error::invalid_path(path, format!("unclosed bracket in '{}'", step)))?;
    let index = &close[open + 1..];
    let rep = index
        .parse::<usize>()
        .map_err(|_| Error::invalid_path(path, format!("invalid index in '{}'", step)))?;
    let name = &step[..open];
    if name.is_empty() {
        return Err(Error::invalid_path(path, format!("missing name in '{}'", step)));
    }
    Ok(Step { name, rep })
}

fn resolve(node: &StructureNode, step: &Step<'_>) -> Result<ChildKey> {
    if step.name.bytes().all(|b| b.is_ascii_digit()) {
        let position: usize = step
            .name
            .parse()
            .map_err(|_| Error::undeclared(node.name(), step.name))?;
        return node
            .schema()
            .key_for_position(position)
            .ok_or_else(|| Error::undeclared(node.name(), format!("field {}", position)));
    }
    node.key(step.name)
}

/// Follow a path without creating anything; `None` if a step is absent
pub fn navigate<'a>(node: &'a StructureNode, path: &str) -> Result<Option<&'a Child>> {
    let steps = parse_path(path)?;
    let (last, init) = steps
        .split_last()
        .ok_or_else(|| Error::invalid_path(path, "path is empty"))?;

    let mut current = node;
    for step in init {
        let key = resolve(current, step)?;
        current = match current.peek_at(key, step.rep) {
            None => return Ok(None),
            Some(Child::Structure(child)) => child,
            Some(Child::Field(_)) => {
                return Err(Error::invalid_path(
                    path,
                    format!("'{}' is a field and has no children", step.name),
                ));
            }
        };
    }

    let key = resolve(current, last)?;
    Ok(current.peek_at(key, last.rep))
}

/// Follow a path, creating missing repetitions along the way
pub fn navigate_mut<'a>(node: &'a mut StructureNode, path: &str) -> Result<&'a mut Child> {
    let steps = parse_path(path)?;
    let (last, init) = steps
        .split_last()
        .ok_or_else(|| Error::invalid_path(path, "path is empty"))?;

    let mut current = node;
    for step in init {
        let key = resolve(current, step)?;
        current = current.structure_at(key, step.rep)?;
    }

    let key = resolve(current, last)?;
    current.get_at(key, last.rep)
}
