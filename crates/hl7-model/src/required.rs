//! Detection of required children that are absent

use crate::node::{Child, StructureNode};
use hl7_schema::{ChildKey, ChildKind};
use std::fmt;

/// A required child with no (non-empty) occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRequired {
    /// Path of the owning node, e.g. `DFT_P03/FINANCIAL[0]`
    pub parent_path: String,
    /// Schema name of the owning node
    pub parent: String,
    pub key: ChildKey,
    pub name: String,
    pub kind: ChildKind,
}

impl MissingRequired {
    /// Full path of the missing child
    pub fn path(&self) -> String {
        format!("{}/{}", self.parent_path, self.name)
    }
}

impl fmt::Display for MissingRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.path(), self.kind, self.parent)
    }
}

/// Collect every required child missing below `node`, in schema order.
///
/// Segments and groups count as present once they exist; a required field
/// counts as present only if some repetition holds a value.
pub fn missing_required(node: &StructureNode) -> Vec<MissingRequired> {
    let mut missing = Vec::new();
    collect(node, node.name(), &mut missing);
    missing
}

fn collect(node: &StructureNode, path: &str, missing: &mut Vec<MissingRequired>) {
    for (key, spec) in node.schema().entries() {
        let reps = node.iter_at(key);
        let present = match spec.kind {
            ChildKind::Field => reps.clone().any(|child| !child.is_empty()),
            ChildKind::Segment | ChildKind::Group => reps.len() > 0,
        };
        if spec.required && !present {
            missing.push(MissingRequired {
                parent_path: path.to_string(),
                parent: node.name().to_string(),
                key,
                name: spec.name.clone(),
                kind: spec.kind,
            });
        }

        for (rep, child) in reps.enumerate() {
            if let Child::Structure(child) = child {
                let child_path = format!("{}/{}[{}]", path, spec.name, rep);
                collect(child, &child_path, missing);
            }
        }
    }
}
