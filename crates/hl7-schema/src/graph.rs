//! Reference graph over schema definitions, used to reject cycles

use std::collections::HashMap;

/// Directed "contains" edges between definitions (group -> nested group,
/// composite -> component datatype)
#[derive(Debug, Default)]
pub struct TypeGraph {
    edges: HashMap<String, Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.entry(from.into()).or_default().push(to.into());
    }

    /// Find one cycle, returned as the path of names that closes it
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();

        let mut roots: Vec<&str> = self.edges.keys().map(String::as_str).collect();
        roots.sort_unstable();

        for root in roots {
            if marks.contains_key(root) {
                continue;
            }
            if let Some(cycle) = self.visit(root, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }

        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Visiting);
        stack.push(node);

        for target in self.edges.get(node).into_iter().flatten() {
            match marks.get(target.as_str()) {
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == target.as_str())?;
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|n| (*n).to_string()).collect();
                    cycle.push(target.clone());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = self.visit(target, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }
}
