//! Computation-graph store and ingestion
//!
//! Task descriptors arrive in graph-update messages and are merged into a
//! node-local DAG store. The merge is add-if-absent: a name seen in an
//! earlier generation is already known and is never overwritten, so the
//! first declaration wins. No cycle detection is performed.

use crate::wire::{DataDecl, GraphUpdate, TaskDecl};
use std::collections::BTreeSet;
use std::collections::HashMap;
use tracing::debug;

/// A named data dependency. Within one input or output set a name is
/// unique; inserting a second ref with the same name is a silent no-op.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DataRef {
    pub name: String,
    pub size: u64,
}

// Set identity is the name alone, matching the source's set semantics:
// a duplicate name with a different size is still a duplicate.
impl PartialEq for DataRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for DataRef {}
impl PartialOrd for DataRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DataRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// One task in the computation graph. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskNode {
    pub name: String,
    pub kind: u32,
    pub caller: String,
    pub inputs: BTreeSet<DataRef>,
    pub outputs: BTreeSet<DataRef>,
    /// Opaque reference to the executable body.
    pub thunk: String,
    /// Expected execution cost.
    pub duration: u64,
}

fn into_set(decls: Vec<DataDecl>) -> BTreeSet<DataRef> {
    let mut set = BTreeSet::new();
    for decl in decls {
        // BTreeSet::insert keeps the existing entry on duplicates.
        set.insert(DataRef {
            name: decl.name,
            size: decl.size,
        });
    }
    set
}

impl From<TaskDecl> for TaskNode {
    fn from(decl: TaskDecl) -> Self {
        TaskNode {
            name: decl.name,
            kind: decl.kind,
            caller: decl.caller,
            inputs: into_set(decl.inputs),
            outputs: into_set(decl.outputs),
            thunk: decl.thunk,
            duration: decl.duration,
        }
    }
}

/// The known-graph store: task name → descriptor, append-only within and
/// across generations.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<String, TaskNode>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless its name is already known. Returns whether the
    /// node was added.
    pub fn add_node(&mut self, node: TaskNode) -> bool {
        if self.nodes.contains_key(&node.name) {
            debug!(task = %node.name, "duplicate task declaration skipped");
            return false;
        }
        self.nodes.insert(node.name.clone(), node);
        true
    }

    /// Merge a decoded graph generation. Returns how many declarations
    /// were new.
    pub fn merge(&mut self, update: GraphUpdate) -> usize {
        update
            .tasks
            .into_iter()
            .filter(|decl| self.add_node(TaskNode::from(decl.clone())))
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tasks declaring `output` among their outputs.
    pub fn producers_of<'a>(&'a self, output: &'a str) -> impl Iterator<Item = &'a TaskNode> {
        self.nodes
            .values()
            .filter(move |node| node.outputs.iter().any(|d| d.name == output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, duration: u64) -> TaskDecl {
        TaskDecl {
            name: name.to_string(),
            kind: 0,
            caller: "root".to_string(),
            inputs: vec![DataDecl {
                name: "in".to_string(),
                size: 10,
            }],
            outputs: vec![DataDecl {
                name: format!("{name}-out"),
                size: 10,
            }],
            thunk: format!("/thunks/{name}"),
            duration,
        }
    }

    #[test]
    fn test_merge_adds_new_tasks() {
        let mut graph = Graph::new();
        let added = graph.merge(GraphUpdate {
            tasks: vec![decl("a", 5), decl("b", 7)],
        });
        assert_eq!(added, 2);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_redeclaration_keeps_first_duration() {
        let mut graph = Graph::new();
        graph.merge(GraphUpdate {
            tasks: vec![decl("a", 5)],
        });
        // Second generation re-declares "a" with a different duration.
        let added = graph.merge(GraphUpdate {
            tasks: vec![decl("a", 99)],
        });
        assert_eq!(added, 0);
        assert_eq!(graph.get("a").unwrap().duration, 5);
    }

    #[test]
    fn test_duplicate_io_names_dropped_silently() {
        let mut task = decl("a", 5);
        task.inputs = vec![
            DataDecl {
                name: "x".to_string(),
                size: 1,
            },
            DataDecl {
                name: "x".to_string(),
                size: 2,
            },
            DataDecl {
                name: "y".to_string(),
                size: 3,
            },
        ];
        let node = TaskNode::from(task);
        assert_eq!(node.inputs.len(), 2);
        // First declaration of "x" wins.
        let x = node.inputs.iter().find(|d| d.name == "x").unwrap();
        assert_eq!(x.size, 1);
    }

    #[test]
    fn test_producers_of() {
        let mut graph = Graph::new();
        graph.merge(GraphUpdate {
            tasks: vec![decl("a", 5), decl("b", 7)],
        });
        let producers: Vec<_> = graph.producers_of("a-out").map(|n| n.name.as_str()).collect();
        assert_eq!(producers, vec!["a"]);
        assert_eq!(graph.producers_of("missing").count(), 0);
    }
}
