//! Address-space walker
//!
//! Depth-first traversal of a [`NodeHandle`] graph producing a display tree
//! plus directory and variable indexes.
//!
//! # Path filter
//!
//! With a filter such as `["Root", "Objects", "PLC"]`, element *k* is matched
//! against the display name of the node at depth *k*. Until the last element
//! matches, only the child named by the next element is expanded; beneath the
//! terminal node traversal is unrestricted. Only the terminal node and its
//! descendants are indexed. Without a filter every visited node is indexed.
//!
//! # Failures
//!
//! Read failures never abort a walk. They become annotations on the tree node
//! (`Error reading value: ...`), and a failure to enumerate children prunes
//! only that subtree.

use crate::backend::NodeRef;
use crate::codec::{decode, describe_type, format_value};
use crate::types::NodeClass;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::index::PathIndex;
use super::tree::{BrowseTree, TreeId};

/// Options controlling a walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkOptions {
    /// Display-name prefix guiding the walk from the root
    pub path_filter: Option<Vec<String>>,
    /// Nodes deeper than this are not visited (root is depth 0)
    pub max_depth: Option<usize>,
    /// Stop visiting once this many nodes have been visited
    pub max_nodes: Option<usize>,
}

impl WalkOptions {
    /// Options with only a path filter
    pub fn filtered<S: Into<String>>(filter: impl IntoIterator<Item = S>) -> Self {
        Self {
            path_filter: Some(filter.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    fn filter(&self) -> Option<&[String]> {
        self.path_filter.as_deref().filter(|f| !f.is_empty())
    }
}

/// Counters reported by a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub nodes_visited: usize,
    pub errors: usize,
    /// True when `max_nodes` cut the walk short
    pub truncated: bool,
}

/// Output of [`AddressSpaceWalker::walk`]
#[derive(Debug, Clone, Default)]
pub struct BrowseResult {
    pub tree: BrowseTree,
    pub directories: PathIndex,
    pub variables: PathIndex,
    pub stats: WalkStats,
}

/// Walks an address space under [`WalkOptions`]
#[derive(Debug, Clone, Default)]
pub struct AddressSpaceWalker {
    options: WalkOptions,
}

impl AddressSpaceWalker {
    pub fn new(options: WalkOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Walk from `root`
    pub fn walk(&self, root: &NodeRef) -> BrowseResult {
        let started = Instant::now();
        let mut result = BrowseResult::default();

        let name = read_name(root);
        self.visit(&mut result, root, name, TreeId::INVALID, 0);

        tracing::info!(
            "Browse finished: {} nodes, {} directories, {} variables, {} errors in {:?}{}",
            result.stats.nodes_visited,
            result.directories.len(),
            result.variables.len(),
            result.stats.errors,
            started.elapsed(),
            if result.stats.truncated { " (truncated)" } else { "" }
        );
        result
    }

    fn visit(
        &self,
        result: &mut BrowseResult,
        node: &NodeRef,
        name: String,
        parent: TreeId,
        depth: usize,
    ) {
        if let Some(limit) = self.options.max_nodes {
            if result.stats.nodes_visited >= limit {
                result.stats.truncated = true;
                return;
            }
        }
        result.stats.nodes_visited += 1;

        let node_id = node.node_id();
        let tree_id = if parent.is_valid() {
            result.tree.add_child(parent, name.clone(), node_id.clone())
        } else {
            result.tree.add_root(name.clone(), node_id.clone())
        };
        let path = result
            .tree
            .get(tree_id)
            .map(|n| n.path_label.clone())
            .unwrap_or_else(|| name.clone());
        tracing::trace!("Visiting {} ({})", path, node_id);

        let filter = self.options.filter();
        if let Some(filter) = filter {
            // only reachable for the root: children are pre-matched by the parent
            if depth < filter.len() && filter[depth] != name {
                tracing::debug!(
                    "'{}' does not match path filter element '{}', not expanding",
                    name,
                    filter[depth]
                );
                return;
            }
        }
        let guided = filter.is_some_and(|f| depth + 1 < f.len());
        let indexed = !guided;

        let class = match node.node_class() {
            Ok(class) => class,
            Err(e) => {
                tracing::warn!("Error reading node class of {}: {}", path, e);
                result.stats.errors += 1;
                result
                    .tree
                    .annotate(tree_id, format!("Error reading node class: {}", e.message()));
                return;
            }
        };
        if let Some(n) = result.tree.get_mut(tree_id) {
            n.class = class;
        }

        if class.is_variable() {
            match node.read_value() {
                Ok(raw) => {
                    let value = decode(&raw);
                    result.tree.annotate(
                        tree_id,
                        format!(
                            "Value: {}, Type: {}",
                            format_value(&value),
                            describe_type(&value)
                        ),
                    );
                }
                Err(e) => {
                    tracing::debug!("Error reading value of {}: {}", path, e);
                    result.stats.errors += 1;
                    result
                        .tree
                        .annotate(tree_id, format!("Error reading value: {}", e.message()));
                }
            }
            if indexed {
                result.variables.insert(&path, &node_id);
            }
            if guided {
                // a variable on the guiding prefix is shown but not expanded
                return;
            }
        }

        let children = match node.children() {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!("Error browsing children of {}: {}", path, e);
                result.stats.errors += 1;
                result
                    .tree
                    .annotate(tree_id, format!("Error reading children: {}", e.message()));
                return;
            }
        };

        if indexed && class != NodeClass::Variable && !children.is_empty() {
            tracing::debug!("Found directory: {}", path);
            result.directories.insert(&path, &node_id);
        }

        if self.options.max_depth.is_some_and(|max| depth >= max) {
            return;
        }

        let next_filter = filter.filter(|_| guided).map(|f| f[depth + 1].as_str());
        for child in &children {
            let child_name = read_name(child);
            if let Some(expected) = next_filter {
                if child_name != expected {
                    continue;
                }
            }
            self.visit(result, child, child_name, tree_id, depth + 1);
            if result.stats.truncated {
                return;
            }
        }
    }
}

/// Display name of `node`, falling back to its node id
fn read_name(node: &NodeRef) -> String {
    match node.display_name() {
        Ok(name) => name,
        Err(e) => {
            let id = node.node_id();
            tracing::debug!("Display name of {} unreadable ({}), using node id", id, e);
            id
        }
    }
}

/// Convenience: walk a root with the given path filter
pub fn walk(root: &NodeRef, path_filter: Option<&[&str]>) -> BrowseResult {
    let options = WalkOptions {
        path_filter: path_filter.map(|f| f.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    };
    AddressSpaceWalker::new(options).walk(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        Connection, Connector, Fault, NodeHandle, SimulatedServer, ValuePattern, OBJECTS_NODE_ID,
    };
    use crate::error::{RecorderError, Result};
    use crate::types::{AccessLevel, RawValue};
    use std::sync::Arc;

    mockall::mock! {
        pub Node {}
        impl NodeHandle for Node {
            fn node_id(&self) -> String;
            fn display_name(&self) -> Result<String>;
            fn node_class(&self) -> Result<NodeClass>;
            fn children(&self) -> Result<Vec<NodeRef>>;
            fn read_value(&self) -> Result<RawValue>;
            fn description(&self) -> Result<Option<String>>;
            fn access_level(&self) -> Result<AccessLevel>;
        }
    }

    const PLC_FILTER: [&str; 3] = ["Root", "Objects", "PLC"];

    fn demo_root() -> (SimulatedServer, NodeRef) {
        let server = SimulatedServer::demo().unwrap();
        let root = server
            .connect("opc.tcp://localhost:4840")
            .unwrap()
            .root()
            .unwrap();
        (server, root)
    }

    #[test]
    fn test_walk_with_path_filter() {
        let (_server, root) = demo_root();
        let result = walk(&root, Some(&PLC_FILTER));

        let dirs: Vec<_> = result.directories.labels().collect();
        assert_eq!(
            dirs,
            [
                "Root/Objects/PLC",
                "Root/Objects/PLC/Line1",
                "Root/Objects/PLC/Drives"
            ]
        );
        assert_eq!(result.variables.len(), 7);
        assert_eq!(
            result.variables.get("Root/Objects/PLC/Line1/Temp"),
            Some("ns=2;s=PLC.Line1.Temp")
        );

        // guiding prefix is in the tree but not indexed, siblings are skipped
        assert!(result.tree.find_by_path("Root/Objects").is_some());
        assert!(!result.directories.contains("Root/Objects"));
        assert!(result.tree.find_by_path("Root/Objects/Server").is_none());
        assert_eq!(result.stats.errors, 0);
    }

    #[test]
    fn test_walk_without_filter_indexes_everything() {
        let (_server, root) = demo_root();
        let result = walk(&root, None);

        assert!(result.directories.contains("Root"));
        assert!(result.directories.contains("Root/Objects/Server"));
        assert_eq!(result.directories.len(), 6);
        assert_eq!(result.variables.len(), 8);
        assert!(result.variables.contains("Root/Objects/Server/ServerStatus"));
    }

    #[test]
    fn test_root_mismatch_expands_nothing() {
        let (_server, root) = demo_root();
        let result = walk(&root, Some(&["Plant", "Objects"]));

        assert_eq!(result.tree.len(), 1);
        assert!(result.directories.is_empty());
        assert!(result.variables.is_empty());
    }

    #[test]
    fn test_single_element_filter_indexes_root() {
        let (_server, root) = demo_root();
        let filtered = walk(&root, Some(&["Root"]));
        let unfiltered = walk(&root, None);
        assert_eq!(filtered.directories.len(), unfiltered.directories.len());
        assert_eq!(filtered.variables.len(), unfiltered.variables.len());
    }

    #[test]
    fn test_variable_annotations() {
        let (_server, root) = demo_root();
        let result = walk(&root, Some(&PLC_FILTER));

        let motor = result
            .tree
            .find_by_path("Root/Objects/PLC/Drives/Motor")
            .unwrap();
        assert_eq!(motor.class, NodeClass::Variable);
        assert_eq!(
            motor.annotations,
            vec![
                "Value: {speed: 1450.0, enabled: true, limits: {min: 0, max: 3000}}, \
                 Type: MotorState{speed: Double, enabled: Boolean, limits: Limits}"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_node_reachable_twice_is_recorded_per_path() {
        let (server, root) = demo_root();
        server
            .link("ns=2;s=PLC.Drives", "ns=2;s=PLC.Line1.Temp")
            .unwrap();
        let result = walk(&root, Some(&PLC_FILTER));

        assert_eq!(
            result.variables.get("Root/Objects/PLC/Line1/Temp"),
            result.variables.get("Root/Objects/PLC/Drives/Temp")
        );
        assert_eq!(result.variables.len(), 8);
    }

    #[test]
    fn test_children_failure_prunes_only_subtree() {
        let (server, root) = demo_root();
        server
            .set_fault("ns=2;s=PLC.Line1", Fault::Children, Some("BadTimeout"))
            .unwrap();
        let result = walk(&root, Some(&PLC_FILTER));

        let line1 = result.tree.find_by_path("Root/Objects/PLC/Line1").unwrap();
        assert_eq!(line1.annotations, vec!["Error reading children: BadTimeout"]);
        assert!(!line1.has_children());
        assert!(!result.directories.contains("Root/Objects/PLC/Line1"));
        assert!(result.directories.contains("Root/Objects/PLC/Drives"));
        assert_eq!(result.variables.len(), 3);
        assert_eq!(result.stats.errors, 1);
    }

    #[test]
    fn test_value_failure_is_annotated_and_still_indexed() {
        let (server, root) = demo_root();
        server
            .set_fault(
                "ns=2;s=PLC.Line1.Temp",
                Fault::Value,
                Some("BadCommunicationError"),
            )
            .unwrap();
        let result = walk(&root, Some(&PLC_FILTER));

        let temp = result
            .tree
            .find_by_path("Root/Objects/PLC/Line1/Temp")
            .unwrap();
        assert_eq!(
            temp.annotations,
            vec!["Error reading value: BadCommunicationError"]
        );
        assert!(result.variables.contains("Root/Objects/PLC/Line1/Temp"));
    }

    #[test]
    fn test_variable_on_guiding_prefix_is_not_expanded() {
        let server = SimulatedServer::new();
        server
            .add_variable(
                OBJECTS_NODE_ID,
                "ns=2;i=1",
                "PLC",
                ValuePattern::Constant(RawValue::Double(1.0)),
            )
            .unwrap();
        server.add_folder("ns=2;i=1", "ns=2;i=2", "Inner").unwrap();
        let root = server
            .connect("opc.tcp://localhost:4840")
            .unwrap()
            .root()
            .unwrap();

        let guided = walk(&root, Some(&["Root", "Objects", "PLC", "Inner"]));
        let plc = guided.tree.find_by_path("Root/Objects/PLC").unwrap();
        assert_eq!(plc.annotations, vec!["Value: 1.0, Type: Double"]);
        assert!(guided.tree.find_by_path("Root/Objects/PLC/Inner").is_none());
        assert!(guided.variables.is_empty());

        // unfiltered, variables are still walked for children
        let open = walk(&root, None);
        assert!(open.tree.find_by_path("Root/Objects/PLC/Inner").is_some());
        assert!(open.variables.contains("Root/Objects/PLC"));
        assert!(!open.directories.contains("Root/Objects/PLC"));
    }

    #[test]
    fn test_walk_limits() {
        let (_server, root) = demo_root();

        let limited = AddressSpaceWalker::new(WalkOptions {
            max_nodes: Some(3),
            ..Default::default()
        })
        .walk(&root);
        assert_eq!(limited.stats.nodes_visited, 3);
        assert!(limited.stats.truncated);

        let shallow = AddressSpaceWalker::new(WalkOptions {
            max_depth: Some(1),
            ..Default::default()
        })
        .walk(&root);
        assert_eq!(shallow.tree.len(), 2);
        assert!(shallow.directories.contains("Root/Objects"));
        assert!(!shallow.stats.truncated);
    }

    #[test]
    fn test_class_failure_and_name_fallback() {
        let mut child = MockNode::new();
        child.expect_node_id().return_const("ns=1;i=7".to_string());
        child
            .expect_display_name()
            .returning(|| Err(RecorderError::read("ns=1;i=7", "BadAttributeIdInvalid")));
        child
            .expect_node_class()
            .returning(|| Err(RecorderError::traversal("ns=1;i=7", "BadNodeClassInvalid")));
        let child: NodeRef = Arc::new(child);

        let mut root = MockNode::new();
        root.expect_node_id().return_const("i=84".to_string());
        root.expect_display_name()
            .returning(|| Ok("Root".to_string()));
        root.expect_node_class().returning(|| Ok(NodeClass::Object));
        root.expect_children()
            .returning(move || Ok(vec![Arc::clone(&child)]));
        let root: NodeRef = Arc::new(root);

        let result = walk(&root, None);
        let node = result.tree.find_by_path("Root/ns=1;i=7").unwrap();
        assert_eq!(
            node.annotations,
            vec!["Error reading node class: BadNodeClassInvalid"]
        );
        assert_eq!(node.class, NodeClass::Unspecified);
        assert!(result.directories.contains("Root"));
        assert!(result.variables.is_empty());
        assert_eq!(result.stats.errors, 1);
    }

    #[test]
    fn test_root_children_failure_terminates() {
        let mut root = MockNode::new();
        root.expect_node_id().return_const("i=84".to_string());
        root.expect_display_name()
            .returning(|| Ok("Root".to_string()));
        root.expect_node_class().returning(|| Ok(NodeClass::Object));
        root.expect_children()
            .times(1)
            .returning(|| Err(RecorderError::Connection("Connection closed".into())));
        let root: NodeRef = Arc::new(root);

        let result = walk(&root, Some(&PLC_FILTER));
        assert_eq!(result.tree.len(), 1);
        assert_eq!(result.stats.errors, 1);
        assert!(result.directories.is_empty());
    }
}
