//! Display tree built while walking the address space.
//!
//! Nodes are stored in a flat `Vec` indexed by [`TreeId`], with
//! parent/child/sibling links forming an intrusive tree. The same node id may
//! appear several times when it is reachable through more than one parent
//! chain; the path label is what distinguishes the copies.
//!
//! ```text
//! Root
//! +-- Objects
//!     +-- PLC
//!         +-- Temp         Value: 21.5, Type: Double
//!         +-- Pressure     Error reading value: BadCommunicationError
//! ```

use crate::types::{join_path, NodeClass};
use std::collections::HashMap;
use std::fmt;

/// Index into `BrowseTree::nodes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TreeId(pub u32);

impl TreeId {
    pub const INVALID: TreeId = TreeId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "TreeId(INVALID)")
        } else {
            write!(f, "TreeId({})", self.0)
        }
    }
}

/// A single visited node.
#[derive(Debug, Clone)]
pub struct BrowseNode {
    pub id: TreeId,
    /// Display name as read from the server (node id when unreadable).
    pub display_name: String,
    /// `/`-joined display names from the traversal root.
    pub path_label: String,
    /// Server node id.
    pub node_id: String,
    /// Node class, `Unspecified` when it could not be read.
    pub class: NodeClass,
    pub parent: TreeId,
    pub first_child: TreeId,
    last_child: TreeId,
    pub next_sibling: TreeId,
    /// Depth in the tree (0 for the root).
    pub depth: u16,
    /// Inline notes such as the current value or a read error.
    pub annotations: Vec<String>,
}

impl BrowseNode {
    fn new(id: TreeId, display_name: String, path_label: String, node_id: String) -> Self {
        Self {
            id,
            display_name,
            path_label,
            node_id,
            class: NodeClass::Unspecified,
            parent: TreeId::INVALID,
            first_child: TreeId::INVALID,
            last_child: TreeId::INVALID,
            next_sibling: TreeId::INVALID,
            depth: 0,
            annotations: Vec::new(),
        }
    }

    pub fn has_children(&self) -> bool {
        self.first_child.is_valid()
    }
}

/// Flat-storage browse tree.
///
/// - `TreeId` is a direct index into `nodes`.
/// - Path lookups are O(1) via HashMap; a repeated path keeps the latest node.
#[derive(Debug, Default, Clone)]
pub struct BrowseTree {
    nodes: Vec<BrowseNode>,
    path_index: HashMap<String, TreeId>,
}

impl BrowseTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a root node (no parent).
    pub fn add_root(&mut self, display_name: String, node_id: String) -> TreeId {
        let id = TreeId(self.nodes.len() as u32);
        let node = BrowseNode::new(id, display_name.clone(), display_name, node_id);
        self.path_index.insert(node.path_label.clone(), id);
        self.nodes.push(node);
        id
    }

    /// Add a child node under `parent`. Returns the child's TreeId.
    pub fn add_child(&mut self, parent: TreeId, display_name: String, node_id: String) -> TreeId {
        let Some(parent_node) = self.get(parent) else {
            return self.add_root(display_name, node_id);
        };
        let id = TreeId(self.nodes.len() as u32);
        let path_label = join_path(&parent_node.path_label, &display_name);
        let depth = parent_node.depth + 1;
        let previous_last = parent_node.last_child;

        let mut node = BrowseNode::new(id, display_name, path_label, node_id);
        node.parent = parent;
        node.depth = depth;
        self.path_index.insert(node.path_label.clone(), id);
        self.nodes.push(node);

        // Link into parent's child list
        if previous_last.is_valid() {
            self.nodes[previous_last.index()].next_sibling = id;
        } else {
            self.nodes[parent.index()].first_child = id;
        }
        self.nodes[parent.index()].last_child = id;

        id
    }

    /// Get a node by TreeId (O(1) array index).
    #[inline]
    pub fn get(&self, id: TreeId) -> Option<&BrowseNode> {
        if id.is_valid() {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, id: TreeId) -> Option<&mut BrowseNode> {
        if id.is_valid() {
            self.nodes.get_mut(id.index())
        } else {
            None
        }
    }

    /// Attach an inline note to a node.
    pub fn annotate(&mut self, id: TreeId, note: impl Into<String>) {
        if let Some(node) = self.get_mut(id) {
            node.annotations.push(note.into());
        }
    }

    /// Look up by path label (O(1) HashMap).
    pub fn find_by_path(&self, path_label: &str) -> Option<&BrowseNode> {
        self.path_index
            .get(path_label)
            .and_then(|id| self.get(*id))
    }

    /// Iterate over all nodes in visit order.
    pub fn iter(&self) -> impl Iterator<Item = &BrowseNode> {
        self.nodes.iter()
    }

    /// Iterate over children of a given node.
    pub fn children(&self, parent: TreeId) -> ChildIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(TreeId::INVALID);
        ChildIter {
            tree: self,
            current: first,
        }
    }

    /// Iterate over root nodes.
    pub fn roots(&self) -> impl Iterator<Item = &BrowseNode> {
        self.nodes.iter().filter(|n| !n.parent.is_valid())
    }

    /// Number of annotations across the tree.
    pub fn annotation_count(&self) -> usize {
        self.nodes.iter().map(|n| n.annotations.len()).sum()
    }

    /// Render the tree as indented text, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for root in self.roots() {
            self.render_node(root, &mut out);
        }
        out
    }

    fn render_node(&self, node: &BrowseNode, out: &mut String) {
        let indent = "  ".repeat(node.depth as usize);
        out.push_str(&indent);
        out.push_str(&node.display_name);
        out.push('\n');
        for note in &node.annotations {
            // multi-line values (arrays) stay aligned under the node
            for line in note.lines() {
                out.push_str(&indent);
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        for child in self.children(node.id) {
            self.render_node(child, out);
        }
    }
}

/// Iterator over the children of a node.
pub struct ChildIter<'a> {
    tree: &'a BrowseTree,
    current: TreeId,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = &'a BrowseNode;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.current.is_valid() {
            return None;
        }
        let node = &self.tree.nodes[self.current.index()];
        self.current = node.next_sibling;
        Some(node)
    }
}
