//! Arena-based XML tree storage.
//!
//! This module implements the backing storage for a document using arena
//! allocation with typed indices. All nodes live in a contiguous
//! `Vec<NodeData>` owned by the [`Tree`], and are referenced by [`NodeId`] —
//! a newtype over `NonZeroU32`.
//!
//! This design provides O(1) node access, cache-friendly layout, no
//! reference counting overhead, and safe bulk deallocation (drop the `Tree`
//! and everything is freed). Navigation links (parent, first\_child,
//! last\_child, next\_sibling, prev\_sibling) are arena indices, which avoids
//! aliasing hazards and per-node heap allocation.
//!
//! The `Tree` exposes link-level primitives only; the invariant-checked
//! surface (root policy, text/children exclusivity, cycle rejection) lives
//! in [`crate::dom`].

mod node;

pub use node::NodeKind;

use std::num::NonZeroU32;

/// A typed index into a tree's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, meaning it can never be zero
/// and `Option<NodeId>` has the same size as `NodeId` (niche optimization).
/// Two ids are equal iff they denote the same arena position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0.
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    /// Returns the raw index as a `usize` for indexing into the arena.
    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// An XML attribute on an element. The value is always stored as a string;
/// typed access is a conversion at read/write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The attribute name, unique within its element.
    pub name: String,
    /// The attribute value (entity references resolved).
    pub value: String,
}

/// Storage for a single node in the arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node, if any. The document node has no parent.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }

    fn tombstone() -> Self {
        Self::new(NodeKind::Freed)
    }
}

/// The backing storage of one document: a node arena plus the metadata from
/// the XML declaration.
#[derive(Debug, Clone)]
pub struct Tree {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node id (parent of the root element).
    root: NodeId,
    /// XML version from the XML declaration (e.g., "1.0").
    pub version: Option<String>,
    /// Encoding from the XML declaration (e.g., "UTF-8").
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
    /// Root element name declared in the DOCTYPE, if one was present.
    pub doctype_name: Option<String>,
}

impl Tree {
    /// Creates a new empty tree containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        // Index 0: placeholder (NodeId uses NonZeroU32)
        nodes.push(NodeData::new(NodeKind::Document));
        // Index 1: the document node
        nodes.push(NodeData::new(NodeKind::Document));
        let root = NodeId::from_index(1);
        Self {
            nodes,
            root,
            version: None,
            encoding: None,
            standalone: None,
            doctype_name: None,
        }
    }

    /// Returns the document node id (the parent of the root element).
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element of the tree (the single top-level element),
    /// if one exists.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node(id).kind.is_element())
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a valid node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    /// Returns a mutable reference to the `NodeData` for the given node.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns `false` if the node's subtree was unlinked and freed.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.as_index() < self.nodes.len() && !matches!(self.node(id).kind, NodeKind::Freed)
    }

    /// Returns the tag name of an element node, `None` for any other kind.
    #[must_use]
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the total number of nodes in the arena, freed slots included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1 // subtract placeholder at index 0
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node (all kinds).
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to the
    /// document node).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// Returns an iterator over all descendants of a node, depth-first in
    /// document order. The starting node itself is not yielded.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// Walks parent links from `id` upward; `true` iff `ancestor` is
    /// encountered (a node is in its own subtree).
    #[must_use]
    pub fn is_in_subtree_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    // --- Mutation ---

    /// Allocates a new node in the arena and returns its `NodeId`.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Allocates a new element node with no attributes.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_node(NodeKind::Element {
            name: name.to_string(),
            attributes: Vec::new(),
        })
    }

    /// Allocates a new text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.create_node(NodeKind::Text {
            content: content.to_string(),
        })
    }

    /// Appends a child node to the end of a parent's child list.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if `child` already has a parent. Detach it
    /// first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Inserts `new_node` as the immediate next sibling of `anchor`.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if `anchor` has no parent or `new_node`
    /// already has one.
    pub fn insert_after(&mut self, anchor: NodeId, new_node: NodeId) {
        debug_assert!(
            self.node(new_node).parent.is_none(),
            "new_node already has a parent; detach it first"
        );
        debug_assert!(self.node(anchor).parent.is_some(), "anchor has no parent");

        let parent = self.node(anchor).parent;
        self.node_mut(new_node).parent = parent;

        let next = self.node(anchor).next_sibling;
        self.node_mut(anchor).next_sibling = Some(new_node);
        self.node_mut(new_node).prev_sibling = Some(anchor);
        self.node_mut(new_node).next_sibling = next;

        match next {
            Some(n) => self.node_mut(n).prev_sibling = Some(new_node),
            None => {
                if let Some(p) = parent {
                    self.node_mut(p).last_child = Some(new_node);
                }
            }
        }
    }

    /// Detaches a node from its parent. The node stays allocated and keeps
    /// its subtree; only the links to its old position are cleared.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        self.node_mut(id).parent = None;
        self.node_mut(id).prev_sibling = None;
        self.node_mut(id).next_sibling = None;
    }

    /// Detaches a node and tombstones it together with its entire subtree.
    /// Later lookups through any id in the subtree report the node as dead.
    pub fn free_subtree(&mut self, id: NodeId) {
        let mut doomed: Vec<NodeId> = self.descendants(id).collect();
        doomed.push(id);
        self.detach(id);
        for node in doomed {
            self.nodes[node.as_index()] = NodeData::tombstone();
        }
    }

    /// Deep-copies the subtree rooted at `id` within this arena. The copy is
    /// detached; link it with [`append_child`](Self::append_child) or
    /// [`insert_after`](Self::insert_after).
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.node(id).kind.clone();
        let copy = self.create_node(kind);
        let children: Vec<NodeId> = self.children(id).collect();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Deep-copies the subtree rooted at `id` in `source` into this arena.
    /// The copy is detached; `source` is not modified.
    pub fn copy_subtree_from(&mut self, source: &Tree, id: NodeId) -> NodeId {
        let copy = self.create_node(source.node(id).kind.clone());
        for child in source.children(id) {
            let child_copy = self.copy_subtree_from(source, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // --- Attributes ---

    /// Returns the attributes of an element node, empty for other kinds.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the value of an attribute by name on an element node.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Creates or overwrites an attribute on an element node. Does nothing
    /// on non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            match attributes.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.value = value.to_string(),
                None => attributes.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }
    }

    /// Removes an attribute by name. Returns whether it existed.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            let before = attributes.len();
            attributes.retain(|a| a.name != name);
            return attributes.len() != before;
        }
        false
    }

    // --- Text content ---

    /// Returns the concatenated text content of a node's subtree: every
    /// `Text` and `CData` payload in document order. A subtree without
    /// text-bearing nodes yields an empty string.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } | NodeKind::CData { content } => {
                buf.push_str(content);
            }
            _ => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
        }
    }

    /// Returns `true` if the node has a direct text-bearing child.
    #[must_use]
    pub fn has_text_child(&self, id: NodeId) -> bool {
        self.children(id)
            .any(|c| self.node(c).kind.is_text_bearing())
    }

    /// Returns `true` if the node has a direct element child.
    #[must_use]
    pub fn has_element_child(&self, id: NodeId) -> bool {
        self.children(id).any(|c| self.node(c).kind.is_element())
    }

    /// Appends text to the node, coalescing with a trailing text child if
    /// one exists.
    pub fn append_text(&mut self, id: NodeId, content: &str) {
        if content.is_empty() {
            return;
        }
        if let Some(last) = self.last_child(id) {
            if let NodeKind::Text { content: existing } = &mut self.node_mut(last).kind {
                existing.push_str(content);
                return;
            }
        }
        let text = self.create_text(content);
        self.append_child(id, text);
    }

    /// Unlinks and frees every direct text-bearing child of the node.
    /// Returns how many children were removed.
    pub fn remove_text_children(&mut self, id: NodeId) -> usize {
        let doomed: Vec<NodeId> = self
            .children(id)
            .filter(|&c| self.node(c).kind.is_text_bearing())
            .collect();
        let count = doomed.len();
        for child in doomed {
            self.free_subtree(child);
        }
        count
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node (all node kinds).
pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    tree: &'a Tree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        // Go deeper first
        if let Some(child) = self.tree.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        // Then try the next sibling
        if let Some(sibling) = self.tree.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        // Walk up to find an ancestor with a next sibling, stopping at the
        // traversal root
        let mut ancestor = self.tree.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                self.next = None;
                return Some(current);
            }
            if let Some(sibling) = self.tree.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.tree.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}
