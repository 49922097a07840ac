//! The document object model: [`Document`] and [`NodeHandle`].
//!
//! A `Document` owns one tree of nodes and exposes invariant-checked access
//! to it: at most one root element, text/children exclusivity on mutation,
//! cycle-free relocation, and typed attribute conversion. `NodeHandle` is a
//! copyable identifier for one element position — a document id plus an
//! arena position — valid as long as the owning document is alive and the
//! node has not been removed.
//!
//! All operations go through the owning `Document` (`&Document` for
//! navigation, `&mut Document` for mutation), which is what makes the
//! handles safe to copy freely: they borrow nothing.
//!
//! The model is single-owner and synchronous. Every operation runs to
//! completion on the caller's thread; sharing a `Document` across threads
//! requires external synchronization (e.g., wrapping it in a `Mutex`).
//!
//! # Examples
//!
//! ```
//! use arbordom::Document;
//!
//! let mut doc = Document::new();
//! let root = doc.add_root_node("test").unwrap();
//! doc.set_attribute(root, "prop", &123).unwrap();
//! assert_eq!(doc.dump_node(root, false), r#"<test prop="123"/>"#);
//! assert_eq!(doc.attribute::<i64>(root, "prop").unwrap(), 123);
//! ```

mod attr;
mod iter;

pub use attr::{AttributeInteger, FromAttributeValue, ToAttributeValue};
pub use iter::{ElementChildren, ElementSiblings};

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, XmlError};
use crate::parser::{self, ParseOptions, BUFFER_SOURCE_NAME};
use crate::serial::{self, SerializeOptions};
use crate::tree::{NodeId, Tree};
use crate::xpath;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one document's backing storage.
///
/// Deep-copying a document allocates a fresh id, so handles never alias
/// across storages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A lightweight, copyable identifier for one element node.
///
/// Two handles are equal iff they denote the same position in the same
/// document's storage — identity, not structural equality. A handle does
/// not keep its node alive: after the node (or its document) is gone,
/// fallible operations report [`XmlError::NoSuchNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) doc: DocumentId,
    pub(crate) node: NodeId,
}

/// An XML document: the single owner of a node tree.
///
/// Constructed empty ([`Document::new`]), from a file
/// ([`Document::load_file`]), or from a memory buffer
/// ([`Document::from_buffer`]). Dropping the document frees the whole tree;
/// `Clone` deep-copies it.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    tree: Tree,
    /// Lazily materialized root element, invalidated when the cached node
    /// dies (e.g., the root was adopted into another document).
    root_cache: Cell<Option<NodeId>>,
}

impl Document {
    // --- Construction ---

    /// Creates a new empty document with an auto-assigned version marker
    /// (`1.0`) and no root node.
    #[must_use]
    pub fn new() -> Self {
        parser::initialize();
        let mut tree = Tree::new();
        tree.version = Some("1.0".to_string());
        Self::from_tree(tree)
    }

    fn from_tree(tree: Tree) -> Self {
        Self {
            id: DocumentId::next(),
            tree,
            root_cache: Cell::new(None),
        }
    }

    /// Reads and parses the named file with default options.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Io`] if the file cannot be read and
    /// [`XmlError::Parse`] (carrying the file name) if its content is not
    /// well-formed XML.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_file_with(path, &ParseOptions::default())
    }

    /// Reads and parses the named file. `options` selects an explicit
    /// character encoding and whether to validate against the embedded
    /// DOCTYPE.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Io`] if the file cannot be read and
    /// [`XmlError::Parse`] if parsing or validation fails.
    pub fn load_file_with(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| XmlError::Io {
            path: name.clone(),
            message: e.to_string(),
        })?;
        let tree = parser::parse_bytes_named(&bytes, &name, options)?;
        Ok(Self::from_tree(tree))
    }

    /// Parses a document from an in-memory byte buffer with default
    /// options. Errors are attributed to `noname.xml`.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Parse`] if the buffer is not well-formed XML.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        Self::from_buffer_with(buffer, &ParseOptions::default())
    }

    /// Parses a document from an in-memory byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Parse`] if decoding, parsing, or validation
    /// fails.
    pub fn from_buffer_with(buffer: &[u8], options: &ParseOptions) -> Result<Self> {
        let tree = parser::parse_bytes_named(buffer, BUFFER_SOURCE_NAME, options)?;
        Ok(Self::from_tree(tree))
    }

    /// The XML version marker of this document, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.tree.version.as_deref()
    }

    // --- Handle plumbing ---

    fn handle(&self, id: NodeId) -> NodeHandle {
        NodeHandle {
            doc: self.id,
            node: id,
        }
    }

    /// Resolves a handle for a fallible operation.
    fn require(&self, handle: NodeHandle) -> Result<NodeId> {
        if handle.doc != self.id {
            return Err(XmlError::no_such_node("node does not belong to this document"));
        }
        if !self.tree.is_alive(handle.node) {
            return Err(XmlError::no_such_node("node is no longer part of the document"));
        }
        Ok(handle.node)
    }

    /// Resolves a handle for an infallible accessor.
    ///
    /// # Panics
    ///
    /// Panics if the handle belongs to a different document or its node has
    /// been removed — both are programmer errors, not data conditions.
    fn expect_node(&self, handle: NodeHandle) -> NodeId {
        assert!(
            handle.doc == self.id,
            "node handle belongs to a different document"
        );
        assert!(
            self.tree.is_alive(handle.node),
            "node handle refers to a removed node"
        );
        handle.node
    }

    // --- Root node ---

    fn root_id(&self) -> Option<NodeId> {
        if let Some(id) = self.root_cache.get() {
            if self.tree.is_alive(id) {
                return Some(id);
            }
            self.root_cache.set(None);
        }
        let found = self.tree.root_element();
        if found.is_some() {
            self.root_cache.set(found);
        }
        found
    }

    /// Returns the root node of the document.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::NoRootNode`] if no root has been added yet.
    pub fn root_node(&self) -> Result<NodeHandle> {
        self.root_id()
            .map(|id| self.handle(id))
            .ok_or(XmlError::NoRootNode)
    }

    /// Adds the root node to a document that has none yet. Once added, the
    /// root is fixed for the lifetime of the document.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::RootAlreadyExists`] if a root is already set.
    pub fn add_root_node(&mut self, name: &str) -> Result<NodeHandle> {
        if self.root_id().is_some() {
            return Err(XmlError::RootAlreadyExists {
                name: name.to_string(),
            });
        }
        let root = self.tree.create_element(name);
        let doc_node = self.tree.root();
        self.tree.append_child(doc_node, root);
        self.root_cache.set(Some(root));
        Ok(self.handle(root))
    }

    // --- Name and identity ---

    /// Returns the element's tag name.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign (see [`NodeHandle`]).
    #[must_use]
    pub fn name(&self, node: NodeHandle) -> &str {
        let id = self.expect_node(node);
        self.tree
            .element_name(id)
            .expect("node handle does not reference an element")
    }

    /// Walks parent links from `node` upward; `true` iff `ancestor` is
    /// encountered. A node is in its own subtree.
    ///
    /// # Panics
    ///
    /// Panics if `node` is stale or foreign.
    #[must_use]
    pub fn is_in_subtree_of(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        let id = self.expect_node(node);
        if ancestor.doc != self.id || !self.tree.is_alive(ancestor.node) {
            return false;
        }
        self.tree.is_in_subtree_of(id, ancestor.node)
    }

    // --- Attributes ---

    /// Returns whether the node carries the named attribute.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    #[must_use]
    pub fn has_attribute(&self, node: NodeHandle, name: &str) -> bool {
        let id = self.expect_node(node);
        self.tree.attribute(id, name).is_some()
    }

    /// Reads an attribute and converts it to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::AttributeMissing`] if the attribute does not
    /// exist, and [`XmlError::AttributeMalformed`] if the stored string is
    /// not entirely consumed by the conversion (trailing garbage, range
    /// overflow, unknown boolean spelling).
    pub fn attribute<T: FromAttributeValue>(&self, node: NodeHandle, name: &str) -> Result<T> {
        let value = self.raw_attribute(node, name)?;
        T::from_attribute(value)
    }

    /// Reads an integer attribute in the given base (2 to 36).
    ///
    /// # Errors
    ///
    /// Same contract as [`attribute`](Self::attribute).
    pub fn int_attribute_with_base<T: AttributeInteger>(
        &self,
        node: NodeHandle,
        name: &str,
        base: u32,
    ) -> Result<T> {
        let value = self.raw_attribute(node, name)?;
        attr::parse_integer(value, base)
    }

    /// Reads an attribute whose value names an element of an enumeration.
    /// Returns the zero-based index of the exact, case-sensitive match of
    /// the stored string in `names`.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::AttributeMissing`] if the attribute does not
    /// exist, and [`XmlError::AttributeMalformed`] if no candidate matches.
    pub fn enum_attribute(
        &self,
        node: NodeHandle,
        name: &str,
        names: &[&str],
    ) -> Result<usize> {
        let value = self.raw_attribute(node, name)?;
        attr::enum_index(value, names).ok_or_else(|| XmlError::AttributeMalformed {
            message: format!(
                "invalid value for {}.{}: `{}'",
                self.name(node),
                name,
                value
            ),
        })
    }

    fn raw_attribute(&self, node: NodeHandle, name: &str) -> Result<&str> {
        let id = self.require(node)?;
        self.tree
            .attribute(id, name)
            .ok_or_else(|| XmlError::AttributeMissing {
                name: name.to_string(),
            })
    }

    /// Serializes `value` to its canonical string form and stores it,
    /// creating the attribute or overwriting an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::NoSuchNode`] for a stale or foreign handle.
    pub fn set_attribute<T: ToAttributeValue + ?Sized>(
        &mut self,
        node: NodeHandle,
        name: &str,
        value: &T,
    ) -> Result<()> {
        let id = self.require(node)?;
        self.tree.set_attribute(id, name, &value.to_attribute());
        Ok(())
    }

    /// Like [`set_attribute`](Self::set_attribute), but refuses to create
    /// the attribute: it must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::AttributeMissing`] if the attribute does not
    /// exist.
    pub fn update_attribute<T: ToAttributeValue + ?Sized>(
        &mut self,
        node: NodeHandle,
        name: &str,
        value: &T,
    ) -> Result<()> {
        let id = self.require(node)?;
        if self.tree.attribute(id, name).is_none() {
            return Err(XmlError::AttributeMissing {
                name: name.to_string(),
            });
        }
        self.tree.set_attribute(id, name, &value.to_attribute());
        Ok(())
    }

    /// Removes an attribute. Not an error if the attribute is absent.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::NoSuchNode`] for a stale or foreign handle.
    pub fn remove_attribute(&mut self, node: NodeHandle, name: &str) -> Result<()> {
        let id = self.require(node)?;
        self.tree.remove_attribute(id, name);
        Ok(())
    }

    // --- Children ---

    /// Returns whether the node has element children.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    #[must_use]
    pub fn has_children(&self, node: NodeHandle) -> bool {
        self.children(node).next().is_some()
    }

    /// Counts the node's element children. O(n) in the child count.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    #[must_use]
    pub fn number_of_children(&self, node: NodeHandle) -> usize {
        self.children(node).count()
    }

    /// Returns an iterator over the node's element children. Non-element
    /// children (text, comments, processing instructions) are skipped.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    pub fn children(&self, node: NodeHandle) -> ElementChildren<'_> {
        let id = self.expect_node(node);
        ElementChildren::new(&self.tree, self.id, id)
    }

    /// Returns the node's first element child.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::NoSuchNode`] if there is none.
    pub fn first_child(&self, node: NodeHandle) -> Result<NodeHandle> {
        self.require(node)?;
        self.children(node)
            .next()
            .ok_or_else(|| XmlError::no_such_node("node has no children"))
    }

    /// Creates a new element child with the given name and appends it as
    /// the last child. When `content` is non-empty, the new element gets it
    /// as text content.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if this node currently has text
    /// content.
    pub fn add_child_node(
        &mut self,
        node: NodeHandle,
        name: &str,
        content: &str,
    ) -> Result<NodeHandle> {
        let id = self.require(node)?;
        self.check_no_text(id)?;
        let child = self.tree.create_element(name);
        self.tree.append_text(child, content);
        self.tree.append_child(id, child);
        Ok(self.handle(child))
    }

    /// Relocates (or, with `copy`, deep-copies) `node` to be the last child
    /// of `parent`. Both handles belong to this document; for nodes from
    /// another document see [`adopt_child_tree`](Self::adopt_child_tree)
    /// and [`copy_child_tree`](Self::copy_child_tree).
    ///
    /// Returns the handle of the attached node — `node` itself for a move,
    /// the fresh copy otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if `parent` has text content, and
    /// [`XmlError::CyclicRelocation`] if `parent` lies within `node`'s own
    /// subtree and `copy` is `false`.
    pub fn add_child_tree(
        &mut self,
        parent: NodeHandle,
        node: NodeHandle,
        copy: bool,
    ) -> Result<NodeHandle> {
        let parent_id = self.require(parent)?;
        let node_id = self.require(node)?;
        self.check_no_text(parent_id)?;

        if copy {
            let copy_id = self.tree.clone_subtree(node_id);
            self.tree.append_child(parent_id, copy_id);
            return Ok(self.handle(copy_id));
        }

        if self.tree.is_in_subtree_of(parent_id, node_id) {
            return Err(XmlError::CyclicRelocation);
        }
        self.tree.detach(node_id);
        self.tree.append_child(parent_id, node_id);
        Ok(node)
    }

    /// Moves `node` (with its whole subtree) out of `source` and appends it
    /// as the last child of `parent`. The node is detached from its origin;
    /// the returned handle identifies its new position in this document.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if `parent` has text content.
    pub fn adopt_child_tree(
        &mut self,
        parent: NodeHandle,
        source: &mut Document,
        node: NodeHandle,
    ) -> Result<NodeHandle> {
        let parent_id = self.require(parent)?;
        let node_id = source.require(node)?;
        self.check_no_text(parent_id)?;

        let copy_id = self.tree.copy_subtree_from(&source.tree, node_id);
        source.tree.free_subtree(node_id);
        self.tree.append_child(parent_id, copy_id);
        Ok(self.handle(copy_id))
    }

    /// Deep-copies `node` (with its whole subtree) from `source` and
    /// appends the copy as the last child of `parent`. The original subtree
    /// is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if `parent` has text content.
    pub fn copy_child_tree(
        &mut self,
        parent: NodeHandle,
        source: &Document,
        node: NodeHandle,
    ) -> Result<NodeHandle> {
        let parent_id = self.require(parent)?;
        let node_id = source.require(node)?;
        self.check_no_text(parent_id)?;

        let copy_id = self.tree.copy_subtree_from(&source.tree, node_id);
        self.tree.append_child(parent_id, copy_id);
        Ok(self.handle(copy_id))
    }

    /// Unlinks `child` from this node and frees its entire subtree. Stale
    /// handles into the removed subtree subsequently fail with
    /// [`XmlError::NoSuchNode`].
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::NotAChild`] if `child` is not a direct child of
    /// `parent`.
    pub fn remove_child_node(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        let parent_id = self.require(parent)?;
        let child_id = self.require(child)?;
        if self.tree.parent(child_id) != Some(parent_id) {
            return Err(XmlError::NotAChild);
        }
        self.tree.free_subtree(child_id);
        Ok(())
    }

    // --- Siblings ---

    /// Returns whether an element sibling follows this node.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    #[must_use]
    pub fn has_next_sibling(&self, node: NodeHandle) -> bool {
        self.following_siblings(node).next().is_some()
    }

    /// Returns an iterator over the element siblings following this node.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    pub fn following_siblings(&self, node: NodeHandle) -> ElementSiblings<'_> {
        let id = self.expect_node(node);
        ElementSiblings::new(&self.tree, self.id, id)
    }

    /// Returns the next element sibling.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::NoSuchNode`] if there is none.
    pub fn next_sibling(&self, node: NodeHandle) -> Result<NodeHandle> {
        self.require(node)?;
        self.following_siblings(node)
            .next()
            .ok_or_else(|| XmlError::no_such_node("node has no sibling"))
    }

    /// Creates a new element with the given name (and optional text
    /// content) and inserts it as the immediate next sibling of this node.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if this node is the root (a
    /// document has at most one root) or if the parent has text content.
    pub fn add_next_sibling(
        &mut self,
        node: NodeHandle,
        name: &str,
        content: &str,
    ) -> Result<NodeHandle> {
        let id = self.require(node)?;
        let parent_id = self.sibling_insertion_parent(id)?;
        self.check_no_text(parent_id)?;

        let sibling = self.tree.create_element(name);
        self.tree.append_text(sibling, content);
        self.tree.insert_after(id, sibling);
        Ok(self.handle(sibling))
    }

    /// Relocates (or, with `copy`, deep-copies) `node` to be the immediate
    /// next sibling of `anchor` — same semantics as
    /// [`add_child_tree`](Self::add_child_tree), but for sibling insertion.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if `anchor` is the root or its
    /// parent has text content, and [`XmlError::CyclicRelocation`] if
    /// `anchor` lies within `node`'s own subtree and `copy` is `false`.
    pub fn add_sibling_tree(
        &mut self,
        anchor: NodeHandle,
        node: NodeHandle,
        copy: bool,
    ) -> Result<NodeHandle> {
        let anchor_id = self.require(anchor)?;
        let node_id = self.require(node)?;
        let parent_id = self.sibling_insertion_parent(anchor_id)?;
        self.check_no_text(parent_id)?;

        if copy {
            let copy_id = self.tree.clone_subtree(node_id);
            self.tree.insert_after(anchor_id, copy_id);
            return Ok(self.handle(copy_id));
        }

        if self.tree.is_in_subtree_of(anchor_id, node_id) {
            return Err(XmlError::CyclicRelocation);
        }
        self.tree.detach(node_id);
        self.tree.insert_after(anchor_id, node_id);
        Ok(node)
    }

    /// Moves `node` out of `source` and inserts it as the immediate next
    /// sibling of `anchor` — the sibling counterpart of
    /// [`adopt_child_tree`](Self::adopt_child_tree).
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if `anchor` is the root or its
    /// parent has text content.
    pub fn adopt_sibling_tree(
        &mut self,
        anchor: NodeHandle,
        source: &mut Document,
        node: NodeHandle,
    ) -> Result<NodeHandle> {
        let anchor_id = self.require(anchor)?;
        let node_id = source.require(node)?;
        let parent_id = self.sibling_insertion_parent(anchor_id)?;
        self.check_no_text(parent_id)?;

        let copy_id = self.tree.copy_subtree_from(&source.tree, node_id);
        source.tree.free_subtree(node_id);
        self.tree.insert_after(anchor_id, copy_id);
        Ok(self.handle(copy_id))
    }

    /// Deep-copies `node` from `source` and inserts the copy as the
    /// immediate next sibling of `anchor`. The original subtree is
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if `anchor` is the root or its
    /// parent has text content.
    pub fn copy_sibling_tree(
        &mut self,
        anchor: NodeHandle,
        source: &Document,
        node: NodeHandle,
    ) -> Result<NodeHandle> {
        let anchor_id = self.require(anchor)?;
        let node_id = source.require(node)?;
        let parent_id = self.sibling_insertion_parent(anchor_id)?;
        self.check_no_text(parent_id)?;

        let copy_id = self.tree.copy_subtree_from(&source.tree, node_id);
        self.tree.insert_after(anchor_id, copy_id);
        Ok(self.handle(copy_id))
    }

    fn sibling_insertion_parent(&self, anchor: NodeId) -> Result<NodeId> {
        let parent = self
            .tree
            .parent(anchor)
            .ok_or_else(|| XmlError::invalid_state("node has no parent"))?;
        if parent == self.tree.root() {
            return Err(XmlError::invalid_state("cannot add a sibling to the root node"));
        }
        Ok(parent)
    }

    fn check_no_text(&self, parent: NodeId) -> Result<()> {
        if self.tree.has_text_child(parent) {
            return Err(XmlError::invalid_state(
                "node has text content; cannot add element children",
            ));
        }
        Ok(())
    }

    // --- Text content ---

    /// Returns the concatenation of all text-bearing content in the node's
    /// subtree, in document order. A node without any text-bearing content
    /// yields an empty string.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    #[must_use]
    pub fn text_content(&self, node: NodeHandle) -> String {
        let id = self.expect_node(node);
        self.tree.text_content(id)
    }

    /// Replaces the node's text content. The previous text-bearing children
    /// are removed first; an empty `content` just clears them.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if the node has element children.
    pub fn set_content(&mut self, node: NodeHandle, content: &str) -> Result<()> {
        let id = self.require(node)?;
        self.check_no_elements(id)?;
        self.tree.remove_text_children(id);
        self.tree.append_text(id, content);
        Ok(())
    }

    /// Appends text to the node without removing existing text.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::InvalidState`] if the node has element children.
    pub fn add_text_content(&mut self, node: NodeHandle, content: &str) -> Result<()> {
        let id = self.require(node)?;
        self.check_no_elements(id)?;
        self.tree.append_text(id, content);
        Ok(())
    }

    /// Deletes all direct text-bearing children of the node. Text inside
    /// nested elements stays. No-op if no text-bearing children exist.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::NoSuchNode`] for a stale or foreign handle.
    pub fn remove_text_content(&mut self, node: NodeHandle) -> Result<()> {
        let id = self.require(node)?;
        self.tree.remove_text_children(id);
        Ok(())
    }

    fn check_no_elements(&self, node: NodeId) -> Result<()> {
        if self.tree.has_element_child(node) {
            return Err(XmlError::invalid_state(
                "node has element children; cannot set text content",
            ));
        }
        Ok(())
    }

    // --- Queries ---

    /// Evaluates a path query against the document and returns the first
    /// match in document order.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Query`] if the expression cannot be compiled and
    /// [`XmlError::NoSuchNode`] if it compiles but matches nothing.
    pub fn find_node(&self, query: &str) -> Result<NodeHandle> {
        let matches = xpath::evaluate(&self.tree, query)?;
        matches
            .first()
            .map(|&id| self.handle(id))
            .ok_or_else(|| XmlError::no_such_node(format!("no node matches query `{query}'")))
    }

    // --- Serialization ---

    /// Serializes the node and its subtree to markup text. `format`
    /// requests indented output.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or foreign.
    #[must_use]
    pub fn dump_node(&self, node: NodeHandle, format: bool) -> String {
        let id = self.expect_node(node);
        let options = SerializeOptions::default().indent(format);
        serial::serialize_subtree(&self.tree, id, &options)
    }

    /// Serializes the whole document, XML declaration included.
    #[must_use]
    pub fn dump(&self, format: bool) -> String {
        let options = SerializeOptions::default().indent(format);
        serial::serialize(&self.tree, &options)
    }

    /// Writes the document to the named file: UTF-8, indented, with a
    /// trailing newline. `compression` takes the conventional 0–9 range
    /// where 0 means uncompressed; the writer currently always produces
    /// plain text regardless of the level.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Io`] if the file cannot be written.
    pub fn write_to_file(&self, path: impl AsRef<Path>, compression: u32) -> Result<()> {
        let _ = compression;
        let path = path.as_ref();
        fs::write(path, self.dump(true)).map_err(|e| XmlError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Document {
    /// Deep-copies the entire backing tree. The copy has its own document
    /// id, so handles into the original do not resolve against the copy;
    /// its root handle is recomputed from the new storage.
    fn clone(&self) -> Self {
        Self::from_tree(self.tree.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_has_no_root() {
        let doc = Document::new();
        assert_eq!(doc.root_node(), Err(XmlError::NoRootNode));
        assert_eq!(doc.version(), Some("1.0"));
    }

    #[test]
    fn test_add_root_node_once() {
        let mut doc = Document::new();
        let root = doc.add_root_node("test").unwrap();
        assert_eq!(doc.name(root), "test");
        assert_eq!(doc.root_node().unwrap(), root);

        let err = doc.add_root_node("again").unwrap_err();
        assert_eq!(
            err,
            XmlError::RootAlreadyExists {
                name: "again".to_string()
            }
        );
    }

    #[test]
    fn test_handle_identity_equality() {
        let doc = Document::from_buffer(b"<r><a/><a/></r>").unwrap();
        let root = doc.root_node().unwrap();
        let first: Vec<NodeHandle> = doc.children(root).collect();
        let second: Vec<NodeHandle> = doc.children(root).collect();
        // Same positions compare equal; distinct siblings with the same
        // name do not.
        assert_eq!(first[0], second[0]);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_handles_do_not_cross_documents() {
        let doc1 = Document::from_buffer(b"<r><a/></r>").unwrap();
        let doc2 = doc1.clone();
        let root1 = doc1.root_node().unwrap();
        let root2 = doc2.root_node().unwrap();
        assert_ne!(root1, root2);
        assert!(doc2.first_child(root1).is_err());
    }

    #[test]
    fn test_typed_attribute_round_trip() {
        let mut doc = Document::new();
        let root = doc.add_root_node("test").unwrap();
        doc.set_attribute(root, "prop_1", "val").unwrap();
        doc.set_attribute(root, "prop_2", &true).unwrap();
        doc.set_attribute(root, "prop_3", &4.3).unwrap();
        doc.set_attribute(root, "prop_4", &123).unwrap();

        assert_eq!(doc.attribute::<String>(root, "prop_1").unwrap(), "val");
        assert!(doc.attribute::<bool>(root, "prop_2").unwrap());
        assert_eq!(doc.attribute::<f64>(root, "prop_3").unwrap(), 4.3);
        assert_eq!(doc.attribute::<i32>(root, "prop_4").unwrap(), 123);
    }

    #[test]
    fn test_bool_attribute_serializes_as_words() {
        let mut doc = Document::new();
        let root = doc.add_root_node("t").unwrap();
        doc.set_attribute(root, "flag", &false).unwrap();
        assert_eq!(doc.dump_node(root, false), r#"<t flag="false"/>"#);
    }

    #[test]
    fn test_missing_attribute() {
        let mut doc = Document::new();
        let root = doc.add_root_node("t").unwrap();
        let err = doc.attribute::<i32>(root, "missing").unwrap_err();
        assert_eq!(
            err,
            XmlError::AttributeMissing {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_attribute() {
        let mut doc = Document::new();
        let root = doc.add_root_node("t").unwrap();
        doc.set_attribute(root, "n", "12abc").unwrap();
        assert!(matches!(
            doc.attribute::<i32>(root, "n"),
            Err(XmlError::AttributeMalformed { .. })
        ));
        // The raw string is still accessible.
        assert_eq!(doc.attribute::<String>(root, "n").unwrap(), "12abc");
    }

    #[test]
    fn test_int_attribute_with_base() {
        let mut doc = Document::new();
        let root = doc.add_root_node("t").unwrap();
        doc.set_attribute(root, "mask", "ff").unwrap();
        assert_eq!(
            doc.int_attribute_with_base::<u32>(root, "mask", 16).unwrap(),
            255
        );
        assert!(doc.int_attribute_with_base::<u32>(root, "mask", 10).is_err());
    }

    #[test]
    fn test_enum_attribute() {
        let mut doc = Document::new();
        let root = doc.add_root_node("pump").unwrap();
        doc.set_attribute(root, "mode", "idle").unwrap();

        let index = doc
            .enum_attribute(root, "mode", &["off", "idle", "running"])
            .unwrap();
        assert_eq!(index, 1);

        doc.set_attribute(root, "mode", "turbo").unwrap();
        let err = doc
            .enum_attribute(root, "mode", &["off", "idle", "running"])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for pump.mode: `turbo'"
        );
    }

    #[test]
    fn test_update_attribute_requires_existing() {
        let mut doc = Document::new();
        let root = doc.add_root_node("t").unwrap();
        assert!(matches!(
            doc.update_attribute(root, "p", &1),
            Err(XmlError::AttributeMissing { .. })
        ));
        doc.set_attribute(root, "p", &1).unwrap();
        doc.update_attribute(root, "p", &2).unwrap();
        assert_eq!(doc.attribute::<i32>(root, "p").unwrap(), 2);
    }

    #[test]
    fn test_remove_attribute_is_noop_when_absent() {
        let mut doc = Document::new();
        let root = doc.add_root_node("t").unwrap();
        doc.remove_attribute(root, "nothing").unwrap();
        doc.set_attribute(root, "p", &1).unwrap();
        doc.remove_attribute(root, "p").unwrap();
        assert!(!doc.has_attribute(root, "p"));
    }

    #[test]
    fn test_add_child_node_with_content() {
        let mut doc = Document::new();
        let root = doc.add_root_node("r").unwrap();
        let child = doc.add_child_node(root, "child", "hello").unwrap();
        assert_eq!(doc.name(child), "child");
        assert_eq!(doc.text_content(child), "hello");
        assert_eq!(doc.dump_node(root, false), "<r><child>hello</child></r>");
    }

    #[test]
    fn test_add_child_to_text_node_fails() {
        let mut doc = Document::new();
        let root = doc.add_root_node("r").unwrap();
        let child = doc.add_child_node(root, "c", "some text").unwrap();
        assert!(matches!(
            doc.add_child_node(child, "grandchild", ""),
            Err(XmlError::InvalidState { .. })
        ));
        // The rejected call left the tree untouched.
        assert_eq!(doc.number_of_children(child), 0);
    }

    #[test]
    fn test_set_content_on_node_with_children_fails() {
        let mut doc = Document::new();
        let root = doc.add_root_node("r").unwrap();
        doc.add_child_node(root, "c", "").unwrap();
        assert!(matches!(
            doc.set_content(root, "text"),
            Err(XmlError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_set_content_replaces_text() {
        let mut doc = Document::new();
        let root = doc.add_root_node("r").unwrap();
        doc.set_content(root, "first").unwrap();
        doc.set_content(root, "second").unwrap();
        assert_eq!(doc.text_content(root), "second");
    }

    #[test]
    fn test_add_text_content_appends() {
        let mut doc = Document::new();
        let root = doc.add_root_node("r").unwrap();
        doc.set_content(root, "fn0rd").unwrap();
        doc.add_text_content(root, "&<bla").unwrap();
        assert_eq!(doc.text_content(root), "fn0rd&<bla");
        assert_eq!(doc.dump_node(root, false), "<r>fn0rd&amp;&lt;bla</r>");
    }

    #[test]
    fn test_remove_text_content_keeps_nested_text() {
        let doc_text = b"<foo><child1>text1<child2>text2</child2>text3</child1></foo>";
        let mut doc = Document::from_buffer(doc_text).unwrap();
        let root = doc.root_node().unwrap();
        let child1 = doc.first_child(root).unwrap();
        assert_eq!(doc.text_content(child1), "text1text2text3");

        doc.remove_text_content(child1).unwrap();
        assert_eq!(doc.text_content(child1), "text2");

        // No-op on a node that has no text left.
        doc.remove_text_content(child1).unwrap();
        assert_eq!(doc.text_content(child1), "text2");
    }

    #[test]
    fn test_first_child_and_next_sibling_errors() {
        let doc = Document::from_buffer(b"<r><only/></r>").unwrap();
        let root = doc.root_node().unwrap();
        let only = doc.first_child(root).unwrap();
        assert!(matches!(
            doc.first_child(only),
            Err(XmlError::NoSuchNode { .. })
        ));
        assert!(matches!(
            doc.next_sibling(only),
            Err(XmlError::NoSuchNode { .. })
        ));
        assert!(!doc.has_children(only));
        assert!(!doc.has_next_sibling(only));
    }

    #[test]
    fn test_add_next_sibling() {
        let mut doc = Document::new();
        let root = doc.add_root_node("r").unwrap();
        let a = doc.add_child_node(root, "a", "").unwrap();
        let b = doc.add_next_sibling(a, "b", "text").unwrap();
        assert_eq!(doc.next_sibling(a).unwrap(), b);
        assert_eq!(doc.dump_node(root, false), "<r><a/><b>text</b></r>");
    }

    #[test]
    fn test_add_next_sibling_to_root_fails() {
        let mut doc = Document::new();
        let root = doc.add_root_node("r").unwrap();
        assert!(matches!(
            doc.add_next_sibling(root, "second", ""),
            Err(XmlError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_move_child_within_document() {
        let mut doc = Document::from_buffer(b"<r><a><x/></a><b/></r>").unwrap();
        let root = doc.root_node().unwrap();
        let a = doc.first_child(root).unwrap();
        let b = doc.next_sibling(a).unwrap();
        let x = doc.first_child(a).unwrap();

        let moved = doc.add_child_tree(b, x, false).unwrap();
        assert_eq!(moved, x);
        assert_eq!(doc.dump_node(root, false), "<r><a/><b><x/></b></r>");
    }

    #[test]
    fn test_move_into_own_subtree_fails() {
        let mut doc = Document::from_buffer(b"<r><a><x/></a></r>").unwrap();
        let root = doc.root_node().unwrap();
        let a = doc.first_child(root).unwrap();
        let x = doc.first_child(a).unwrap();

        assert_eq!(doc.add_child_tree(x, a, false), Err(XmlError::CyclicRelocation));
        // Rejected move left the tree untouched.
        assert_eq!(doc.dump_node(root, false), "<r><a><x/></a></r>");
    }

    #[test]
    fn test_copy_into_own_subtree_succeeds() {
        let mut doc = Document::from_buffer(b"<r><a><x/></a></r>").unwrap();
        let root = doc.root_node().unwrap();
        let a = doc.first_child(root).unwrap();
        let x = doc.first_child(a).unwrap();

        let copy = doc.add_child_tree(x, a, true).unwrap();
        assert_ne!(copy, a);
        assert_eq!(
            doc.dump_node(root, false),
            "<r><a><x><a><x/></a></x></a></r>"
        );
    }

    #[test]
    fn test_adopt_child_across_documents() {
        let mut target = Document::from_buffer(b"<target/>").unwrap();
        let mut source = Document::from_buffer(b"<src><gift><inner/></gift></src>").unwrap();
        let target_root = target.root_node().unwrap();
        let source_root = source.root_node().unwrap();
        let gift = source.first_child(source_root).unwrap();

        let adopted = target.adopt_child_tree(target_root, &mut source, gift).unwrap();
        assert_eq!(target.name(adopted), "gift");
        assert_eq!(
            target.dump_node(target_root, false),
            "<target><gift><inner/></gift></target>"
        );
        // Moved out of the source document.
        assert!(!source.has_children(source_root));
        assert!(source.first_child(source_root).is_err());
    }

    #[test]
    fn test_copy_child_across_documents_leaves_source() {
        let mut target = Document::from_buffer(b"<target/>").unwrap();
        let source = Document::from_buffer(b"<src><gift/></src>").unwrap();
        let target_root = target.root_node().unwrap();
        let gift = source.first_child(source.root_node().unwrap()).unwrap();

        target.copy_child_tree(target_root, &source, gift).unwrap();
        assert_eq!(target.dump_node(target_root, false), "<target><gift/></target>");
        assert_eq!(source.dump_node(source.root_node().unwrap(), false), "<src><gift/></src>");
    }

    #[test]
    fn test_sibling_tree_relocation() {
        let mut doc = Document::from_buffer(b"<r><a/><b><x/></b></r>").unwrap();
        let root = doc.root_node().unwrap();
        let a = doc.first_child(root).unwrap();
        let b = doc.next_sibling(a).unwrap();
        let x = doc.first_child(b).unwrap();

        doc.add_sibling_tree(a, x, false).unwrap();
        assert_eq!(doc.dump_node(root, false), "<r><a/><x/><b/></r>");
    }

    #[test]
    fn test_sibling_move_into_own_subtree_fails() {
        let mut doc = Document::from_buffer(b"<r><a><x/><y/></a></r>").unwrap();
        let root = doc.root_node().unwrap();
        let a = doc.first_child(root).unwrap();
        let x = doc.first_child(a).unwrap();

        assert_eq!(doc.add_sibling_tree(x, a, false), Err(XmlError::CyclicRelocation));
    }

    #[test]
    fn test_remove_child_node() {
        let mut doc = Document::from_buffer(b"<r><a/><b><deep/></b></r>").unwrap();
        let root = doc.root_node().unwrap();
        let a = doc.first_child(root).unwrap();
        let b = doc.next_sibling(a).unwrap();
        let deep = doc.first_child(b).unwrap();

        // Not a direct child of root.
        assert_eq!(doc.remove_child_node(root, deep), Err(XmlError::NotAChild));

        doc.remove_child_node(root, b).unwrap();
        assert_eq!(doc.number_of_children(root), 1);
        // The whole subtree is gone; stale handles fail.
        assert!(doc.first_child(b).is_err());
        assert!(doc.attribute::<String>(deep, "x").is_err());
        assert_eq!(doc.dump_node(root, false), "<r><a/></r>");
    }

    #[test]
    fn test_is_in_subtree_of() {
        let doc = Document::from_buffer(b"<r><a><x/></a><b/></r>").unwrap();
        let root = doc.root_node().unwrap();
        let a = doc.first_child(root).unwrap();
        let x = doc.first_child(a).unwrap();
        let b = doc.next_sibling(a).unwrap();

        assert!(doc.is_in_subtree_of(x, a));
        assert!(doc.is_in_subtree_of(x, root));
        assert!(doc.is_in_subtree_of(a, a));
        assert!(!doc.is_in_subtree_of(a, x));
        assert!(!doc.is_in_subtree_of(b, a));
    }

    #[test]
    fn test_find_node() {
        let doc = Document::from_buffer(
            b"<foo><child1>text1<child2>text2</child2>text3</child1></foo>",
        )
        .unwrap();
        let child2 = doc.find_node("/foo/child1/child2").unwrap();
        assert_eq!(doc.dump_node(child2, false), "<child2>text2</child2>");

        assert!(matches!(
            doc.find_node("/foo/nonexistent"),
            Err(XmlError::NoSuchNode { .. })
        ));
        assert!(matches!(
            doc.find_node("/foo/child1["),
            Err(XmlError::Query { .. })
        ));
    }

    #[test]
    fn test_find_node_returns_first_in_document_order() {
        let doc = Document::from_buffer(b"<r><k i=\"1\"/><k i=\"2\"/></r>").unwrap();
        let found = doc.find_node("//k").unwrap();
        assert_eq!(doc.attribute::<i32>(found, "i").unwrap(), 1);
    }

    #[test]
    fn test_clone_is_deep_and_independent() {
        let mut original = Document::from_buffer(b"<r><a p=\"1\"/></r>").unwrap();
        let clone = original.clone();
        assert_eq!(original.dump(true), clone.dump(true));

        let root = original.root_node().unwrap();
        let a = original.first_child(root).unwrap();
        original.set_attribute(a, "p", &2).unwrap();

        let clone_a = clone.first_child(clone.root_node().unwrap()).unwrap();
        assert_eq!(clone.attribute::<i32>(clone_a, "p").unwrap(), 1);
    }

    #[test]
    fn test_root_cache_survives_root_adoption() {
        let mut target = Document::from_buffer(b"<t/>").unwrap();
        let mut source = Document::from_buffer(b"<s/>").unwrap();
        let source_root = source.root_node().unwrap(); // materializes the cache
        let target_root = target.root_node().unwrap();

        target.adopt_child_tree(target_root, &mut source, source_root).unwrap();
        assert_eq!(source.root_node(), Err(XmlError::NoRootNode));
        // A new root can be added afterwards.
        source.add_root_node("fresh").unwrap();
        assert_eq!(source.name(source.root_node().unwrap()), "fresh");
    }

    #[test]
    fn test_load_file_missing_is_io_error() {
        let err = Document::load_file("/no/such/file.xml").unwrap_err();
        assert!(matches!(err, XmlError::Io { .. }));
    }

    #[test]
    fn test_parse_error_carries_source_name() {
        let err = Document::from_buffer(b"<broken").unwrap_err();
        match err {
            XmlError::Parse { source_name, .. } => assert_eq!(source_name, "noname.xml"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
