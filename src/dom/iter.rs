//! Element-filtering iterators.
//!
//! Both iterators walk a sibling chain and transparently skip every
//! non-element node (text, comments, CDATA, processing instructions). They
//! are forward-only and single-pass; calling the accessor again yields a
//! fresh traversal. Mutating the tree while an iterator is live is ruled
//! out by the borrow on the document.
//!
//! An exhausted iterator keeps returning `None`, so iterators started from
//! different nodes become indistinguishable once they run off the end of
//! their chains — the shared end sentinel of the traversal.

use crate::tree::{NodeId, Tree};

use super::{DocumentId, NodeHandle};

fn next_element(tree: &Tree, mut candidate: Option<NodeId>) -> Option<NodeId> {
    while let Some(id) = candidate {
        if tree.node(id).kind.is_element() {
            return Some(id);
        }
        candidate = tree.next_sibling(id);
    }
    None
}

/// Iterator over the element children of a node, in document order.
pub struct ElementChildren<'a> {
    tree: &'a Tree,
    doc: DocumentId,
    next: Option<NodeId>,
}

impl<'a> ElementChildren<'a> {
    pub(super) fn new(tree: &'a Tree, doc: DocumentId, parent: NodeId) -> Self {
        Self {
            tree,
            doc,
            next: tree.first_child(parent),
        }
    }
}

impl Iterator for ElementChildren<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let id = next_element(self.tree, self.next)?;
        self.next = self.tree.next_sibling(id);
        Some(NodeHandle {
            doc: self.doc,
            node: id,
        })
    }
}

/// Iterator over the element siblings following a node, in document order.
/// The starting node itself is not yielded.
pub struct ElementSiblings<'a> {
    tree: &'a Tree,
    doc: DocumentId,
    next: Option<NodeId>,
}

impl<'a> ElementSiblings<'a> {
    pub(super) fn new(tree: &'a Tree, doc: DocumentId, start: NodeId) -> Self {
        Self {
            tree,
            doc,
            next: tree.next_sibling(start),
        }
    }
}

impl Iterator for ElementSiblings<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let id = next_element(self.tree, self.next)?;
        self.next = self.tree.next_sibling(id);
        Some(NodeHandle {
            doc: self.doc,
            node: id,
        })
    }
}
