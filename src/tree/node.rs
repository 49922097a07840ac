//! Node type definitions.
//!
//! The `NodeKind` enum represents all node types in an XML document tree.
//! Each variant carries the node-type-specific payload (element name and
//! attributes, text content, and so on).

use super::Attribute;

/// The kind of an XML node and its associated data.
///
/// This enum carries the payload for each node type. Navigation links
/// (parent, children, siblings) are stored in `NodeData`, not here.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node — there is exactly one per tree.
    Document,

    /// An element node, e.g., `<wheel radius="0.3">`.
    Element {
        /// The element's tag name.
        name: String,
        /// Attributes on this element, in document order. Names are unique
        /// within one element.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data (character references already
    /// resolved).
    Text {
        /// The text content.
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// Tombstone for a node whose subtree was unlinked and freed. Freed
    /// slots are never reused; reachable traversals never encounter them.
    Freed,
}

impl NodeKind {
    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }

    /// Returns `true` for text-bearing nodes (text and CDATA).
    #[must_use]
    pub fn is_text_bearing(&self) -> bool {
        matches!(self, Self::Text { .. } | Self::CData { .. })
    }
}
