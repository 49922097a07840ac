//! Error types for document access and manipulation.
//!
//! Every fallible operation in this crate reports one of the variants of
//! [`XmlError`] synchronously at the point of failure. Operations that could
//! partially apply validate all preconditions before the first mutation, so a
//! rejected call never leaves the tree in an inconsistent state.
//!
//! Parse errors carry a [`SourceLocation`] with line, column, and byte offset
//! for precise diagnostics.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XmlError>;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error type for all document operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// The input could not be parsed into a document tree.
    Parse {
        /// The name of the input (file path, or `noname.xml` for buffers).
        source_name: String,
        /// What went wrong.
        message: String,
        /// Where in the input the parser gave up.
        location: SourceLocation,
    },

    /// The document has no root node yet.
    NoRootNode,

    /// A root node is already set and cannot be replaced.
    RootAlreadyExists {
        /// The name the caller tried to add.
        name: String,
    },

    /// A requested child, sibling, or query match does not exist.
    NoSuchNode {
        /// What was looked for.
        message: String,
    },

    /// The given node is not a direct child of the node it was removed from.
    NotAChild,

    /// A requested attribute does not exist on the node.
    AttributeMissing {
        /// The attribute name.
        name: String,
    },

    /// An attribute value could not be converted to the requested type.
    AttributeMalformed {
        /// What failed to convert, and why.
        message: String,
    },

    /// The operation would mix element children with text content.
    InvalidState {
        /// Which rule was violated.
        message: String,
    },

    /// Moving the node would make a subtree a descendant of itself.
    CyclicRelocation,

    /// A path query expression could not be compiled.
    Query {
        /// What the query compiler rejected.
        message: String,
    },

    /// A file could not be read or written.
    Io {
        /// The path involved.
        path: String,
        /// The underlying I/O error, rendered.
        message: String,
    },
}

impl XmlError {
    /// Shorthand for a [`XmlError::NoSuchNode`] with the given message.
    pub(crate) fn no_such_node(message: impl Into<String>) -> Self {
        Self::NoSuchNode {
            message: message.into(),
        }
    }

    /// Shorthand for a [`XmlError::InvalidState`] with the given message.
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse {
                source_name,
                message,
                location,
            } => write!(f, "could not parse `{source_name}' at {location}: {message}"),
            Self::NoRootNode => write!(f, "no root node defined for this document"),
            Self::RootAlreadyExists { name } => {
                write!(f, "root node already exists with name `{name}'")
            }
            Self::NoSuchNode { message } => write!(f, "{message}"),
            Self::NotAChild => write!(f, "given node is not a child of this node"),
            Self::AttributeMissing { name } => {
                write!(f, "requested attribute `{name}' does not exist in this node")
            }
            Self::AttributeMalformed { message } => write!(f, "{message}"),
            Self::InvalidState { message } => write!(f, "{message}"),
            Self::CyclicRelocation => {
                write!(f, "cannot move a node into its own subtree without copying")
            }
            Self::Query { message } => write!(f, "could not compile query: {message}"),
            Self::Io { path, message } => write!(f, "`{path}': {message}"),
        }
    }
}

impl std::error::Error for XmlError {}
