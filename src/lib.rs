//! # arbordom
//!
//! A typed XML document object model over arena-backed tree storage.
//! Documents own their node tree exclusively; nodes are addressed through
//! copyable [`NodeHandle`] identifiers rather than references, which keeps
//! navigation, mutation, and cross-document relocation safe without
//! reference counting.
//!
//! ## Quick Start
//!
//! ```
//! use arbordom::Document;
//!
//! let mut doc = Document::new();
//! let root = doc.add_root_node("robot").unwrap();
//! doc.set_attribute(root, "wheels", &4).unwrap();
//! let arm = doc.add_child_node(root, "arm", "").unwrap();
//! doc.set_attribute(arm, "reach", &0.8).unwrap();
//!
//! assert_eq!(doc.attribute::<u32>(root, "wheels").unwrap(), 4);
//! assert_eq!(
//!     doc.dump_node(root, false),
//!     r#"<robot wheels="4"><arm reach="0.8"/></robot>"#
//! );
//! ```
//!
//! Parsing and path queries:
//!
//! ```
//! use arbordom::Document;
//!
//! let doc = Document::from_buffer(b"<fleet><bot id=\"r2\"/></fleet>").unwrap();
//! let bot = doc.find_node("/fleet/bot").unwrap();
//! assert_eq!(doc.attribute::<String>(bot, "id").unwrap(), "r2");
//! ```

pub mod dom;
pub mod encoding;
pub mod error;
pub mod parser;
pub mod serial;
pub mod tree;
pub mod xpath;

// Re-export the primary types at the crate root for convenience.
pub use dom::{Document, FromAttributeValue, NodeHandle, ToAttributeValue};
pub use error::{Result, XmlError};
pub use parser::ParseOptions;
pub use serial::SerializeOptions;
