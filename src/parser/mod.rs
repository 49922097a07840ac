//! XML reader: options, process-wide setup, and parse entry points.
//!
//! The parser is a hand-rolled recursive descent reader (see [`xml`]) that
//! builds a [`Tree`]. It fails fast: the first well-formedness violation is
//! reported as [`XmlError::Parse`] with a source location, and no partial
//! tree escapes.

mod xml;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::encoding::decode_to_utf8;
use crate::error::{Result, SourceLocation, XmlError};
use crate::tree::Tree;

/// Source name reported for in-memory buffers, matching the convention of
/// parsing from memory with no file behind it.
pub const BUFFER_SOURCE_NAME: &str = "noname.xml";

/// Options controlling how input is read into a tree.
///
/// ```
/// use arbordom::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .encoding("ISO-8859-1")
///     .validate(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Explicit character encoding of the input. When set, it overrides BOM
    /// detection. `None` means autodetect (UTF-8 unless a BOM says
    /// otherwise).
    pub encoding: Option<String>,
    /// Whether to validate the document against its embedded DOCTYPE after
    /// parsing. Fails the parse when no DOCTYPE is present.
    pub validate: bool,
}

impl ParseOptions {
    /// Sets an explicit character encoding for the input.
    #[must_use]
    pub fn encoding(mut self, name: &str) -> Self {
        self.encoding = Some(name.to_string());
        self
    }

    /// Enables or disables DOCTYPE validation.
    #[must_use]
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// Performs the process-wide parser setup.
///
/// Builds the shared predefined-entity table behind a `OnceLock`. The call
/// is idempotent and safe to trigger redundantly — every document
/// construction goes through it. There is no matching teardown: the table
/// lives in a `'static` cell and all per-document state is owned by its
/// `Document`.
pub fn initialize() {
    let _ = predefined_entities();
}

/// The five entities predefined by XML 1.0 §4.6.
pub(crate) fn predefined_entities() -> &'static HashMap<&'static str, char> {
    static ENTITIES: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    ENTITIES.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("amp", '&');
        map.insert("lt", '<');
        map.insert("gt", '>');
        map.insert("apos", '\'');
        map.insert("quot", '"');
        map
    })
}

/// Parses a UTF-8 string into a [`Tree`] with default options. Errors are
/// attributed to [`BUFFER_SOURCE_NAME`].
///
/// # Errors
///
/// Returns [`XmlError::Parse`] if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Tree> {
    parse_str_named(input, BUFFER_SOURCE_NAME, &ParseOptions::default())
}

/// Parses a UTF-8 string into a [`Tree`], attributing errors to
/// `source_name`.
///
/// # Errors
///
/// Returns [`XmlError::Parse`] if the input is not well-formed, or — with
/// `options.validate` — if the root element does not match the DOCTYPE.
pub fn parse_str_named(input: &str, source_name: &str, options: &ParseOptions) -> Result<Tree> {
    initialize();
    let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let tree = xml::XmlParser::new(input, source_name).parse()?;
    if options.validate {
        check_doctype(&tree, source_name)?;
    }
    Ok(tree)
}

/// Decodes raw bytes (honoring `options.encoding` and any BOM) and parses
/// them into a [`Tree`].
///
/// # Errors
///
/// Returns [`XmlError::Parse`] if the bytes cannot be decoded or the XML is
/// not well-formed.
pub fn parse_bytes_named(bytes: &[u8], source_name: &str, options: &ParseOptions) -> Result<Tree> {
    let text = decode_to_utf8(bytes, options.encoding.as_deref()).map_err(|e| XmlError::Parse {
        source_name: source_name.to_string(),
        message: e.message,
        location: SourceLocation::default(),
    })?;
    parse_str_named(&text, source_name, options)
}

/// The structural DOCTYPE check run for `validate = true`: the document must
/// carry a DOCTYPE and the root element name must match it. Content-model
/// validation beyond this is out of scope for the reader.
fn check_doctype(tree: &Tree, source_name: &str) -> Result<()> {
    let Some(doctype) = tree.doctype_name.as_deref() else {
        return Err(XmlError::Parse {
            source_name: source_name.to_string(),
            message: "validity error: no DTD found".to_string(),
            location: SourceLocation::default(),
        });
    };
    let root_name = tree
        .root_element()
        .and_then(|id| tree.element_name(id))
        .unwrap_or("");
    if root_name != doctype {
        return Err(XmlError::Parse {
            source_name: source_name.to_string(),
            message: format!(
                "validity error: root element `{root_name}' does not match DOCTYPE `{doctype}'"
            ),
            location: SourceLocation::default(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        initialize();
        initialize();
        assert_eq!(predefined_entities().get("amp"), Some(&'&'));
        assert_eq!(predefined_entities().len(), 5);
    }

    #[test]
    fn test_parse_str_simple() {
        let tree = parse_str("<root><child/></root>").unwrap();
        let root = tree.root_element().unwrap();
        assert_eq!(tree.element_name(root), Some("root"));
    }

    #[test]
    fn test_parse_error_carries_buffer_source_name() {
        let err = parse_str("<root>").unwrap_err();
        match err {
            XmlError::Parse { source_name, .. } => assert_eq!(source_name, BUFFER_SOURCE_NAME),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_requires_doctype() {
        let options = ParseOptions::default().validate(true);
        let err = parse_str_named("<root/>", "mem", &options).unwrap_err();
        assert!(err.to_string().contains("no DTD found"));
    }

    #[test]
    fn test_validate_accepts_matching_doctype() {
        let options = ParseOptions::default().validate(true);
        let tree = parse_str_named("<!DOCTYPE root><root/>", "mem", &options).unwrap();
        assert_eq!(tree.doctype_name.as_deref(), Some("root"));
    }

    #[test]
    fn test_validate_rejects_mismatched_doctype() {
        let options = ParseOptions::default().validate(true);
        let err = parse_str_named("<!DOCTYPE other><root/>", "mem", &options).unwrap_err();
        assert!(err.to_string().contains("does not match DOCTYPE"));
    }

    #[test]
    fn test_parse_bytes_latin1() {
        let options = ParseOptions::default().encoding("ISO-8859-1");
        let tree = parse_bytes_named(b"<r a=\"caf\xE9\"/>", "mem", &options).unwrap();
        let root = tree.root_element().unwrap();
        assert_eq!(tree.attribute(root, "a"), Some("caf\u{E9}"));
    }
}
