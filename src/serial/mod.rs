//! XML serializer.
//!
//! Serializes a [`Tree`] — or a single subtree — into well-formed markup
//! text. Whole-document serialization emits the XML declaration and a
//! trailing newline; subtree dumps emit the markup only.

use crate::tree::{NodeId, NodeKind, Tree};

/// Options controlling serialization output.
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Whether to produce indented (pretty-printed) output.
    /// Defaults to `false`.
    pub indent: bool,
    /// The indentation string used for each level when `indent` is `true`.
    /// Defaults to two spaces.
    pub indent_str: String,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output. Mixed-content elements (text
    /// and element children side by side) are never indented, so character
    /// data survives pretty-printing unchanged.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }
}

/// Serializes a whole tree to an XML string, including the XML declaration
/// and a trailing newline.
#[must_use]
pub fn serialize(tree: &Tree, options: &SerializeOptions) -> String {
    let mut output = String::new();

    let version = tree.version.as_deref().unwrap_or("1.0");
    output.push_str("<?xml version=\"");
    output.push_str(version);
    output.push('"');
    if let Some(encoding) = &tree.encoding {
        output.push_str(" encoding=\"");
        output.push_str(encoding);
        output.push('"');
    }
    if let Some(standalone) = tree.standalone {
        output.push_str(" standalone=\"");
        output.push_str(if standalone { "yes" } else { "no" });
        output.push('"');
    }
    output.push_str("?>\n");

    let children: Vec<NodeId> = tree.children(tree.root()).collect();
    for (i, child) in children.iter().enumerate() {
        serialize_node(tree, *child, &mut output, options, 0, options.indent);
        // Separate document-level nodes (comments, PIs, the root element)
        // when pretty-printing.
        if options.indent && i + 1 < children.len() {
            output.push('\n');
        }
    }

    output.push('\n');
    output
}

/// Serializes the subtree rooted at `id` to markup text, without the XML
/// declaration or trailing newline.
#[must_use]
pub fn serialize_subtree(tree: &Tree, id: NodeId, options: &SerializeOptions) -> String {
    let mut output = String::new();
    serialize_node(tree, id, &mut output, options, 0, false);
    output
}

/// Returns `true` if the element contains only other elements (and optional
/// whitespace text), meaning it is safe to add indentation.
fn is_element_only(tree: &Tree, id: NodeId) -> bool {
    let mut has_element_child = false;
    for child in tree.children(id) {
        match &tree.node(child).kind {
            NodeKind::Element { .. } => has_element_child = true,
            NodeKind::Text { content } => {
                if !content.trim().is_empty() {
                    return false;
                }
            }
            NodeKind::CData { .. } => return false,
            _ => {}
        }
    }
    has_element_child
}

fn serialize_node(
    tree: &Tree,
    id: NodeId,
    out: &mut String,
    options: &SerializeOptions,
    depth: usize,
    parent_is_element_only: bool,
) {
    let indent = options.indent;
    match &tree.node(id).kind {
        NodeKind::Element { name, attributes } => {
            if indent && parent_is_element_only && depth > 0 {
                out.push('\n');
                for _ in 0..depth {
                    out.push_str(&options.indent_str);
                }
            }
            out.push('<');
            out.push_str(name);
            for attr in attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                write_escaped(out, &attr.value, true);
                out.push('"');
            }

            if tree.first_child(id).is_none() {
                out.push_str("/>");
                return;
            }
            out.push('>');

            let element_only = is_element_only(tree, id);
            for child in tree.children(id) {
                // Whitespace-only text between elements is dropped when
                // indenting, so re-parsing formatted output stays stable.
                if indent && element_only {
                    if let NodeKind::Text { .. } = &tree.node(child).kind {
                        continue;
                    }
                }
                serialize_node(tree, child, out, options, depth + 1, element_only);
            }

            if indent && element_only {
                out.push('\n');
                for _ in 0..depth {
                    out.push_str(&options.indent_str);
                }
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        NodeKind::Text { content } => {
            write_escaped(out, content, false);
        }
        NodeKind::CData { content } => {
            out.push_str("<![CDATA[");
            out.push_str(content);
            out.push_str("]]>");
        }
        NodeKind::Comment { content } => {
            if indent && parent_is_element_only && depth > 0 {
                out.push('\n');
                for _ in 0..depth {
                    out.push_str(&options.indent_str);
                }
            }
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            if indent && parent_is_element_only && depth > 0 {
                out.push('\n');
                for _ in 0..depth {
                    out.push_str(&options.indent_str);
                }
            }
            out.push_str("<?");
            out.push_str(target);
            if let Some(data) = data {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
        NodeKind::Document | NodeKind::Freed => {}
    }
}

/// Escapes markup-significant characters. In attribute values the double
/// quote is escaped too (values are always serialized with `"` delimiters).
fn write_escaped(out: &mut String, text: &str, in_attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '\n' if in_attribute => out.push_str("&#10;"),
            '\t' if in_attribute => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    fn roundtrip(input: &str) -> String {
        let tree = parse_str(input).unwrap();
        let root = tree.root_element().unwrap();
        serialize_subtree(&tree, root, &SerializeOptions::default())
    }

    #[test]
    fn test_empty_element_self_closes() {
        assert_eq!(roundtrip("<root></root>"), "<root/>");
    }

    #[test]
    fn test_attributes_and_text() {
        let tree = parse_str(r#"<test prop="123">body</test>"#).unwrap();
        let root = tree.root_element().unwrap();
        assert_eq!(
            serialize_subtree(&tree, root, &SerializeOptions::default()),
            r#"<test prop="123">body</test>"#
        );
    }

    #[test]
    fn test_escaping_in_text_and_attributes() {
        let tree = parse_str("<r a=\"&lt;&quot;&amp;\">x &lt; y &amp; z</r>").unwrap();
        let root = tree.root_element().unwrap();
        assert_eq!(
            serialize_subtree(&tree, root, &SerializeOptions::default()),
            "<r a=\"&lt;&quot;&amp;\">x &lt; y &amp; z</r>"
        );
    }

    #[test]
    fn test_document_serialization_has_declaration() {
        let tree = parse_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>").unwrap();
        let text = serialize(&tree, &SerializeOptions::default());
        assert_eq!(text, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r/>\n");
    }

    #[test]
    fn test_declaration_defaults_to_version_1_0() {
        let tree = parse_str("<r/>").unwrap();
        let text = serialize(&tree, &SerializeOptions::default());
        assert_eq!(text, "<?xml version=\"1.0\"?>\n<r/>\n");
    }

    #[test]
    fn test_indented_output() {
        let tree = parse_str("<a><b><c/></b><d/></a>").unwrap();
        let root = tree.root_element().unwrap();
        let text = serialize_subtree(&tree, root, &SerializeOptions::default().indent(true));
        assert_eq!(text, "<a>\n  <b>\n    <c/>\n  </b>\n  <d/>\n</a>");
    }

    #[test]
    fn test_mixed_content_not_indented() {
        let tree = parse_str("<p>one <b>two</b> three</p>").unwrap();
        let root = tree.root_element().unwrap();
        let text = serialize_subtree(&tree, root, &SerializeOptions::default().indent(true));
        assert_eq!(text, "<p>one <b>two</b> three</p>");
    }

    #[test]
    fn test_indent_roundtrip_is_stable() {
        let options = SerializeOptions::default().indent(true);
        let tree = parse_str("<a><b><c/></b><d/></a>").unwrap();
        let first = serialize(&tree, &options);
        let reparsed = parse_str(&first).unwrap();
        let second = serialize(&reparsed, &options);
        assert_eq!(first, second);
    }

    #[test]
    fn test_comment_and_pi_serialized() {
        let tree = parse_str("<r><!-- note --><?t d?></r>").unwrap();
        let root = tree.root_element().unwrap();
        assert_eq!(
            serialize_subtree(&tree, root, &SerializeOptions::default()),
            "<r><!-- note --><?t d?></r>"
        );
    }

    #[test]
    fn test_cdata_serialized_verbatim() {
        let tree = parse_str("<r><![CDATA[a < b]]></r>").unwrap();
        let root = tree.root_element().unwrap();
        assert_eq!(
            serialize_subtree(&tree, root, &SerializeOptions::default()),
            "<r><![CDATA[a < b]]></r>"
        );
    }
}
