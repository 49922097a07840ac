//! Recursive descent XML reader.
//!
//! Implements a hand-rolled parser for the XML 1.0 document grammar:
//! declaration, DOCTYPE (skimmed), elements, attributes, character data,
//! CDATA sections, comments, processing instructions, and the predefined
//! and character entity references. Namespaces are not interpreted — a
//! qualified name is just a name.

use crate::error::{Result, SourceLocation, XmlError};
use crate::tree::{NodeId, NodeKind, Tree};

use super::predefined_entities;

/// The reader. Consumes a UTF-8 string and builds a [`Tree`].
pub(crate) struct XmlParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    source_name: &'a str,
    tree: Tree,
}

impl<'a> XmlParser<'a> {
    pub(crate) fn new(input: &'a str, source_name: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            source_name,
            tree: Tree::new(),
        }
    }

    /// Parses the entire document.
    pub(crate) fn parse(mut self) -> Result<Tree> {
        // XML declaration must sit at the very start, with no leading
        // whitespace (XML 1.0 §2.8). "<?xml-stylesheet" is an ordinary PI.
        if self.looking_at(b"<?xml")
            && matches!(self.byte_at(5), Some(b' ' | b'\t' | b'\r' | b'\n'))
        {
            self.parse_xml_declaration()?;
        }

        let doc = self.tree.root();
        self.parse_misc(doc)?;

        if self.looking_at(b"<!DOCTYPE") {
            self.parse_doctype()?;
            self.parse_misc(doc)?;
        }

        if self.peek() == Some(b'<') && !matches!(self.byte_at(1), Some(b'!' | b'?')) {
            self.parse_element(doc)?;
        } else {
            return Err(self.fatal("start tag expected, `<' not found"));
        }

        self.parse_misc(doc)?;
        if !self.at_end() {
            return Err(self.fatal("extra content at the end of the document"));
        }

        Ok(self.tree)
    }

    // --- Input primitives ---

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }

    fn fatal(&self, message: impl Into<String>) -> XmlError {
        XmlError::Parse {
            source_name: self.source_name.to_string(),
            message: message.into(),
            location: self.location(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn looking_at(&self, prefix: &[u8]) -> bool {
        self.bytes[self.pos..].starts_with(prefix)
    }

    /// Advances `n` bytes, maintaining the line/column counters. Column
    /// counts characters, so UTF-8 continuation bytes do not advance it.
    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            match self.bytes.get(self.pos) {
                Some(b'\n') => {
                    self.line += 1;
                    self.column = 1;
                }
                Some(b) if b & 0xC0 != 0x80 => self.column += 1,
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: &[u8]) -> Result<()> {
        if self.looking_at(expected) {
            self.advance(expected.len());
            Ok(())
        } else {
            let shown = String::from_utf8_lossy(expected);
            Err(self.fatal(format!("expected `{shown}'")))
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.advance(1);
        }
        self.pos != start
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Parses an XML name (lenient: names are checked structurally, not
    /// against the full production character classes).
    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        match self.current_char() {
            Some(c) if c.is_alphabetic() || c == '_' || c == ':' || !c.is_ascii() => {
                self.advance(c.len_utf8());
            }
            _ => return Err(self.fatal("expected a name")),
        }
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.') || !c.is_ascii() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_quoted(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.fatal("expected a quoted value")),
        };
        self.advance(1);
        let start = self.pos;
        while self.peek() != Some(quote) {
            if self.at_end() {
                return Err(self.fatal("unexpected end of input in quoted value"));
            }
            self.advance(1);
        }
        let value = self.input[start..self.pos].to_string();
        self.advance(1);
        Ok(value)
    }

    // --- Document structure ---

    fn parse_xml_declaration(&mut self) -> Result<()> {
        self.expect(b"<?xml")?;
        self.skip_whitespace();

        self.expect(b"version")?;
        self.skip_whitespace();
        self.expect(b"=")?;
        self.skip_whitespace();
        self.tree.version = Some(self.parse_quoted()?);
        self.skip_whitespace();

        if self.looking_at(b"encoding") {
            self.advance(8);
            self.skip_whitespace();
            self.expect(b"=")?;
            self.skip_whitespace();
            self.tree.encoding = Some(self.parse_quoted()?);
            self.skip_whitespace();
        }

        if self.looking_at(b"standalone") {
            self.advance(10);
            self.skip_whitespace();
            self.expect(b"=")?;
            self.skip_whitespace();
            let value = self.parse_quoted()?;
            self.tree.standalone = match value.as_str() {
                "yes" => Some(true),
                "no" => Some(false),
                other => {
                    return Err(
                        self.fatal(format!("standalone must be `yes' or `no', got `{other}'"))
                    )
                }
            };
            self.skip_whitespace();
        }

        self.expect(b"?>")?;
        Ok(())
    }

    /// Comments, processing instructions, and whitespace outside the
    /// document element. Document-level whitespace is not materialized as
    /// text nodes.
    fn parse_misc(&mut self, parent: NodeId) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.looking_at(b"<?") {
                self.parse_processing_instruction(parent)?;
            } else {
                return Ok(());
            }
        }
    }

    /// Skims the DOCTYPE declaration: the name is kept for validation, the
    /// external ids and internal subset are scanned over without being
    /// interpreted.
    fn parse_doctype(&mut self) -> Result<()> {
        self.expect(b"<!DOCTYPE")?;
        if !self.skip_whitespace() {
            return Err(self.fatal("expected whitespace after `<!DOCTYPE'"));
        }
        let name = self.parse_name()?;
        self.tree.doctype_name = Some(name);
        self.skip_whitespace();

        if self.looking_at(b"SYSTEM") {
            self.advance(6);
            self.skip_whitespace();
            self.parse_quoted()?;
            self.skip_whitespace();
        } else if self.looking_at(b"PUBLIC") {
            self.advance(6);
            self.skip_whitespace();
            self.parse_quoted()?;
            self.skip_whitespace();
            self.parse_quoted()?;
            self.skip_whitespace();
        }

        if self.peek() == Some(b'[') {
            self.advance(1);
            let mut depth = 1u32;
            while depth > 0 {
                match self.peek() {
                    None => return Err(self.fatal("unexpected end of input in internal subset")),
                    Some(b'[') => {
                        depth += 1;
                        self.advance(1);
                    }
                    Some(b']') => {
                        depth -= 1;
                        self.advance(1);
                    }
                    Some(q @ (b'"' | b'\'')) => {
                        // Skip quoted strings so brackets inside entity
                        // values do not confuse the depth tracking.
                        self.advance(1);
                        while self.peek() != Some(q) {
                            if self.at_end() {
                                return Err(
                                    self.fatal("unexpected end of input in internal subset")
                                );
                            }
                            self.advance(1);
                        }
                        self.advance(1);
                    }
                    Some(_) => self.advance(1),
                }
            }
            self.skip_whitespace();
        }

        self.expect(b">")?;
        Ok(())
    }

    // --- Elements ---

    fn parse_element(&mut self, parent: NodeId) -> Result<()> {
        self.expect(b"<")?;
        let name = self.parse_name()?;

        let element = self.tree.create_element(&name);
        self.tree.append_child(parent, element);

        loop {
            let had_space = self.skip_whitespace();
            match self.peek() {
                Some(b'>') | Some(b'/') => break,
                None => {
                    return Err(self.fatal(format!("unexpected end of input in tag `{name}'")))
                }
                _ => {
                    if !had_space {
                        return Err(self.fatal("expected whitespace before attribute"));
                    }
                    self.parse_attribute(element, &name)?;
                }
            }
        }

        if self.looking_at(b"/>") {
            self.advance(2);
            return Ok(());
        }
        self.expect(b">")?;

        self.parse_content(element, &name)?;

        self.expect(b"</")?;
        let end_name = self.parse_name()?;
        if end_name != name {
            return Err(self.fatal(format!(
                "mismatched end tag: expected `</{name}>', found `</{end_name}>'"
            )));
        }
        self.skip_whitespace();
        self.expect(b">")?;
        Ok(())
    }

    fn parse_attribute(&mut self, element: NodeId, element_name: &str) -> Result<()> {
        let name = self.parse_name()?;
        self.skip_whitespace();
        self.expect(b"=")?;
        self.skip_whitespace();
        let value = self.parse_attribute_value()?;

        // Attribute names are unique within one element (XML 1.0 §3.1).
        if self.tree.attribute(element, &name).is_some() {
            return Err(self.fatal(format!(
                "attribute `{name}' redefined in element `{element_name}'"
            )));
        }
        self.tree.set_attribute(element, &name, &value);
        Ok(())
    }

    /// Parses a quoted attribute value, resolving references and applying
    /// attribute-value normalization (whitespace characters become spaces).
    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.fatal("expected a quoted attribute value")),
        };
        self.advance(1);

        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.fatal("unexpected end of input in attribute value")),
                Some(q) if q == quote => {
                    self.advance(1);
                    return Ok(value);
                }
                Some(b'<') => {
                    return Err(self.fatal("unescaped `<' in attribute value"));
                }
                Some(b'&') => value.push(self.parse_reference()?),
                Some(b'\t' | b'\n') => {
                    value.push(' ');
                    self.advance(1);
                }
                Some(b'\r') => {
                    value.push(' ');
                    self.advance(1);
                    if self.peek() == Some(b'\n') {
                        self.advance(1);
                    }
                }
                Some(_) => {
                    let c = self.current_char().unwrap_or('\u{FFFD}');
                    value.push(c);
                    self.advance(c.len_utf8());
                }
            }
        }
    }

    // --- Content ---

    fn parse_content(&mut self, parent: NodeId, name: &str) -> Result<()> {
        loop {
            if self.at_end() {
                return Err(self.fatal(format!("unexpected end of input in element `{name}'")));
            }
            if self.looking_at(b"</") {
                return Ok(());
            }
            if self.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.looking_at(b"<![CDATA[") {
                self.parse_cdata(parent)?;
            } else if self.looking_at(b"<?") {
                self.parse_processing_instruction(parent)?;
            } else if self.peek() == Some(b'<') {
                self.parse_element(parent)?;
            } else {
                self.parse_text(parent)?;
            }
        }
    }

    /// Character data up to the next markup. CRLF and lone CR are
    /// normalized to LF (XML 1.0 §2.11).
    fn parse_text(&mut self, parent: NodeId) -> Result<()> {
        let mut content = String::new();
        loop {
            match self.peek() {
                None | Some(b'<') => break,
                Some(b'&') => content.push(self.parse_reference()?),
                Some(b'\r') => {
                    content.push('\n');
                    self.advance(1);
                    if self.peek() == Some(b'\n') {
                        self.advance(1);
                    }
                }
                Some(b']') if self.looking_at(b"]]>") => {
                    return Err(self.fatal("`]]>' is not allowed in character data"));
                }
                Some(_) => {
                    let c = self.current_char().unwrap_or('\u{FFFD}');
                    content.push(c);
                    self.advance(c.len_utf8());
                }
            }
        }
        let text = self.tree.create_node(NodeKind::Text { content });
        self.tree.append_child(parent, text);
        Ok(())
    }

    /// An entity or character reference, starting at `&`.
    fn parse_reference(&mut self) -> Result<char> {
        self.expect(b"&")?;

        if self.peek() == Some(b'#') {
            self.advance(1);
            let (radix, digits): (u32, String) = if self.peek() == Some(b'x') {
                self.advance(1);
                (16, self.take_while(|b| b.is_ascii_hexdigit()))
            } else {
                (10, self.take_while(|b| b.is_ascii_digit()))
            };
            self.expect(b";")?;
            let code = u32::from_str_radix(&digits, radix)
                .map_err(|_| self.fatal("invalid character reference"))?;
            return char::from_u32(code)
                .filter(|&c| is_xml_char(c))
                .ok_or_else(|| {
                    self.fatal(format!("character reference &#{code}; is not a valid XML character"))
                });
        }

        let name = self.parse_name()?;
        self.expect(b";")?;
        predefined_entities()
            .get(name.as_str())
            .copied()
            .ok_or_else(|| self.fatal(format!("entity `{name}' not defined")))
    }

    fn take_while(&mut self, predicate: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&predicate) {
            self.advance(1);
        }
        self.input[start..self.pos].to_string()
    }

    // --- Comments, CDATA, processing instructions ---

    fn parse_comment(&mut self, parent: NodeId) -> Result<()> {
        self.expect(b"<!--")?;
        let start = self.pos;
        loop {
            if self.at_end() {
                return Err(self.fatal("unexpected end of input in comment"));
            }
            if self.looking_at(b"--") {
                if self.looking_at(b"-->") {
                    break;
                }
                return Err(self.fatal("`--' is not allowed within a comment"));
            }
            self.advance(1);
        }
        let content = self.input[start..self.pos].to_string();
        self.advance(3);

        let comment = self.tree.create_node(NodeKind::Comment { content });
        self.tree.append_child(parent, comment);
        Ok(())
    }

    fn parse_cdata(&mut self, parent: NodeId) -> Result<()> {
        self.expect(b"<![CDATA[")?;
        let start = self.pos;
        while !self.looking_at(b"]]>") {
            if self.at_end() {
                return Err(self.fatal("unexpected end of input in CDATA section"));
            }
            self.advance(1);
        }
        let content = self.input[start..self.pos].to_string();
        self.advance(3);

        let cdata = self.tree.create_node(NodeKind::CData { content });
        self.tree.append_child(parent, cdata);
        Ok(())
    }

    fn parse_processing_instruction(&mut self, parent: NodeId) -> Result<()> {
        self.expect(b"<?")?;
        let target = self.parse_name()?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.fatal("the processing instruction target `xml' is reserved"));
        }

        let data = if self.skip_whitespace() {
            let start = self.pos;
            while !self.looking_at(b"?>") {
                if self.at_end() {
                    return Err(self.fatal("unexpected end of input in processing instruction"));
                }
                self.advance(1);
            }
            let text = self.input[start..self.pos].to_string();
            (!text.is_empty()).then_some(text)
        } else {
            None
        };
        self.expect(b"?>")?;

        let pi = self
            .tree
            .create_node(NodeKind::ProcessingInstruction { target, data });
        self.tree.append_child(parent, pi);
        Ok(())
    }
}

/// Char production of XML 1.0 §2.2.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
