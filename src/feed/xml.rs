// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small owned XML tree with namespace-insensitive lookups.
//!
//! Feed providers mix prefixes freely (`atom:link`, `itunes:title`, default
//! namespaces on `<feed>`), so every lookup here compares element and attribute
//! *local names* only, ignoring case.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Maximum element nesting accepted before parsing is aborted
const MAX_DEPTH: usize = 256;

/// One element of a parsed XML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Local name of the element (prefix stripped)
    pub name: String,
    /// Namespace prefix as written, empty for unprefixed elements
    pub prefix: String,
    /// Attributes as (local name, unescaped value) pairs, in document order
    pub attributes: Vec<(String, String)>,
    /// Concatenated, untrimmed text and CDATA content directly inside this element
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a complete document and return its root element
    pub fn parse(bytes: &[u8]) -> Result<XmlNode, String> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().check_end_names = false;

        // The bottom of the stack is a synthetic document node
        let mut stack: Vec<XmlNode> = vec![XmlNode::default()];
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if stack.len() > MAX_DEPTH {
                        return Err(format!("nesting deeper than {MAX_DEPTH} levels"));
                    }
                    stack.push(element_from(&e));
                }
                Ok(Event::Empty(e)) => {
                    let node = element_from(&e);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
                Ok(Event::End(_)) => {
                    // Stray end tags at document level are ignored
                    if stack.len() > 1
                        && let Some(node) = stack.pop()
                        && let Some(parent) = stack.last_mut()
                    {
                        parent.children.push(node);
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        // Unknown entities such as &nbsp; keep their raw form
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(format!(
                        "{} at position {}",
                        e,
                        reader.error_position()
                    ));
                }
                _ => {}
            }
            buf.clear();
        }

        // Close anything left open by a truncated document
        while stack.len() > 1 {
            if let Some(node) = stack.pop()
                && let Some(parent) = stack.last_mut()
            {
                parent.children.push(node);
            }
        }

        stack
            .pop()
            .and_then(|document| document.children.into_iter().next())
            .ok_or_else(|| "document has no root element".to_string())
    }

    /// Whether this element has the given local name
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// First direct child with the given local name, preferring unprefixed ones
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children
            .iter()
            .find(|c| c.is(name) && c.prefix.is_empty())
            .or_else(|| self.children.iter().find(|c| c.is(name)))
    }

    /// All direct children with the given local name
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.is(name))
    }

    /// Value of the attribute with the given local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text of this element, `None` when blank
    pub fn text(&self) -> Option<&str> {
        Some(self.text.trim()).filter(|t| !t.is_empty())
    }

    /// Trimmed text of the first direct child with the given name that has any.
    ///
    /// `<title>` wins over an earlier `<itunes:title>`; a prefixed element is only
    /// used when no unprefixed one carries text.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        let mut fallback = None;
        for (node, text) in self.children.iter().filter(|c| c.is(name)).filter_map(|c| Some((c, c.text()?))) {
            if node.prefix.is_empty() {
                return Some(text);
            }
            fallback.get_or_insert(text);
        }
        fallback
    }

    /// Follow a path of local names from this node and collect every match.
    ///
    /// The first segment must match this node itself, e.g. `["rss", "channel", "item"]`
    /// called on an `<rss>` root yields all items.
    pub fn select_path<'a>(&'a self, path: &[&str]) -> Vec<&'a XmlNode> {
        let Some((first, rest)) = path.split_first() else {
            return Vec::new();
        };
        if !self.is(first) {
            return Vec::new();
        }

        let mut current = vec![self];
        for segment in rest {
            current = current
                .into_iter()
                .flat_map(|node| node.children.iter().filter(move |c| c.is(segment)))
                .collect();
        }
        current
    }
}

/// Local name of the first element in a document, skipping the prolog,
/// comments and doctype. `None` if there is no element or the start is malformed.
pub fn root_name(bytes: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn element_from(e: &BytesStart<'_>) -> XmlNode {
    let qname = e.name();
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let prefix = qname
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
        .unwrap_or_default();

    let attributes = e
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            (key, value)
        })
        .collect();

    XmlNode {
        name,
        prefix,
        attributes,
        ..Default::default()
    }
}
