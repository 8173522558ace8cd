//! Minimal element tree over `quick-xml` events.
//!
//! Feeds are small, and both dialects are queried by tag name in a handful of
//! places, so the parser builds a tree once and the extractors walk it. Names
//! are kept qualified (`content:encoded`); namespaces are not resolved.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted before the document is rejected.
/// Keeps tree walks bounded for hostile input.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },
    #[error("closing tag </{0}> does not match any open element")]
    UnexpectedEnd(String),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("content after the root element")]
    TrailingContent,
    #[error("nesting depth exceeds maximum of {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child element named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == name)
    }

    /// This element followed by all of its descendants, in document order.
    pub fn self_and_descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(el) = stack.pop() {
            out.push(el);
            let children: Vec<&Element> = el.child_elements().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// First descendant (not self) named `name`, in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.self_and_descendants()
            .into_iter()
            .skip(1)
            .find(|e| e.name == name)
    }

    /// All elements named `name` in this subtree, self included.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        self.self_and_descendants()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    /// Concatenated text and CDATA of every descendant.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&Node> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => stack.extend(e.children.iter().rev()),
            }
        }
        out
    }
}

/// Parses a whole document and returns its root element.
///
/// Rejects anything that is not well-formed: syntax errors, mismatched or
/// unclosed tags, unknown entities, a missing root, or a second root.
pub fn parse_document(raw: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| syntax(&reader, e))?;
        match event {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(XmlError::TrailingContent);
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::TooDeep(MAX_DEPTH));
                }
                stack.push(start_element(&reader, &e)?);
            }
            Event::Empty(e) => {
                if root.is_some() {
                    return Err(XmlError::TrailingContent);
                }
                let el = start_element(&reader, &e)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(e) => {
                let name = decode_name(&reader, e.name().as_ref())?;
                match stack.pop() {
                    Some(el) if el.name == name => attach(&mut stack, &mut root, el),
                    _ => return Err(XmlError::UnexpectedEnd(name)),
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| syntax(&reader, e))?;
                push_text(&mut stack, text.into_owned())?;
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                push_text(&mut stack, text)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}

fn syntax(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> XmlError {
    XmlError::Syntax {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

fn decode_name(reader: &Reader<&[u8]>, bytes: &[u8]) -> Result<String, XmlError> {
    reader
        .decoder()
        .decode(bytes)
        .map(|name| name.into_owned())
        .map_err(|e| syntax(reader, e))
}

fn start_element(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = decode_name(reader, e.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| syntax(reader, err))?;
        let key = decode_name(reader, attr.key.as_ref())?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| syntax(reader, err))?;
        attributes.push((key, value.into_owned()));
    }
    Ok(Element::new(name, attributes))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None => *root = Some(el),
    }
}

fn push_text(stack: &mut [Element], text: String) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Text(text));
            Ok(())
        }
        // Whitespace around the root is fine, anything else is not
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::TrailingContent),
    }
}
