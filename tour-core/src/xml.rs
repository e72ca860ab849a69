//! Minimal XML writer and element tree used by every tour document type

use crate::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::str::FromStr;

const INDENT: &str = "  ";

struct OpenElement {
    name: String,
    has_children: bool,
    has_text: bool,
}

/// Streaming XML serializer with a push/pop element stack.
///
/// Attributes may only be written while the start tag of the innermost
/// element is still open, i.e. before any child element or text.
#[derive(Default)]
pub struct XmlWriter {
    out: String,
    stack: Vec<OpenElement>,
    tag_open: bool,
}

impl XmlWriter {
    /// Creates an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the `<?xml ...?>` declaration
    pub fn write_processing_instruction(&mut self) {
        self.out
            .push_str("<?xml version='1.0' encoding='UTF-8'?>\n");
    }

    /// Opens a new element nested in the current one
    pub fn write_start_element(&mut self, name: &str) {
        self.close_start_tag();
        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
        }
        self.push_indent();
        self.out.push('<');
        self.out.push_str(name);
        self.stack.push(OpenElement {
            name: name.to_string(),
            has_children: false,
            has_text: false,
        });
        self.tag_open = true;
    }

    /// Adds an attribute to the element whose start tag is open
    pub fn write_attribute_string(&mut self, name: &str, value: &str) {
        if !self.tag_open {
            log::warn!("attribute {} written outside of a start tag, ignored", name);
            return;
        }
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape(value));
        self.out.push('"');
    }

    /// Convenience for `Display` values
    pub fn write_attribute<T: std::fmt::Display>(&mut self, name: &str, value: T) {
        self.write_attribute_string(name, &value.to_string());
    }

    /// Writes a boolean the way the desktop client does ("True"/"False")
    pub fn write_attribute_bool(&mut self, name: &str, value: bool) {
        self.write_attribute_string(name, if value { "True" } else { "False" });
    }

    /// Writes escaped text content into the current element
    pub fn write_string(&mut self, text: &str) {
        if self.tag_open {
            self.out.push('>');
            self.tag_open = false;
        }
        if let Some(current) = self.stack.last_mut() {
            current.has_text = true;
        }
        self.out.push_str(&escape(text));
    }

    /// Writes `<name>text</name>`
    pub fn write_element_string(&mut self, name: &str, text: &str) {
        self.write_start_element(name);
        self.write_string(text);
        self.write_end_element();
    }

    /// Closes the innermost element
    pub fn write_end_element(&mut self) {
        let Some(element) = self.stack.pop() else {
            log::warn!("unbalanced write_end_element ignored");
            return;
        };
        if self.tag_open {
            self.out.push_str("/>\n");
            self.tag_open = false;
            return;
        }
        if element.has_children {
            self.push_indent();
        }
        self.out.push_str("</");
        self.out.push_str(&element.name);
        self.out.push_str(">\n");
    }

    /// Closes every open element and returns the document text
    pub fn into_string(mut self) -> String {
        while !self.stack.is_empty() {
            self.write_end_element();
        }
        self.out
    }

    /// The text written so far
    pub fn body(&self) -> &str {
        &self.out
    }

    fn close_start_tag(&mut self) {
        if self.tag_open {
            self.out.push_str(">\n");
            self.tag_open = false;
        } else if let Some(current) = self.stack.last() {
            // text was written inline, children go on a fresh line
            if current.has_text && !current.has_children {
                self.out.push('\n');
            }
        }
    }

    fn push_indent(&mut self) {
        for _ in 0..self.stack.len() {
            self.out.push_str(INDENT);
        }
    }
}

/// A parsed XML element with its attributes, children and text content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Parses a document and returns its root element
    pub fn parse(content: &str) -> Result<Self> {
        let content = content.trim_start_matches('\u{feff}');
        let mut reader = Reader::from_str(content);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Self::from_start(&e)?),
                Event::Empty(e) => {
                    let element = Self::from_start(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| Error::MalformedXml("unexpected end tag".into()))?;
                    // indentation between child elements is not content
                    if !element.children.is_empty() && element.text.trim().is_empty() {
                        element.text.clear();
                    }
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::MalformedXml(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or(Error::MissingElement("root"))
    }

    /// Parses raw bytes, replacing invalid UTF-8 sequences
    pub fn parse_bytes(content: &[u8]) -> Result<Self> {
        Self::parse(&String::from_utf8_lossy(content))
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Raw attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, or an error naming the element
    pub fn require_attr(&self, name: &'static str) -> Result<&str> {
        self.attr(name).ok_or_else(|| Error::MissingAttribute {
            element: self.name.clone(),
            attribute: name,
        })
    }

    /// Attribute parsed as `T`, falling back to `default` when absent or unparseable
    pub fn attr_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.attr(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Attribute parsed as `T`; absent is `Ok(None)`, unparseable is an error
    pub fn parse_attr<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.attr(name) {
            None => Ok(None),
            Some(v) => v.trim().parse().map(Some).map_err(|_| Error::InvalidValue {
                attribute: name.to_string(),
                value: v.to_string(),
            }),
        }
    }

    /// Boolean attribute, case-insensitive, with a default
    pub fn attr_bool(&self, name: &str, default: bool) -> bool {
        self.attr(name).and_then(parse_bool).unwrap_or(default)
    }

    /// String attribute with a default
    pub fn attr_string(&self, name: &str, default: &str) -> String {
        self.attr(name).unwrap_or(default).to_string()
    }

    /// Writes this element and its subtree unchanged
    pub fn write_to(&self, w: &mut XmlWriter) {
        w.write_start_element(&self.name);
        for (k, v) in &self.attributes {
            w.write_attribute_string(k, v);
        }
        if !self.text.is_empty() {
            w.write_string(&self.text);
        }
        for child in &self.children {
            child.write_to(w);
        }
        w.write_end_element();
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

/// Parses "True"/"False" in any case, plus "1"/"0"
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
