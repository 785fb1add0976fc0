//! Minimal XML element tree
//!
//! Components serialize themselves into an [`XmlElement`] and restore from
//! one. Parsing and writing go through `quick-xml`.

use crate::error::{Result, SurfaceError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

/// XML element with ordered attributes, child elements and text content
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Set (or replace) an attribute
    pub fn set_attribute(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Builder form of [`set_attribute`](Self::set_attribute)
    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn int_attribute(&self, key: &str) -> Option<i64> {
        self.attribute(key)?.trim().parse().ok()
    }

    pub fn double_attribute(&self, key: &str) -> Option<f64> {
        self.attribute(key)?.trim().parse().ok()
    }

    pub fn bool_attribute(&self, key: &str) -> Option<bool> {
        match self.attribute(key)?.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn add_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.add_child(child);
        self
    }

    /// First child with the given tag
    pub fn child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Parse a document and return its root element
    pub fn parse(document: &str) -> Result<Self> {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        Self::attach(&mut stack, &mut root, element);
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = stack.pop() {
            return Err(SurfaceError::UnclosedElement(unclosed.tag));
        }

        root.ok_or(SurfaceError::EmptyDocument)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            // Only the first top-level element counts as the root
            None if root.is_none() => *root = Some(element),
            None => {}
        }
    }

    /// Serialize as a complete, indented document
    pub fn to_document(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_into(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    fn write_into<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.tag.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.tag.as_str())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let doc = r#"<?xml version="1.0"?>
            <Root version="2">
              <Child name="a &amp; b"/>
              <Child name="c">text</Child>
            </Root>"#;

        let root = XmlElement::parse(doc).unwrap();
        assert_eq!(root.tag(), "Root");
        assert_eq!(root.int_attribute("version"), Some(2));

        let children: Vec<_> = root.children_named("Child").collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].attribute("name"), Some("a & b"));
        assert_eq!(children[1].text(), "text");
    }

    #[test]
    fn test_write_then_parse() {
        let element = XmlElement::new("Root")
            .with_attribute("ratio", 0.25)
            .with_attribute("flag", true)
            .with_child(XmlElement::new("Leaf").with_attribute("quote", "\"<>\""));

        let doc = element.to_document().unwrap();
        let parsed = XmlElement::parse(&doc).unwrap();

        assert_eq!(parsed, element);
        assert_eq!(parsed.double_attribute("ratio"), Some(0.25));
        assert_eq!(parsed.bool_attribute("flag"), Some(true));
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut element = XmlElement::new("E");
        element.set_attribute("k", 1);
        element.set_attribute("k", 2);
        assert_eq!(element.attributes().count(), 1);
        assert_eq!(element.int_attribute("k"), Some(2));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(XmlElement::parse("").is_err());
        assert!(XmlElement::parse("<Root><Child></Root>").is_err());
        assert!(XmlElement::parse("<Root>").is_err());
    }

    #[test]
    fn test_typed_accessors_reject_garbage() {
        let element = XmlElement::new("E")
            .with_attribute("n", "abc")
            .with_attribute("b", "maybe");
        assert_eq!(element.int_attribute("n"), None);
        assert_eq!(element.bool_attribute("b"), None);
        assert_eq!(element.double_attribute("missing"), None);
    }
}
