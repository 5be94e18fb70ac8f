//! FILENAME: workbook/src/xml.rs
//! PURPOSE: Minimal owned element tree built from quick-xml events.
//! CONTEXT: Tableau documents are small enough to hold in memory, and the
//! extraction rules are phrased as tree queries ("every column with a
//! calculation child"), so the event stream is folded into `XmlElement`s once.

use crate::error::WorkbookError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One element with its attributes in document order and its direct text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Text and CDATA found directly inside this element, concatenated.
    pub text: String,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        XmlElement {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, or an empty string when absent.
    pub fn attr_or_empty(&self, key: &str) -> String {
        self.attr(key).unwrap_or_default().to_string()
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attr(key).is_some()
    }

    /// "true" (any case) is true, everything else including absence is `default`.
    pub fn attr_flag(&self, key: &str, default: bool) -> bool {
        match self.attr(key) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// First direct child with the given tag.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Every descendant with the given tag in document order, excluding `self`.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        for child in &self.children {
            child.collect_named(name, &mut found);
        }
        found
    }

    /// Like `descendants_named`, but `self` is included when it matches.
    pub fn self_and_descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    /// First descendant with the given tag, excluding `self`.
    pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                child.find_descendant(name)
            }
        })
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        if self.name == name {
            found.push(self);
        }
        for child in &self.children {
            child.collect_named(name, found);
        }
    }
}

fn xml_error(position: usize, err: impl std::fmt::Display) -> WorkbookError {
    WorkbookError::Xml(format!("at byte {}: {}", position, err))
}

fn element_from(start: &BytesStart, position: usize) -> Result<XmlElement, WorkbookError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(position, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(position, e))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Hands a finished element to its parent, or makes it the root.
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    position: usize,
) -> Result<(), WorkbookError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(xml_error(position, "document has more than one root element"));
    }
    *root = Some(element);
    Ok(())
}

/// Parses a complete document and returns its root element.
pub fn parse_document(xml: &str) -> Result<XmlElement, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from(&e, position)?),
            Ok(Event::Empty(e)) => {
                let element = element_from(&e, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_error(position, "closing tag without opening tag"))?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| xml_error(position, e))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None => return Err(xml_error(position, "text outside the root element")),
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions, doctype
            Ok(_) => {}
            Err(e) => return Err(xml_error(position, e)),
        }
    }

    if let Some(open) = stack.last() {
        return Err(WorkbookError::Xml(format!(
            "unexpected end of document: <{}> is not closed",
            open.name
        )));
    }

    root.ok_or_else(|| WorkbookError::Xml("document has no root element".to_string()))
}
