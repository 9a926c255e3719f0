//! Small XML helpers over `quick-xml`.
//!
//! The service speaks XML with stable element names but a large, mostly
//! opaque schema. Requests are built with [`XmlWriter`]; responses are read
//! with lookup functions that match elements by local name (namespace
//! prefixes such as `wc:` are ignored).
//!
//! Signatures are computed over serialized fragments, so the writer never
//! inserts whitespace or declarations on its own.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;

use crate::error::{CoreError, Result};

fn xml_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::xml(e.to_string())
}

/// Builder for compact XML fragments.
///
/// Writing into memory cannot fail on I/O, so builder calls are chainable and
/// the first encoding error (if any) is reported by [`XmlWriter::finish`].
pub struct XmlWriter {
    writer: Writer<Vec<u8>>,
    error: Option<CoreError>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
            error: None,
        }
    }

    fn write(&mut self, event: Event<'_>) -> &mut Self {
        if self.error.is_none()
            && let Err(e) = self.writer.write_event(event)
        {
            self.error = Some(xml_err(e));
        }
        self
    }

    pub fn start(&mut self, name: &str) -> &mut Self {
        self.write(Event::Start(BytesStart::new(name)))
    }

    pub fn start_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.write(Event::Start(start))
    }

    pub fn end(&mut self, name: &str) -> &mut Self {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// `<name/>`
    pub fn empty(&mut self, name: &str) -> &mut Self {
        self.write(Event::Empty(BytesStart::new(name)))
    }

    /// Escaped character data.
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.write(Event::Text(BytesText::new(text)))
    }

    /// Pre-serialized XML, written verbatim.
    pub fn raw(&mut self, xml: &str) -> &mut Self {
        self.write(Event::Text(BytesText::from_escaped(xml)))
    }

    /// `<name>text</name>`
    pub fn element(&mut self, name: &str, text: &str) -> &mut Self {
        self.start(name).text(text).end(name)
    }

    /// `<name a="b">text</name>`
    pub fn element_with(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> &mut Self {
        self.start_with(name, attrs).text(text).end(name)
    }

    pub fn finish(self) -> Result<String> {
        if let Some(e) = self.error {
            return Err(e);
        }
        String::from_utf8(self.writer.into_inner()).map_err(xml_err)
    }
}

/// An element found in a document: its attributes and raw inner XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub inner_xml: String,
}

impl XmlElement {
    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Unescaped text of a leaf element.
    pub fn text(&self) -> Result<String> {
        unescape(&self.inner_xml)
            .map(Cow::into_owned)
            .map_err(xml_err)
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn ends_with(stack: &[String], path: &[&str]) -> bool {
    !path.is_empty()
        && stack.len() >= path.len()
        && stack[stack.len() - path.len()..]
            .iter()
            .zip(path)
            .all(|(a, b)| a == b)
}

/// Walks `xml` and collects every element whose trailing name path matches
/// `path` (e.g. `"status/code"` or just `"thing"`). With `anchored`, the path
/// must start at the top level of `xml`. Matched elements are not searched
/// for nested matches.
fn collect(xml: &str, path: &str, anchored: bool, first_only: bool) -> Result<Vec<XmlElement>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut found = Vec::new();
    let matches = |stack: &[String]| {
        ends_with(stack, &segments) && (!anchored || stack.len() == segments.len())
    };

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                stack.push(local_name(&e));
                if matches(stack.as_slice()) {
                    let qname = e.name().as_ref().to_vec();
                    let inner = reader.read_text(QName(&qname)).map_err(xml_err)?;
                    found.push(XmlElement {
                        name: local_name(&e),
                        attributes: attributes(&e)?,
                        inner_xml: inner.into_owned(),
                    });
                    stack.pop();
                    if first_only {
                        break;
                    }
                }
            }
            Event::Empty(e) => {
                stack.push(local_name(&e));
                if matches(stack.as_slice()) {
                    found.push(XmlElement {
                        name: local_name(&e),
                        attributes: attributes(&e)?,
                        inner_xml: String::new(),
                    });
                    if first_only {
                        break;
                    }
                }
                stack.pop();
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

/// Fail unless `xml` is a document with exactly one root element, balanced
/// tags, no character data outside the root and only predefined or numeric
/// entity references.
pub fn check_well_formed(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut roots = 0usize;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(_) | Event::Empty(_) if depth == 0 && roots > 0 => {
                return Err(CoreError::xml("more than one root element"));
            }
            Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::Empty(_) if depth == 0 => roots += 1,
            Event::End(_) if depth == 0 => {
                return Err(CoreError::xml("end tag without start tag"));
            }
            Event::End(_) => depth -= 1,
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_err)?;
                if depth == 0 && !text.trim().is_empty() {
                    return Err(CoreError::xml("text outside the root element"));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(CoreError::xml("text outside the root element"));
            }
            Event::Eof if depth > 0 => {
                return Err(CoreError::xml("unexpected end of document"));
            }
            Event::Eof if roots == 0 => return Err(CoreError::xml("no root element")),
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

/// All elements matching `path`.
pub fn find_elements(xml: &str, path: &str) -> Result<Vec<XmlElement>> {
    collect(xml, path, false, false)
}

/// First element matching `path`.
pub fn find_element(xml: &str, path: &str) -> Result<Option<XmlElement>> {
    Ok(collect(xml, path, false, true)?.into_iter().next())
}

/// First top-level element of `xml` named `name`. Used on an element's inner
/// XML to read its direct children without looking into nested content.
pub fn find_child(xml: &str, name: &str) -> Result<Option<XmlElement>> {
    Ok(collect(xml, name, true, true)?.into_iter().next())
}

/// Unescaped text of the first element matching `path`.
pub fn find_text(xml: &str, path: &str) -> Result<Option<String>> {
    find_element(xml, path)?.map(|e| e.text()).transpose()
}

/// Raw inner XML of the first element matching `path`.
pub fn find_inner_xml(xml: &str, path: &str) -> Result<Option<String>> {
    Ok(find_element(xml, path)?.map(|e| e.inner_xml))
}

/// Raw inner XML of every element matching `path`.
pub fn find_all_inner_xml(xml: &str, path: &str) -> Result<Vec<String>> {
    Ok(find_elements(xml, path)?
        .into_iter()
        .map(|e| e.inner_xml)
        .collect())
}

/// Attribute of the first element matching `path`.
pub fn find_attribute(xml: &str, path: &str, attr: &str) -> Result<Option<String>> {
    Ok(find_element(xml, path)?.and_then(|e| e.attr(attr).map(str::to_string)))
}
