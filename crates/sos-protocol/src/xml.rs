//! Namespace-aware XML element tree.
//!
//! Request documents are small, so decoders work on a fully built tree
//! instead of streaming events. Every element records its resolved
//! namespace URI, which is what decoder lookup keys on.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use sos_common::{CodedException, Fault, FaultHint};

/// An XML element with its attributes, children and concatenated text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `sos:GetObservation`.
    pub qname: String,
    pub local_name: String,
    /// Resolved namespace URI.
    pub namespace: Option<String>,
    /// Attributes as written (qualified name, unescaped value).
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

fn bad_request(message: impl Into<String>) -> Fault {
    CodedException::no_applicable_code(message)
        .with_hint(FaultHint::BadRequest)
        .into()
}

fn local_part(qname: &str) -> &str {
    qname.rsplit_once(':').map(|(_, local)| local).unwrap_or(qname)
}

fn prefix_part(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(prefix, _)| prefix)
}

impl XmlElement {
    /// Parse a document into its root element.
    pub fn parse(input: &str) -> Result<XmlElement, Fault> {
        let mut reader = NsReader::from_str(input);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = match resolved {
                ResolveResult::Bound(Namespace(ns)) => {
                    Some(String::from_utf8_lossy(ns).into_owned())
                }
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(prefix) => {
                    return Err(bad_request(format!(
                        "Unknown namespace prefix '{}'",
                        String::from_utf8_lossy(&prefix)
                    )));
                }
            };

            match event {
                Event::Start(start) => {
                    stack.push(Self::from_start(&start, namespace)?);
                }
                Event::Empty(start) => {
                    let element = Self::from_start(&start, namespace)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| bad_request("Unexpected closing tag"))?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(bad_request("Unexpected end of document"));
        }
        root.ok_or_else(|| bad_request("Document has no root element"))
    }

    fn from_start(start: &BytesStart<'_>, namespace: Option<String>) -> Result<XmlElement, Fault> {
        let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(XmlElement {
            qname,
            local_name,
            namespace,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn attach(
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<(), Fault> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => return Err(bad_request("Document has more than one root element")),
        }
        Ok(())
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Attribute value by local name, ignoring any prefix.
    pub fn attr(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| !k.starts_with("xmlns") && local_part(k) == local_name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name == local_name)
    }

    pub fn children_named<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.local_name == local_name)
    }

    pub fn first_child(&self) -> Option<&XmlElement> {
        self.children.first()
    }

    /// Depth-first search for the first descendant with the local name.
    pub fn descendant(&self, local_name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.local_name == local_name {
                return Some(child);
            }
            if let Some(found) = child.descendant(local_name) {
                return Some(found);
            }
        }
        None
    }

    /// Trimmed text content, `None` when empty.
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Text of a child element.
    pub fn child_text(&self, local_name: &str) -> Option<&str> {
        self.child(local_name).and_then(|c| c.text())
    }

    /// Texts of all children with the local name, skipping empty ones.
    pub fn child_texts(&self, local_name: &str) -> Vec<String> {
        self.children_named(local_name)
            .filter_map(|c| c.text())
            .map(str::to_string)
            .collect()
    }

    /// Text content, or the `xlink:href` reference for by-reference values.
    pub fn text_or_href(&self) -> Option<&str> {
        self.text().or_else(|| self.attr("href"))
    }

    /// Serialize this element as a standalone fragment.
    ///
    /// Namespace declarations inherited from ancestors are not kept, except
    /// for the element's own prefix.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out, true);
        out
    }

    fn write_xml(&self, out: &mut String, standalone: bool) {
        out.push('<');
        out.push_str(&self.qname);

        if standalone {
            if let Some(ns) = &self.namespace {
                let decl = match prefix_part(&self.qname) {
                    Some(prefix) => format!("xmlns:{}", prefix),
                    None => "xmlns".to_string(),
                };
                if !self.attributes.iter().any(|(k, _)| *k == decl) {
                    out.push_str(&format!(" {}=\"{}\"", decl, quick_xml::escape::escape(ns)));
                }
            }
        }

        for (key, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", key, quick_xml::escape::escape(value)));
        }

        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        out.push_str(&quick_xml::escape::escape(&self.text));
        for child in &self.children {
            child.write_xml(out, false);
        }
        out.push_str("</");
        out.push_str(&self.qname);
        out.push('>');
    }
}
