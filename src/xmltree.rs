//! A minimal generic XML tree, used as an intermediate representation
//! between raw `quick-xml` events and the XTCE-specific interpretation in
//! `definition.rs`. Namespace prefixes are stripped: elements and
//! attributes are matched on local name only, since this crate does not
//! validate documents against the XTCE schema.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::DefinitionError;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.tag == tag)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |e| e.tag == tag)
    }
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.rfind(':') {
        Some(idx) => name[idx + 1..].to_string(),
        None => name.into_owned(),
    }
}

/// Parse an XML document into a single root [`Element`], dropping
/// namespace prefixes and XML comments/processing instructions.
pub fn parse(xml: &str) -> Result<Element, DefinitionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| DefinitionError::Xml(e.to_string()))? {
            Event::Start(tag) => {
                let element = Element {
                    tag: local_name(tag.name().as_ref()),
                    attrs: tag
                        .attributes()
                        .filter_map(|a| a.ok())
                        .map(|a| {
                            let key = local_name(a.key.as_ref());
                            let value = a.unescape_value().unwrap_or_default().into_owned();
                            (key, value)
                        })
                        .collect(),
                    children: Vec::new(),
                    text: String::new(),
                };
                stack.push(element);
            }
            Event::Empty(tag) => {
                let element = Element {
                    tag: local_name(tag.name().as_ref()),
                    attrs: tag
                        .attributes()
                        .filter_map(|a| a.ok())
                        .map(|a| {
                            let key = local_name(a.key.as_ref());
                            let value = a.unescape_value().unwrap_or_default().into_owned();
                            (key, value)
                        })
                        .collect(),
                    children: Vec::new(),
                    text: String::new(),
                };
                push_finished(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().unwrap_or_default());
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    DefinitionError::Xml("unbalanced closing tag".to_string())
                })?;
                push_finished(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| DefinitionError::Xml("document has no root element".to_string()))
}

fn push_finished(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else {
        *root = Some(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let xml = r#"<Root attr="1"><Child name="a"/><Child name="b">text</Child></Root>"#;
        let root = parse(xml).unwrap();
        assert_eq!(root.tag, "Root");
        assert_eq!(root.attr("attr"), Some("1"));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].text, "text");
    }

    #[test]
    fn strips_namespace_prefixes() {
        let xml = r#"<xtce:SpaceSystem xmlns:xtce="urn:x"><xtce:Header/></xtce:SpaceSystem>"#;
        let root = parse(xml).unwrap();
        assert_eq!(root.tag, "SpaceSystem");
        assert_eq!(root.children[0].tag, "Header");
    }
}
