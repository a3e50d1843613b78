//! Just enough XML to read SOAP responses: an owned element tree keyed by
//! local names, plus escaping for the request envelopes we write by hand.

use std::borrow::Cow;

use quick_xml::{Reader, escape::escape, events::Event};

use super::CaError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Self::default()
        }
    }

    /// Direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Depth-first search through all descendants, self included.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Trimmed text of a direct child, `None` when absent or empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(|child| child.text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}

pub fn parse(input: &str) -> Result<XmlNode, CaError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader.read_event().map_err(|err| {
            CaError::Malformed(format!(
                "XML error at byte {}: {err}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(start) => stack.push(XmlNode::named(start.local_name().as_ref())),
            Event::Empty(start) => {
                attach(&mut stack, &mut root, XmlNode::named(start.local_name().as_ref()))
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| CaError::Malformed("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|err| CaError::Malformed(format!("bad XML text: {err}")))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(CaError::Malformed("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| CaError::Malformed("empty document".to_string()))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

pub fn escape_text(value: &str) -> Cow<'_, str> {
    escape(value)
}
