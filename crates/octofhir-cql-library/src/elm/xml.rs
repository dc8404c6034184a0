//! Verbose ELM reader
//!
//! Converts the XML element tree into the JSON layout of compact ELM:
//! attributes become string fields, `xsi:type` becomes `type`, repeated
//! children become arrays.

use super::XmlAnnotation;
use crate::error::{LibraryError, LibraryResult};
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

/// Elements that are always lists in compact ELM.
const ARRAY_ELEMENTS: &[&str] = &["annotation", "def", "operand", "element", "s", "signature"];

pub(super) struct XmlDocument {
    pub elm: Value,
    /// Annotation elements directly under the root `library` element
    pub annotations: Vec<XmlAnnotation>,
}

struct Frame {
    name: String,
    attributes: IndexMap<String, String>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> LibraryResult<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = IndexMap::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| xml_error(e.to_string()))?;
            let raw_key = attribute.key.as_ref();
            if raw_key == b"xmlns" || raw_key.starts_with(b"xmlns:") {
                continue;
            }
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| xml_error(e.to_string()))?
                .into_owned();
            let value = if key == "type" {
                // xsi:type="a:CqlToElmInfo" -> CqlToElmInfo
                value.rsplit(':').next().unwrap_or(&value).to_string()
            } else {
                value
            };
            attributes.insert(key, value);
        }
        Ok(Self {
            name,
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn into_value(self) -> Value {
        let mut object = Map::new();
        for (key, value) in self.attributes {
            object.insert(key, Value::String(value));
        }
        for (key, value) in self.children {
            object.insert(key, value);
        }
        let text = self.text.trim();
        if !text.is_empty() {
            object.insert("value".to_string(), Value::String(text.to_string()));
        }
        Value::Object(object)
    }
}

fn append_child(parent: &mut Map<String, Value>, name: &str, value: Value) {
    match parent.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None if ARRAY_ELEMENTS.contains(&name) => {
            parent.insert(name.to_string(), Value::Array(vec![value]));
        }
        None => {
            parent.insert(name.to_string(), value);
        }
    }
}

fn xml_error(message: String) -> LibraryError {
    LibraryError::invalid_elm(format!("Error encountered while reading ELM xml: {message}"))
}

pub(super) fn read_document(bytes: &[u8]) -> LibraryResult<XmlDocument> {
    let text = std::str::from_utf8(bytes).map_err(|e| xml_error(e.to_string()))?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;
    let mut annotations = Vec::new();

    loop {
        let frame = match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(Frame::open(&start)?);
                continue;
            }
            Ok(Event::Empty(start)) => Frame::open(&start)?,
            Ok(Event::End(_)) => stack
                .pop()
                .ok_or_else(|| xml_error("unbalanced closing tag".to_string()))?,
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(&text.unescape().map_err(|e| xml_error(e.to_string()))?);
                }
                continue;
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => return Err(xml_error(e.to_string())),
        };

        // Closed element: attach to its parent, or it is the document root
        if stack.len() == 1 && frame.name == "annotation" {
            annotations.push(XmlAnnotation {
                name: frame.name.clone(),
                attributes: frame.attributes.clone(),
            });
        }
        let name = frame.name.clone();
        let value = frame.into_value();
        match stack.last_mut() {
            Some(parent) => append_child(&mut parent.children, &name, value),
            None => root = Some((name, value)),
        }
    }

    if !stack.is_empty() {
        return Err(xml_error("unexpected end of document".to_string()));
    }
    let (name, value) = root.ok_or_else(|| xml_error("empty document".to_string()))?;
    if name != "library" {
        return Err(xml_error(format!("unexpected root element {name}")));
    }

    let mut elm = Map::new();
    elm.insert("library".to_string(), value);
    Ok(XmlDocument {
        elm: Value::Object(elm),
        annotations,
    })
}
