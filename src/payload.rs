// Raw vendor payloads (JSON or XML text) into JSON values
use crate::translator::MessageFormat;
use roxmltree::{Document, Node};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Empty payload")]
    Empty,

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid XML payload: {0}")]
    Xml(#[from] roxmltree::Error),
}

pub fn detect_format(text: &str) -> Option<MessageFormat> {
    match text.trim_start().chars().next()? {
        '<' => Some(MessageFormat::Xml),
        _ => Some(MessageFormat::Json),
    }
}

pub fn parse(text: &str) -> Result<Value, PayloadError> {
    let format = detect_format(text).ok_or(PayloadError::Empty)?;
    parse_as(text, format)
}

pub fn parse_as(text: &str, format: MessageFormat) -> Result<Value, PayloadError> {
    if text.trim().is_empty() {
        return Err(PayloadError::Empty);
    }
    match format {
        MessageFormat::Json => Ok(serde_json::from_str(text)?),
        MessageFormat::Xml => xml_to_value(text),
    }
}

// The root element becomes the top-level value. Attributes are stored as
// "@name", repeated child elements collect into arrays, text-only elements
// become strings (null when empty), and text next to attributes is "#text".
pub fn xml_to_value(text: &str) -> Result<Value, PayloadError> {
    let document = Document::parse(text)?;
    Ok(element_value(document.root_element()))
}

fn element_value(node: Node) -> Value {
    let mut fields = Map::new();
    for attribute in node.attributes() {
        fields.insert(
            format!("@{}", attribute.name()),
            Value::String(attribute.value().to_string()),
        );
    }

    let mut has_children = false;
    for child in node.children().filter(Node::is_element) {
        has_children = true;
        let name = child.tag_name().name().to_string();
        let value = element_value(child);
        match fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(name, value);
            }
        }
    }

    if has_children {
        return Value::Object(fields);
    }

    let text: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    if fields.is_empty() {
        if text.is_empty() {
            return Value::Null;
        }
        return Value::String(text.to_string());
    }
    if !text.is_empty() {
        fields.insert("#text".to_string(), Value::String(text.to_string()));
    }
    Value::Object(fields)
}
