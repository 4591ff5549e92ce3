// XSD validation of outbound documents.
//
// Schemas are read into an owned model covering what the OTA notification
// schemas use: named and inline simple types restricted by facets, complex
// types with attributes and a flat xs:sequence of local elements. Anything
// else is reported as `SchemaError::Unsupported` when the schema loads, so a
// document is never passed by a construct the validator does not understand.
use crate::record::MessageKind;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_SCHEMA_DIR: &str = "schemas";

const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const MAX_TYPE_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Schema is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Unsupported XSD construct: {0}")]
    Unsupported(String),

    #[error("Invalid schema: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    String,
    Boolean,
    Date,
    DateTime,
    Decimal,
    NonNegativeInteger,
    PositiveInteger,
}

impl Builtin {
    fn from_local(name: &str) -> Option<Self> {
        let builtin = match name {
            "string" => Builtin::String,
            "boolean" => Builtin::Boolean,
            "date" => Builtin::Date,
            "dateTime" => Builtin::DateTime,
            "decimal" => Builtin::Decimal,
            "nonNegativeInteger" => Builtin::NonNegativeInteger,
            "positiveInteger" => Builtin::PositiveInteger,
            _ => return None,
        };
        Some(builtin)
    }

    fn name(&self) -> &'static str {
        match self {
            Builtin::String => "string",
            Builtin::Boolean => "boolean",
            Builtin::Date => "date",
            Builtin::DateTime => "dateTime",
            Builtin::Decimal => "decimal",
            Builtin::NonNegativeInteger => "nonNegativeInteger",
            Builtin::PositiveInteger => "positiveInteger",
        }
    }

    fn check(&self, raw: &str) -> Result<(), String> {
        let value = raw.trim();
        let valid = match self {
            Builtin::String => true,
            Builtin::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Builtin::Date => is_date(value),
            Builtin::DateTime => is_date_time(value),
            Builtin::Decimal => is_decimal(value),
            Builtin::NonNegativeInteger => {
                is_integer(value) && (!value.starts_with('-') || is_zero(value))
            }
            Builtin::PositiveInteger => {
                is_integer(value) && !value.starts_with('-') && !is_zero(value)
            }
        };
        if valid {
            Ok(())
        } else {
            Err(format!("not a valid xs:{}", self.name()))
        }
    }
}

fn unsigned(value: &str) -> &str {
    value.strip_prefix(|c| c == '+' || c == '-').unwrap_or(value)
}

fn is_integer(value: &str) -> bool {
    let digits = unsigned(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_zero(value: &str) -> bool {
    unsigned(value).chars().all(|c| c == '0')
}

fn is_decimal(value: &str) -> bool {
    let number = unsigned(value);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    !(whole.is_empty() && fraction.is_empty()) && digits(whole) && digits(fraction)
}

// Splits a trailing "Z" or "+hh:mm"/"-hh:mm" zone off a date or dateTime.
fn split_timezone(value: &str) -> (&str, &str) {
    if let Some(rest) = value.strip_suffix('Z') {
        return (rest, "Z");
    }
    let bytes = value.as_bytes();
    let len = bytes.len();
    if len > 6
        && value.is_char_boundary(len - 6)
        && matches!(bytes[len - 6], b'+' | b'-')
        && bytes[len - 3] == b':'
    {
        return value.split_at(len - 6);
    }
    (value, "")
}

fn is_timezone(zone: &str) -> bool {
    if zone.is_empty() || zone == "Z" {
        return true;
    }
    let Some((hours, minutes)) = zone[1..].split_once(':') else {
        return false;
    };
    match (hours.parse::<u32>(), minutes.parse::<u32>()) {
        (Ok(h), Ok(m)) => hours.len() == 2 && minutes.len() == 2 && h <= 14 && m < 60,
        _ => false,
    }
}

fn is_date(value: &str) -> bool {
    let (date, zone) = split_timezone(value);
    date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() && is_timezone(zone)
}

fn is_date_time(value: &str) -> bool {
    let (date_time, zone) = split_timezone(value);
    let parsed = NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M:%S%.f").is_ok();
    parsed && is_timezone(zone)
}

#[derive(Debug, Clone)]
enum SimpleTypeRef {
    Builtin(Builtin),
    Named(String),
    Inline(Box<SimpleType>),
}

#[derive(Debug, Clone)]
struct SimpleType {
    base: SimpleTypeRef,
    facets: Facets,
}

#[derive(Debug, Clone, Default)]
struct Facets {
    enumeration: Vec<String>,
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_inclusive: Option<f64>,
    max_inclusive: Option<f64>,
}

impl Facets {
    fn check(&self, value: &str) -> Result<(), String> {
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e == value) {
            return Err(format!("not one of [{}]", self.enumeration.join(", ")));
        }

        let length = value.chars().count();
        if let Some(expected) = self.length {
            if length != expected {
                return Err(format!("length {} is not {}", length, expected));
            }
        }
        if let Some(min) = self.min_length {
            if length < min {
                return Err(format!("length {} is below the minimum {}", length, min));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(format!("length {} is above the maximum {}", length, max));
            }
        }

        if self.min_inclusive.is_some() || self.max_inclusive.is_some() {
            let number: f64 = value
                .trim()
                .parse()
                .map_err(|_| "not a number".to_string())?;
            if let Some(min) = self.min_inclusive {
                if number < min {
                    return Err(format!("{} is below the minimum {}", number, min));
                }
            }
            if let Some(max) = self.max_inclusive {
                if number > max {
                    return Err(format!("{} is above the maximum {}", number, max));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum ElementType {
    Simple(SimpleTypeRef),
    Complex(Box<ComplexType>),
    // A named complex or simple type, resolved at validation time
    Named(String),
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: String,
    ty: ElementType,
}

// One entry of a complex type's xs:sequence.
#[derive(Debug, Clone)]
struct Particle {
    min: u32,
    max: Option<u32>,
    decl: ElementDecl,
}

#[derive(Debug, Clone, Default)]
struct ComplexType {
    attributes: Vec<AttributeDecl>,
    sequence: Vec<Particle>,
}

#[derive(Debug, Clone)]
struct AttributeDecl {
    name: String,
    required: bool,
    ty: SimpleTypeRef,
}

// Parsed schema document.
#[derive(Debug, Clone)]
pub struct Schema {
    target_namespace: Option<String>,
    qualified: bool,
    elements: HashMap<String, ElementDecl>,
    complex_types: HashMap<String, ComplexType>,
    simple_types: HashMap<String, SimpleType>,
}

impl FromStr for Schema {
    type Err = SchemaError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl Schema {
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = Self::parse(&text)?;
        debug!(path = %path.display(), elements = schema.elements.len(), "Loaded schema");
        Ok(schema)
    }

    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let document = Document::parse(text)?;
        let root = document.root_element();
        if root.tag_name().namespace() != Some(XSD_NS) || root.tag_name().name() != "schema" {
            return Err(SchemaError::Invalid(
                "root element is not xs:schema".to_string(),
            ));
        }

        let mut schema = Schema {
            target_namespace: root.attribute("targetNamespace").map(str::to_string),
            qualified: root.attribute("elementFormDefault") == Some("qualified"),
            elements: HashMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
        };

        for child in schema_children(root) {
            ensure_xsd(child)?;
            match child.tag_name().name() {
                "element" => {
                    let decl = parse_element_decl(child)?;
                    schema.elements.insert(decl.name.clone(), decl);
                }
                "complexType" => {
                    let name = required_attribute(child, "name")?;
                    schema
                        .complex_types
                        .insert(name.to_string(), parse_complex_type(child)?);
                }
                "simpleType" => {
                    let name = required_attribute(child, "name")?;
                    schema
                        .simple_types
                        .insert(name.to_string(), parse_simple_type(child)?);
                }
                other => {
                    return Err(SchemaError::Unsupported(format!(
                        "top-level <xs:{}>",
                        other
                    )))
                }
            }
        }

        schema.check_references()?;
        Ok(schema)
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    // All violations found in `xml`, in document order.
    pub fn validate(&self, xml: &str) -> Result<(), Vec<String>> {
        let document = Document::parse(xml)
            .map_err(|e| vec![format!("document is not well-formed XML: {}", e)])?;
        let root = document.root_element();
        let name = root.tag_name().name();
        let path = format!("/{}", name);

        let mut validator = Validator {
            schema: self,
            violations: Vec::new(),
        };
        match self.elements.get(name) {
            Some(decl) => validator.validate_element(root, decl, true, &path),
            None => validator.report(
                root,
                &path,
                format!("root element <{}> is not declared by the schema", name),
            ),
        }

        if validator.violations.is_empty() {
            Ok(())
        } else {
            Err(validator.violations)
        }
    }

    // None when `xml` conforms, otherwise the violations joined into one message.
    pub fn diagnose(&self, xml: &str) -> Option<String> {
        self.validate(xml).err().map(|violations| violations.join("; "))
    }

    fn check_references(&self) -> Result<(), SchemaError> {
        for decl in self.elements.values() {
            self.check_element(decl)?;
        }
        for complex in self.complex_types.values() {
            self.check_complex(complex)?;
        }
        for simple in self.simple_types.values() {
            self.check_simple_ref(&simple.base)?;
        }
        Ok(())
    }

    fn check_element(&self, decl: &ElementDecl) -> Result<(), SchemaError> {
        match &decl.ty {
            ElementType::Simple(simple) => self.check_simple_ref(simple),
            ElementType::Complex(complex) => self.check_complex(complex),
            ElementType::Named(name)
                if self.complex_types.contains_key(name) || self.simple_types.contains_key(name) =>
            {
                Ok(())
            }
            ElementType::Named(name) => Err(SchemaError::Invalid(format!(
                "element '{}' uses unknown type '{}'",
                decl.name, name
            ))),
        }
    }

    fn check_complex(&self, complex: &ComplexType) -> Result<(), SchemaError> {
        for attribute in &complex.attributes {
            self.check_simple_ref(&attribute.ty)?;
        }
        complex
            .sequence
            .iter()
            .try_for_each(|particle| self.check_element(&particle.decl))
    }

    fn check_simple_ref(&self, simple: &SimpleTypeRef) -> Result<(), SchemaError> {
        match simple {
            SimpleTypeRef::Builtin(_) => Ok(()),
            SimpleTypeRef::Named(name) if self.simple_types.contains_key(name) => Ok(()),
            SimpleTypeRef::Named(name) => Err(SchemaError::Invalid(format!(
                "unknown simple type '{}'",
                name
            ))),
            SimpleTypeRef::Inline(inline) => self.check_simple_ref(&inline.base),
        }
    }

    fn check_value(&self, ty: &SimpleTypeRef, value: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_TYPE_DEPTH {
            return Err("simple type derivation is too deep".to_string());
        }
        let simple = match ty {
            SimpleTypeRef::Builtin(builtin) => return builtin.check(value),
            SimpleTypeRef::Named(name) => self
                .simple_types
                .get(name)
                .ok_or_else(|| format!("unknown simple type '{}'", name))?,
            SimpleTypeRef::Inline(inline) => inline.as_ref(),
        };
        self.check_value(&simple.base, value, depth + 1)?;
        simple.facets.check(value)
    }
}

fn schema_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|child| child.is_element() && child.tag_name().name() != "annotation")
}

fn ensure_xsd(node: Node) -> Result<(), SchemaError> {
    if node.tag_name().namespace() == Some(XSD_NS) {
        Ok(())
    } else {
        Err(SchemaError::Unsupported(format!(
            "element <{}> outside the XML Schema namespace",
            node.tag_name().name()
        )))
    }
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, SchemaError> {
    node.attribute(name).ok_or_else(|| {
        SchemaError::Invalid(format!(
            "<xs:{}> is missing the '{}' attribute",
            node.tag_name().name(),
            name
        ))
    })
}

// Builtins resolve through the xs prefix; any other name is a schema type.
fn simple_type_ref(node: Node, qname: &str) -> Result<SimpleTypeRef, SchemaError> {
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    };
    if node.lookup_namespace_uri(prefix) != Some(XSD_NS) {
        return Ok(SimpleTypeRef::Named(local.to_string()));
    }
    Builtin::from_local(local)
        .map(SimpleTypeRef::Builtin)
        .ok_or_else(|| SchemaError::Unsupported(format!("built-in type xs:{}", local)))
}

fn occurs(node: Node) -> Result<(u32, Option<u32>), SchemaError> {
    let parse = |name: &str, value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| SchemaError::Invalid(format!("{} '{}' is not a count", name, value)))
    };
    let min = match node.attribute("minOccurs") {
        Some(value) => parse("minOccurs", value)?,
        None => 1,
    };
    let max = match node.attribute("maxOccurs") {
        Some("unbounded") => None,
        Some(value) => Some(parse("maxOccurs", value)?),
        None => Some(1),
    };
    if max.map_or(false, |max| max < min) {
        return Err(SchemaError::Invalid(format!(
            "maxOccurs is below minOccurs on element '{}'",
            node.attribute("name").unwrap_or_default()
        )));
    }
    Ok((min, max))
}

fn parse_element_decl(node: Node) -> Result<ElementDecl, SchemaError> {
    if node.attribute("ref").is_some() {
        return Err(SchemaError::Unsupported("element references".to_string()));
    }
    let name = required_attribute(node, "name")?.to_string();
    if node.attribute("substitutionGroup").is_some() || node.attribute("abstract").is_some() {
        return Err(SchemaError::Unsupported(format!(
            "substitution groups (element '{}')",
            name
        )));
    }

    if let Some(qname) = node.attribute("type") {
        let ty = match simple_type_ref(node, qname)? {
            SimpleTypeRef::Named(type_name) => ElementType::Named(type_name),
            builtin => ElementType::Simple(builtin),
        };
        return Ok(ElementDecl { name, ty });
    }

    let mut ty = None;
    for child in schema_children(node) {
        ensure_xsd(child)?;
        ty = Some(match child.tag_name().name() {
            "complexType" => ElementType::Complex(Box::new(parse_complex_type(child)?)),
            "simpleType" => {
                ElementType::Simple(SimpleTypeRef::Inline(Box::new(parse_simple_type(child)?)))
            }
            other => {
                return Err(SchemaError::Unsupported(format!(
                    "<xs:{}> in element '{}'",
                    other, name
                )))
            }
        });
    }
    let ty = ty.ok_or_else(|| SchemaError::Unsupported(format!("untyped element '{}'", name)))?;
    Ok(ElementDecl { name, ty })
}

fn parse_sequence(node: Node) -> Result<Vec<Particle>, SchemaError> {
    if node.attribute("minOccurs").is_some() || node.attribute("maxOccurs").is_some() {
        return Err(SchemaError::Unsupported(
            "occurrence bounds on xs:sequence".to_string(),
        ));
    }
    let mut particles = Vec::new();
    for child in schema_children(node) {
        ensure_xsd(child)?;
        match child.tag_name().name() {
            "element" => {
                let (min, max) = occurs(child)?;
                let decl = parse_element_decl(child)?;
                if particles.iter().any(|p: &Particle| p.decl.name == decl.name) {
                    return Err(SchemaError::Unsupported(format!(
                        "element '{}' appears twice in one sequence",
                        decl.name
                    )));
                }
                particles.push(Particle { min, max, decl });
            }
            other => {
                return Err(SchemaError::Unsupported(format!(
                    "<xs:{}> inside <xs:sequence>",
                    other
                )))
            }
        }
    }
    Ok(particles)
}

fn parse_complex_type(node: Node) -> Result<ComplexType, SchemaError> {
    if node.attribute("mixed") == Some("true") {
        return Err(SchemaError::Unsupported("mixed content".to_string()));
    }
    let mut complex = ComplexType::default();
    let mut has_sequence = false;
    for child in schema_children(node) {
        ensure_xsd(child)?;
        match child.tag_name().name() {
            "sequence" if has_sequence => {
                return Err(SchemaError::Invalid(
                    "complexType declares more than one content model".to_string(),
                ))
            }
            "sequence" => {
                complex.sequence = parse_sequence(child)?;
                has_sequence = true;
            }
            "attribute" => complex.attributes.push(parse_attribute(child)?),
            other => {
                return Err(SchemaError::Unsupported(format!(
                    "<xs:{}> in complexType",
                    other
                )))
            }
        }
    }
    Ok(complex)
}

fn parse_attribute(node: Node) -> Result<AttributeDecl, SchemaError> {
    if node.attribute("ref").is_some() {
        return Err(SchemaError::Unsupported("attribute references".to_string()));
    }
    let name = required_attribute(node, "name")?.to_string();
    let required = match node.attribute("use") {
        None | Some("optional") => false,
        Some("required") => true,
        Some(other) => {
            return Err(SchemaError::Unsupported(format!(
                "attribute use '{}' on '{}'",
                other, name
            )))
        }
    };

    let mut ty = match node.attribute("type") {
        Some(qname) => simple_type_ref(node, qname)?,
        None => SimpleTypeRef::Builtin(Builtin::String),
    };
    for child in schema_children(node) {
        ensure_xsd(child)?;
        match child.tag_name().name() {
            "simpleType" => ty = SimpleTypeRef::Inline(Box::new(parse_simple_type(child)?)),
            other => {
                return Err(SchemaError::Unsupported(format!(
                    "<xs:{}> in attribute '{}'",
                    other, name
                )))
            }
        }
    }
    Ok(AttributeDecl { name, required, ty })
}

fn parse_facet<T: FromStr>(facet: &str, value: &str) -> Result<T, SchemaError> {
    value
        .trim()
        .parse()
        .map_err(|_| SchemaError::Invalid(format!("bad value '{}' for facet {}", value, facet)))
}

fn parse_simple_type(node: Node) -> Result<SimpleType, SchemaError> {
    let mut restriction = None;
    for child in schema_children(node) {
        ensure_xsd(child)?;
        match child.tag_name().name() {
            "restriction" => restriction = Some(child),
            other => {
                return Err(SchemaError::Unsupported(format!(
                    "<xs:{}> in simpleType",
                    other
                )))
            }
        }
    }
    let restriction = restriction.ok_or_else(|| {
        SchemaError::Invalid("simpleType without a restriction".to_string())
    })?;

    let base = restriction
        .attribute("base")
        .map(|qname| simple_type_ref(restriction, qname))
        .transpose()?
        .ok_or_else(|| SchemaError::Invalid("restriction without a base type".to_string()))?;
    let mut facets = Facets::default();
    for facet in schema_children(restriction) {
        ensure_xsd(facet)?;
        let name = facet.tag_name().name();
        let value = required_attribute(facet, "value")?;
        match name {
            "enumeration" => facets.enumeration.push(value.to_string()),
            "length" => facets.length = Some(parse_facet(name, value)?),
            "minLength" => facets.min_length = Some(parse_facet(name, value)?),
            "maxLength" => facets.max_length = Some(parse_facet(name, value)?),
            "minInclusive" => facets.min_inclusive = Some(parse_facet(name, value)?),
            "maxInclusive" => facets.max_inclusive = Some(parse_facet(name, value)?),
            other => return Err(SchemaError::Unsupported(format!("facet xs:{}", other))),
        }
    }
    Ok(SimpleType { base, facets })
}

fn element_text(node: Node) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect()
}

struct Validator<'s> {
    schema: &'s Schema,
    violations: Vec<String>,
}

impl<'s> Validator<'s> {
    fn report(&mut self, node: Node, path: &str, message: impl fmt::Display) {
        let position = node.document().text_pos_at(node.range().start);
        self.violations.push(format!(
            "{} (line {}, column {}): {}",
            path, position.row, position.col, message
        ));
    }

    // Global declarations always live in the target namespace; local ones
    // only when elementFormDefault is qualified.
    fn expected_namespace(&self, global: bool) -> Option<&'s str> {
        if global || self.schema.qualified {
            self.schema.target_namespace.as_deref()
        } else {
            None
        }
    }

    fn validate_element(&mut self, node: Node, decl: &ElementDecl, global: bool, path: &str) {
        let expected = self.expected_namespace(global);
        let actual = node.tag_name().namespace();
        if actual != expected {
            self.report(
                node,
                path,
                format!(
                    "element <{}> is in namespace '{}', expected '{}'",
                    decl.name,
                    actual.unwrap_or(""),
                    expected.unwrap_or("")
                ),
            );
        }

        let schema = self.schema;
        match &decl.ty {
            ElementType::Simple(simple) => self.validate_simple_element(node, simple, path),
            ElementType::Complex(complex) => self.validate_complex(node, complex, path),
            ElementType::Named(name) => match schema.complex_types.get(name) {
                Some(complex) => self.validate_complex(node, complex, path),
                None => {
                    let simple = SimpleTypeRef::Named(name.clone());
                    self.validate_simple_element(node, &simple, path)
                }
            },
        }
    }

    fn validate_simple_element(&mut self, node: Node, simple: &SimpleTypeRef, path: &str) {
        for attribute in node.attributes() {
            if attribute.namespace() != Some(XSI_NS) {
                self.report(
                    node,
                    path,
                    format!("attribute '{}' is not allowed", attribute.name()),
                );
            }
        }
        if let Some(child) = node.children().find(Node::is_element) {
            self.report(
                child,
                path,
                format!("unexpected element <{}>", child.tag_name().name()),
            );
            return;
        }
        let text = element_text(node);
        if let Err(reason) = self.schema.check_value(simple, &text, 0) {
            self.report(node, path, format!("invalid value '{}': {}", text, reason));
        }
    }

    fn validate_complex(&mut self, node: Node, complex: &ComplexType, path: &str) {
        for attribute in node.attributes() {
            if attribute.namespace() == Some(XSI_NS) {
                continue;
            }
            let declared = complex
                .attributes
                .iter()
                .find(|decl| attribute.namespace().is_none() && decl.name == attribute.name());
            match declared {
                Some(decl) => {
                    if let Err(reason) = self.schema.check_value(&decl.ty, attribute.value(), 0) {
                        self.report(
                            node,
                            path,
                            format!(
                                "attribute '{}' has invalid value '{}': {}",
                                decl.name,
                                attribute.value(),
                                reason
                            ),
                        );
                    }
                }
                None => self.report(
                    node,
                    path,
                    format!("attribute '{}' is not allowed", attribute.name()),
                ),
            }
        }
        for decl in complex.attributes.iter().filter(|decl| decl.required) {
            if node.attribute(decl.name.as_str()).is_none() {
                self.report(
                    node,
                    path,
                    format!("missing required attribute '{}'", decl.name),
                );
            }
        }

        if !element_text(node).trim().is_empty() {
            self.report(node, path, "text content is not allowed");
        }

        self.validate_sequence(node, &complex.sequence, path);
    }

    // Element names inside one sequence are distinct, so each child belongs
    // to exactly one particle and a single forward pass decides the match.
    fn validate_sequence(&mut self, node: Node, sequence: &[Particle], path: &str) {
        let children: Vec<Node> = node.children().filter(Node::is_element).collect();
        let mut position = 0;
        for particle in sequence {
            let mut count = 0u32;
            while particle.max.map_or(true, |max| count < max) {
                let Some(child) = children.get(position) else {
                    break;
                };
                if child.tag_name().name() != particle.decl.name {
                    break;
                }
                count += 1;
                let child_path = if count > 1 {
                    format!("{}/{}[{}]", path, particle.decl.name, count)
                } else {
                    format!("{}/{}", path, particle.decl.name)
                };
                self.validate_element(*child, &particle.decl, false, &child_path);
                position += 1;
            }
            if count < particle.min {
                let message = match children.get(position) {
                    Some(found) => format!(
                        "expected <{}>, found <{}>",
                        particle.decl.name,
                        found.tag_name().name()
                    ),
                    None => format!("missing required element <{}>", particle.decl.name),
                };
                let at = children.get(position).copied().unwrap_or(node);
                self.report(at, path, message);
                return;
            }
        }
        if let Some(extra) = children.get(position) {
            self.report(
                *extra,
                path,
                format!("unexpected element <{}>", extra.tag_name().name()),
            );
        }
    }
}

// Schemas per message kind, read from `schema_dir` and cached after the
// first successful load.
#[derive(Debug)]
pub struct SchemaCatalog {
    schema_dir: PathBuf,
    schemas: RwLock<HashMap<MessageKind, Arc<Schema>>>,
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_DIR)
    }
}

impl SchemaCatalog {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    pub fn schema_path(&self, kind: MessageKind) -> PathBuf {
        self.schema_dir.join(kind.schema_file())
    }

    pub fn load(&self, kind: MessageKind) -> Result<Arc<Schema>, SchemaError> {
        if let Some(schema) = self.schemas.read().get(&kind) {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(Schema::from_file(&self.schema_path(kind))?);
        self.schemas.write().insert(kind, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn validate(&self, kind: MessageKind, xml: &str) -> Option<String> {
        let diagnostic = match self.load(kind) {
            Ok(schema) => schema.diagnose(xml),
            Err(e) => Some(e.to_string()),
        };
        if let Some(diagnostic) = &diagnostic {
            warn!(message_type = %kind, %diagnostic, "Schema validation failed");
        }
        diagnostic
    }
}

// Validate `xml` against the schema file at `schema_path`. Returns None when
// the document conforms; otherwise a diagnostic, including when the schema
// itself cannot be read.
pub fn validate_xml(xml: &str, schema_path: &Path) -> Option<String> {
    match Schema::from_file(schema_path) {
        Ok(schema) => schema.diagnose(xml),
        Err(e) => Some(e.to_string()),
    }
}
