//! Blueprint JSON reader and writer.
//!
//! Blueprints are JSON-Schema-like documents:
//!
//! ```json
//! {
//!   "class": "Engineering Report",
//!   "description": "...",
//!   "definitions": {
//!     "Casing_Summary": {
//!       "type": "object",
//!       "properties": {
//!         "Size": { "type": "string", "inferenceType": "explicit", "instruction": "..." }
//!       }
//!     }
//!   },
//!   "properties": {
//!     "Report_Date": { "type": "date", "inferenceType": "explicit", "instruction": "..." },
//!     "Casing_Summary": {
//!       "type": "array",
//!       "instruction": "...",
//!       "items": { "$ref": "#/definitions/Casing_Summary" }
//!     }
//!   }
//! }
//! ```
//!
//! Objects are read into an order- and duplicate-preserving tree first, so a
//! field declared twice is reported instead of silently overwritten.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::SchemaError;
use crate::blueprint::{
    Cardinality, FieldSpec, GroupSpec, InferenceMode, NestedGroup, ROOT_GROUP, RootProperty,
    Schema, SchemaParts, ValueType,
};

const SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";
const REF_PREFIX: &str = "#/definitions/";

impl Schema {
    /// Parse and validate a blueprint document.
    pub fn from_json(name: &str, text: &str) -> Result<Self, SchemaError> {
        let root: Node = serde_json::from_str(text)?;
        let schema = Schema::new(parse_parts(name, &root)?)?;
        debug!(
            blueprint = name,
            groups = schema.groups().len(),
            "parsed blueprint"
        );
        Ok(schema)
    }

    /// Read a blueprint file; its name is the file stem.
    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Self::from_json(name, &text)
    }

    /// Serialise back to blueprint JSON.
    ///
    /// Document-level fields are written before group properties.
    pub fn to_json_value(&self) -> Value {
        let mut definitions = Map::new();
        for group in self.groups().values() {
            let mut props = Map::new();
            for field in &group.fields {
                props.insert(field.name.clone(), field_json(field));
            }
            for nested in &group.nested {
                let mut obj = Map::new();
                obj.insert("$ref".into(), json!(format!("{REF_PREFIX}{}", nested.group)));
                if let Some(instruction) = &nested.instruction {
                    obj.insert("instruction".into(), json!(instruction));
                }
                props.insert(nested.name.clone(), Value::Object(obj));
            }
            definitions.insert(
                group.name.clone(),
                json!({ "type": "object", "properties": props }),
            );
        }

        let mut properties = Map::new();
        for field in self.fields() {
            properties.insert(field.name.clone(), field_json(field));
        }
        for prop in self.root_properties() {
            let reference = format!("{REF_PREFIX}{}", prop.group);
            let mut obj = Map::new();
            if prop.cardinality == Cardinality::Repeated {
                obj.insert("type".into(), json!("array"));
            } else {
                obj.insert("$ref".into(), json!(reference));
            }
            if let Some(instruction) = &prop.instruction {
                obj.insert("instruction".into(), json!(instruction));
            }
            if prop.cardinality == Cardinality::Repeated {
                obj.insert("items".into(), json!({ "$ref": reference }));
            }
            properties.insert(prop.name.clone(), Value::Object(obj));
        }

        json!({
            "$schema": SCHEMA_DIALECT,
            "description": self.description(),
            "class": self.document_class(),
            "type": "object",
            "definitions": definitions,
            "properties": properties,
        })
    }

    pub fn to_json_string(&self) -> String {
        // Serialising a `Value` cannot fail.
        serde_json::to_string_pretty(&self.to_json_value()).unwrap_or_default()
    }
}

fn field_json(field: &FieldSpec) -> Value {
    json!({
        "type": field.value_type.as_str(),
        "inferenceType": field.inference_mode.as_str(),
        "instruction": field.instruction,
    })
}

// ── Parsing ──

fn parse_parts(name: &str, root: &Node) -> Result<SchemaParts, SchemaError> {
    let entries = root.as_object().ok_or_else(|| malformed("$", "expected an object"))?;
    let document_class = match Node::get(entries, "class") {
        Some(node) => node
            .as_str()
            .ok_or_else(|| malformed("class", "expected a string"))?
            .to_string(),
        None => return Err(malformed("class", "missing document class")),
    };
    let description = Node::get(entries, "description")
        .and_then(Node::as_str)
        .unwrap_or_default()
        .to_string();

    let mut groups = Vec::new();
    if let Some(defs) = Node::get(entries, "definitions") {
        let defs = defs
            .as_object()
            .ok_or_else(|| malformed("definitions", "expected an object"))?;
        for (group_name, node) in defs {
            groups.push(parse_group(group_name, node)?);
        }
    }

    let mut fields = Vec::new();
    let mut properties = Vec::new();
    let props = Node::get(entries, "properties")
        .ok_or_else(|| malformed(ROOT_GROUP, "missing root properties"))?
        .as_object()
        .ok_or_else(|| malformed(ROOT_GROUP, "expected an object"))?;
    for (prop_name, node) in props {
        let location = format!("{ROOT_GROUP}.{prop_name}");
        match parse_root_member(&location, prop_name, node)? {
            RootMember::Field(field) => fields.push(field),
            RootMember::Group(prop) => properties.push(prop),
        }
    }

    Ok(SchemaParts {
        name: name.to_string(),
        document_class,
        description,
        groups,
        fields,
        properties,
    })
}

fn parse_group(name: &str, node: &Node) -> Result<GroupSpec, SchemaError> {
    let location = format!("definitions.{name}");
    let entries = node
        .as_object()
        .ok_or_else(|| malformed(&location, "expected an object"))?;
    let props = Node::get(entries, "properties")
        .ok_or_else(|| malformed(&location, "definition has no properties"))?
        .as_object()
        .ok_or_else(|| malformed(&location, "properties must be an object"))?;

    let mut group = GroupSpec::new(name);
    for (field_name, field_node) in props {
        let location = format!("{location}.{field_name}");
        let field_entries = field_node
            .as_object()
            .ok_or_else(|| malformed(&location, "expected an object"))?;
        if let Some(reference) = Node::get(field_entries, "$ref") {
            check_ref_has_no_type(&location, field_entries)?;
            group.nested.push(NestedGroup {
                name: field_name.clone(),
                group: resolve_ref(&location, reference)?,
                instruction: instruction_of(field_entries),
            });
        } else if type_of(field_entries) == Some("array") {
            return Err(SchemaError::CardinalityConflict {
                location,
                detail: "arrays are only allowed as root properties".into(),
            });
        } else {
            group.fields.push(parse_field(&location, field_name, field_entries)?);
        }
    }
    Ok(group)
}

enum RootMember {
    Field(FieldSpec),
    Group(RootProperty),
}

fn parse_root_member(location: &str, name: &str, node: &Node) -> Result<RootMember, SchemaError> {
    let entries = node
        .as_object()
        .ok_or_else(|| malformed(location, "expected an object"))?;

    if let Some(reference) = Node::get(entries, "$ref") {
        check_ref_has_no_type(location, entries)?;
        return Ok(RootMember::Group(RootProperty {
            name: name.to_string(),
            group: resolve_ref(location, reference)?,
            instruction: instruction_of(entries),
            cardinality: Cardinality::Single,
        }));
    }

    if type_of(entries) == Some("array") {
        let items = Node::get(entries, "items")
            .ok_or_else(|| malformed(location, "array property has no items"))?
            .as_object()
            .ok_or_else(|| malformed(location, "items must be an object"))?;
        let Some(reference) = Node::get(items, "$ref") else {
            return Err(SchemaError::CardinalityConflict {
                location: location.to_string(),
                detail: format!(
                    "array items must reference a definition, found plain `{}`",
                    type_of(items).unwrap_or("value")
                ),
            });
        };
        check_ref_has_no_type(location, items)?;
        return Ok(RootMember::Group(RootProperty {
            name: name.to_string(),
            group: resolve_ref(location, reference)?,
            instruction: instruction_of(entries),
            cardinality: Cardinality::Repeated,
        }));
    }

    Ok(RootMember::Field(parse_field(location, name, entries)?))
}

fn parse_field(
    location: &str,
    name: &str,
    entries: &[(String, Node)],
) -> Result<FieldSpec, SchemaError> {
    let value_type = match Node::get(entries, "type") {
        Some(node) => {
            let raw = node.as_str().unwrap_or("<non-string>");
            ValueType::parse(raw).ok_or_else(|| SchemaError::UnsupportedType {
                location: location.to_string(),
                found: raw.to_string(),
            })?
        }
        None => {
            return Err(SchemaError::UnsupportedType {
                location: location.to_string(),
                found: "<missing>".into(),
            });
        }
    };

    let inference_mode = match Node::get(entries, "inferenceType") {
        Some(node) => node
            .as_str()
            .and_then(InferenceMode::parse)
            .ok_or_else(|| malformed(location, "inferenceType must be `explicit` or `inferred`"))?,
        None => InferenceMode::default(),
    };

    Ok(FieldSpec {
        name: name.to_string(),
        value_type,
        inference_mode,
        instruction: instruction_of(entries).unwrap_or_default(),
    })
}

/// A `$ref` combined with a scalar or array type is ambiguous about cardinality.
fn check_ref_has_no_type(location: &str, entries: &[(String, Node)]) -> Result<(), SchemaError> {
    match type_of(entries) {
        None | Some("object") => Ok(()),
        Some(other) => Err(SchemaError::CardinalityConflict {
            location: location.to_string(),
            detail: format!("`$ref` cannot be combined with type `{other}`"),
        }),
    }
}

fn resolve_ref(location: &str, node: &Node) -> Result<String, SchemaError> {
    let raw = node.as_str().unwrap_or_default();
    match raw.strip_prefix(REF_PREFIX) {
        Some(target) if !target.is_empty() => Ok(target.to_string()),
        _ => Err(SchemaError::UnresolvedReference {
            reference: raw.to_string(),
            location: location.to_string(),
        }),
    }
}

fn type_of(entries: &[(String, Node)]) -> Option<&str> {
    Node::get(entries, "type").and_then(Node::as_str)
}

fn instruction_of(entries: &[(String, Node)]) -> Option<String> {
    Node::get(entries, "instruction")
        .and_then(Node::as_str)
        .map(str::to_string)
}

fn malformed(location: &str, detail: &str) -> SchemaError {
    SchemaError::Malformed {
        location: location.to_string(),
        detail: detail.to_string(),
    }
}

// ── Duplicate-preserving JSON tree ──

enum Node {
    Null,
    Bool,
    Number,
    String(String),
    Array,
    Object(Vec<(String, Node)>),
}

impl Node {
    fn as_object(&self) -> Option<&[(String, Node)]> {
        match self {
            Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// First entry with `key`.
    fn get<'a>(entries: &'a [(String, Node)], key: &str) -> Option<&'a Node> {
        entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Node, E> {
        Ok(Node::Bool)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Node, E> {
        Ok(Node::Number)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Node, E> {
        Ok(Node::Number)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Node, E> {
        Ok(Node::Number)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        while seq.next_element::<Node>()?.is_some() {}
        Ok(Node::Array)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Node>()? {
            entries.push((key, value));
        }
        Ok(Node::Object(entries))
    }
}
