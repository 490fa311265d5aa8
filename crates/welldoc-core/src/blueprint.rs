//! Typed blueprint model.
//!
//! A [`Schema`] describes what to extract from one document class: named
//! groups of typed fields, the root properties that place those groups in a
//! document (once or repeated), and any document-level scalar fields.
//!
//! A `Schema` can only be obtained through [`Schema::new`] (or the JSON
//! loader, which calls it), so every value in hand has already had its
//! references resolved and its field names checked.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::SchemaError;

/// Label used for document-level fields in error messages.
pub const ROOT_GROUP: &str = "properties";

/// Scalar type of an extractable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// Whether the extractor must read a value verbatim or may synthesise it.
///
/// Passed through to the extraction service; not enforced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceMode {
    #[default]
    Explicit,
    Inferred,
}

impl InferenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "explicit" => Some(Self::Explicit),
            "inferred" => Some(Self::Inferred),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Single,
    Repeated,
}

/// One extractable scalar value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub value_type: ValueType,
    pub inference_mode: InferenceMode,
    pub instruction: String,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        inference_mode: InferenceMode,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            inference_mode,
            instruction: instruction.into(),
        }
    }
}

/// A field of a group whose value is a single record of another group.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedGroup {
    pub name: String,
    pub group: String,
    pub instruction: Option<String>,
}

/// A named record type.
///
/// `cardinality` is derived when the owning [`Schema`] is built: a group is
/// `Repeated` if any root property places it as an array.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub nested: Vec<NestedGroup>,
    pub cardinality: Cardinality,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            nested: Vec::new(),
            cardinality: Cardinality::Single,
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_nested(mut self, nested: NestedGroup) -> Self {
        self.nested.push(nested);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A top-level property that places a group in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct RootProperty {
    pub name: String,
    pub group: String,
    pub instruction: Option<String>,
    pub cardinality: Cardinality,
}

impl RootProperty {
    pub fn single(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            instruction: None,
            cardinality: Cardinality::Single,
        }
    }

    pub fn repeated(
        name: impl Into<String>,
        group: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            instruction: Some(instruction.into()),
            cardinality: Cardinality::Repeated,
        }
    }
}

/// Everything needed to build a [`Schema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaParts {
    pub name: String,
    pub document_class: String,
    pub description: String,
    pub groups: Vec<GroupSpec>,
    pub fields: Vec<FieldSpec>,
    pub properties: Vec<RootProperty>,
}

/// A validated blueprint for one document class.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    document_class: String,
    description: String,
    groups: BTreeMap<String, GroupSpec>,
    fields: Vec<FieldSpec>,
    properties: Vec<RootProperty>,
}

impl Schema {
    /// Validate `parts` and build a schema.
    ///
    /// Checks, in order: group names are unique, field names are unique
    /// within each group and at the root, an array property is not also a
    /// document-level field, instructions are non-empty, every reference
    /// resolves, nested references are acyclic, and flattened column names
    /// do not collide.
    pub fn new(parts: SchemaParts) -> Result<Self, SchemaError> {
        let SchemaParts {
            name,
            document_class,
            description,
            groups: group_list,
            fields,
            properties,
        } = parts;

        let mut groups = BTreeMap::new();
        for group in group_list {
            if groups.contains_key(&group.name) {
                return Err(SchemaError::Malformed {
                    location: format!("definitions.{}", group.name),
                    detail: "definition declared more than once".into(),
                });
            }
            groups.insert(group.name.clone(), group);
        }

        for group in groups.values() {
            check_members(
                &group.name,
                &group.fields,
                group.nested.iter().map(|n| n.name.as_str()),
            )?;
            for nested in &group.nested {
                if !groups.contains_key(&nested.group) {
                    return Err(SchemaError::UnresolvedReference {
                        reference: nested.group.clone(),
                        location: format!("definitions.{}.{}", group.name, nested.name),
                    });
                }
            }
        }

        for field in &fields {
            let repeated = properties
                .iter()
                .any(|p| p.name == field.name && p.cardinality == Cardinality::Repeated);
            if repeated {
                return Err(SchemaError::CardinalityConflict {
                    location: format!("{ROOT_GROUP}.{}", field.name),
                    detail: "declared both as an array of records and as a scalar field".into(),
                });
            }
        }
        check_members(
            ROOT_GROUP,
            &fields,
            properties.iter().map(|p| p.name.as_str()),
        )?;
        for prop in &properties {
            if !groups.contains_key(&prop.group) {
                return Err(SchemaError::UnresolvedReference {
                    reference: prop.group.clone(),
                    location: format!("{ROOT_GROUP}.{}", prop.name),
                });
            }
        }

        check_acyclic(&groups)?;
        for group in groups.values() {
            check_flattened(group, &groups)?;
        }

        for group in groups.values_mut() {
            group.cardinality = if properties
                .iter()
                .any(|p| p.group == group.name && p.cardinality == Cardinality::Repeated)
            {
                Cardinality::Repeated
            } else {
                Cardinality::Single
            };
        }

        Ok(Self {
            name,
            document_class,
            description,
            groups,
            fields,
            properties,
        })
    }

    /// Blueprint name; extraction results report this as the matched schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document_class(&self) -> &str {
        &self.document_class
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn groups(&self) -> &BTreeMap<String, GroupSpec> {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.get(name)
    }

    /// Document-level scalar fields.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn root_properties(&self) -> &[RootProperty] {
        &self.properties
    }

    pub fn root_property(&self, name: &str) -> Option<&RootProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

fn check_members<'a>(
    group: &str,
    fields: &[FieldSpec],
    others: impl Iterator<Item = &'a str>,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                group: group.to_string(),
                field: field.name.clone(),
            });
        }
        if field.instruction.trim().is_empty() {
            return Err(SchemaError::MissingInstruction {
                group: group.to_string(),
                field: field.name.clone(),
            });
        }
    }
    for name in others {
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateField {
                group: group.to_string(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Nested fields become `Parent.child` columns, so a field literally named
/// `Parent.child` would shadow one. Runs after the cycle check.
fn check_flattened(
    group: &GroupSpec,
    groups: &BTreeMap<String, GroupSpec>,
) -> Result<(), SchemaError> {
    fn collect<'a>(
        spec: &'a GroupSpec,
        groups: &'a BTreeMap<String, GroupSpec>,
        prefix: &str,
        seen: &mut HashSet<String>,
        owner: &str,
    ) -> Result<(), SchemaError> {
        for field in &spec.fields {
            let column = format!("{prefix}{}", field.name);
            if !seen.insert(column.clone()) {
                return Err(SchemaError::DuplicateField {
                    group: owner.to_string(),
                    field: column,
                });
            }
        }
        for nested in &spec.nested {
            if let Some(inner) = groups.get(&nested.group) {
                collect(inner, groups, &format!("{prefix}{}.", nested.name), seen, owner)?;
            }
        }
        Ok(())
    }

    collect(group, groups, "", &mut HashSet::new(), &group.name)
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    InProgress,
    Done,
}

fn check_acyclic(groups: &BTreeMap<String, GroupSpec>) -> Result<(), SchemaError> {
    fn visit<'a>(
        name: &'a str,
        groups: &'a BTreeMap<String, GroupSpec>,
        state: &mut HashMap<&'a str, Visit>,
    ) -> Result<(), SchemaError> {
        match state.get(name) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                return Err(SchemaError::CyclicReference {
                    group: name.to_string(),
                });
            }
            None => {}
        }
        state.insert(name, Visit::InProgress);
        if let Some(group) = groups.get(name) {
            for nested in &group.nested {
                visit(&nested.group, groups, state)?;
            }
        }
        state.insert(name, Visit::Done);
        Ok(())
    }

    let mut state = HashMap::new();
    for name in groups.keys() {
        visit(name, groups, &mut state)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn casing() -> GroupSpec {
        GroupSpec::new("Casing_Summary")
            .with_field(FieldSpec::new(
                "Size",
                ValueType::String,
                InferenceMode::Explicit,
                "Outer diameter of the casing string",
            ))
            .with_field(FieldSpec::new(
                "Weight",
                ValueType::Number,
                InferenceMode::Explicit,
                "Nominal weight in lb/ft",
            ))
    }

    fn parts() -> SchemaParts {
        SchemaParts {
            name: "well-completion-report".into(),
            document_class: "Engineering Report".into(),
            description: "Well completion report".into(),
            groups: vec![casing()],
            fields: vec![],
            properties: vec![RootProperty::repeated(
                "Casing_Summary",
                "Casing_Summary",
                "One row per casing string",
            )],
        }
    }

    #[test]
    fn builds_and_derives_cardinality() {
        let schema = Schema::new(parts()).unwrap();
        assert_eq!(schema.document_class(), "Engineering Report");
        assert_eq!(
            schema.group("Casing_Summary").unwrap().cardinality,
            Cardinality::Repeated
        );
    }

    #[test]
    fn group_only_nested_stays_single() {
        let mut p = parts();
        p.groups.push(
            GroupSpec::new("Well").with_nested(NestedGroup {
                name: "Casing".into(),
                group: "Casing_Summary".into(),
                instruction: None,
            }),
        );
        p.properties.push(RootProperty::single("Well", "Well"));
        let schema = Schema::new(p).unwrap();
        assert_eq!(schema.group("Well").unwrap().cardinality, Cardinality::Single);
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut p = parts();
        p.groups[0].fields.push(FieldSpec::new(
            "Size",
            ValueType::String,
            InferenceMode::Explicit,
            "again",
        ));
        let err = Schema::new(p).unwrap_err();
        assert!(
            matches!(err, SchemaError::DuplicateField { ref group, ref field }
                if group == "Casing_Summary" && field == "Size")
        );
    }

    #[test]
    fn array_property_and_scalar_field_with_one_name_conflict() {
        let mut p = parts();
        p.fields.push(FieldSpec::new(
            "Casing_Summary",
            ValueType::String,
            InferenceMode::Explicit,
            "clashes with the array property",
        ));
        let err = Schema::new(p).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::CardinalityConflict { ref location, .. } if location == "properties.Casing_Summary"
        ));
    }

    #[test]
    fn single_property_and_scalar_field_with_one_name_is_duplicate() {
        let mut p = parts();
        p.groups.push(GroupSpec::new("Well"));
        p.properties.push(RootProperty::single("Well", "Well"));
        p.fields.push(FieldSpec::new(
            "Well",
            ValueType::String,
            InferenceMode::Explicit,
            "Well name",
        ));
        let err = Schema::new(p).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { ref group, .. } if group == ROOT_GROUP));
    }

    #[test]
    fn dotted_field_colliding_with_nested_column_rejected() {
        let mut p = parts();
        p.groups.push(GroupSpec::new("Surface").with_field(FieldSpec::new(
            "Lat",
            ValueType::Number,
            InferenceMode::Explicit,
            "Surface latitude",
        )));
        p.groups.push(
            GroupSpec::new("Well")
                .with_field(FieldSpec::new(
                    "Location.Lat",
                    ValueType::Number,
                    InferenceMode::Explicit,
                    "Latitude as printed",
                ))
                .with_nested(NestedGroup {
                    name: "Location".into(),
                    group: "Surface".into(),
                    instruction: None,
                }),
        );
        p.properties.push(RootProperty::single("Well", "Well"));
        let err = Schema::new(p).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateField { ref group, ref field }
                if group == "Well" && field == "Location.Lat"
        ));
    }

    #[test]
    fn blank_instruction_rejected() {
        let mut p = parts();
        p.groups[0].fields[1].instruction = "   ".into();
        let err = Schema::new(p).unwrap_err();
        assert!(matches!(err, SchemaError::MissingInstruction { ref field, .. } if field == "Weight"));
    }

    #[test]
    fn unresolved_root_reference() {
        let mut p = parts();
        p.properties.push(RootProperty::single("Tubing", "Tubing_Summary"));
        let err = Schema::new(p).unwrap_err();
        assert!(
            matches!(err, SchemaError::UnresolvedReference { ref reference, .. } if reference == "Tubing_Summary")
        );
    }

    #[test]
    fn unresolved_nested_reference() {
        let mut p = parts();
        p.groups[0].nested.push(NestedGroup {
            name: "Cement".into(),
            group: "Cement_Job".into(),
            instruction: None,
        });
        let err = Schema::new(p).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnresolvedReference { ref location, .. } if location == "definitions.Casing_Summary.Cement"
        ));
    }

    #[test]
    fn nested_cycle_rejected() {
        let mut p = parts();
        p.groups.push(GroupSpec::new("A").with_nested(NestedGroup {
            name: "b".into(),
            group: "B".into(),
            instruction: None,
        }));
        p.groups.push(GroupSpec::new("B").with_nested(NestedGroup {
            name: "a".into(),
            group: "A".into(),
            instruction: None,
        }));
        let err = Schema::new(p).unwrap_err();
        assert!(matches!(err, SchemaError::CyclicReference { .. }));
    }

    #[test]
    fn value_type_names() {
        for t in [
            ValueType::String,
            ValueType::Number,
            ValueType::Boolean,
            ValueType::Date,
        ] {
            assert_eq!(ValueType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ValueType::parse("integer"), None);
    }
}
