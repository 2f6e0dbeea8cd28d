//! Lock-step flattening of actual and expected value trees into leaf records.
//!
//! Declared attributes are visited in declaration order, list items by index, and attributes
//! only present in the data follow the declared ones in sorted key order, so flattening the same
//! pair of trees always yields the same path sequence.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::AttributeConfigResolver;
use crate::error::EvalError;
use crate::model::{
    AttributeSpec, AttributeType, Diagnostic, DiagnosticKind, EvaluationMethod, FieldPath,
    FlattenedField, ListMatchSummary, is_absent,
};

/// Everything an aligner needs to know about the list being paired.
#[derive(Debug, Clone, Copy)]
pub struct ListContext<'a> {
    pub path: &'a FieldPath,
    pub spec: &'a AttributeSpec,
    pub root_type: AttributeType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    /// `(actual index, expected index)` in reporting order.
    pub pairs: Vec<(Option<usize>, Option<usize>)>,
    pub summary: Option<ListMatchSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Decides which actual item is compared with which expected item for HUNGARIAN lists.
pub trait ItemAligner: Sync {
    fn align(
        &self,
        flattener: &TreeFlattener<'_>,
        context: ListContext<'_>,
        actual: &[Value],
        expected: &[Value],
    ) -> Alignment;
}

/// Pairs items by position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalAligner;

impl ItemAligner for PositionalAligner {
    fn align(
        &self,
        _flattener: &TreeFlattener<'_>,
        _context: ListContext<'_>,
        actual: &[Value],
        expected: &[Value],
    ) -> Alignment {
        Alignment {
            pairs: positional_pairs(actual.len(), expected.len()),
            summary: None,
            diagnostics: Vec::new(),
        }
    }
}

pub fn positional_pairs(
    actual_len: usize,
    expected_len: usize,
) -> Vec<(Option<usize>, Option<usize>)> {
    (0..actual_len.max(expected_len))
        .map(|index| {
            (
                (index < actual_len).then_some(index),
                (index < expected_len).then_some(index),
            )
        })
        .collect()
}

/// Flat arena of leaf records with an index by reporting path.
#[derive(Debug, Clone, Default)]
pub struct FlattenedTree {
    fields: Vec<FlattenedField>,
    index: HashMap<String, usize>,
    pub diagnostics: Vec<Diagnostic>,
    pub list_matches: Vec<ListMatchSummary>,
}

impl FlattenedTree {
    pub fn fields(&self) -> &[FlattenedField] {
        &self.fields
    }

    pub fn get(&self, path: &str) -> Option<&FlattenedField> {
        self.index.get(path).map(|position| &self.fields[*position])
    }

    pub fn paths(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.path.display()).collect()
    }

    fn push(&mut self, field: FlattenedField) {
        self.index.insert(field.path.display(), self.fields.len());
        self.fields.push(field);
    }

    /// Points the actual-side paths of fields pushed since `first` at actual item `index`.
    fn relocate_actual(&mut self, first: usize, depth: usize, index: Option<usize>) {
        for field in &mut self.fields[first..] {
            field.actual_path = match index {
                Some(index) => field
                    .actual_path
                    .take()
                    .map(|path| path.with_index_at(depth, index)),
                None => None,
            };
        }
    }

    fn mismatch(&mut self, path: &FieldPath, side: &str, expected: &str, found: &Value) {
        let error = EvalError::StructuralMismatch {
            path: path.display(),
            expected: expected.to_string(),
            found: value_kind(found).to_string(),
        };
        warn!(side, error = %error, "value treated as absent");
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::StructuralMismatch,
            path.display(),
            format!("{side} side: {error}; treated as absent"),
        ));
    }
}

pub struct TreeFlattener<'a> {
    resolver: AttributeConfigResolver<'a>,
    aligner: &'a dyn ItemAligner,
}

impl<'a> TreeFlattener<'a> {
    pub fn new(resolver: AttributeConfigResolver<'a>, aligner: &'a dyn ItemAligner) -> Self {
        Self { resolver, aligner }
    }

    /// Flattens a whole section after removing envelope keys.
    pub fn flatten(
        &self,
        attributes: &[AttributeSpec],
        actual: Option<&Value>,
        expected: Option<&Value>,
    ) -> FlattenedTree {
        let envelope_keys = &self.resolver.settings().envelope_keys;
        let actual = actual.map(|value| unwrap_envelope(value, envelope_keys));
        let expected = expected.map(|value| unwrap_envelope(value, envelope_keys));

        let mut tree = FlattenedTree::default();
        let root = FieldPath::root();
        let actual = object_side(&mut tree, &root, "actual", actual);
        let expected = object_side(&mut tree, &root, "expected", expected);
        self.walk_object(&mut tree, attributes, None, None, &root, actual, expected);
        tree
    }

    /// Flattens one list item pair under `path` using the item template.
    pub fn flatten_item(
        &self,
        context: ListContext<'_>,
        path: &FieldPath,
        actual: Option<&Value>,
        expected: Option<&Value>,
    ) -> FlattenedTree {
        let mut tree = FlattenedTree::default();
        self.walk_item(&mut tree, context, path, actual, expected);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_object(
        &self,
        tree: &mut FlattenedTree,
        attributes: &[AttributeSpec],
        inherited: Option<EvaluationMethod>,
        root_type: Option<AttributeType>,
        prefix: &FieldPath,
        actual: Option<&Map<String, Value>>,
        expected: Option<&Map<String, Value>>,
    ) {
        for attribute in attributes {
            let actual_value = actual.and_then(|object| object.get(&attribute.name));
            let expected_value = expected.and_then(|object| object.get(&attribute.name));
            let root_type = root_type.unwrap_or(attribute.attribute_type);
            self.walk_declared(
                tree,
                attribute,
                inherited,
                root_type,
                prefix,
                actual_value,
                expected_value,
            );
        }

        let declared = attributes
            .iter()
            .map(|attribute| attribute.name.as_str())
            .collect::<BTreeSet<&str>>();
        let undeclared = actual
            .into_iter()
            .chain(expected)
            .flat_map(|object| object.keys())
            .map(String::as_str)
            .filter(|key| !declared.contains(key))
            .collect::<BTreeSet<&str>>();

        for key in undeclared {
            let path = prefix.child(key);
            debug!(path = %path, "attribute not declared in configuration");
            tree.diagnostics.push(Diagnostic::new(
                DiagnosticKind::Discovery,
                path.display(),
                "attribute not declared in configuration; default method applied",
            ));
            self.walk_discovered(
                tree,
                root_type,
                &path,
                actual.and_then(|object| object.get(key)),
                expected.and_then(|object| object.get(key)),
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_declared(
        &self,
        tree: &mut FlattenedTree,
        attribute: &AttributeSpec,
        inherited: Option<EvaluationMethod>,
        root_type: AttributeType,
        prefix: &FieldPath,
        actual: Option<&Value>,
        expected: Option<&Value>,
    ) {
        let path = prefix.child(&attribute.name);
        match attribute.attribute_type {
            AttributeType::Simple => {
                let actual = scalar_side(tree, &path, "actual", actual);
                let expected = scalar_side(tree, &path, "expected", expected);
                tree.push(FlattenedField {
                    attribute: self.resolver.resolve_declared(attribute, inherited, root_type),
                    actual_path: Some(path.clone()),
                    path,
                    actual: actual.cloned(),
                    expected: expected.cloned(),
                });
            }
            AttributeType::Group => {
                let actual = object_side(tree, &path, "actual", actual);
                let expected = object_side(tree, &path, "expected", expected);
                self.walk_object(
                    tree,
                    &attribute.group_attributes,
                    inherited,
                    Some(root_type),
                    &path,
                    actual,
                    expected,
                );
            }
            AttributeType::List => {
                let actual = array_side(tree, &path, "actual", actual);
                let expected = array_side(tree, &path, "expected", expected);
                let context = ListContext {
                    path: &path,
                    spec: attribute,
                    root_type,
                };
                let hungarian = attribute.evaluation_method == Some(EvaluationMethod::Hungarian);
                let alignment = if hungarian {
                    self.aligner.align(self, context, actual, expected)
                } else {
                    Alignment {
                        pairs: positional_pairs(actual.len(), expected.len()),
                        summary: None,
                        diagnostics: Vec::new(),
                    }
                };

                let depth = path.segments().len();
                for (position, (actual_index, expected_index)) in
                    alignment.pairs.iter().enumerate()
                {
                    let item_path = path.index(position);
                    let first = tree.fields.len();
                    self.walk_item(
                        tree,
                        context,
                        &item_path,
                        actual_index.and_then(|index| actual.get(index)),
                        expected_index.and_then(|index| expected.get(index)),
                    );
                    tree.relocate_actual(first, depth, *actual_index);
                }
                tree.diagnostics.extend(alignment.diagnostics);
                if let Some(summary) = alignment.summary {
                    tree.list_matches.push(summary);
                }
            }
        }
    }

    fn walk_item(
        &self,
        tree: &mut FlattenedTree,
        context: ListContext<'_>,
        path: &FieldPath,
        actual: Option<&Value>,
        expected: Option<&Value>,
    ) {
        let actual = object_side(tree, path, "actual", actual);
        let expected = object_side(tree, path, "expected", expected);
        self.walk_object(
            tree,
            context.spec.item_attributes(),
            context.spec.hungarian_comparator,
            Some(context.root_type),
            path,
            actual,
            expected,
        );
    }

    fn walk_discovered(
        &self,
        tree: &mut FlattenedTree,
        root_type: Option<AttributeType>,
        path: &FieldPath,
        actual: Option<&Value>,
        expected: Option<&Value>,
    ) {
        let shape = discovered_shape(actual, expected);
        let root_type = root_type.unwrap_or(shape);
        match shape {
            AttributeType::Group => {
                let actual = object_side(tree, path, "actual", actual);
                let expected = object_side(tree, path, "expected", expected);
                self.walk_object(tree, &[], None, Some(root_type), path, actual, expected);
            }
            AttributeType::List => {
                let actual = array_side(tree, path, "actual", actual);
                let expected = array_side(tree, path, "expected", expected);
                for (position, (actual_index, expected_index)) in
                    positional_pairs(actual.len(), expected.len()).into_iter().enumerate()
                {
                    self.walk_discovered(
                        tree,
                        Some(root_type),
                        &path.index(position),
                        actual_index.and_then(|index| actual.get(index)),
                        expected_index.and_then(|index| expected.get(index)),
                    );
                }
            }
            AttributeType::Simple => {
                let name = path.leaf_name().unwrap_or_default().to_string();
                tree.push(FlattenedField {
                    attribute: self.resolver.resolve_discovered(&name, root_type),
                    actual_path: Some(path.clone()),
                    path: path.clone(),
                    actual: actual.cloned(),
                    expected: expected.cloned(),
                });
            }
        }
    }
}

/// Strips single-key wrapper objects such as `{"inference_result": {...}}`.
pub fn unwrap_envelope<'v>(value: &'v Value, envelope_keys: &[String]) -> &'v Value {
    let mut current = value;
    while let Value::Object(object) = current
        && object.len() == 1
        && let Some((key, inner)) = object.iter().next()
        && envelope_keys.iter().any(|envelope| envelope == key)
    {
        current = inner;
    }
    current
}

fn discovered_shape(actual: Option<&Value>, expected: Option<&Value>) -> AttributeType {
    let sides = [actual, expected];
    if sides.iter().flatten().any(|value| value.is_object()) {
        AttributeType::Group
    } else if sides.iter().flatten().any(|value| value.is_array()) {
        AttributeType::List
    } else {
        AttributeType::Simple
    }
}

fn scalar_side<'v>(
    tree: &mut FlattenedTree,
    path: &FieldPath,
    side: &str,
    value: Option<&'v Value>,
) -> Option<&'v Value> {
    match value {
        Some(found @ (Value::Object(_) | Value::Array(_))) => {
            tree.mismatch(path, side, "a scalar", found);
            None
        }
        other => other,
    }
}

fn object_side<'v>(
    tree: &mut FlattenedTree,
    path: &FieldPath,
    side: &str,
    value: Option<&'v Value>,
) -> Option<&'v Map<String, Value>> {
    match value {
        Some(Value::Object(object)) => Some(object),
        Some(found) if !is_absent(Some(found)) => {
            tree.mismatch(path, side, "an object", found);
            None
        }
        _ => None,
    }
}

fn array_side<'v>(
    tree: &mut FlattenedTree,
    path: &FieldPath,
    side: &str,
    value: Option<&'v Value>,
) -> &'v [Value] {
    match value {
        Some(Value::Array(items)) => items.as_slice(),
        Some(found) if !is_absent(Some(found)) => {
            tree.mismatch(path, side, "a list", found);
            &[]
        }
        _ => &[],
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorSettings;
    use serde_json::json;

    fn invoice_attributes() -> Vec<AttributeSpec> {
        vec![
            AttributeSpec::simple("InvoiceNumber", EvaluationMethod::Exact),
            AttributeSpec::group(
                "Vendor",
                vec![
                    AttributeSpec::simple("Name", EvaluationMethod::Fuzzy),
                    AttributeSpec::simple("Address", EvaluationMethod::Exact),
                ],
            ),
            AttributeSpec::list(
                "Lines",
                None,
                vec![
                    AttributeSpec::simple("Sku", EvaluationMethod::Exact),
                    AttributeSpec::simple("Price", EvaluationMethod::NumericExact),
                ],
            ),
        ]
    }

    fn flatten_with(
        settings: &EvaluatorSettings,
        attributes: &[AttributeSpec],
        actual: &Value,
        expected: &Value,
    ) -> FlattenedTree {
        let flattener =
            TreeFlattener::new(AttributeConfigResolver::new(settings), &PositionalAligner);
        flattener.flatten(attributes, Some(actual), Some(expected))
    }

    #[test]
    fn flattens_groups_and_lists_in_declaration_order() {
        let settings = EvaluatorSettings::default();
        let actual = json!({
            "InvoiceNumber": "INV-1",
            "Vendor": {"Name": "Acme"},
            "Lines": [{"Sku": "A", "Price": "1"}, {"Sku": "B", "Price": "2"}]
        });
        let expected = json!({
            "InvoiceNumber": "INV-1",
            "Vendor": {"Name": "Acme", "Address": "1 Road"},
            "Lines": [{"Sku": "A", "Price": "1"}]
        });

        let tree = flatten_with(&settings, &invoice_attributes(), &actual, &expected);
        assert_eq!(
            tree.paths(),
            vec![
                "InvoiceNumber",
                "Vendor.Name",
                "Vendor.Address",
                "Lines[0].Sku",
                "Lines[0].Price",
                "Lines[1].Sku",
                "Lines[1].Price",
            ]
        );

        let extra = tree.get("Lines[1].Sku").expect("second item flattened");
        assert_eq!(extra.actual, Some(json!("B")));
        assert!(extra.expected.is_none());
        assert_eq!(extra.path.tracking_key(), "Lines.Sku");
        assert_eq!(extra.attribute.root_type, AttributeType::List);
    }

    #[test]
    fn flattening_is_idempotent() {
        let settings = EvaluatorSettings::default();
        let actual = json!({"Vendor": {"Name": "Acme"}, "Zeta": 1, "Alpha": {"b": 2, "a": 1}});
        let expected = json!({"InvoiceNumber": "X", "Lines": [{"Sku": "A"}]});

        let first = flatten_with(&settings, &invoice_attributes(), &actual, &expected);
        let second = flatten_with(&settings, &invoice_attributes(), &actual, &expected);
        assert_eq!(first.paths(), second.paths());
        assert_eq!(first.fields(), second.fields());
    }

    #[test]
    fn missing_group_still_emits_children() {
        let settings = EvaluatorSettings::default();
        let tree = flatten_with(
            &settings,
            &invoice_attributes(),
            &json!({}),
            &json!({"Vendor": {"Name": "Acme"}}),
        );
        let name = tree.get("Vendor.Name").expect("child emitted");
        assert!(name.actual.is_none());
        assert_eq!(name.expected, Some(json!("Acme")));
        assert!(tree.get("Vendor.Address").is_some());
    }

    #[test]
    fn undeclared_attributes_are_discovered_after_declared_ones() {
        let settings = EvaluatorSettings::default();
        let attributes = vec![AttributeSpec::simple("Amount", EvaluationMethod::NumericExact)];
        let tree = flatten_with(
            &settings,
            &attributes,
            &json!({"Amount": "1", "Notes": "x", "Meta": {"Pages": 2}, "Tags": ["a", "b"]}),
            &json!({"Amount": "1", "Notes": "y"}),
        );

        assert_eq!(
            tree.paths(),
            vec!["Amount", "Meta.Pages", "Notes", "Tags[0]", "Tags[1]"]
        );
        let notes = tree.get("Notes").expect("discovered leaf");
        assert!(notes.attribute.discovered);
        assert_eq!(notes.attribute.method, EvaluationMethod::Llm);
        assert_eq!(
            tree.get("Meta.Pages").map(|field| field.attribute.root_type),
            Some(AttributeType::Group)
        );
        assert!(
            tree.diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::Discovery && d.path == "Notes")
        );
    }

    #[test]
    fn list_holding_scalar_is_treated_as_absent() {
        let settings = EvaluatorSettings::default();
        let tree = flatten_with(
            &settings,
            &invoice_attributes(),
            &json!({"Lines": "not a list"}),
            &json!({"Lines": [{"Sku": "A", "Price": "3"}]}),
        );

        let sku = tree.get("Lines[0].Sku").expect("expected item still flattened");
        assert!(sku.actual.is_none());
        assert!(
            tree.diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::StructuralMismatch && d.path == "Lines")
        );
    }

    #[test]
    fn envelope_keys_are_not_part_of_paths() {
        let settings = EvaluatorSettings::default();
        let attributes = vec![AttributeSpec::simple("Amount", EvaluationMethod::NumericExact)];
        let tree = flatten_with(
            &settings,
            &attributes,
            &json!({"inference_result": {"Amount": "1"}}),
            &json!({"Amount": "1"}),
        );
        assert_eq!(tree.paths(), vec!["Amount"]);
        assert_eq!(tree.fields()[0].actual, Some(json!("1")));
    }
}
