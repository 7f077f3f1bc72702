//! Provider compatibility normalization for tool parameter schemas.
//!
//! `clean_schema` runs, in order:
//! 1. `$ref` inlining from the local definition registries (which are then dropped)
//! 2. literal-union flattening into `{ type, enum }`
//! 3. null-variant pruning for `anyOf`/`oneOf` with a single non-null variant
//! 4. keyword stripping and residual union collapse for [`SchemaTarget::Strict`]
//!
//! Passes 2-4 run bottom-up over the whole tree. Cleaning never fails and
//! never mutates its input.

use indexmap::IndexMap;
use serde_json::Value;

use toolgate_config::SchemaConfig;
use toolgate_types::{Combinator, SchemaKind, SchemaNode};

/// Keywords removed for strict targets.
pub const STRIPPED_KEYWORDS: &[&str] = &[
    // structural
    "patternProperties",
    "additionalProperties",
    "$schema",
    "$id",
    "definitions",
    // validation-only
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "multipleOf",
    "pattern",
    "format",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
];

/// Schema compatibility class of a model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaTarget {
    /// Accepts `anyOf`/`oneOf`/`$ref` and the full validation vocabulary.
    Tolerant,
    /// Rejects unions and anything outside a small keyword set.
    Strict,
}

impl SchemaTarget {
    /// Compatibility class of `provider` under the configured provider list.
    pub fn for_provider(provider: &str, config: &SchemaConfig) -> Self {
        let provider = provider.trim();
        if config
            .strict_providers
            .iter()
            .any(|p| p.trim().eq_ignore_ascii_case(provider))
        {
            SchemaTarget::Strict
        } else {
            SchemaTarget::Tolerant
        }
    }
}

/// Normalize `schema` for `target`.
pub fn clean_schema(schema: &SchemaNode, target: SchemaTarget) -> SchemaNode {
    let mut registry = IndexMap::new();
    collect_definitions(schema, &mut registry);
    let inlined = inline_refs(schema, &registry, &mut Vec::new());
    clean_node(inlined, target)
}

// ──────────────────── Pass 1: $ref inlining ────────────────────

fn collect_definitions(node: &SchemaNode, registry: &mut IndexMap<String, SchemaNode>) {
    node.walk(&mut |n| {
        for (name, def) in &n.definitions {
            registry
                .entry(name.clone())
                .or_insert_with(|| def.clone());
        }
    });
}

fn local_ref_name(target: &str) -> Option<&str> {
    target
        .strip_prefix("#/$defs/")
        .or_else(|| target.strip_prefix("#/definitions/"))
}

/// Copy of `node` with every resolvable local `$ref` replaced by its target
/// and all definition registries removed. `active` guards against cycles.
fn inline_refs(
    node: &SchemaNode,
    registry: &IndexMap<String, SchemaNode>,
    active: &mut Vec<String>,
) -> SchemaNode {
    if let SchemaKind::Ref(target) = &node.kind {
        let resolved = local_ref_name(target)
            .filter(|name| !active.iter().any(|a| a == name))
            .and_then(|name| registry.get(name).map(|def| (name, def)));
        return match resolved {
            Some((name, def)) => {
                active.push(name.to_string());
                let mut inlined = inline_refs(def, registry, active);
                active.pop();
                merge_site(&mut inlined, node);
                inlined
            }
            None => {
                // External, missing, or recursive reference: degrade to an untyped node.
                tracing::debug!("Dropping unresolvable schema reference {target}");
                SchemaNode {
                    kind: SchemaKind::Any,
                    description: node.description.clone(),
                    keywords: node.keywords.clone(),
                    ..Default::default()
                }
            }
        };
    }

    let kind = match &node.kind {
        SchemaKind::Object {
            properties,
            required,
        } => SchemaKind::Object {
            properties: properties
                .iter()
                .map(|(k, v)| (k.clone(), inline_refs(v, registry, active)))
                .collect(),
            required: required.clone(),
        },
        SchemaKind::Array { items } => SchemaKind::Array {
            items: items
                .as_ref()
                .map(|i| Box::new(inline_refs(i, registry, active))),
        },
        SchemaKind::Union {
            combinator,
            variants,
        } => SchemaKind::Union {
            combinator: *combinator,
            variants: variants
                .iter()
                .map(|v| inline_refs(v, registry, active))
                .collect(),
        },
        other => other.clone(),
    };
    SchemaNode {
        kind,
        description: node.description.clone(),
        enum_values: node.enum_values.clone(),
        const_value: node.const_value.clone(),
        definitions: IndexMap::new(),
        keywords: node.keywords.clone(),
    }
}

/// Annotations written at a use site win over the ones on the replacement.
fn merge_site(target: &mut SchemaNode, site: &SchemaNode) {
    if site.description.is_some() {
        target.description = site.description.clone();
    }
    for (key, value) in &site.keywords {
        target.keywords.insert(key.clone(), value.clone());
    }
}

// ──────────────────── Passes 2-4 ────────────────────

fn clean_node(node: SchemaNode, target: SchemaTarget) -> SchemaNode {
    let SchemaNode {
        kind,
        description,
        enum_values,
        const_value,
        definitions: _,
        keywords,
    } = node;

    let kind = match kind {
        SchemaKind::Object {
            properties,
            required,
        } => SchemaKind::Object {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k, clean_node(v, target)))
                .collect(),
            required,
        },
        SchemaKind::Array { items } => SchemaKind::Array {
            items: items.map(|i| Box::new(clean_node(*i, target))),
        },
        SchemaKind::Union {
            combinator,
            variants,
        } => SchemaKind::Union {
            combinator,
            variants: variants.into_iter().map(|v| clean_node(v, target)).collect(),
        },
        other => other,
    };

    let mut node = SchemaNode {
        kind,
        description,
        enum_values,
        const_value,
        definitions: IndexMap::new(),
        keywords,
    };

    if let Some(flat) = flatten_literal_union(&node) {
        node = flat;
    }
    if let Some(pruned) = prune_null_variant(&node) {
        node = pruned;
    }
    if target == SchemaTarget::Strict {
        if let Some(collapsed) = collapse_union(&node) {
            node = collapsed;
        }
        node.keywords
            .retain(|key, _| !STRIPPED_KEYWORDS.contains(&key.as_str()));
    }
    node
}

fn literal_type(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("integer"),
        Value::Number(_) => Some("number"),
        _ => None,
    }
}

/// `integer` literals widen to `number` when mixed with floats.
fn unify_types(a: &'static str, b: &'static str) -> Option<&'static str> {
    match (a, b) {
        _ if a == b => Some(a),
        ("integer", "number") | ("number", "integer") => Some("number"),
        _ => None,
    }
}

/// Literal values and their shared type, if `variant` is a pure literal.
fn variant_literals(variant: &SchemaNode) -> Option<(&'static str, Vec<Value>)> {
    let mut literals: Vec<Value> = Vec::new();
    if let Some(value) = &variant.const_value {
        literals.push(value.clone());
    }
    if let Some(values) = &variant.enum_values {
        literals.extend(values.iter().cloned());
    }
    if literals.is_empty() {
        return None;
    }

    let mut ty = literal_type(&literals[0])?;
    for literal in &literals[1..] {
        ty = unify_types(ty, literal_type(literal)?)?;
    }
    match &variant.kind {
        SchemaKind::Any => Some((ty, literals)),
        kind => {
            let declared = kind.type_name()?;
            let ty = unify_types(declared, ty)?;
            // A declared `integer` cannot absorb float literals.
            (ty == declared || declared == "number").then_some((declared, literals))
        }
    }
}

/// Pass 2: `anyOf`/`oneOf` of same-typed literals becomes `{ type, enum }`.
fn flatten_literal_union(node: &SchemaNode) -> Option<SchemaNode> {
    let SchemaKind::Union {
        combinator: Combinator::AnyOf | Combinator::OneOf,
        variants,
    } = &node.kind
    else {
        return None;
    };
    if variants.is_empty() {
        return None;
    }

    let mut ty: Option<&'static str> = None;
    let mut values: Vec<Value> = Vec::new();
    for variant in variants {
        let (variant_ty, literals) = variant_literals(variant)?;
        ty = Some(match ty {
            Some(current) => unify_types(current, variant_ty)?,
            None => variant_ty,
        });
        for literal in literals {
            if !values.contains(&literal) {
                values.push(literal);
            }
        }
    }

    let mut keywords = node.keywords.clone();
    keywords.remove("type");
    Some(SchemaNode {
        kind: SchemaKind::scalar(ty?)?,
        description: node
            .description
            .clone()
            .or_else(|| variants.iter().find_map(|v| v.description.clone())),
        enum_values: Some(values),
        const_value: None,
        definitions: IndexMap::new(),
        keywords,
    })
}

/// Pass 3: `anyOf: [X, {type: null}]` becomes `X`.
fn prune_null_variant(node: &SchemaNode) -> Option<SchemaNode> {
    let SchemaKind::Union {
        combinator: Combinator::AnyOf | Combinator::OneOf,
        variants,
    } = &node.kind
    else {
        return None;
    };
    let has_null = variants.iter().any(|v| v.kind == SchemaKind::Null);
    let mut non_null = variants.iter().filter(|v| v.kind != SchemaKind::Null);
    let (Some(only), None) = (non_null.next(), non_null.next()) else {
        return None;
    };
    if !has_null {
        return None;
    }
    Some(fold_into(only.clone(), node))
}

/// Carry the union node's own annotations onto the variant replacing it.
fn fold_into(mut variant: SchemaNode, union: &SchemaNode) -> SchemaNode {
    if variant.description.is_none() {
        variant.description = union.description.clone();
    }
    for (key, value) in &union.keywords {
        if key != "type" && !variant.keywords.contains_key(key) {
            variant.keywords.insert(key.clone(), value.clone());
        }
    }
    variant
}

/// Strict targets cannot express unions that passes 2-3 left in place.
///
/// `allOf` over objects merges their properties. Otherwise null variants
/// are dropped, same-typed literals still flatten to an enum, and anything
/// else keeps its first non-null variant.
fn collapse_union(node: &SchemaNode) -> Option<SchemaNode> {
    let SchemaKind::Union {
        combinator,
        variants,
    } = &node.kind
    else {
        return None;
    };

    if *combinator == Combinator::AllOf
        && !variants.is_empty()
        && variants.iter().all(|v| v.is_object())
    {
        let mut merged: IndexMap<String, SchemaNode> = IndexMap::new();
        let mut required: Vec<String> = Vec::new();
        for variant in variants {
            if let SchemaKind::Object {
                properties,
                required: variant_required,
            } = &variant.kind
            {
                for (name, prop) in properties {
                    merged.entry(name.clone()).or_insert_with(|| prop.clone());
                }
                for name in variant_required {
                    if !required.contains(name) {
                        required.push(name.clone());
                    }
                }
            }
        }
        let object = SchemaNode::new(SchemaKind::Object {
            properties: merged,
            required,
        });
        return Some(fold_into(object, node));
    }

    let non_null: Vec<SchemaNode> = variants
        .iter()
        .filter(|v| v.kind != SchemaKind::Null)
        .cloned()
        .collect();

    // An optional literal set keeps every literal once its null is gone.
    if non_null.len() > 1 && *combinator != Combinator::AllOf {
        let without_null = SchemaNode {
            kind: SchemaKind::Union {
                combinator: *combinator,
                variants: non_null.clone(),
            },
            ..node.clone()
        };
        if let Some(flat) = flatten_literal_union(&without_null) {
            return Some(flat);
        }
    }

    let chosen = non_null
        .into_iter()
        .next()
        .or_else(|| variants.first().cloned())
        .unwrap_or_default();
    Some(fold_into(chosen, node))
}

/// True when no node in the tree carries a union, reference, or registry.
pub fn is_union_free(schema: &SchemaNode) -> bool {
    let mut clean = true;
    schema.walk(&mut |node| {
        if matches!(node.kind, SchemaKind::Union { .. } | SchemaKind::Ref(_))
            || !node.definitions.is_empty()
        {
            clean = false;
        }
    });
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clean(raw: Value, target: SchemaTarget) -> Value {
        clean_schema(&SchemaNode::from_value(&raw), target).to_value()
    }

    #[test]
    fn test_target_for_provider() {
        let config = SchemaConfig::default();
        assert_eq!(SchemaTarget::for_provider("Google", &config), SchemaTarget::Strict);
        assert_eq!(
            SchemaTarget::for_provider("google-gemini-cli", &config),
            SchemaTarget::Strict
        );
        assert_eq!(SchemaTarget::for_provider("openai", &config), SchemaTarget::Tolerant);
    }

    #[test]
    fn test_literal_union_flattens_to_enum() {
        let cleaned = clean(
            json!({
                "description": "mode",
                "anyOf": [
                    { "const": "fast" },
                    { "type": "string", "enum": ["slow", "fast"] },
                    { "const": "auto" }
                ]
            }),
            SchemaTarget::Tolerant,
        );
        assert_eq!(
            cleaned,
            json!({ "type": "string", "description": "mode", "enum": ["fast", "slow", "auto"] })
        );
    }

    #[test]
    fn test_mixed_literal_types_are_not_flattened() {
        let raw = json!({ "anyOf": [{ "const": "a" }, { "const": 1 }] });
        let cleaned = clean(raw.clone(), SchemaTarget::Tolerant);
        assert_eq!(cleaned, raw);
    }

    #[test]
    fn test_integer_and_number_literals_widen() {
        let cleaned = clean(
            json!({ "oneOf": [{ "const": 1 }, { "const": 2.5 }] }),
            SchemaTarget::Tolerant,
        );
        assert_eq!(cleaned, json!({ "type": "number", "enum": [1, 2.5] }));
    }

    #[test]
    fn test_nullable_variant_is_pruned() {
        let cleaned = clean(
            json!({
                "type": "object",
                "properties": {
                    "label": {
                        "description": "optional label",
                        "anyOf": [{ "type": "string" }, { "type": "null" }]
                    }
                }
            }),
            SchemaTarget::Tolerant,
        );
        assert_eq!(
            cleaned["properties"]["label"],
            json!({ "type": "string", "description": "optional label" })
        );
    }

    #[test]
    fn test_type_list_with_null_is_pruned() {
        let cleaned = clean(json!({ "type": ["integer", "null"] }), SchemaTarget::Tolerant);
        assert_eq!(cleaned, json!({ "type": "integer" }));
    }

    #[test]
    fn test_multi_variant_union_is_preserved_for_tolerant_targets() {
        let raw = json!({ "oneOf": [{ "type": "string" }, { "type": "number" }] });
        assert_eq!(clean(raw.clone(), SchemaTarget::Tolerant), raw);

        let with_null = json!({
            "anyOf": [{ "type": "string" }, { "type": "number" }, { "type": "null" }]
        });
        assert_eq!(clean(with_null.clone(), SchemaTarget::Tolerant), with_null);
    }

    #[test]
    fn test_strict_target_collapses_residual_union() {
        let cleaned = clean(
            json!({ "oneOf": [{ "type": "string", "minLength": 1 }, { "type": "number" }] }),
            SchemaTarget::Strict,
        );
        assert_eq!(cleaned, json!({ "type": "string" }));
    }

    #[test]
    fn test_strict_target_keeps_every_literal_of_optional_enum() {
        let raw = json!({
            "anyOf": [{ "const": "low" }, { "const": "high" }, { "type": "null" }],
            "description": "Priority."
        });
        assert_eq!(
            clean(raw.clone(), SchemaTarget::Strict),
            json!({ "type": "string", "description": "Priority.", "enum": ["low", "high"] })
        );
        assert_eq!(clean(raw.clone(), SchemaTarget::Tolerant), raw);
    }

    #[test]
    fn test_strict_target_merges_all_of_objects() {
        let cleaned = clean(
            json!({
                "allOf": [
                    { "type": "object", "properties": { "a": { "type": "string" } }, "required": ["a"] },
                    { "type": "object", "properties": { "b": { "type": "boolean" } } }
                ]
            }),
            SchemaTarget::Strict,
        );
        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": { "a": { "type": "string" }, "b": { "type": "boolean" } },
                "required": ["a"]
            })
        );
    }

    #[test]
    fn test_refs_are_inlined_and_registry_dropped() {
        let cleaned = clean(
            json!({
                "type": "object",
                "properties": {
                    "target": { "$ref": "#/$defs/Target", "description": "where to go" },
                    "legacy": { "$ref": "#/definitions/Legacy" }
                },
                "$defs": {
                    "Target": {
                        "type": "object",
                        "properties": { "url": { "type": "string" } },
                        "required": ["url"]
                    }
                },
                "definitions": { "Legacy": { "type": "boolean" } }
            }),
            SchemaTarget::Tolerant,
        );
        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "object",
                        "description": "where to go",
                        "properties": { "url": { "type": "string" } },
                        "required": ["url"]
                    },
                    "legacy": { "type": "boolean" }
                }
            })
        );
    }

    #[test]
    fn test_recursive_ref_degrades() {
        let schema = SchemaNode::from_value(&json!({
            "$ref": "#/$defs/Node",
            "$defs": {
                "Node": {
                    "type": "object",
                    "properties": { "child": { "$ref": "#/$defs/Node" } }
                }
            }
        }));
        let cleaned = clean_schema(&schema, SchemaTarget::Tolerant);
        assert!(is_union_free(&cleaned));
        assert_eq!(cleaned.properties().unwrap()["child"].kind, SchemaKind::Any);
    }

    #[test]
    fn test_ref_to_literal_union_is_flattened_after_inlining() {
        let cleaned = clean(
            json!({
                "type": "object",
                "properties": { "level": { "$ref": "#/$defs/Level" } },
                "$defs": { "Level": { "oneOf": [{ "const": "low" }, { "const": "high" }] } }
            }),
            SchemaTarget::Tolerant,
        );
        assert_eq!(
            cleaned["properties"]["level"],
            json!({ "type": "string", "enum": ["low", "high"] })
        );
    }

    #[test]
    fn test_strict_target_strips_keywords_only() {
        let cleaned = clean(
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "name": { "type": "string", "minLength": 1, "pattern": "^a", "format": "email" },
                    "tags": { "type": "array", "items": { "type": "string", "maxLength": 4 }, "uniqueItems": true },
                    "kind": { "type": "string", "enum": ["a", "b"], "default": "a" }
                },
                "required": ["name"]
            }),
            SchemaTarget::Strict,
        );
        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "kind": { "type": "string", "enum": ["a", "b"], "default": "a" }
                },
                "required": ["name"]
            })
        );
    }

    #[test]
    fn test_tolerant_target_keeps_validation_keywords() {
        let raw = json!({
            "type": "object",
            "properties": { "n": { "type": "integer", "minimum": 0 } },
            "additionalProperties": false
        });
        assert_eq!(clean(raw.clone(), SchemaTarget::Tolerant), raw);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let raw = SchemaNode::from_value(&json!({
            "type": "object",
            "properties": {
                "a": { "anyOf": [{ "const": "x" }, { "const": "y" }] },
                "b": { "anyOf": [{ "$ref": "#/$defs/B" }, { "type": "null" }] },
                "c": { "oneOf": [{ "type": "string" }, { "type": "integer" }] },
                "d": { "type": "string", "pattern": "^d" }
            },
            "$defs": { "B": { "type": "array", "items": { "type": ["string", "null"] } } }
        }));
        for target in [SchemaTarget::Tolerant, SchemaTarget::Strict] {
            let once = clean_schema(&raw, target);
            let twice = clean_schema(&once, target);
            assert_eq!(once, twice, "not idempotent for {target:?}");
        }
    }

    #[test]
    fn test_clean_does_not_mutate_input() {
        let raw = SchemaNode::from_value(&json!({
            "anyOf": [{ "type": "string" }, { "type": "null" }],
            "$defs": { "X": { "type": "string" } }
        }));
        let before = raw.clone();
        let _ = clean_schema(&raw, SchemaTarget::Strict);
        assert_eq!(raw, before);
    }
}
