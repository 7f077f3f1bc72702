//! Typed JSON-Schema tree used for tool parameter contracts.
//!
//! Tool schemas arrive and leave as `serde_json::Value`, but every transform
//! in the workspace operates on [`SchemaNode`]: a node shape (`SchemaKind`)
//! plus the handful of keywords that matter for compatibility, with every
//! other keyword carried through verbatim in `keywords`.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Union combinator keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    AnyOf,
    OneOf,
    AllOf,
}

impl Combinator {
    pub const ALL: [Combinator; 3] = [Combinator::AnyOf, Combinator::OneOf, Combinator::AllOf];

    pub fn keyword(&self) -> &'static str {
        match self {
            Combinator::AnyOf => "anyOf",
            Combinator::OneOf => "oneOf",
            Combinator::AllOf => "allOf",
        }
    }
}

/// Shape of a schema node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SchemaKind {
    Object {
        /// Property definitions in declaration order.
        properties: IndexMap<String, SchemaNode>,
        required: Vec<String>,
    },
    Array {
        items: Option<Box<SchemaNode>>,
    },
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Union {
        combinator: Combinator,
        variants: Vec<SchemaNode>,
    },
    /// A `$ref` pointer, e.g. `#/$defs/Target`.
    Ref(String),
    /// No declared type (`{}`, `{ "const": 1 }`, boolean schemas).
    #[default]
    Any,
}

impl SchemaKind {
    /// The JSON-Schema `type` name for primitive and container kinds.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            SchemaKind::Object { .. } => Some("object"),
            SchemaKind::Array { .. } => Some("array"),
            SchemaKind::String => Some("string"),
            SchemaKind::Number => Some("number"),
            SchemaKind::Integer => Some("integer"),
            SchemaKind::Boolean => Some("boolean"),
            SchemaKind::Null => Some("null"),
            SchemaKind::Union { .. } | SchemaKind::Ref(_) | SchemaKind::Any => None,
        }
    }

    /// Scalar kind for a `type` name. Containers are not covered.
    pub fn scalar(type_name: &str) -> Option<SchemaKind> {
        match type_name {
            "string" => Some(SchemaKind::String),
            "number" => Some(SchemaKind::Number),
            "integer" => Some(SchemaKind::Integer),
            "boolean" => Some(SchemaKind::Boolean),
            "null" => Some(SchemaKind::Null),
            _ => None,
        }
    }
}

/// One node of a tool parameter schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub description: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    /// Local definition registry (`$defs` / `definitions`).
    pub definitions: IndexMap<String, SchemaNode>,
    /// Every other keyword, kept in source order.
    pub keywords: Map<String, Value>,
}

/// Keywords consumed into typed fields when parsing.
const TYPED_KEYWORDS: &[&str] = &[
    "type",
    "description",
    "enum",
    "const",
    "properties",
    "required",
    "items",
    "$ref",
    "$defs",
    "definitions",
];

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn string(description: &str) -> Self {
        Self::new(SchemaKind::String).with_description(description)
    }

    pub fn integer(description: &str) -> Self {
        Self::new(SchemaKind::Integer).with_description(description)
    }

    pub fn boolean(description: &str) -> Self {
        Self::new(SchemaKind::Boolean).with_description(description)
    }

    pub fn string_enum(values: &[&str], description: &str) -> Self {
        let mut node = Self::string(description);
        node.enum_values = Some(values.iter().map(|v| Value::from(*v)).collect());
        node
    }

    /// Object node from `(name, schema)` pairs.
    pub fn object<I>(properties: I, required: &[&str]) -> Self
    where
        I: IntoIterator<Item = (&'static str, SchemaNode)>,
    {
        Self::new(SchemaKind::Object {
            properties: properties
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
            required: required.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Object node with no properties.
    pub fn empty_object() -> Self {
        Self::new(SchemaKind::Object {
            properties: IndexMap::new(),
            required: Vec::new(),
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn properties(&self) -> Option<&IndexMap<String, SchemaNode>> {
        match &self.kind {
            SchemaKind::Object { properties, .. } => Some(properties),
            _ => None,
        }
    }

    pub fn required(&self) -> &[String] {
        match &self.kind {
            SchemaKind::Object { required, .. } => required,
            _ => &[],
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, SchemaKind::Object { .. })
    }

    /// Parse a JSON value into a schema tree. Never fails: anything that is
    /// not a JSON object becomes an untyped node.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };

        if let Some(Value::Array(types)) = map.get("type") {
            return Self::from_type_list(map, types);
        }

        let mut node = Self {
            description: map
                .get("description")
                .and_then(|v| v.as_str())
                .map(String::from),
            enum_values: map.get("enum").and_then(|v| v.as_array()).cloned(),
            const_value: map.get("const").cloned(),
            ..Default::default()
        };

        for key in ["$defs", "definitions"] {
            if let Some(Value::Object(defs)) = map.get(key) {
                for (name, def) in defs {
                    node.definitions
                        .entry(name.clone())
                        .or_insert_with(|| Self::from_value(def));
                }
            }
        }

        let union = Combinator::ALL.into_iter().find_map(|combinator| {
            map.get(combinator.keyword())
                .and_then(|v| v.as_array())
                .map(|variants| (combinator, variants))
        });
        let type_name = map.get("type").and_then(|v| v.as_str());

        let mut consumed: Vec<&str> = TYPED_KEYWORDS.to_vec();
        node.kind = if let Some(target) = map.get("$ref").and_then(|v| v.as_str()) {
            SchemaKind::Ref(target.to_string())
        } else if let Some((combinator, variants)) = union {
            // A `type` alongside a combinator stays a plain keyword.
            consumed.retain(|k| *k != "type");
            consumed.push(combinator.keyword());
            SchemaKind::Union {
                combinator,
                variants: variants.iter().map(Self::from_value).collect(),
            }
        } else {
            match type_name {
                Some("object") => Self::object_kind(map),
                Some("array") => Self::array_kind(map),
                Some(other) => match SchemaKind::scalar(other) {
                    Some(kind) => kind,
                    None => {
                        consumed.retain(|k| *k != "type");
                        SchemaKind::Any
                    }
                },
                None if map.contains_key("properties") => Self::object_kind(map),
                None if map.get("items").is_some_and(|v| v.is_object()) => Self::array_kind(map),
                None => SchemaKind::Any,
            }
        };

        // Tuple-style `items` arrays are not modelled; keep them verbatim.
        if map.get("items").is_some_and(|v| v.is_array()) {
            consumed.retain(|k| *k != "items");
        }

        node.keywords = map
            .iter()
            .filter(|(k, _)| !consumed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        node
    }

    /// `"type": ["string", "null"]` becomes an `anyOf` with one variant per type.
    fn from_type_list(map: &Map<String, Value>, types: &[Value]) -> Self {
        let names: Vec<&str> = types.iter().filter_map(|t| t.as_str()).collect();
        let variant_for = |name: &str| {
            let mut single = map.clone();
            single.insert("type".into(), Value::from(name));
            Self::from_value(&Value::Object(single))
        };
        match names.as_slice() {
            [] => {
                let mut untyped = map.clone();
                untyped.remove("type");
                Self::from_value(&Value::Object(untyped))
            }
            [only] => variant_for(only),
            _ => Self::new(SchemaKind::Union {
                combinator: Combinator::AnyOf,
                variants: names
                    .iter()
                    .map(|name| {
                        if *name == "null" {
                            Self::new(SchemaKind::Null)
                        } else {
                            variant_for(name)
                        }
                    })
                    .collect(),
            }),
        }
    }

    fn object_kind(map: &Map<String, Value>) -> SchemaKind {
        let properties = map
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_value(v)))
                    .collect()
            })
            .unwrap_or_default();
        let mut required: Vec<String> = Vec::new();
        for name in map
            .get("required")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
        {
            if !required.iter().any(|r| r == name) {
                required.push(name.to_string());
            }
        }
        SchemaKind::Object {
            properties,
            required,
        }
    }

    fn array_kind(map: &Map<String, Value>) -> SchemaKind {
        SchemaKind::Array {
            items: map
                .get("items")
                .filter(|v| v.is_object())
                .map(|v| Box::new(Self::from_value(v))),
        }
    }

    /// Render the node back to JSON.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(type_name) = self.kind.type_name() {
            map.insert("type".into(), Value::from(type_name));
        }
        if let Some(description) = &self.description {
            map.insert("description".into(), Value::from(description.as_str()));
        }
        match &self.kind {
            SchemaKind::Object {
                properties,
                required,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect();
                map.insert("properties".into(), Value::Object(props));
                if !required.is_empty() {
                    map.insert(
                        "required".into(),
                        Value::Array(required.iter().map(|r| Value::from(r.as_str())).collect()),
                    );
                }
            }
            SchemaKind::Array { items: Some(items) } => {
                map.insert("items".into(), items.to_value());
            }
            SchemaKind::Union {
                combinator,
                variants,
            } => {
                map.insert(
                    combinator.keyword().into(),
                    Value::Array(variants.iter().map(Self::to_value).collect()),
                );
            }
            SchemaKind::Ref(target) => {
                map.insert("$ref".into(), Value::from(target.as_str()));
            }
            _ => {}
        }
        if let Some(values) = &self.enum_values {
            map.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(value) = &self.const_value {
            map.insert("const".into(), value.clone());
        }
        if !self.definitions.is_empty() {
            let defs: Map<String, Value> = self
                .definitions
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect();
            map.insert("$defs".into(), Value::Object(defs));
        }
        for (key, value) in &self.keywords {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(map)
    }

    /// Visit this node and every nested node, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a SchemaNode)) {
        visit(self);
        match &self.kind {
            SchemaKind::Object { properties, .. } => {
                for child in properties.values() {
                    child.walk(visit);
                }
            }
            SchemaKind::Array { items: Some(items) } => items.walk(visit),
            SchemaKind::Union { variants, .. } => {
                for variant in variants {
                    variant.walk(visit);
                }
            }
            _ => {}
        }
        for def in self.definitions.values() {
            def.walk(visit);
        }
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}
