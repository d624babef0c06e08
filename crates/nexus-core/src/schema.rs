//! Schema description tree used for action input/output contracts.
//!
//! The shapes mirror the JSON-Schema subset agent definitions are authored
//! in; field names are preserved so existing definitions deserialize as-is.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Primitive type tag of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// UTF-8 string.
    String,
    /// Any JSON number.
    Number,
    /// Any JSON number; integral and floating values are both accepted.
    Integer,
    /// `true` / `false`.
    Boolean,
    /// JSON `null`.
    Null,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
        };
        f.write_str(name)
    }
}

/// `additionalProperties`: either a blanket allow/deny or a schema applied to
/// every key not listed in `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    /// `true` allows any extra key; `false` rejects all of them.
    Allowed(bool),
    /// Every extra key must satisfy this schema.
    Schema(Box<Property>),
}

/// Root of a schema document: an object description plus its `$defs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "$defs", default, skip_serializing_if = "HashMap::is_empty")]
    pub defs: HashMap<String, SchemaConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<serde_json::Value>,
}

impl SchemaConfig {
    /// An empty `object` schema.
    pub fn object() -> Self {
        Self {
            kind: Some(SchemaType::Object),
            ..Self::default()
        }
    }

    /// Add a property.
    pub fn with_property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Add a property and mark it required.
    pub fn with_required(mut self, name: impl Into<String>, property: Property) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, property);
        self
    }

    /// Add a `$defs` entry.
    pub fn with_def(mut self, name: impl Into<String>, def: SchemaConfig) -> Self {
        self.defs.insert(name.into(), def);
        self
    }

    /// True when the schema places no constraint at all (e.g. an action with
    /// no declared output contract).
    pub fn is_unconstrained(&self) -> bool {
        self.kind.is_none()
            && self.required.is_empty()
            && self.properties.is_empty()
            && self.additional_properties.is_none()
            && self.reference.is_none()
    }
}

/// A property node. Recursive through `items`, `properties` and the
/// combinators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<String>,
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Property>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<serde_json::Value>,
}

impl Property {
    /// A property of the given type with no further constraints.
    pub fn of(kind: SchemaType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Shorthand for a `string` property.
    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    /// Shorthand for a `number` property.
    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    /// Shorthand for an `integer` property.
    pub fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    /// Shorthand for a `boolean` property.
    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    /// An `array` whose elements satisfy `items`.
    pub fn array_of(items: Property) -> Self {
        Self {
            kind: Some(SchemaType::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// A property that only points at a `$defs` entry.
    pub fn reference(target: impl Into<String>) -> Self {
        Self {
            reference: Some(target.into()),
            ..Self::default()
        }
    }

    /// Restrict a string to the given values.
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    /// Require a string to match `pattern`.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Require a string to be of the named format.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Numeric bounds; `None` leaves a side open.
    pub fn with_bounds(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Array length bounds; `None` leaves a side open.
    pub fn with_item_bounds(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }
}
