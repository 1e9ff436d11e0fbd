use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Value type of a slot. Determines which JSON values a `slot` event may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotKind {
    Text,
    Bool,
    Float {
        #[serde(default)]
        min_value: Option<f64>,
        #[serde(default)]
        max_value: Option<f64>,
    },
    List,
    /// One of a fixed set of string values (compared case-insensitively).
    Categorical { values: Vec<String> },
    /// Stores anything; never featurized.
    Any,
}

impl SlotKind {
    /// `null` is accepted by every kind and means "unset".
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;

        if value.is_null() {
            return true;
        }
        match self {
            Self::Text => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Float { .. } => value.is_number(),
            Self::List => value.is_array(),
            Self::Categorical { values } => match value {
                Value::String(s) => values.iter().any(|v| v.eq_ignore_ascii_case(s)),
                _ => false,
            },
            Self::Any => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Float { .. } => "float",
            Self::List => "list",
            Self::Categorical { .. } => "categorical",
            Self::Any => "any",
        }
    }
}

/// A named slot with its type and the value it holds before being set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlotDefinition {
    pub name: String,
    #[serde(flatten)]
    pub kind: SlotKind,
    #[serde(default)]
    pub initial_value: serde_json::Value,
}

impl SlotDefinition {
    pub fn new(name: impl Into<String>, kind: SlotKind) -> Self {
        Self {
            name: name.into(),
            kind,
            initial_value: serde_json::Value::Null,
        }
    }

    pub fn with_initial_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.initial_value = value.into();
        self
    }
}
