use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    /// Integer `>= 0`: row counts and limits.
    Count,
    Number,
    Boolean,
    Enum(Vec<String>),
}

impl ParamKind {
    pub fn describe(&self) -> String {
        match self {
            Self::String => "a string".to_string(),
            Self::Integer => "an integer".to_string(),
            Self::Count => "a non-negative integer".to_string(),
            Self::Number => "a number".to_string(),
            Self::Boolean => "a boolean".to_string(),
            Self::Enum(allowed) => format!("one of [{}]", allowed.join(", ")),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Count => value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Enum(allowed) => value
                .as_str()
                .is_some_and(|s| allowed.iter().any(|a| a == s)),
        }
    }

    fn schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Count => json!({ "type": "integer", "minimum": 0 }),
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Enum(allowed) => json!({ "type": "string", "enum": allowed }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    /// JSON Schema object advertised to the model for this tool.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut schema = param.kind.schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".into(), Value::String(param.description.clone()));
            }
            properties.insert(param.name.clone(), schema);
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Outcome of one tool call, correlated with the model's request by
/// `call_id`. Failures are data: `payload` then holds `error` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub success: bool,
    pub payload: Value,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            payload,
        }
    }

    pub fn error(call_id: impl Into<String>, kind: &str, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            payload: json!({ "error": kind, "message": message.into() }),
        }
    }

    /// Attach an extra field to a failure payload, e.g. a list of valid
    /// names the model can pick from.
    pub fn with_hint(mut self, key: &str, value: Value) -> Self {
        if let Some(obj) = self.payload.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        self
    }

    pub fn error_kind(&self) -> Option<&str> {
        if self.success {
            return None;
        }
        self.payload.get("error").and_then(Value::as_str)
    }

    /// Text sent back to the model as the tool message content.
    pub fn to_message_content(&self) -> String {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(self.success));
        match &self.payload {
            Value::Object(fields) => body.extend(fields.clone()),
            other => {
                body.insert("result".into(), other.clone());
            }
        }
        Value::Object(body).to_string()
    }
}
