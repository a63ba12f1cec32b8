use crate::error::ValidationError;
use crate::tools::default_specs;
use crate::traits::{ToolCall, ToolSpec};
use serde_json::{Map, Value};

/// Arguments that passed schema validation for `tool`. Only declared,
/// non-null parameters are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArgs {
    pub tool: String,
    pub values: Map<String, Value>,
}

/// The catalog of tools the model may call. Built once and shared
/// read-only between sessions.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_specs(default_specs())
    }

    pub fn with_specs(specs: Vec<ToolSpec>) -> Self {
        Self { specs }
    }

    pub fn list_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn validate(&self, tool_name: &str, arguments: &Value) -> Result<ValidatedArgs, ValidationError> {
        let spec = self.get(tool_name).ok_or_else(|| ValidationError::UnknownTool {
            name: tool_name.to_string(),
        })?;

        let empty = Map::new();
        let provided = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ValidationError::MalformedArguments {
                    tool: spec.name.clone(),
                    reason: format!("expected an object, got {}", other),
                });
            }
        };

        let mut values = Map::new();
        for param in &spec.parameters {
            match provided.get(&param.name).filter(|v| !v.is_null()) {
                None if param.required => {
                    return Err(ValidationError::MissingArgument {
                        tool: spec.name.clone(),
                        field: param.name.clone(),
                    });
                }
                None => {}
                Some(value) if !param.kind.accepts(value) => {
                    return Err(ValidationError::TypeMismatch {
                        tool: spec.name.clone(),
                        field: param.name.clone(),
                        expected: param.kind.describe(),
                    });
                }
                Some(value) => {
                    values.insert(param.name.clone(), value.clone());
                }
            }
        }

        Ok(ValidatedArgs {
            tool: spec.name.clone(),
            values,
        })
    }

    /// Decode the raw argument text of a model tool call, then validate it.
    pub fn parse_and_validate(&self, call: &ToolCall) -> Result<ValidatedArgs, ValidationError> {
        if !self.contains(&call.name) {
            return Err(ValidationError::UnknownTool {
                name: call.name.clone(),
            });
        }

        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| ValidationError::MalformedArguments {
                tool: call.name.clone(),
                reason: e.to_string(),
            })?
        };
        self.validate(&call.name, &arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ParamKind, ParamSpec};
    use serde_json::json;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let registry = ToolRegistry::new();
        for name in ["drop_table", "", "READ_STRUCTURE"] {
            assert_eq!(
                registry.validate(name, &json!({})),
                Err(ValidationError::UnknownTool { name: name.into() })
            );
        }
    }

    #[test]
    fn missing_required_argument_names_field() {
        let err = ToolRegistry::new()
            .validate("query_rows", &json!({ "file_name": "estudios.csv" }))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingArgument {
                tool: "query_rows".into(),
                field: "filter_expression".into(),
            }
        );
    }

    #[test]
    fn type_mismatch_names_field() {
        let err = ToolRegistry::new()
            .validate(
                "read_structure",
                &json!({ "file_name": "estudios.csv", "sample_rows": "five" }),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch { ref field, .. } if field == "sample_rows"
        ));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let registry = ToolRegistry::new();
        for (tool, args) in [
            ("read_structure", json!({ "file_name": "estudios.csv", "sample_rows": -5 })),
            (
                "query_rows",
                json!({ "file_name": "estudios.csv", "filter_expression": "true", "limit": -1 }),
            ),
        ] {
            let err = registry.validate(tool, &args).unwrap_err();
            assert!(matches!(
                err,
                ValidationError::TypeMismatch { ref expected, .. } if expected == "a non-negative integer"
            ));
        }
    }

    #[test]
    fn null_counts_as_absent_and_extras_are_dropped() {
        let validated = ToolRegistry::new()
            .validate(
                "column_values",
                &json!({ "file_name": "a.csv", "column_name": "tipo", "distinct": null, "sheet": "1" }),
            )
            .unwrap();
        assert_eq!(validated.values.len(), 2);
        assert!(validated.values.get("distinct").is_none());
    }

    #[test]
    fn enum_parameters_are_checked() {
        let registry = ToolRegistry::with_specs(vec![ToolSpec {
            name: "sort_rows".into(),
            description: "sort".into(),
            parameters: vec![ParamSpec::required(
                "order",
                ParamKind::Enum(vec!["asc".into(), "desc".into()]),
                "direction",
            )],
        }]);
        assert!(registry.validate("sort_rows", &json!({ "order": "asc" })).is_ok());
        assert!(matches!(
            registry.validate("sort_rows", &json!({ "order": "up" })),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn raw_arguments_are_decoded() {
        let registry = ToolRegistry::new();
        assert!(registry.parse_and_validate(&call("list_available_files", "")).is_ok());
        assert!(matches!(
            registry.parse_and_validate(&call("read_structure", "{\"file_name\": ")),
            Err(ValidationError::MalformedArguments { .. })
        ));
        assert!(matches!(
            registry.parse_and_validate(&call("read_structure", "[1, 2]")),
            Err(ValidationError::MalformedArguments { .. })
        ));
    }
}
