use std::collections::HashSet;

use chatsync_llm::{Describe, Property, Schema, ToolCallPart, ToolDefinition};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{ChatError, ToolSpecError};

pub const UPDATE_USER_DATA: &str = "update_user_data";

// ---------------------------------------------------------------------------
// Tool inputs
// ---------------------------------------------------------------------------

/// Arguments of the `update_user_data` tool: the complete new user data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateUserDataInput {
    pub data: String,
}

impl Describe for UpdateUserDataInput {
    fn describe() -> Schema {
        Schema::Object {
            description: None,
            properties: vec![Property {
                name: "data".into(),
                schema: Schema::String {
                    description: Some("完整的使用者資料內容，將取代目前的資料".into()),
                },
            }],
            required: vec!["data".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// ToolSpec
// ---------------------------------------------------------------------------

/// A validated tool descriptor paired with the input type its arguments
/// decode into.
#[derive(Debug, Clone)]
pub struct ToolSpec<I> {
    definition: ToolDefinition,
    _input: std::marker::PhantomData<fn() -> I>,
}

impl<I: Describe + DeserializeOwned> ToolSpec<I> {
    /// Build and validate a descriptor whose parameters come from `I`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ToolSpecError> {
        let definition = ToolDefinition {
            name: name.into(),
            description: description.into(),
            parameters: I::describe(),
        };
        validate(&definition)?;
        Ok(Self {
            definition,
            _input: std::marker::PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Decode a model-issued call to this tool.
    pub fn parse(&self, call: &ToolCallPart) -> Result<I, ChatError> {
        if call.name != self.definition.name {
            return Err(ChatError::UnknownTool(call.name.clone()));
        }
        serde_json::from_str(&call.arguments).map_err(ChatError::ToolArguments)
    }
}

impl ToolSpec<UpdateUserDataInput> {
    pub fn update_user_data() -> Result<Self, ToolSpecError> {
        Self::new(
            UPDATE_USER_DATA,
            "更新共享的使用者資料。傳入更新後的完整內容，會取代目前的資料並通知所有連線中的使用者。",
        )
    }
}

/// Check that a descriptor can be offered to the model as a strict function.
pub fn validate(definition: &ToolDefinition) -> Result<(), ToolSpecError> {
    if definition.name.trim().is_empty() {
        return Err(ToolSpecError::EmptyName);
    }

    let Schema::Object {
        properties,
        required,
        ..
    } = &definition.parameters
    else {
        return Err(ToolSpecError::NotAnObject(definition.name.clone()));
    };

    let mut declared = HashSet::new();
    for property in properties {
        if !declared.insert(property.name.as_str()) {
            return Err(ToolSpecError::DuplicateProperty {
                tool: definition.name.clone(),
                field: property.name.clone(),
            });
        }
    }

    if let Some(missing) = required.iter().find(|r| !declared.contains(r.as_str())) {
        return Err(ToolSpecError::UndeclaredRequired {
            tool: definition.name.clone(),
            field: missing.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> ToolCallPart {
        ToolCallPart {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn update_user_data_descriptor_is_valid() {
        let spec = ToolSpec::update_user_data().unwrap();
        assert_eq!(spec.name(), UPDATE_USER_DATA);

        let schema = spec.definition().parameters.to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["data"]["type"], "string");
        assert_eq!(schema["required"], serde_json::json!(["data"]));
    }

    #[test]
    fn parse_decodes_arguments() {
        let spec = ToolSpec::update_user_data().unwrap();
        let input = spec
            .parse(&call(UPDATE_USER_DATA, r#"{"data":"買牛奶"}"#))
            .unwrap();
        assert_eq!(input.data, "買牛奶");
    }

    #[test]
    fn parse_rejects_other_tools_and_bad_json() {
        let spec = ToolSpec::update_user_data().unwrap();

        let err = spec.parse(&call("delete_everything", "{}")).unwrap_err();
        assert!(matches!(err, ChatError::UnknownTool(ref n) if n == "delete_everything"));

        let err = spec.parse(&call(UPDATE_USER_DATA, r#"{"nope":1}"#)).unwrap_err();
        assert!(matches!(err, ChatError::ToolArguments(_)));
    }

    #[test]
    fn validate_rejects_broken_descriptors() {
        let string_params = ToolDefinition {
            name: "t".into(),
            description: String::new(),
            parameters: Schema::String { description: None },
        };
        assert_eq!(
            validate(&string_params),
            Err(ToolSpecError::NotAnObject("t".into()))
        );

        let unnamed = ToolDefinition {
            name: " ".into(),
            ..string_params.clone()
        };
        assert_eq!(validate(&unnamed), Err(ToolSpecError::EmptyName));

        let undeclared = ToolDefinition {
            name: "t".into(),
            description: String::new(),
            parameters: Schema::Object {
                description: None,
                properties: vec![],
                required: vec!["data".into()],
            },
        };
        assert_eq!(
            validate(&undeclared),
            Err(ToolSpecError::UndeclaredRequired {
                tool: "t".into(),
                field: "data".into()
            })
        );

        let twice = ToolDefinition {
            name: "t".into(),
            description: String::new(),
            parameters: Schema::Object {
                description: None,
                properties: vec![
                    Property {
                        name: "a".into(),
                        schema: Schema::String { description: None },
                    },
                    Property {
                        name: "a".into(),
                        schema: Schema::String { description: None },
                    },
                ],
                required: vec![],
            },
        };
        assert_eq!(
            validate(&twice),
            Err(ToolSpecError::DuplicateProperty {
                tool: "t".into(),
                field: "a".into()
            })
        );
    }
}
