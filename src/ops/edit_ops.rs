// ============================================================================
// EDIT OPERATIONS - per-tool request planning
// ============================================================================

use serde_json::{Map, Value, json};

use crate::components::tools::{BackgroundMode, Tool};
use crate::ops::ai::EditRequest;
use crate::session::EditorSession;
use crate::validation::{ValidationError, validate_mask, validate_prompt};

/// Static description of an edit tool's service call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditOperation {
    pub tool: Tool,
    pub endpoint: &'static str,
    /// History label of the committed result.
    pub label: &'static str,
    pub processing_message: &'static str,
}

const OPERATIONS: [EditOperation; 5] = [
    EditOperation {
        tool: Tool::Enhance,
        endpoint: "/api/enhance",
        label: "Enhanced",
        processing_message: "Enhancing image...",
    },
    EditOperation {
        tool: Tool::RemoveBackground,
        endpoint: "/api/remove-background",
        label: "Background Removed",
        processing_message: "Removing background...",
    },
    EditOperation {
        tool: Tool::ReplaceBackground,
        endpoint: "/api/replace-background",
        label: "Background Replaced",
        processing_message: "Replacing background...",
    },
    EditOperation {
        tool: Tool::GenerativeFill,
        endpoint: "/api/generative-fill",
        label: "Generative Fill",
        processing_message: "Generating fill...",
    },
    EditOperation {
        tool: Tool::RemoveObject,
        endpoint: "/api/remove-object",
        label: "Object Removed",
        processing_message: "Removing object...",
    },
];

/// `None` for tools that don't call the service (Download).
pub fn operation_for(tool: Tool) -> Option<&'static EditOperation> {
    OPERATIONS.iter().find(|op| op.tool == tool)
}

/// Build the request for the session's selected tool.
pub fn plan_active_tool(session: &EditorSession) -> Result<EditRequest, ValidationError> {
    let tool = session.active_tool().ok_or(ValidationError::NoToolSelected)?;
    plan(tool, session)
}

/// Build the request `tool` would send for the current session state.
/// Nothing in the session is modified.
pub fn plan(tool: Tool, session: &EditorSession) -> Result<EditRequest, ValidationError> {
    let op = operation_for(tool).ok_or(ValidationError::NotAnEditTool(tool))?;
    let image = session.current_image().ok_or(ValidationError::NoImage)?;

    let mut body = Map::new();
    body.insert("image".into(), json!(image.as_data_uri()));

    match tool {
        Tool::Enhance => {
            if session.face_enhance() {
                body.insert("faceEnhance".into(), json!(true));
            }
        }
        Tool::RemoveBackground => {}
        Tool::ReplaceBackground => {
            let mode = session.background_mode();
            body.insert("mode".into(), json!(mode.id()));
            match mode {
                BackgroundMode::Prompt => {
                    validate_prompt(session.prompt())?;
                    body.insert("prompt".into(), json!(session.prompt()));
                }
                BackgroundMode::Color => {
                    body.insert("color".into(), json!(session.background_color()));
                }
                BackgroundMode::Upload => {
                    let background = session
                        .background_image()
                        .ok_or(ValidationError::MissingBackgroundImage)?;
                    body.insert("backgroundImage".into(), json!(background.as_data_uri()));
                }
            }
        }
        Tool::GenerativeFill => {
            let mask = session.mask_data().map(|m| m.as_data_uri());
            validate_mask(mask)?;
            validate_prompt(session.prompt())?;
            body.insert("mask".into(), json!(mask));
            body.insert("prompt".into(), json!(session.prompt()));
        }
        Tool::RemoveObject => {
            let mask = session.mask_data().map(|m| m.as_data_uri());
            validate_mask(mask)?;
            body.insert("mask".into(), json!(mask));
        }
        Tool::Download => return Err(ValidationError::NotAnEditTool(tool)),
    }

    Ok(EditRequest {
        endpoint: op.endpoint.to_string(),
        payload: Value::Object(body),
        label: op.label.to_string(),
        processing_message: op.processing_message.to_string(),
    })
}

#[cfg(test)]
#[path = "edit_ops_test.rs"]
mod tests;
