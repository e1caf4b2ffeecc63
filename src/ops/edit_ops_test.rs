use super::*;
use crate::io::EncodedImage;

const IMAGE: &str = "data:image/png;base64,aW1hZ2U=";
const MASK: &str = "data:image/png;base64,bWFzaw==";

fn session_with(tool: Tool) -> EditorSession {
    let mut session = EditorSession::new();
    session.set_image(EncodedImage::parse(IMAGE).unwrap(), 256, 256);
    session.set_active_tool(Some(tool));
    session
}

fn with_mask(mut session: EditorSession) -> EditorSession {
    session.set_mask_data(Some(EncodedImage::parse(MASK).unwrap()));
    session
}

#[test]
fn every_edit_tool_has_an_operation() {
    for tool in Tool::ALL {
        assert_eq!(operation_for(tool).is_some(), tool != Tool::Download, "{tool}");
    }
}

#[test]
fn enhance_request() {
    let req = plan_active_tool(&session_with(Tool::Enhance)).unwrap();
    assert_eq!(req.endpoint, "/api/enhance");
    assert_eq!(req.label, "Enhanced");
    assert_eq!(req.processing_message, "Enhancing image...");
    assert_eq!(req.payload, json!({ "image": IMAGE }));
}

#[test]
fn enhance_with_face_enhance() {
    let mut session = session_with(Tool::Enhance);
    session.set_face_enhance(true);
    let req = plan_active_tool(&session).unwrap();
    assert_eq!(req.payload, json!({ "image": IMAGE, "faceEnhance": true }));
}

#[test]
fn remove_background_request() {
    let req = plan_active_tool(&session_with(Tool::RemoveBackground)).unwrap();
    assert_eq!(req.endpoint, "/api/remove-background");
    assert_eq!(req.label, "Background Removed");
    assert_eq!(req.payload, json!({ "image": IMAGE }));
}

#[test]
fn replace_background_prompt_mode() {
    let mut session = session_with(Tool::ReplaceBackground);
    assert_eq!(plan_active_tool(&session), Err(ValidationError::EmptyPrompt));

    session.set_prompt("a beach at sunset");
    let req = plan_active_tool(&session).unwrap();
    assert_eq!(req.endpoint, "/api/replace-background");
    assert_eq!(req.label, "Background Replaced");
    assert_eq!(
        req.payload,
        json!({ "image": IMAGE, "mode": "prompt", "prompt": "a beach at sunset" })
    );
}

#[test]
fn replace_background_color_mode() {
    let mut session = session_with(Tool::ReplaceBackground);
    session.set_background_mode(BackgroundMode::Color);
    let req = plan_active_tool(&session).unwrap();
    assert_eq!(req.payload, json!({ "image": IMAGE, "mode": "color", "color": "#ffffff" }));
}

#[test]
fn replace_background_upload_mode() {
    let mut session = session_with(Tool::ReplaceBackground);
    session.set_background_mode(BackgroundMode::Upload);
    assert_eq!(
        plan_active_tool(&session),
        Err(ValidationError::MissingBackgroundImage)
    );

    session.set_background_image(Some(EncodedImage::parse("YmFjaw==").unwrap()));
    let req = plan_active_tool(&session).unwrap();
    assert_eq!(
        req.payload,
        json!({
            "image": IMAGE,
            "mode": "upload",
            "backgroundImage": "data:image/png;base64,YmFjaw=="
        })
    );
}

#[test]
fn generative_fill_needs_mask_then_prompt() {
    let mut session = session_with(Tool::GenerativeFill);
    session.set_prompt("a vase of flowers");
    assert_eq!(plan_active_tool(&session), Err(ValidationError::MissingMask));

    let mut session = with_mask(session_with(Tool::GenerativeFill));
    assert_eq!(plan_active_tool(&session), Err(ValidationError::EmptyPrompt));

    session.set_prompt("a vase of flowers");
    let req = plan_active_tool(&session).unwrap();
    assert_eq!(req.endpoint, "/api/generative-fill");
    assert_eq!(req.label, "Generative Fill");
    assert_eq!(
        req.payload,
        json!({ "image": IMAGE, "mask": MASK, "prompt": "a vase of flowers" })
    );
}

#[test]
fn remove_object_needs_mask() {
    let session = session_with(Tool::RemoveObject);
    assert_eq!(plan_active_tool(&session), Err(ValidationError::MissingMask));

    let req = plan_active_tool(&with_mask(session)).unwrap();
    assert_eq!(req.endpoint, "/api/remove-object");
    assert_eq!(req.label, "Object Removed");
    assert_eq!(req.payload, json!({ "image": IMAGE, "mask": MASK }));
}

#[test]
fn no_tool_download_or_no_image_is_rejected() {
    let mut session = EditorSession::new();
    assert_eq!(plan_active_tool(&session), Err(ValidationError::NoToolSelected));

    session.set_active_tool(Some(Tool::Enhance));
    assert_eq!(plan_active_tool(&session), Err(ValidationError::NoImage));

    let session = session_with(Tool::Download);
    assert_eq!(
        plan_active_tool(&session),
        Err(ValidationError::NotAnEditTool(Tool::Download))
    );
}

#[test]
fn planning_does_not_touch_the_session() {
    let mut session = with_mask(session_with(Tool::GenerativeFill));
    session.set_prompt("sky");
    let before = session.clone();
    let _ = plan_active_tool(&session);
    assert_eq!(session, before);
}

#[test]
fn planned_image_is_the_current_history_entry() {
    let mut session = session_with(Tool::Enhance);
    session.set_current_image(EncodedImage::parse("bmV4dA==").unwrap(), "Enhanced");
    let req = plan_active_tool(&session).unwrap();
    assert_eq!(req.payload["image"], "data:image/png;base64,bmV4dA==");
}
