// ============================================================================
// VALIDATION - upload intake and request input policy
// ============================================================================

use crate::components::tools::Tool;
use crate::io::{is_base64_alphabet, strip_data_uri};

pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
pub const MIN_DIMENSION: u32 = 64;
pub const MAX_DIMENSION: u32 = 4096;
pub const MAX_PROMPT_LENGTH: usize = 500;

pub const SUPPORTED_FORMATS: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("file is empty")]
    EmptyFile,
    #[error("file exceeds {}MB limit", MAX_FILE_SIZE / (1024 * 1024))]
    FileTooLarge,
    #[error("unsupported format: {0}. Supported: JPEG, PNG, WebP, HEIC")]
    UnsupportedFormat(String),
    #[error("image too small, minimum dimension is {MIN_DIMENSION}px")]
    ImageTooSmall,
    #[error("image too large, maximum dimension is {MAX_DIMENSION}px")]
    ImageTooLarge,
    #[error("image data is required")]
    MissingImageData,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("image data exceeds size limit")]
    ImageDataTooLarge,
    #[error("prompt cannot be empty")]
    EmptyPrompt,
    #[error("prompt must be {MAX_PROMPT_LENGTH} characters or less")]
    PromptTooLong,
    #[error("please paint over the area first")]
    MissingMask,
    #[error("please upload a background image")]
    MissingBackgroundImage,
    #[error("no image loaded")]
    NoImage,
    #[error("no tool selected")]
    NoToolSelected,
    #[error("{} does not run an edit", .0.title())]
    NotAnEditTool(Tool),
}

pub fn validate_file_size(size: u64) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::FileTooLarge);
    }
    Ok(())
}

pub fn validate_file_format(mime_type: &str) -> Result<(), ValidationError> {
    if SUPPORTED_FORMATS.contains(&mime_type) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFormat(mime_type.to_string()))
    }
}

pub fn validate_dimensions(width: u32, height: u32) -> Result<(), ValidationError> {
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(ValidationError::ImageTooSmall);
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ValidationError::ImageTooLarge);
    }
    Ok(())
}

/// Accepts prefixed or bare base64; checks the alphabet and that the
/// decoded size stays within `MAX_FILE_SIZE`.
pub fn validate_base64_image(data: &str) -> Result<(), ValidationError> {
    let raw = strip_data_uri(data);
    if raw.is_empty() {
        return Err(ValidationError::MissingImageData);
    }
    if !is_base64_alphabet(raw) {
        return Err(ValidationError::InvalidBase64);
    }
    let estimated = raw.len() as u64 * 3 / 4;
    if estimated > MAX_FILE_SIZE {
        return Err(ValidationError::ImageDataTooLarge);
    }
    Ok(())
}

/// Length is counted on the trimmed text.
pub fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    if trimmed.chars().count() > MAX_PROMPT_LENGTH {
        return Err(ValidationError::PromptTooLong);
    }
    Ok(())
}

pub fn validate_mask(mask: Option<&str>) -> Result<(), ValidationError> {
    match mask {
        None => Err(ValidationError::MissingMask),
        Some(m) if m.trim().is_empty() => Err(ValidationError::MissingMask),
        Some(m) => validate_base64_image(m),
    }
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
