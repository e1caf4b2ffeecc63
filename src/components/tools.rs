use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TOOL ENUMERATION
// ============================================================================

/// The edit operation the user has selected. Mutually exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    Enhance,
    RemoveBackground,
    ReplaceBackground,
    GenerativeFill,
    RemoveObject,
    Download,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Enhance,
        Tool::RemoveBackground,
        Tool::ReplaceBackground,
        Tool::GenerativeFill,
        Tool::RemoveObject,
        Tool::Download,
    ];

    /// Stable identifier used on the wire and on the command line.
    pub fn id(self) -> &'static str {
        match self {
            Tool::Enhance => "enhance",
            Tool::RemoveBackground => "remove-background",
            Tool::ReplaceBackground => "replace-background",
            Tool::GenerativeFill => "generative-fill",
            Tool::RemoveObject => "remove-object",
            Tool::Download => "download",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Tool::Enhance => "AI Enhance",
            Tool::RemoveBackground => "Remove Background",
            Tool::ReplaceBackground => "Replace Background",
            Tool::GenerativeFill => "Generative Fill",
            Tool::RemoveObject => "Remove Object",
            Tool::Download => "Download",
        }
    }

    /// Tools that paint a selection mask before running.
    pub fn uses_brush(self) -> bool {
        matches!(self, Tool::GenerativeFill | Tool::RemoveObject)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Tool::ALL
            .into_iter()
            .find(|tool| tool.id() == needle)
            .ok_or_else(|| format!("unknown tool '{s}'"))
    }
}

// ============================================================================
// BACKGROUND REPLACEMENT SUB-MODE
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Generate a new background from the text prompt.
    #[default]
    Prompt,
    /// Fill with a solid color.
    Color,
    /// Composite over a user-supplied image.
    Upload,
}

impl BackgroundMode {
    pub fn id(self) -> &'static str {
        match self {
            BackgroundMode::Prompt => "prompt",
            BackgroundMode::Color => "color",
            BackgroundMode::Upload => "upload",
        }
    }
}

impl FromStr for BackgroundMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" => Ok(BackgroundMode::Prompt),
            "color" | "colour" => Ok(BackgroundMode::Color),
            "upload" | "image" => Ok(BackgroundMode::Upload),
            other => Err(format!("unknown background mode '{other}'")),
        }
    }
}

pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";

// ============================================================================
// BRUSH SETTINGS
// ============================================================================

pub const DEFAULT_BRUSH_SIZE: f32 = 30.0;
pub const MIN_BRUSH_SIZE: f32 = 5.0;
pub const MAX_BRUSH_SIZE: f32 = 100.0;
/// Step used by the bracket-style size buttons.
pub const BRUSH_SIZE_STEP: f32 = 5.0;

/// Mask brush parameters. Persist across tool switches.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrushSettings {
    /// Diameter in image pixels.
    pub size: f32,
    /// Selection intensity 0.0–1.0.
    pub opacity: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_BRUSH_SIZE,
            opacity: 1.0,
        }
    }
}

impl BrushSettings {
    pub fn increased_size(&self) -> f32 {
        (self.size + BRUSH_SIZE_STEP).min(MAX_BRUSH_SIZE)
    }

    pub fn decreased_size(&self) -> f32 {
        (self.size - BRUSH_SIZE_STEP).max(MIN_BRUSH_SIZE)
    }
}

/// Partial update for [`BrushSettings`]; `None` fields keep their value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BrushSettingsUpdate {
    pub size: Option<f32>,
    pub opacity: Option<f32>,
}

impl BrushSettingsUpdate {
    pub fn size(size: f32) -> Self {
        Self { size: Some(size), ..Self::default() }
    }

    pub fn opacity(opacity: f32) -> Self {
        Self { opacity: Some(opacity), ..Self::default() }
    }

    pub fn apply_to(self, settings: &mut BrushSettings) {
        if let Some(size) = self.size {
            settings.size = size;
        }
        if let Some(opacity) = self.opacity {
            settings.opacity = opacity;
        }
    }
}

// ============================================================================
// DOWNLOAD OPTIONS
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    #[default]
    Png,
    Jpeg,
}

impl DownloadFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DownloadFormat::Png => "png",
            DownloadFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DownloadFormat::Png => "image/png",
            DownloadFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            DownloadFormat::Png => "edited-image.png",
            DownloadFormat::Jpeg => "edited-image.jpg",
        }
    }
}

impl FromStr for DownloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(DownloadFormat::Png),
            "jpeg" | "jpg" => Ok(DownloadFormat::Jpeg),
            other => Err(format!("unsupported download format '{other}'")),
        }
    }
}

/// Export preferences, independent of the editing content.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub format: DownloadFormat,
    /// JPEG quality 0–100 (ignored for PNG).
    pub quality: u8,
    /// Output scale relative to the image dimensions (0.25, 0.5, 1, 2).
    pub scale: f32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: DownloadFormat::Png,
            quality: 90,
            scale: 1.0,
        }
    }
}

/// Partial update for [`DownloadOptions`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DownloadOptionsUpdate {
    pub format: Option<DownloadFormat>,
    pub quality: Option<u8>,
    pub scale: Option<f32>,
}

impl DownloadOptionsUpdate {
    pub fn apply_to(self, options: &mut DownloadOptions) {
        if let Some(format) = self.format {
            options.format = format;
        }
        if let Some(quality) = self.quality {
            options.quality = quality;
        }
        if let Some(scale) = self.scale {
            options.scale = scale;
        }
    }
}

#[cfg(test)]
#[path = "tools_test.rs"]
mod tests;
