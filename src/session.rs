use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::canvas::{Viewport, ViewportUpdate};
use crate::components::history::{HistoryEntry, HistoryLog};
use crate::components::shortcuts::ShortcutAction;
use crate::components::tools::{
    BackgroundMode, BrushSettings, BrushSettingsUpdate, DEFAULT_BACKGROUND_COLOR, DownloadOptions,
    DownloadOptionsUpdate, Tool,
};
use crate::io::{DownloadArtifact, EncodedImage, ImageDataError, export_download};
use crate::settings::EditorSettings;

/// Handle shared between the view and in-flight edit operations.
pub type SharedSession = Arc<Mutex<EditorSession>>;

/// Lock a shared session, recovering the state if a previous holder panicked.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, EditorSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identifies one processing cycle. The session id says which image the
/// result belongs to; the sequence number says who owns the processing flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessingTicket {
    pub session_id: Uuid,
    seq: u64,
}

// ============================================================================
// EDITOR SESSION - single-owner aggregate for one editing session
// ============================================================================

/// All state of one editing session. Every mutation goes through a named
/// method so its side effects stay explicit:
///
/// - `set_image` starts a new history and clears mask and prompt.
/// - `set_current_image` commits an edit and clears the mask.
/// - `set_active_tool` clears mask and prompt, even when deselecting.
/// - `undo` / `redo` / `jump_to` move the history cursor and clear the mask.
#[derive(Clone, Debug)]
pub struct EditorSession {
    id: Uuid,
    original_image: Option<EncodedImage>,
    image_width: u32,
    image_height: u32,
    active_tool: Option<Tool>,
    mask_data: Option<EncodedImage>,
    prompt: String,
    background_mode: BackgroundMode,
    background_color: String,
    background_image: Option<EncodedImage>,
    face_enhance: bool,
    brush_settings: BrushSettings,
    zoom_pan: Viewport,
    history: HistoryLog,
    is_processing: bool,
    processing_message: String,
    download_options: DownloadOptions,

    // Configured defaults restored by `reset`.
    default_brush_size: f32,
    max_history_size: usize,

    // Monotonic across resets so a stale ticket never matches a new cycle.
    processing_seq: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::with_settings(&EditorSettings::default())
    }
}

/// Equality covers every field except `processing_seq`, which only
/// identifies processing cycles.
impl PartialEq for EditorSession {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.original_image == other.original_image
            && self.image_width == other.image_width
            && self.image_height == other.image_height
            && self.active_tool == other.active_tool
            && self.mask_data == other.mask_data
            && self.prompt == other.prompt
            && self.background_mode == other.background_mode
            && self.background_color == other.background_color
            && self.background_image == other.background_image
            && self.face_enhance == other.face_enhance
            && self.brush_settings == other.brush_settings
            && self.zoom_pan == other.zoom_pan
            && self.history == other.history
            && self.is_processing == other.is_processing
            && self.processing_message == other.processing_message
            && self.download_options == other.download_options
            && self.default_brush_size == other.default_brush_size
            && self.max_history_size == other.max_history_size
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: &EditorSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_image: None,
            image_width: 0,
            image_height: 0,
            active_tool: None,
            mask_data: None,
            prompt: String::new(),
            background_mode: BackgroundMode::default(),
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            background_image: None,
            face_enhance: false,
            brush_settings: BrushSettings {
                size: settings.default_brush_size,
                ..BrushSettings::default()
            },
            zoom_pan: Viewport::default(),
            history: HistoryLog::new(settings.max_history_size),
            is_processing: false,
            processing_message: String::new(),
            download_options: DownloadOptions::default(),
            default_brush_size: settings.default_brush_size,
            max_history_size: settings.max_history_size,
            processing_seq: 0,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Changes whenever the session is superseded (new image or reset).
    pub fn id(&self) -> Uuid {
        self.id
    }

    // ---- image & history ----

    /// Load a new image. Tool selection and the processing flag are left alone.
    pub fn set_image(&mut self, image: EncodedImage, width: u32, height: u32) {
        self.id = Uuid::new_v4();
        self.history.initialize(image.clone());
        self.original_image = Some(image);
        self.image_width = width;
        self.image_height = height;
        self.mask_data = None;
        self.prompt.clear();
        tracing::info!(session_id = %self.id, width, height, "session: image loaded");
    }

    /// Commit the result of an edit. The prompt is kept.
    pub fn set_current_image(&mut self, image: EncodedImage, label: impl Into<String>) {
        let label = label.into();
        self.history.append(image, label.as_str());
        self.mask_data = None;
        tracing::debug!(
            session_id = %self.id,
            label = %label,
            entries = self.history.len(),
            "session: edit committed"
        );
    }

    pub fn current_image(&self) -> Option<&EncodedImage> {
        self.history.current().map(|entry| &entry.image)
    }

    pub fn original_image(&self) -> Option<&EncodedImage> {
        self.original_image.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.current_image().is_some()
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    pub fn image_dimensions(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.entries()
    }

    pub fn history_index(&self) -> Option<usize> {
        self.history.current_index()
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo().is_some();
        if moved {
            self.mask_data = None;
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo().is_some();
        if moved {
            self.mask_data = None;
        }
        moved
    }

    /// Jump straight to a history entry (history panel).
    pub fn jump_to(&mut self, index: usize) -> bool {
        let moved = self.history.jump_to(index);
        if moved {
            self.mask_data = None;
        }
        moved
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ---- tool & inputs ----

    pub fn active_tool(&self) -> Option<Tool> {
        self.active_tool
    }

    /// Switching tools (or deselecting) discards the selection and prompt.
    pub fn set_active_tool(&mut self, tool: Option<Tool>) {
        self.active_tool = tool;
        self.mask_data = None;
        self.prompt.clear();
    }

    pub fn mask_data(&self) -> Option<&EncodedImage> {
        self.mask_data.as_ref()
    }

    pub fn set_mask_data(&mut self, mask: Option<EncodedImage>) {
        self.mask_data = mask;
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// No length policy here; see `validation::validate_prompt`.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn background_mode(&self) -> BackgroundMode {
        self.background_mode
    }

    pub fn set_background_mode(&mut self, mode: BackgroundMode) {
        self.background_mode = mode;
    }

    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.background_color = color.into();
    }

    pub fn background_image(&self) -> Option<&EncodedImage> {
        self.background_image.as_ref()
    }

    pub fn set_background_image(&mut self, image: Option<EncodedImage>) {
        self.background_image = image;
    }

    pub fn face_enhance(&self) -> bool {
        self.face_enhance
    }

    pub fn set_face_enhance(&mut self, enabled: bool) {
        self.face_enhance = enabled;
    }

    // ---- brush, viewport, download ----

    pub fn brush_settings(&self) -> BrushSettings {
        self.brush_settings
    }

    pub fn set_brush_settings(&mut self, update: BrushSettingsUpdate) {
        update.apply_to(&mut self.brush_settings);
    }

    pub fn increase_brush_size(&mut self) {
        let size = self.brush_settings.increased_size();
        self.set_brush_settings(BrushSettingsUpdate::size(size));
    }

    pub fn decrease_brush_size(&mut self) {
        let size = self.brush_settings.decreased_size();
        self.set_brush_settings(BrushSettingsUpdate::size(size));
    }

    pub fn zoom_pan(&self) -> Viewport {
        self.zoom_pan
    }

    pub fn set_zoom_pan(&mut self, update: ViewportUpdate) {
        update.apply_to(&mut self.zoom_pan);
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.zoom_pan
    }

    /// Fit the loaded image into a container of the given size.
    pub fn fit_to_container(&mut self, container_width: f32, container_height: f32) {
        self.zoom_pan.fit_to_container(
            container_width,
            container_height,
            self.image_width,
            self.image_height,
        );
    }

    pub fn download_options(&self) -> DownloadOptions {
        self.download_options
    }

    pub fn set_download_options(&mut self, update: DownloadOptionsUpdate) {
        update.apply_to(&mut self.download_options);
    }

    /// Export the current image with the session's download options.
    pub fn download(&self) -> Result<DownloadArtifact, ImageDataError> {
        let image = self.current_image().ok_or(ImageDataError::NoImage)?;
        export_download(image, self.image_width, self.image_height, &self.download_options)
    }

    // ---- processing ----

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    pub fn processing_message(&self) -> &str {
        &self.processing_message
    }

    pub fn set_processing(&mut self, processing: bool, message: Option<&str>) {
        self.is_processing = processing;
        self.processing_message = message.unwrap_or_default().to_string();
    }

    /// Raise the processing flag for a new cycle, or `None` if one is
    /// already running.
    pub(crate) fn begin_processing(&mut self, message: &str) -> Option<ProcessingTicket> {
        if self.is_processing {
            return None;
        }
        self.processing_seq += 1;
        self.set_processing(true, Some(message));
        Some(ProcessingTicket {
            session_id: self.id,
            seq: self.processing_seq,
        })
    }

    /// Lower the flag if `ticket` still owns it. Returns whether it did.
    pub(crate) fn finish_processing(&mut self, ticket: ProcessingTicket) -> bool {
        if self.processing_seq != ticket.seq || !self.is_processing {
            return false;
        }
        self.set_processing(false, None);
        true
    }

    /// The result of `ticket`'s cycle still belongs to this session.
    pub fn accepts(&self, ticket: ProcessingTicket) -> bool {
        self.id == ticket.session_id
    }

    // ---- keyboard ----

    /// Apply a keyboard action. Returns `false` when it was ignored.
    pub fn apply_shortcut(&mut self, action: ShortcutAction) -> bool {
        if self.is_processing && !action.allowed_while_processing() {
            return false;
        }
        match action {
            ShortcutAction::Undo => self.undo(),
            ShortcutAction::Redo => self.redo(),
            ShortcutAction::ZoomIn => {
                self.zoom_pan.zoom_in();
                true
            }
            ShortcutAction::ZoomOut => {
                self.zoom_pan.zoom_out();
                true
            }
            ShortcutAction::ResetZoom => {
                self.zoom_pan.reset();
                true
            }
            ShortcutAction::Deselect => {
                self.set_active_tool(None);
                true
            }
            ShortcutAction::BrushSizeDecrease => {
                self.decrease_brush_size();
                true
            }
            ShortcutAction::BrushSizeIncrease => {
                self.increase_brush_size();
                true
            }
        }
    }

    /// Back to construction-time defaults under a fresh session id.
    pub fn reset(&mut self) {
        let seq = self.processing_seq;
        let settings = EditorSettings {
            default_brush_size: self.default_brush_size,
            max_history_size: self.max_history_size,
            ..EditorSettings::default()
        };
        *self = Self::with_settings(&settings);
        self.processing_seq = seq;
        tracing::info!(session_id = %self.id, "session: reset");
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
