//! PixelForge: the editing session core of an AI image editor.
//!
//! An [`session::EditorSession`] owns the image history, tool state, mask and
//! viewport; [`ops::ai::AiExecutor`] runs one edit request at a time against
//! the edit service and commits the result.

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod logger;
pub mod ops;
pub mod session;
pub mod settings;
pub mod validation;
