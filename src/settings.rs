use std::path::{Path, PathBuf};

use crate::components::history::MAX_HISTORY_SIZE;
use crate::components::tools::{DEFAULT_BRUSH_SIZE, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const SETTINGS_FILE: &str = "pixelforge_settings.cfg";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("no settings directory available on this platform")]
    NoSettingsDir,
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent editor preferences.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Base URL of the edit service; endpoint paths are appended.
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_history_size: usize,
    pub default_brush_size: f32,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_history_size: MAX_HISTORY_SIZE,
            default_brush_size: DEFAULT_BRUSH_SIZE,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl EditorSettings {
    /// Platform settings file, creating its directory if needed.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("pixelforge");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("PixelForge");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PixelForge");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Settings file, then `PIXELFORGE_*` environment overrides.
    pub fn load() -> Self {
        let mut settings = match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    /// Load from `path` (returns default if file missing or corrupt).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines. Unknown keys and bad values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            s.set(key.trim(), val.trim());
        }
        s
    }

    fn set(&mut self, key: &str, val: &str) {
        match key {
            "api_base_url" => {
                if !val.is_empty() {
                    self.api_base_url = val.to_string();
                }
            }
            "request_timeout_secs" => {
                if let Some(v) = val.parse().ok().filter(|&v: &u64| v > 0) {
                    self.request_timeout_secs = v;
                }
            }
            "connect_timeout_secs" => {
                if let Some(v) = val.parse().ok().filter(|&v: &u64| v > 0) {
                    self.connect_timeout_secs = v;
                }
            }
            "max_history_size" => {
                if let Some(v) = val.parse().ok().filter(|&v: &usize| v > 0) {
                    self.max_history_size = v;
                }
            }
            "default_brush_size" => {
                if let Ok(v) = val.parse::<f32>()
                    && v.is_finite()
                {
                    self.default_brush_size = v.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
                }
            }
            "log_level" => {
                if !val.is_empty() {
                    self.log_level = val.to_string();
                }
            }
            _ => {}
        }
    }

    /// Apply `PIXELFORGE_*` overrides through `lookup` (normally `std::env::var`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        const OVERRIDES: [(&str, &str); 5] = [
            ("PIXELFORGE_API_BASE_URL", "api_base_url"),
            ("PIXELFORGE_REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
            ("PIXELFORGE_CONNECT_TIMEOUT_SECS", "connect_timeout_secs"),
            ("PIXELFORGE_MAX_HISTORY_SIZE", "max_history_size"),
            ("PIXELFORGE_LOG_LEVEL", "log_level"),
        ];
        for (var, key) in OVERRIDES {
            if let Some(val) = lookup(var) {
                self.set(key, val.trim());
            }
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "api_base_url={}\n\
             request_timeout_secs={}\n\
             connect_timeout_secs={}\n\
             max_history_size={}\n\
             default_brush_size={}\n\
             log_level={}\n",
            self.api_base_url,
            self.request_timeout_secs,
            self.connect_timeout_secs,
            self.max_history_size,
            self.default_brush_size,
            self.log_level,
        )
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoSettingsDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
