//! User settings, kept in a versioned YAML file

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::highlight::HighlightColor;
use crate::normalize::Heuristics;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "scholia";
const DATA_DIR_ENV: &str = "SCHOLIA_DATA_DIR";
const READER_STATE_FILENAME: &str = "reader_state.json";
const ANNOTATIONS_DIRNAME: &str = "annotations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Color of highlights created together with a note
    #[serde(default = "default_note_color")]
    pub default_note_color: HighlightColor,

    /// Quiet period before a scroll offset is written to disk
    #[serde(default = "default_scroll_save_debounce_ms")]
    pub scroll_save_debounce_ms: u64,

    #[serde(default)]
    pub heuristics: Heuristics,

    /// Where annotations and reader state live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_note_color() -> HighlightColor {
    HighlightColor::Green
}

fn default_scroll_save_debounce_ms() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            default_note_color: default_note_color(),
            scroll_save_debounce_ms: default_scroll_save_debounce_ms(),
            heuristics: Heuristics::default(),
            data_dir: None,
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

/// File the settings were loaded from, when not the default location
static ACTIVE_PATH: LazyLock<RwLock<Option<PathBuf>>> = LazyLock::new(|| RwLock::new(None));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

fn active_config_path() -> Option<PathBuf> {
    ACTIVE_PATH
        .read()
        .ok()
        .and_then(|path| path.clone())
        .or_else(preferred_config_path)
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from_path(&path);
}

/// Load settings from `path`, creating it with defaults when missing
pub fn load_settings_from_path(path: &Path) {
    if let Ok(mut active) = ACTIVE_PATH.write() {
        *active = Some(path.to_path_buf());
    }

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, path);
        }
        return;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = active_config_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let yaml = match serde_yaml::to_string(settings) {
        Ok(yaml) => yaml,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{yaml}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# scholia settings
# ============================================================================
# default_note_color: yellow | red | blue | green
# heuristics: width and line-height estimates used to correct highlight
#   boxes that bleed into the next column or merge several lines.
#   Remove a key to go back to its default.
# data_dir: where annotations and reading positions are stored
#   (defaults to $SCHOLIA_DATA_DIR, then the platform data directory)

"#;

// Public API for accessing/modifying settings

pub fn get_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_default_note_color() -> HighlightColor {
    SETTINGS
        .read()
        .map(|s| s.default_note_color)
        .unwrap_or_else(|_| default_note_color())
}

pub fn get_scroll_save_debounce_ms() -> u64 {
    SETTINGS
        .read()
        .map(|s| s.scroll_save_debounce_ms)
        .unwrap_or_else(|_| default_scroll_save_debounce_ms())
}

pub fn set_scroll_save_debounce_ms(ms: u64) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.scroll_save_debounce_ms = ms;
    }
    save_settings();
}

pub fn get_heuristics() -> Heuristics {
    SETTINGS.read().map(|s| s.heuristics).unwrap_or_default()
}

pub fn set_data_dir(dir: Option<PathBuf>) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.data_dir = dir;
    }
    save_settings();
}

/// Resolve and create the data directory
pub fn data_dir() -> Result<PathBuf> {
    let configured = SETTINGS.read().ok().and_then(|s| s.data_dir.clone());
    let dir = match configured {
        Some(dir) => dir,
        None => match std::env::var(DATA_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .context("Could not determine data directory")?
                .join(APP_NAME),
        },
    };

    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create data directory")?;
    }
    Ok(dir)
}

pub fn annotations_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join(ANNOTATIONS_DIRNAME))
}

pub fn reader_state_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(READER_STATE_FILENAME))
}
