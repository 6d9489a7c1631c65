use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::export::DEFAULT_EXPORT_FILENAME;
use crate::purpose::Purpose;

pub const CURRENT_VERSION: u32 = 2;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "dropmark";
const LEGACY_EXPORT_FILENAME: &str = "drops.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Marker storage file; the platform data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,

    /// Directory for CSV exports; the working directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    #[serde(default = "default_export_filename")]
    pub export_filename: String,

    #[serde(default)]
    pub default_purpose: Purpose,

    #[serde(default = "default_zoom")]
    pub zoom: f32,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_export_filename() -> String {
    DEFAULT_EXPORT_FILENAME.to_string()
}

fn default_zoom() -> f32 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            storage_path: None,
            export_dir: None,
            export_filename: default_export_filename(),
            default_purpose: Purpose::default(),
            zoom: default_zoom(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));
static ACTIVE_PATH: LazyLock<RwLock<Option<PathBuf>>> = LazyLock::new(|| RwLock::new(None));

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, creating the file with defaults
/// when it does not exist yet.
pub fn load_settings() {
    let Some(path) = default_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from(&path);
}

/// Load settings from `path` and remember it as the save target.
pub fn load_settings_from(path: &Path) {
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

    if settings.version < 2 && settings.export_filename == LEGACY_EXPORT_FILENAME {
        settings.export_filename = default_export_filename();
    }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let path = ACTIVE_PATH
        .read()
        .ok()
        .and_then(|p| p.clone())
        .or_else(default_config_path);
    let Some(path) = path else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = match generate_settings_yaml(settings) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> Result<String, serde_yaml::Error> {
    let mut content = String::from(SETTINGS_HEADER);
    content.push_str(&serde_yaml::to_string(settings)?);
    Ok(content)
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# dropmark settings
# ============================================================================
# storage_path:    marker storage file (default: <data dir>/dropmark/storage.json)
# export_dir:      where CSV exports are written (default: current directory)
# export_filename: default CSV name
# default_purpose: Network, Power, Data, Audio, Voice, Security, Control, Other
# zoom:            initial zoom, 0.5 to 4.0
# log_level:       off, error, warn, info, debug, trace

"#;

// Public API for accessing/modifying settings

pub fn get_storage_path() -> Option<PathBuf> {
    SETTINGS.read().ok().and_then(|s| s.storage_path.clone())
}

pub fn get_export_dir() -> PathBuf {
    SETTINGS
        .read()
        .ok()
        .and_then(|s| s.export_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn get_export_filename() -> String {
    SETTINGS
        .read()
        .map(|s| s.export_filename.clone())
        .unwrap_or_else(|_| default_export_filename())
}

pub fn get_default_purpose() -> Purpose {
    SETTINGS
        .read()
        .map(|s| s.default_purpose)
        .unwrap_or_default()
}

pub fn get_zoom() -> f32 {
    SETTINGS
        .read()
        .map(|s| s.zoom)
        .unwrap_or_else(|_| default_zoom())
}

pub fn set_zoom(zoom: f32) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.zoom = zoom;
    }
    save_settings();
}

pub fn get_log_level() -> String {
    SETTINGS
        .read()
        .map(|s| s.log_level.clone())
        .unwrap_or_else(|_| default_log_level())
}

pub fn get_log_file() -> Option<PathBuf> {
    SETTINGS.read().ok().and_then(|s| s.log_file.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn reset() {
        if let Ok(mut settings) = SETTINGS.write() {
            *settings = Settings::default();
        }
    }

    fn snapshot() -> Settings {
        SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
    }

    #[test]
    #[serial]
    fn missing_file_is_created_with_defaults() {
        reset();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dropmark").join("config.yaml");

        load_settings_from(&path);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# ===="));
        let parsed: Settings = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    #[serial]
    fn partial_file_fills_defaults() {
        reset();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "version: 2\ndefault_purpose: Power\nzoom: 1.5\n").unwrap();

        load_settings_from(&path);

        assert_eq!(get_default_purpose(), Purpose::Power);
        assert!((get_zoom() - 1.5).abs() < f32::EPSILON);
        assert_eq!(get_export_filename(), DEFAULT_EXPORT_FILENAME);
        assert_eq!(get_log_level(), "info");
    }

    #[test]
    #[serial]
    fn v1_settings_are_migrated() {
        reset();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nexport_filename: drops.csv\n").unwrap();

        load_settings_from(&path);

        let settings = snapshot();
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.export_filename, DEFAULT_EXPORT_FILENAME);

        let on_disk: Settings = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.version, CURRENT_VERSION);
    }

    #[test]
    #[serial]
    fn zoom_change_persists_to_active_path() {
        reset();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        load_settings_from(&path);

        set_zoom(1.5625);

        let on_disk: Settings = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.zoom, 1.5625);
        assert_eq!(get_zoom(), 1.5625);
    }

    #[test]
    #[serial]
    fn unparsable_file_keeps_defaults() {
        reset();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "zoom: [not, a, number\n").unwrap();

        load_settings_from(&path);
        assert_eq!(snapshot(), Settings::default());
    }
}
