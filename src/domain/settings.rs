use crate::domain::models::{ScanFilter, ScanMode};
use crate::infrastructure::bluetooth::protocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "ble_starter".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// An entry of the device-filter dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPreset {
    pub label: String,
    /// `None` scans for every device
    #[serde(default)]
    pub service_uuid: Option<String>,
}

impl FilterPreset {
    /// Resolve to a scan filter. An unparsable UUID scans unfiltered.
    pub fn to_filter(&self) -> ScanFilter {
        match self.service_uuid.as_deref() {
            None => ScanFilter::None,
            Some(raw) => match protocol::parse_uuid(raw) {
                Ok(uuid) => ScanFilter::ServiceUuid(uuid),
                Err(e) => {
                    warn!("Preset '{}': {}; scanning without filter", self.label, e);
                    ScanFilter::None
                }
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    // Scan Settings
    #[serde(default = "default_filter_presets")]
    pub filter_presets: Vec<FilterPreset>,
    #[serde(default)]
    pub selected_filter: usize,
    #[serde(default)]
    pub scan_mode: ScanMode,

    // Radio Settings
    #[serde(default = "default_true")]
    pub reprompt_on_enable_denied: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            filter_presets: default_filter_presets(),
            selected_filter: 0,
            scan_mode: ScanMode::default(),
            reprompt_on_enable_denied: default_true(),
        }
    }
}

fn default_filter_presets() -> Vec<FilterPreset> {
    vec![
        FilterPreset {
            label: "All devices".to_string(),
            service_uuid: None,
        },
        FilterPreset {
            label: "Würth Proteus".to_string(),
            service_uuid: Some(protocol::PROTEUS_SERVICE_UUID.to_string()),
        },
        FilterPreset {
            label: "Microchip".to_string(),
            service_uuid: Some(protocol::MICROCHIP_SERVICE_UUID.to_string()),
        },
    ]
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults.
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("BleStarter");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "scan_mode": "low_power" }"#).unwrap();
        assert_eq!(settings.scan_mode, ScanMode::LowPower);
        assert_eq!(settings.filter_presets.len(), 3);
        assert!(settings.reprompt_on_enable_denied);
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn test_presets_resolve_to_filters() {
        let presets = default_filter_presets();
        assert_eq!(presets[0].to_filter(), ScanFilter::None);
        assert!(matches!(presets[1].to_filter(), ScanFilter::ServiceUuid(_)));

        let broken = FilterPreset {
            label: "Broken".into(),
            service_uuid: Some("xyz".into()),
        };
        assert_eq!(broken.to_filter(), ScanFilter::None);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!(
            "ble_starter_settings_{}.json",
            std::process::id()
        ));
        let mut service = SettingsService::with_path(path.clone());
        service.get_mut().selected_filter = 2;
        service.save().unwrap();

        let reloaded = SettingsService::with_path(path.clone());
        assert_eq!(reloaded.get().selected_filter, 2);
        let _ = fs::remove_file(path);
    }
}
