use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::consts::{
    DEFAULT_DEAD_ZONE, DEFAULT_INIT_DELAY, DEFAULT_REPEAT_DELAY, FRAME_SLICE_SIZE,
};
use crate::controller::DeviceDefaults;
use crate::mapping::RecorderSettings;

const CONFIG_DIR: &str = ".config/tickwork";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ButtonSettings {
    /// Frames a held button stays silent after its first press
    pub init_delay: u32,
    /// Frames between repeats once the initial delay has passed
    pub repeat_delay: u32,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            init_delay: DEFAULT_INIT_DELAY,
            repeat_delay: DEFAULT_REPEAT_DELAY,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Ticks per second of the host loop
    pub frame_rate: u32,
    pub frame_slice_size: usize,
    pub button: ButtonSettings,
    pub stick_dead_zone: f32,
    /// JSON controller profiles loaded at start
    pub profiles: Vec<PathBuf>,
    pub log_level: String,
    pub stats_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            frame_slice_size: FRAME_SLICE_SIZE,
            button: ButtonSettings::default(),
            stick_dead_zone: DEFAULT_DEAD_ZONE,
            profiles: Vec::new(),
            log_level: "info".to_string(),
            stats_interval_secs: 10,
        }
    }
}

impl Settings {
    pub fn get_home_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        })
    }

    pub fn path() -> PathBuf {
        let mut path = Self::get_home_dir();
        path.push(CONFIG_DIR);
        path.push(SETTINGS_FILE);
        path
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse settings: {}", e))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize settings: {}", e))
    }

    /// Writes the defaults unless a settings file already exists
    pub fn ensure_default() -> Result<PathBuf> {
        let path = Self::path();
        if !path.exists() {
            info!("Creating default settings at {}", path.display());
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
            }
            fs::write(&path, Self::default().to_toml()?)
                .map_err(|e| eyre!("Failed to write default settings: {}", e))?;
        }
        Ok(path)
    }

    pub fn load() -> Result<Self> {
        let path = Self::ensure_default()?;
        let content = fs::read_to_string(&path)
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        let settings = Self::from_toml(&content)?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn device_defaults(&self) -> DeviceDefaults {
        DeviceDefaults {
            init_delay: self.button.init_delay,
            repeat_delay: self.button.repeat_delay.max(1),
            stick_dead_zone: self.stick_dead_zone,
        }
    }

    /// Recorded sticks and axis presses carry the configured dead zone
    pub fn recorder_settings(&self) -> RecorderSettings {
        RecorderSettings {
            dead_zone: self.stick_dead_zone,
            ..RecorderSettings::default()
        }
    }

    /// Seconds per tick
    pub fn frame_time(&self) -> f32 {
        1.0 / self.frame_rate.max(1) as f32
    }
}
