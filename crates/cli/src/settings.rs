use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facecap_core::extraction::infrastructure::image_codec::CropEncoding;
use facecap_core::shared::bounding_box::Padding;
use facecap_core::shared::constants::{DEFAULT_CROP_PADDING, OVERLAY_PADDING};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub padding: Padding,
    pub scale: f64,
    pub encoding: CropEncoding,
    pub overlay_padding: u32,
    pub display_width: u32,
    pub display_height: u32,
    /// Where crops are written. `None` means the system temp directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            padding: Padding::uniform(DEFAULT_CROP_PADDING),
            scale: 1.0,
            encoding: CropEncoding::default(),
            overlay_padding: OVERLAY_PADDING,
            display_width: 640,
            display_height: 480,
            output_dir: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCap").join("settings.json"))
    }

    /// Stored settings, or defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Writes the settings to the config directory and returns the path.
    pub fn save(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("No config directory on this platform")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
