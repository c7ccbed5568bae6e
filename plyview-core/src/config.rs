/// Viewer configuration with TOML support.
///
/// Every section uses `#[serde(default)]`, so a file overriding only
/// `[gesture]` or a single field still loads.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gesture::GestureSettings;
use crate::light::Light;
use crate::ply::ParseOptions;
use crate::render::RenderSettings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Touch slops and tap timings
    pub gesture: GestureSettings,
    /// Point size and clip planes
    pub render: RenderSettings,
    /// Light at startup
    pub light: Light,
    pub parser: ParseOptions,
}

impl ViewerConfig {
    /// Load from a TOML file. Missing fields use defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        config.render = config.render.validated()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write as pretty TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, content).map_err(io_error)
    }
}
