use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::info;
use plotarm_motion::{
    arm::Duration,
    config::{
        BAUD_RATE, DEFAULT_DRAWING_PATH, HOME_X_MM, HOME_Y_MM, MOVE_FEEDRATE, PAPER_Z_MM,
        PRESSURE_FACTOR, SAFE_Z_MM, SETTLE_DELAY_MS,
    },
    drawing::CanvasTransform,
    motion::{AxisMode, PlotterState},
};
use serde::{Deserialize, Serialize};

// Read from the working directory when no file is given
pub const DEFAULT_CONFIG_FILE: &str = "plotarm.toml";
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime settings, every field optional in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: String,
    pub baud_rate: u32,
    pub drawing_path: PathBuf,
    // mm/min
    pub feedrate: u32,
    pub plotter: PlotterConfig,
    pub canvas: CanvasTransform,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: BAUD_RATE,
            drawing_path: PathBuf::from(DEFAULT_DRAWING_PATH),
            feedrate: MOVE_FEEDRATE,
            plotter: PlotterConfig::default(),
            canvas: CanvasTransform::default(),
        }
    }
}

/// The starting calibration. Changes made from the console are not saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotterConfig {
    pub paper_z: f64,
    pub z_offset: f64,
    pub safe_z: f64,
    // Positive, stored negated as the pressure factor
    pub pressure: f64,
    pub axis_mode: AxisMode,
    pub home_x: f64,
    pub home_y: f64,
    pub settle_ms: u64,
}

impl Default for PlotterConfig {
    fn default() -> Self {
        Self {
            paper_z: PAPER_Z_MM,
            z_offset: 0.0,
            safe_z: SAFE_Z_MM,
            pressure: -PRESSURE_FACTOR,
            axis_mode: AxisMode::Cartesian,
            home_x: HOME_X_MM,
            home_y: HOME_Y_MM,
            settle_ms: SETTLE_DELAY_MS,
        }
    }
}

impl PlotterConfig {
    pub fn to_state(&self) -> PlotterState {
        PlotterState::new()
            .with_paper_z(self.paper_z)
            .with_z_offset(self.z_offset)
            .with_safe_z(self.safe_z)
            .with_pressure_value(self.pressure)
            .with_axis_mode(self.axis_mode)
            .with_home(self.home_x, self.home_y)
            .with_settle(Duration::millis(self.settle_ms))
    }
}

impl AppConfig {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, or `plotarm.toml` if it exists, or fall back to the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == io::ErrorKind::NotFound => {
                info!("No {} found. Using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::from_toml(&text, path)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = AppConfig::from_toml("", Path::new("empty.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.plotter.to_state(), PlotterState::new());
    }

    #[test]
    fn test_partial_file_overrides() {
        let text = r#"
port = "/dev/ttyUSB1"
baud_rate = 9600

[plotter]
paper_z = -48.5
pressure = 8
axis_mode = "slider"

[canvas]
y_offset = 200.0
"#;
        let config = AppConfig::from_toml(text, Path::new("plotarm.toml")).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB1");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.feedrate, MOVE_FEEDRATE);
        assert_eq!(config.canvas.y_offset, 200.0);
        assert_eq!(config.canvas.scale, 25.0);

        let state = config.plotter.to_state();
        assert_eq!(state.base_z(), -48.5);
        assert_eq!(state.pressure_factor(), -8.0);
        assert_eq!(state.axis_mode(), AxisMode::Slider);
        assert_eq!(state.safe_z(), SAFE_Z_MM);
    }

    #[test]
    fn test_bad_file_reports_path() {
        let err = AppConfig::from_toml("feedrate = \"fast\"", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = std::env::temp_dir().join("plotarm-config-that-does-not-exist.toml");
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Io { .. })
        ));
    }
}
