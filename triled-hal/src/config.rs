use derive_more::{Display, Error, From};
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use triled_lights_lib::{ControlPoint, DEFAULT_MAX_BRIGHTNESS};

/// Default TCP port for the dispatch server
pub const DEFAULT_PORT: u16 = 4782;

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

/// Errors from loading the config file
#[derive(Debug, Display, Error, From)]
pub enum ConfigError {
    #[display("failed to read config: {_0}")]
    Io(std::io::Error),
    #[display("invalid config: {_0}")]
    Parse(serde_json::Error),
}

/// Sysfs attribute per control point, relative to `Config::sysfs_root`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysfsPaths {
    pub backlight: PathBuf,
    pub red: PathBuf,
    pub green: PathBuf,
    pub blue: PathBuf,
    pub red_on_time: PathBuf,
    pub red_period: PathBuf,
    pub red_ramp_time: PathBuf,
    pub red_blink: PathBuf,
}

impl Default for SysfsPaths {
    fn default() -> Self {
        Self {
            backlight: "sys/class/leds/lcd-backlight/brightness".into(),
            red: "sys/class/leds/red/brightness".into(),
            green: "sys/class/leds/green/brightness".into(),
            blue: "sys/class/leds/blue/brightness".into(),
            red_on_time: "sys/class/leds/red/on_time".into(),
            red_period: "sys/class/leds/red/period".into(),
            red_ramp_time: "sys/class/leds/red/ramp_time".into(),
            red_blink: "sys/class/leds/red/blink".into(),
        }
    }
}

impl SysfsPaths {
    #[must_use]
    pub fn get(&self, point: ControlPoint) -> &Path {
        match point {
            ControlPoint::Backlight => &self.backlight,
            ControlPoint::Red => &self.red,
            ControlPoint::Green => &self.green,
            ControlPoint::Blue => &self.blue,
            ControlPoint::RedOnTime => &self.red_on_time,
            ControlPoint::RedPeriod => &self.red_period,
            ControlPoint::RedRampTime => &self.red_ramp_time,
            ControlPoint::RedBlink => &self.red_blink,
        }
    }

    fn get_mut(&mut self, point: ControlPoint) -> &mut PathBuf {
        match point {
            ControlPoint::Backlight => &mut self.backlight,
            ControlPoint::Red => &mut self.red,
            ControlPoint::Green => &mut self.green,
            ControlPoint::Blue => &mut self.blue,
            ControlPoint::RedOnTime => &mut self.red_on_time,
            ControlPoint::RedPeriod => &mut self.red_period,
            ControlPoint::RedRampTime => &mut self.red_ramp_time,
            ControlPoint::RedBlink => &mut self.red_blink,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the dispatch server listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub log_level: LogLevel,
    /// Prefix for every sysfs path; lets the service run against a fake tree
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default)]
    pub paths: SysfsPaths,
    /// Where the panel's maximum backlight level is read from at startup
    #[serde(default = "default_max_brightness_path")]
    pub backlight_max_brightness_path: PathBuf,
    /// Fixed panel maximum, skipping the sysfs read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlight_max_brightness: Option<u32>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT))
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_max_brightness_path() -> PathBuf {
    PathBuf::from("sys/class/leds/lcd-backlight/max_brightness")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: LogLevel::default(),
            sysfs_root: default_sysfs_root(),
            paths: SysfsPaths::default(),
            backlight_max_brightness_path: default_max_brightness_path(),
            backlight_max_brightness: None,
        }
    }
}

impl Config {
    /// Clamp values to valid ranges and fix invalid values
    pub fn validate(&mut self) {
        let defaults = SysfsPaths::default();
        for point in ControlPoint::ALL {
            if self.paths.get(point).as_os_str().is_empty() {
                warn!("Path for {} is empty, resetting to default", point.name());
                *self.paths.get_mut(point) = defaults.get(point).to_path_buf();
            }
        }
        if self.backlight_max_brightness == Some(0) {
            warn!("backlight_max_brightness of 0 is invalid, reading it from sysfs instead");
            self.backlight_max_brightness = None;
        }
    }

    /// Full path of a control point's sysfs attribute
    #[must_use]
    pub fn path_for(&self, point: ControlPoint) -> PathBuf {
        self.sysfs_root.join(self.paths.get(point))
    }

    /// Load from `path` if given, falling back to defaults on any error.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No config file given, using defaults");
            return Self::default();
        };

        match Self::load(path) {
            Ok(mut config) => {
                info!("Loaded config from {}", path.display());
                config.validate();
                config
            }
            Err(e) => {
                warn!("Failed to load config from {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let buf = std::fs::read(path)?;
        debug!("Config file size: {} bytes", buf.len());
        let config: Config = serde_json::from_slice(&buf)?;
        debug!(
            "Config parsed: listen={}, log_level={:?}, sysfs_root={}",
            config.listen,
            config.log_level,
            config.sysfs_root.display()
        );
        Ok(config)
    }

    /// The panel's maximum backlight level.
    ///
    /// Uses the configured override when present, otherwise reads the sysfs
    /// attribute. Falls back to the reference maximum when neither yields a
    /// positive value.
    pub fn panel_max_brightness(&self) -> u32 {
        if let Some(max) = self.backlight_max_brightness {
            return max;
        }

        let path = self.sysfs_root.join(&self.backlight_max_brightness_path);
        let max = match std::fs::read_to_string(&path) {
            Ok(text) => match text.trim().parse::<u32>() {
                Ok(max) => max,
                Err(e) => {
                    warn!("Invalid max brightness '{}' in {}: {e}", text.trim(), path.display());
                    DEFAULT_MAX_BRIGHTNESS
                }
            },
            Err(e) => {
                warn!("Failed to read max brightness from {}: {e}", path.display());
                DEFAULT_MAX_BRIGHTNESS
            }
        };

        if max == 0 {
            warn!("Panel reports max brightness 0, using {DEFAULT_MAX_BRIGHTNESS}");
            return DEFAULT_MAX_BRIGHTNESS;
        }
        max
    }
}
