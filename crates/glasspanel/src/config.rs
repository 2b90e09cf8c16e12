//! Configuration management for glasspanel.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dashboard::{DashboardOptions, Thresholds, ENGINE, FUEL};
use crate::error::{Error, Result};
use crate::registry::{Descriptor, DispatchMode, InstrumentOptions};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "glasspanel";

/// Environment variable prefix.
const ENV_PREFIX: &str = "GLASSPANEL_";

/// Property path grammar: slash-separated node names, each optionally
/// indexed, e.g. `/consumables/fuel/tank[1]/level-gal`.
const PATH_PATTERN: &str = r"^/?[A-Za-z0-9_.\-]+(\[\d+\])?(/[A-Za-z0-9_.\-]+(\[\d+\])?)*$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GLASSPANEL_`, nested keys joined
///    with `__`)
/// 2. TOML config file at `~/.config/glasspanel/config.toml`
/// 3. Default values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dashboard scaling and thresholds.
    pub dashboard: DashboardOptions,
    /// Frame loop settings.
    pub panel: PanelConfig,
    /// Instrument declarations, in registration order.
    pub instruments: Vec<InstrumentConfig>,
}

/// Frame loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Frames per second of the render loop.
    pub frame_rate_hz: u32,
}

/// One instrument declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Instrument name.
    pub name: String,
    /// `raf` for frame-aligned dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DispatchMode>,
    /// Quiet period for debounced dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    /// Ordered `(alias, path)` pairs.
    pub properties: Vec<PropertyBinding>,
}

/// An aliased property path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBinding {
    /// Argument name.
    pub alias: String,
    /// Property path, absolute or relative.
    pub path: String,
}

impl PropertyBinding {
    fn new(alias: &str, path: &str) -> Self {
        Self {
            alias: alias.to_string(),
            path: path.to_string(),
        }
    }
}

impl InstrumentConfig {
    /// Dispatch options of this instrument.
    #[must_use]
    pub fn options(&self) -> InstrumentOptions {
        InstrumentOptions {
            mode: self.mode,
            debounce_ms: self.debounce_ms,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dashboard: DashboardOptions::default(),
            panel: PanelConfig::default(),
            instruments: default_instruments(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { frame_rate_hz: 60 }
    }
}

/// Engine and fuel instruments on a single-engine, two-tank aircraft.
fn default_instruments() -> Vec<InstrumentConfig> {
    vec![
        InstrumentConfig {
            name: ENGINE.to_string(),
            mode: None,
            debounce_ms: None,
            properties: vec![
                PropertyBinding::new("rpm", "/engines/engine/rpm"),
                PropertyBinding::new("cht", "/engines/engine/cht-degf"),
            ],
        },
        InstrumentConfig {
            name: FUEL.to_string(),
            mode: None,
            debounce_ms: None,
            properties: vec![
                PropertyBinding::new("left", "/consumables/fuel/tank/left/level-gal"),
                PropertyBinding::new("right", "/consumables/fuel/tank/right/level-gal"),
            ],
        },
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation
    /// fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation
    /// fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let d = &self.dashboard;
        for (name, max) in [
            ("max_rpm", d.max_rpm),
            ("max_cht", d.max_cht),
            ("max_fuel", d.max_fuel),
        ] {
            if max.is_nan() || max <= 0.0 {
                return Err(invalid(format!("{name} must be greater than 0, got {max}")));
            }
        }

        if !(d.smooth_factor > 0.0 && d.smooth_factor <= 1.0) {
            return Err(invalid(format!(
                "smooth_factor must be in (0, 1], got {}",
                d.smooth_factor
            )));
        }

        check_thresholds("rpm_thresholds", d.rpm_thresholds, true)?;
        check_thresholds("cht_thresholds", d.cht_thresholds, true)?;
        check_thresholds("fuel_thresholds", d.fuel_thresholds, false)?;

        if self.panel.frame_rate_hz == 0 {
            return Err(invalid("frame_rate_hz must be greater than 0"));
        }

        self.validate_instruments()
    }

    fn validate_instruments(&self) -> Result<()> {
        let path_re = Regex::new(PATH_PATTERN)
            .map_err(|e| invalid(format!("property path pattern: {e}")))?;
        let mut seen = HashSet::new();

        for inst in &self.instruments {
            if inst.name.trim().is_empty() {
                return Err(invalid("instrument name must not be empty"));
            }
            if !seen.insert(inst.name.as_str()) {
                return Err(invalid(format!("instrument {} declared twice", inst.name)));
            }
            if inst.properties.is_empty() {
                return Err(invalid(format!("instrument {} has no properties", inst.name)));
            }
            for (i, prop) in inst.properties.iter().enumerate() {
                if inst.properties[..i].iter().any(|p| p.alias == prop.alias) {
                    return Err(invalid(format!(
                        "instrument {}: alias {} declared twice",
                        inst.name, prop.alias
                    )));
                }
                if !path_re.is_match(&prop.path) {
                    return Err(invalid(format!(
                        "instrument {}: invalid property path {:?}",
                        inst.name, prop.path
                    )));
                }
            }
        }

        for required in [ENGINE, FUEL] {
            match self.instruments.iter().find(|i| i.name == required) {
                None => return Err(invalid(format!("instrument {required} is required"))),
                Some(inst) if inst.properties.len() != 2 => {
                    return Err(invalid(format!(
                        "instrument {required} needs exactly 2 properties, got {}",
                        inst.properties.len()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Instrument declarations as a registry descriptor.
    #[must_use]
    pub fn descriptor(&self) -> Descriptor {
        self.instruments
            .iter()
            .fold(Descriptor::new(), |descriptor, inst| {
                descriptor.instrument(
                    inst.name.clone(),
                    inst.properties
                        .iter()
                        .map(|p| (p.alias.clone(), p.path.clone())),
                )
            })
    }

    /// Dispatch options keyed by instrument name.
    #[must_use]
    pub fn instrument_options(&self) -> BTreeMap<String, InstrumentOptions> {
        self.instruments
            .iter()
            .map(|i| (i.name.clone(), i.options()))
            .collect()
    }

    /// Duration of one frame.
    #[must_use]
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.panel.frame_rate_hz.max(1)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

fn check_thresholds(name: &str, t: Thresholds, ascending: bool) -> Result<()> {
    let in_range = |v: f64| (0.0..=1.0).contains(&v);
    if !in_range(t.warn()) || !in_range(t.alarm()) {
        return Err(invalid(format!("{name} must lie within [0, 1]")));
    }
    let ordered = if ascending {
        t.warn() <= t.alarm()
    } else {
        t.warn() >= t.alarm()
    };
    if !ordered {
        let order = if ascending { "ascending" } else { "descending" };
        return Err(invalid(format!("{name} must be {order} [warn, alarm]")));
    }
    Ok(())
}
