#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the risk map server and ingestion CLI.
//!
//! Defaults are embedded from `default.toml` at compile time. A replacement
//! file can be named with `RISK_MAP_CONFIG`, and a handful of environment
//! variables override individual values on top of whichever file was used:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `VWORLD_API_KEY` | `vworld.key` |
//! | `RISK_MAP_DATA_DIR` | `data.dir` |
//! | `BIND_ADDR` | `server.bind_addr` |
//! | `PORT` | `server.port` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use risk_map_geocoder::VWorldSettings;
use risk_map_ingest_models::{DatasetDefinition, PopulationDataset};
use risk_map_point_models::RiskType;
use risk_map_risk_models::{ProfileSet, RiskParams, RiskProfile};
use risk_map_spatial::{BoundingBox, GridSpec};
use serde::{Deserialize, Serialize};

/// Embedded default configuration.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../default.toml");

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has the wrong shape.
    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    Env {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },

    /// A value is out of its allowed range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Map area and lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Area scored by the risk grid.
    pub bounds: BoundingBox,
    /// Lattice step sizes.
    pub grid: GridStep,
    /// Initial map view center handed to clients.
    pub center: MapCenter,
}

/// Lattice step sizes in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStep {
    /// Latitude step.
    pub step_lat: f64,
    /// Longitude step.
    pub step_lon: f64,
}

/// A map center point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// VWorld API access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VWorldConfig {
    /// API key; empty disables every VWorld call.
    #[serde(default)]
    pub key: String,
    /// Request base URL.
    pub base_url: String,
    /// Delay before each forward geocoding request, in milliseconds.
    pub rate_limit_ms: u64,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
}

impl VWorldConfig {
    /// Client settings for these values.
    #[must_use]
    pub fn settings(&self) -> VWorldSettings {
        VWorldSettings {
            key: self.key.clone(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            rate_limit: Duration::from_millis(self.rate_limit_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Dataset file location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory dataset file names are resolved against.
    pub dir: PathBuf,
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Map area and lattice.
    pub map: MapConfig,
    /// VWorld API access.
    pub vworld: VWorldConfig,
    /// Dataset location.
    pub data: DataConfig,
    /// Facility datasets, imported in this order.
    pub datasets: Vec<DatasetDefinition>,
    /// Population dataset.
    pub population: PopulationDataset,
    /// Risk profile parameters.
    #[serde(default)]
    pub profiles: ProfileSet,
    /// HTTP listener.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not a valid configuration.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Loads the configuration for this process: the file named by
    /// `RISK_MAP_CONFIG` or the embedded defaults, then environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file or an override is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("RISK_MAP_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading configuration from {path}");
                Self::from_file(Path::new(path.trim()))?
            }
            _ => Self::from_toml(DEFAULT_CONFIG_TOML)?,
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies environment-style overrides from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `PORT` is not a valid port number.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(key) = lookup("VWORLD_API_KEY") {
            self.vworld.key = key.trim().to_string();
        }
        if let Some(dir) = lookup("RISK_MAP_DATA_DIR")
            && !dir.trim().is_empty()
        {
            self.data.dir = PathBuf::from(dir.trim());
        }
        if let Some(addr) = lookup("BIND_ADDR")
            && !addr.trim().is_empty()
        {
            self.server.bind_addr = addr.trim().to_string();
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::Env {
                name: "PORT",
                value: port.clone(),
            })?;
        }

        if self.vworld.key.is_empty() {
            log::warn!("VWORLD_API_KEY is not set; geocoding and address search are disabled");
        }

        Ok(())
    }

    /// The scoring lattice.
    #[must_use]
    pub const fn grid(&self) -> GridSpec {
        GridSpec::new(self.map.bounds, self.map.grid.step_lat, self.map.grid.step_lon)
    }

    /// Checks value ranges and dataset coverage.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.map.bounds;
        if !(b.min_lat <= b.max_lat && b.min_lon <= b.max_lon) {
            return Err(invalid("map.bounds minimums must not exceed maximums"));
        }
        for (name, step) in [
            ("map.grid.step_lat", self.map.grid.step_lat),
            ("map.grid.step_lon", self.map.grid.step_lon),
        ] {
            if !(step.is_finite() && step > 0.0) {
                return Err(invalid(format!("{name} must be positive")));
            }
        }

        for profile in [RiskProfile::BlindSpots, RiskProfile::Refined] {
            validate_params(profile, self.profiles.get(profile))?;
        }

        for risk_type in RiskType::all() {
            let count = self
                .datasets
                .iter()
                .filter(|d| d.risk_type == *risk_type)
                .count();
            if count != 1 {
                return Err(invalid(format!(
                    "expected exactly one dataset of type {risk_type}, found {count}"
                )));
            }
        }

        for def in &self.datasets {
            if def.geocode && def.address.fixed().is_none() {
                return Err(invalid(format!(
                    "dataset {} enables geocoding without a fixed address column",
                    def.risk_type
                )));
            }
        }

        Ok(())
    }
}

fn validate_params(profile: RiskProfile, params: &RiskParams) -> Result<(), ConfigError> {
    for (name, radius) in [
        ("facility_radius_m", params.facility_radius_m),
        ("population_radius_m", params.population_radius_m),
        ("clip_radius_m", params.clip_radius_m),
        ("soft_mask_radius_m", params.soft_mask_radius_m),
    ] {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(invalid(format!("profiles.{profile}.{name} must be positive")));
        }
    }
    if !(params.score_range.min <= params.score_range.max) {
        return Err(invalid(format!(
            "profiles.{profile}.score_range min must not exceed max"
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use risk_map_ingest_models::{ColumnMode, DatasetEncoding};

    use super::*;

    fn defaults() -> AppConfig {
        AppConfig::from_toml(DEFAULT_CONFIG_TOML).unwrap()
    }

    #[test]
    fn embedded_defaults_are_valid() {
        let config = defaults();
        assert_eq!(config.datasets.len(), 3);
        assert_eq!(config.profiles, ProfileSet::default());
        assert!(config.vworld.key.is_empty());
        assert_eq!(config.vworld.rate_limit_ms, 100);
        assert!(!config.grid().is_empty());
    }

    #[test]
    fn default_datasets_match_published_layouts() {
        let config = defaults();
        let cctv = &config.datasets[0];
        assert_eq!(cctv.risk_type, RiskType::Cctv);
        assert_eq!(cctv.encoding, DatasetEncoding::Ms949);
        assert_eq!(cctv.latitude, ColumnMode::AutoDetect);

        let police = &config.datasets[1];
        assert_eq!(police.latitude, ColumnMode::Fixed(1));
        assert_eq!(police.longitude, ColumnMode::Fixed(0));

        assert_eq!(config.population.geocode_prefix, "성남시");
    }

    #[test]
    fn overrides_apply() {
        let env: BTreeMap<&str, &str> = [
            ("VWORLD_API_KEY", " secret "),
            ("RISK_MAP_DATA_DIR", "/srv/data"),
            ("PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = defaults();
        config
            .apply_overrides(|name| env.get(name).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.vworld.key, "secret");
        assert_eq!(config.data.dir, PathBuf::from("/srv/data"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = defaults();
        let result = config.apply_overrides(|name| (name == "PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::Env { name: "PORT", .. })));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let text = DEFAULT_CONFIG_TOML.replace("min_lat = 37.33", "min_lat = 37.6");
        assert!(matches!(
            AppConfig::from_toml(&text),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_zero_step() {
        let text = DEFAULT_CONFIG_TOML.replace("step_lat = 0.002", "step_lat = 0.0");
        assert!(matches!(
            AppConfig::from_toml(&text),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_dataset_type() {
        let text = DEFAULT_CONFIG_TOML.replace("type = \"POLICE\"", "type = \"CCTV\"");
        let Err(ConfigError::Invalid { message }) = AppConfig::from_toml(&text) else {
            panic!("expected validation failure");
        };
        assert!(message.contains("CCTV"));
    }

    #[test]
    fn rejects_unknown_encoding() {
        let text = DEFAULT_CONFIG_TOML.replace("encoding = \"ms949\"", "encoding = \"latin1\"");
        assert!(matches!(
            AppConfig::from_toml(&text),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn vworld_settings_strip_trailing_slash() {
        let mut config = defaults();
        config.vworld.base_url = "https://api.vworld.kr/req/".to_string();
        let settings = config.vworld.settings();
        assert_eq!(settings.base_url, "https://api.vworld.kr/req");
        assert_eq!(settings.rate_limit, Duration::from_millis(100));
        assert_eq!(settings.timeout, Duration::from_secs(10));
    }
}
