//! Configuration for the fetch, prepare, and dashboard binaries.
//!
//! Every value has a default, so a missing `hotspot.toml` is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// File looked up in the working directory when `HOTSPOT_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "hotspot.toml";

/// Environment variable pointing at an alternative configuration file.
pub const CONFIG_ENV_VAR: &str = "HOTSPOT_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory layout.
    pub paths: PathsConfig,
    /// Tourism API settings.
    pub api: ApiConfig,
    /// Boundary file and attribute names.
    pub boundaries: BoundaryConfig,
    /// Kernel density settings.
    pub density: DensityConfig,
}

/// Directory layout of inputs, intermediates, and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of all data.
    pub data_dir: PathBuf,
    /// Downloaded source data.
    pub raw_data_dir: PathBuf,
    /// One JSON file per fetched accommodation page.
    pub pages_dir: PathBuf,
    /// Batches of room info results.
    pub room_batches_dir: PathBuf,
    /// Cleaned and joined tables.
    pub prepared_dir: PathBuf,
    /// Files read by the dashboard.
    pub dashboard_dir: PathBuf,
    /// Rendered images.
    pub plot_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        let raw_data_dir = data_dir.join("raw_data");
        let api_dir = raw_data_dir.join("api_calls");
        Self {
            pages_dir: api_dir.join("main_call"),
            room_batches_dir: api_dir.join("room_info"),
            prepared_dir: data_dir.join("prepared_data"),
            dashboard_dir: data_dir.join("dashboard_data"),
            plot_dir: PathBuf::from("plots"),
            raw_data_dir,
            data_dir,
        }
    }
}

impl PathsConfig {
    /// Every directory in creation order.
    #[must_use]
    pub fn dirs(&self) -> Vec<&Path> {
        vec![
            &self.data_dir,
            &self.plot_dir,
            &self.raw_data_dir,
            &self.prepared_dir,
            &self.dashboard_dir,
            &self.pages_dir,
            &self.room_batches_dir,
        ]
    }

    /// All fetched records flattened into one table.
    #[must_use]
    pub fn parsed_accommodations_file(&self) -> PathBuf {
        self.prepared_dir.join("accommodations_parsed.csv")
    }

    /// Cleaned, joined accommodation table.
    #[must_use]
    pub fn prepared_accommodations_file(&self) -> PathBuf {
        self.prepared_dir.join("accommodations_cleaned.csv")
    }

    /// Merged room info of all accommodations.
    #[must_use]
    pub fn room_info_file(&self) -> PathBuf {
        self.prepared_dir.join("accommodation_rooms.csv")
    }

    /// Per-municipality metrics as a flat table.
    #[must_use]
    pub fn municipality_table_file(&self) -> PathBuf {
        self.prepared_dir.join("municipalities.csv")
    }

    /// Per-municipality metrics with boundaries for the dashboard.
    #[must_use]
    pub fn municipality_geojson_file(&self) -> PathBuf {
        self.dashboard_dir.join("municipality.geojson")
    }

    /// Kernel density grid for the dashboard.
    #[must_use]
    pub fn density_file(&self) -> PathBuf {
        self.dashboard_dir.join("density.json")
    }
}

/// Tourism API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the Open Data Hub tourism API.
    pub base_url: String,
    /// Entries per page.
    pub page_size: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Room info results are flushed to disk after this many calls.
    pub room_batch_size: usize,
    /// Language of names requested from the API.
    pub language: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tourism.api.opendatahub.bz.it/v1".to_owned(),
            page_size: 200,
            timeout_secs: 60,
            user_agent: "hotspot/0.1".to_owned(),
            room_batch_size: 200,
            language: "de".to_owned(),
        }
    }
}

/// Boundary file and its attribute names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Shapefile (`.shp`) or GeoJSON file with municipal polygons.
    pub file: PathBuf,
    /// Attribute holding the German name.
    pub name_de_field: String,
    /// Attribute holding the Italian name.
    pub name_it_field: String,
    /// Attribute holding the resident population.
    pub population_field: String,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data/raw_data/shapefiles/OfficialResidentPopulation_polygon.shp"),
            name_de_field: "NAME_D".to_owned(),
            name_it_field: "NAME_I".to_owned(),
            population_field: "BW_WOHNBEV".to_owned(),
        }
    }
}

/// Kernel density estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Grid nodes per axis.
    pub grid_size: usize,
    /// Gaussian kernel bandwidth in degrees.
    pub bandwidth: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            grid_size: 200,
            bandwidth: 0.03,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_owned(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `HOTSPOT_CONFIG`, else `hotspot.toml`, else defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when an existing file is unreadable or invalid.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            info!(path = %path, "loading configuration from {CONFIG_ENV_VAR}");
            return Self::from_file(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            info!(path = %default_path.display(), "loading configuration");
            return Self::from_file(default_path);
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Check values that would make the pipeline misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.page_size == 0 {
            return Err(ConfigError::Invalid("api.page_size must be positive".to_owned()));
        }
        if self.api.room_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "api.room_batch_size must be positive".to_owned(),
            ));
        }
        if self.density.grid_size < 2 {
            return Err(ConfigError::Invalid(
                "density.grid_size must be at least 2".to_owned(),
            ));
        }
        if !(self.density.bandwidth.is_finite() && self.density.bandwidth > 0.0) {
            return Err(ConfigError::Invalid(
                "density.bandwidth must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Create every directory the pipeline writes to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CreateDir`] when a directory cannot be created.
    pub fn prepare_dirs(&self) -> Result<(), ConfigError> {
        for dir in self.paths.dirs() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.to_owned(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        /// Configuration file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`Config`].
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// Configuration file.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// An output directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}
