use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::Tag;
use crate::geometry::{AreaStrategy, DEFAULT_RADIUS_M};
use crate::output::DEFAULT_OUTPUT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_max_results() -> u32 {
    10
}
fn default_radius() -> f64 {
    DEFAULT_RADIUS_M
}
fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

/// Contents of a `poiscout.toml` file. Every key is optional.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub strategy: Option<AreaStrategy>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub nominatim: Option<NominatimConfig>,
    #[serde(default)]
    pub overpass: Option<OverpassConfig>,
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_user_agent() -> String {
    concat!("poiscout/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_nominatim_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct NominatimConfig {
    #[serde(default = "default_nominatim_url")]
    pub url: String,
    /// Sent with every request, Nominatim and Overpass alike
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_nominatim_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            url: default_nominatim_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_nominatim_timeout_secs(),
        }
    }
}

fn default_overpass_urls() -> Vec<String> {
    vec![
        "https://overpass-api.de/api/interpreter".to_string(),
        "https://lz4.overpass-api.de/api/interpreter".to_string(),
        "https://overpass.kumi.systems/api/interpreter".to_string(),
        "https://overpass.nchc.org.tw/api/interpreter".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_server_timeout_secs() -> u64 {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverpassConfig {
    /// Mirrors, tried in this order
    #[serde(default = "default_overpass_urls")]
    pub urls: Vec<String>,
    /// Client-side timeout per endpoint attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `[timeout:N]` sent inside the query
    #[serde(default = "default_server_timeout_secs")]
    pub server_timeout_secs: u64,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            urls: default_overpass_urls(),
            timeout_secs: default_timeout_secs(),
            server_timeout_secs: default_server_timeout_secs(),
        }
    }
}

impl FileConfig {
    /// Load the first usable config file in the standard locations.
    ///
    /// Files that exist but fail to load are skipped and returned alongside,
    /// so the caller can report them once logging is set up.
    pub fn load() -> (Option<Self>, Vec<ConfigError>) {
        Self::load_first(&get_config_paths())
    }

    fn load_first(paths: &[PathBuf]) -> (Option<Self>, Vec<ConfigError>) {
        let mut skipped = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::from_path(path) {
                Ok(config) => return (Some(config), skipped),
                Err(e) => skipped.push(e),
            }
        }
        (None, skipped)
    }

    /// Load an explicitly requested config file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("poiscout.toml"));
    paths.push(PathBuf::from(".poiscout.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("poiscout").join("config.toml"));
        paths.push(config_dir.join("poiscout.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".poiscout.toml"));
    }

    paths
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub address: Option<String>,
    pub tag: Tag,
    pub max_results: u32,
    pub radius_m: f64,
    pub strategy: AreaStrategy,
    pub output: PathBuf,
    pub verbose: bool,
    pub nominatim: NominatimConfig,
    pub overpass: OverpassConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: None,
            tag: Tag::default(),
            max_results: default_max_results(),
            radius_m: default_radius(),
            strategy: AreaStrategy::default(),
            output: default_output(),
            verbose: false,
            nominatim: NominatimConfig::default(),
            overpass: OverpassConfig::default(),
        }
    }
}

impl Settings {
    /// Apply a config file on top of the built-in defaults
    pub fn from_file(file: Option<FileConfig>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else {
            return defaults;
        };

        Self {
            address: file.address,
            tag: file.tag.unwrap_or(defaults.tag),
            max_results: file.max_results.unwrap_or(defaults.max_results),
            radius_m: file.radius.unwrap_or(defaults.radius_m),
            strategy: file.strategy.unwrap_or(defaults.strategy),
            output: file.output.unwrap_or(defaults.output),
            verbose: file.verbose,
            nominatim: file.nominatim.unwrap_or(defaults.nominatim),
            overpass: file.overpass.unwrap_or(defaults.overpass),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.overpass.urls.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one Overpass URL is required".to_string(),
            ));
        }
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "radius must be a positive number of meters, got {}",
                self.radius_m
            )));
        }
        if self.nominatim.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "a non-empty user agent is required by Nominatim".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let file: FileConfig = toml::from_str("").unwrap();
        let settings = Settings::from_file(Some(file));

        assert_eq!(settings.tag, Tag::new("amenity", "cafe"));
        assert_eq!(settings.max_results, 10);
        assert_eq!(settings.radius_m, 350.0);
        assert_eq!(settings.strategy, AreaStrategy::Radius);
        assert_eq!(settings.output, PathBuf::from("results.csv"));
        assert_eq!(settings.overpass.urls.len(), 4);
        assert_eq!(settings.overpass.server_timeout_secs, 25);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let file: FileConfig = toml::from_str(
            r#"
            address = "Hermannstraße 100, Berlin"
            tag = "shop=bakery"
            max_results = 25
            radius = 500.0
            strategy = "bbox"
            output = "bakeries.csv"

            [nominatim]
            user_agent = "MyBusinessSearcher/1.0 (ops@example.org)"

            [overpass]
            urls = ["https://overpass.example/api/interpreter"]
            timeout_secs = 20
            "#,
        )
        .unwrap();
        let settings = Settings::from_file(Some(file));

        assert_eq!(settings.address.as_deref(), Some("Hermannstraße 100, Berlin"));
        assert_eq!(settings.tag, Tag::new("shop", "bakery"));
        assert_eq!(settings.max_results, 25);
        assert_eq!(settings.radius_m, 500.0);
        assert_eq!(settings.strategy, AreaStrategy::Bbox);
        assert_eq!(settings.output, PathBuf::from("bakeries.csv"));
        assert_eq!(
            settings.nominatim.url,
            "https://nominatim.openstreetmap.org/search"
        );
        assert_eq!(
            settings.nominatim.user_agent,
            "MyBusinessSearcher/1.0 (ops@example.org)"
        );
        assert_eq!(settings.overpass.urls.len(), 1);
        assert_eq!(settings.overpass.timeout_secs, 20);
        assert_eq!(settings.overpass.server_timeout_secs, 25);
    }

    #[test]
    fn test_invalid_tag_is_rejected() {
        assert!(toml::from_str::<FileConfig>(r#"tag = "amenity""#).is_err());
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        settings.radius_m = 0.0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        let mut settings = Settings::default();
        settings.radius_m = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.overpass.urls.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        let later = dir.path().join("later.toml");
        std::fs::write(&broken, "radius = [").unwrap();
        std::fs::write(&good, "verbose = true\nmax_results = 7\n").unwrap();
        std::fs::write(&later, "max_results = 99\n").unwrap();

        let (config, skipped) = FileConfig::load_first(&[missing, broken, good, later]);

        let config = config.unwrap();
        assert!(config.verbose);
        assert_eq!(config.max_results, Some(7));
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_with_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let (config, skipped) = FileConfig::load_first(&[dir.path().join("poiscout.toml")]);
        assert!(config.is_none());
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poiscout.toml");

        assert!(matches!(
            FileConfig::from_path(&path),
            Err(ConfigError::NotFound(_))
        ));

        std::fs::write(&path, "max_results = 3\n").unwrap();
        assert_eq!(FileConfig::from_path(&path).unwrap().max_results, Some(3));

        std::fs::write(&path, "max_results = \"three\"\n").unwrap();
        assert!(matches!(
            FileConfig::from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
