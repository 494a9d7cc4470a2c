use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use larder_core::weather::Coordinates;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub weather: WeatherSettings,
}

/// Optional `config.toml` in the config directory.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    db_path: Option<PathBuf>,
    #[serde(default)]
    weather: WeatherSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherSettings {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl WeatherSettings {
    /// Both values must be set and in range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude))
                if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) =>
            {
                Some(Coordinates {
                    latitude,
                    longitude,
                })
            }
            _ => None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "larder").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_file = proj_dirs.config_dir().join("config.toml");
        let env_db = std::env::var_os("LARDER_DB").map(PathBuf::from);
        Self::from_parts(data_dir, &config_file, env_db)
    }

    fn from_parts(data_dir: PathBuf, config_file: &Path, env_db: Option<PathBuf>) -> Result<Self> {
        let file = if config_file.exists() {
            let text = std::fs::read_to_string(config_file)
                .with_context(|| format!("Failed to read {}", config_file.display()))?;
            toml::from_str::<FileConfig>(&text)
                .with_context(|| format!("Invalid config file: {}", config_file.display()))?
        } else {
            FileConfig::default()
        };

        let db_path = env_db
            .or(file.db_path)
            .unwrap_or_else(|| data_dir.join("larder.db"));

        tracing::debug!(db = %db_path.display(), "configuration loaded");
        Ok(Config {
            db_path,
            data_dir,
            weather: file.weather,
        })
    }

    pub fn weather_cache_path(&self) -> PathBuf {
        self.data_dir.join("weather_cache.json")
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)`.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}
