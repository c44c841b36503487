//! Configuration file handling.
//!
//! The configuration file is stored at `$SUIVI_HOME/config.json`. It says where the two dashboard
//! files live and holds the unit prices used for billing.

use crate::billing::BillingTable;
use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::inject::InjectionTarget;
use crate::model::{Amount, Source};
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "suivi";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const DEFAULT_DISPLAY_PATH: &str = "dashboard/index.html";
const DEFAULT_SCRIPT_PATH: &str = "dashboard/charts.js";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$SUIVI_HOME` and from there it loads `$SUIVI_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    prices: BillingTable,
}

impl Config {
    /// Creates the home directory and an initial `config.json`. An existing `config.json` is
    /// never overwritten.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the home directory, e.g. `$HOME/suivi`
    /// - `display` - The dashboard page; defaults to `dashboard/index.html` in the home directory.
    /// - `script` - The chart script; defaults to `dashboard/charts.js` in the home directory.
    pub async fn create(
        dir: impl Into<PathBuf>,
        display: Option<&Path>,
        script: Option<&Path>,
    ) -> Result<Self> {
        Self::create_inner(dir.into(), display, script)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(
        maybe_relative: PathBuf,
        display: Option<&Path>,
        script: Option<&Path>,
    ) -> Res<Self> {
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the suivi home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "{} already exists, edit it instead of running init again",
                config_path.display()
            );
        }

        let config_file = ConfigFile {
            display_path: display
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DISPLAY_PATH)),
            script_path: script
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_PATH)),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
            prices: BillingTable::new(),
        })
    }

    /// This will
    /// - validate that `suivi_home` and its config file exist
    /// - load and validate the config file, prices included
    /// - return the loaded configuration object
    pub async fn load(suivi_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(suivi_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        if !maybe_relative.is_dir() {
            bail!(
                "The suivi home directory is missing '{}', run `suivi init` first",
                maybe_relative.display()
            )
        }
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let prices = BillingTable::from_prices(config_file.prices.clone())
            .with_context(|| format!("Invalid prices in {}", config_path.display()))?;

        Ok(Self {
            root,
            config_path,
            config_file,
            prices,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn display_path(&self) -> PathBuf {
        self.resolve(&self.config_file.display_path)
    }

    pub fn script_path(&self) -> PathBuf {
        self.resolve(&self.config_file.script_path)
    }

    /// The two dashboard files, resolved.
    pub fn target(&self) -> InjectionTarget {
        InjectionTarget::new(self.display_path(), self.script_path())
    }

    pub fn prices(&self) -> &BillingTable {
        &self.prices
    }

    /// Checks if `p` is relative, and if so, resolves it against the home directory.
    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            return p.to_path_buf();
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "suivi",
///   "config_version": 1,
///   "display_path": "dashboard/index.html",
///   "script_path": "dashboard/charts.js",
///   "prices": { "cm": { "RAF": "1.50", "CREA": "4.00" } }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "suivi"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The dashboard page, relative to the home directory or absolute
    display_path: PathBuf,

    /// The chart script, relative to the home directory or absolute
    script_path: PathBuf,

    /// Unit prices per source and category
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    prices: BTreeMap<Source, BTreeMap<String, Amount>>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            display_path: PathBuf::from(DEFAULT_DISPLAY_PATH),
            script_path: PathBuf::from(DEFAULT_SCRIPT_PATH),
            prices: BTreeMap::new(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or was not written for this app
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config version {} is newer than this program supports ({})",
            config.config_version,
            CONFIG_VERSION
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("suivi_home");

        let config = Config::create(&home, None, Some(Path::new("/srv/www/charts.js")))
            .await
            .unwrap();
        assert!(config.config_path().is_file());
        assert_eq!(
            config.display_path(),
            config.root().join("dashboard/index.html")
        );
        assert_eq!(config.script_path(), PathBuf::from("/srv/www/charts.js"));

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.target(), config.target());
        assert!(loaded.prices().is_empty());
    }

    #[tokio::test]
    async fn test_create_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), None, None).await.unwrap();
        let err = Config::create(dir.path(), None, None).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_load_prices() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "suivi",
            "config_version": 1,
            "display_path": "index.html",
            "script_path": "charts.js",
            "prices": { "cm": { "RAF": "1,50 €", "CREA": 4 } }
        }"#;
        utils::write(dir.path().join(CONFIG_JSON), json).await.unwrap();

        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.prices().price(Source::Cm, "RAF").to_string(), "1.50");
        assert_eq!(config.prices().price(Source::Cm, "CREA").to_string(), "4.00");
        assert!(config.prices().price(Source::Cm, "MODIF").is_zero());
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_price_category() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "suivi",
            "config_version": 1,
            "display_path": "index.html",
            "script_path": "charts.js",
            "prices": { "upr": { "KO": "1" } }
        }"#;
        utils::write(dir.path().join(CONFIG_JSON), json).await.unwrap();

        let err = Config::load(dir.path()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(err.to_string().contains("'KO' is not a category of upr"), "{err}");
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "other-app",
            "config_version": 1,
            "display_path": "index.html",
            "script_path": "charts.js"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let t = TempDir::new().unwrap();
        let path = t.path().join("file.json");
        let original = ConfigFile::default();
        original.save(&path).await.unwrap();
        let json = utils::read(&path).await.unwrap();
        assert!(!json.contains("prices"));
        assert_eq!(original, ConfigFile::load(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert!(err.to_string().contains("suivi init"));
    }
}
